//! Commands every bot has: start, the command listing, support contact and
//! the admin-only restart.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{info, warn};

use crate::registry::{CommandDecl, CommandModule, Context, Gate, HandlerResult, ListingSection, handler};
use crate::utils::{display_name, html_escape, mention_html};

const START_TEXT: &str = "<b>Hi, I'm Xenian!</b>\n\n\
    I can search images in reverse, manage your groups, keep custom databases of \
    stickers, GIFs and whatever else you send me, and do a few small things \
    like rolling dice or looking up words.\n\n\
    Send /commands to see everything I can do.";

const SUPPORT_TEXT: &str = "If you need any help do not hesitate to contact me via \
    \"/contribute YOUR_MESSAGE\", if you have found an error please use \
    \"/error ERROR_DESCRIPTION\".";

pub struct Builtins;

/// HTML command listing.
pub fn render_listing(sections: &[ListingSection<'_>]) -> String {
    let mut out = String::from("<b>Available commands</b>\n");

    for section in sections {
        out.push_str(&format!("\n<b>{}</b>\n", html_escape(section.group)));

        for command in &section.direct {
            let word = command.command_word().unwrap_or(&command.command_name);
            out.push_str(&format!("/{word}"));
            for arg in &command.args {
                out.push_str(&format!(" <i>{}</i>", html_escape(&arg.to_uppercase())));
            }
            if !command.description.is_empty() {
                out.push_str(&format!(" - {}", html_escape(&command.description)));
            }
            out.push('\n');
        }

        for command in &section.indirect {
            out.push_str(&format!("<i>{}</i>", html_escape(&command.title)));
            if !command.description.is_empty() {
                out.push_str(&format!(" - {}", html_escape(&command.description)));
            }
            out.push('\n');
        }
    }

    out
}

/// `command - description` lines, as BotFather expects them.
pub fn render_raw_listing(sections: &[ListingSection<'_>]) -> String {
    sections
        .iter()
        .flat_map(|section| &section.direct)
        .filter_map(|command| {
            let word = command.command_word()?;
            Some(format!("{} - {}", word, command.description))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Builtins {
    async fn start(&self, ctx: Context) -> HandlerResult {
        ctx.reply_html(START_TEXT).await?;
        Ok(())
    }

    async fn list_commands(&self, ctx: Context) -> HandlerResult {
        let listing = ctx.registry.listing();

        if ctx.args.iter().any(|a| a == "raw") {
            ctx.reply(render_raw_listing(&listing)).await?;
        } else {
            ctx.reply_html(render_listing(&listing)).await?;
        }
        Ok(())
    }

    async fn support(&self, ctx: Context) -> HandlerResult {
        ctx.reply(SUPPORT_TEXT).await?;
        Ok(())
    }

    async fn contribute(&self, ctx: Context) -> HandlerResult {
        self.forward(ctx, "Contribution", "Please describe your request with \"/contribute YOUR_DESCRIPTION\"")
            .await
    }

    async fn error(&self, ctx: Context) -> HandlerResult {
        self.forward(ctx, "Error", "Please describe your issue with \"/error YOUR_DESCRIPTION\"")
            .await
    }

    /// Send the command text to the admins and supporters.
    async fn forward(&self, ctx: Context, kind: &str, usage: &str) -> HandlerResult {
        let text = ctx.rest_text();
        if text.is_empty() {
            ctx.reply(usage).await?;
            return Ok(());
        }

        info!("Forwarding {} from {}", kind, ctx.user().map(display_name).unwrap_or_default());
        let from = ctx.user().map(mention_html).unwrap_or_default();
        let report = format!("{} from {}: {}", kind, from, html_escape(text));

        for chat_id in ctx.state.supporters() {
            if let Err(e) = ctx
                .bot
                .send_message(chat_id, report.clone())
                .parse_mode(ParseMode::Html)
                .await
            {
                warn!("Could not forward {} to {}: {}", kind, chat_id, e);
            }
        }

        ctx.reply("I forwarded your request to the admins and supporters.")
            .await?;
        Ok(())
    }

    async fn restart(&self, ctx: Context) -> HandlerResult {
        info!("Restart requested in chat {}", ctx.chat_id);
        ctx.reply("Restarting...").await?;
        ctx.state.restart.request(ctx.chat_id);
        Ok(())
    }
}

impl CommandModule for Builtins {
    fn group(&self) -> &'static str {
        "Bot Helpers"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        vec![
            CommandDecl::new(handler!(self, start)).description("Initialize the bot"),
            CommandDecl::new(handler!(self, list_commands))
                .command_name("commands")
                .title("Commands")
                .description("Show all available commands"),
            CommandDecl::alias("help", "commands"),
            CommandDecl::new(handler!(self, support))
                .description("Contact bot maintainer for support of any kind"),
            CommandDecl::new(handler!(self, contribute))
                .description("Send the supporters and admins a request of any kind")
                .args(["text"]),
            CommandDecl::new(handler!(self, error))
                .description("If you have found an error please use this command.")
                .args(["text"]),
            CommandDecl::new(handler!(self, restart))
                .description("Restart the bot")
                .hidden(true)
                .gate(Gate::BotAdmin),
        ]
    }
}
