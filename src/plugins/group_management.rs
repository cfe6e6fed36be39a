//! Group moderation: bans, warnings, kicks and rules.
//!
//! Moderation commands only match in groups where both the sender and the
//! bot are admins, and never against another admin.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, User, UserId};
use tracing::{info, warn};

use crate::bot::ThrottledBot;
use crate::registry::{CommandDecl, CommandModule, Context, Gate, HandlerResult, MessageFilter, Route, handler};
use crate::utils::mention_html;

/// Warnings after which a user is banned.
const MAX_WARNINGS: u32 = 3;

const KICK_DEFAULT_MINUTES: f64 = 10.0;
const KICK_MIN_MINUTES: f64 = 0.5;
const KICK_MAX_MINUTES: f64 = 527_040.0;

const UNWARN_PREFIX: &str = "gm_unwarn";

pub struct GroupManagement;

fn moderation(decl: CommandDecl) -> CommandDecl {
    decl.filter(MessageFilter::Group)
        .gate(Gate::UserGroupAdmin)
        .gate(Gate::BotGroupAdmin)
        .gate(Gate::ReplyNotGroupAdmin)
}

fn reply_target(ctx: &Context) -> Option<User> {
    ctx.message()?.reply_to_message()?.from.clone()
}

/// Parse the `/kick` duration in minutes.
fn kick_minutes(args: &[String]) -> Result<f64, &'static str> {
    let Some(raw) = args.first() else {
        return Ok(KICK_DEFAULT_MINUTES);
    };
    let minutes: f64 = raw
        .parse()
        .map_err(|_| "You have to give me the time in min like /kick 30")?;
    if !(KICK_MIN_MINUTES..=KICK_MAX_MINUTES).contains(&minutes) {
        return Err("Time must be between 30 sec (0.5 min) and 366 days (527040 min).");
    }
    Ok(minutes)
}

fn unwarn_data(user_id: UserId) -> String {
    format!("{UNWARN_PREFIX}:{}", user_id.0)
}

fn parse_unwarn_data(data: &str) -> Option<UserId> {
    data.strip_prefix(UNWARN_PREFIX)?
        .strip_prefix(':')?
        .parse()
        .ok()
        .map(UserId)
}

impl GroupManagement {
    async fn ban(&self, ctx: Context) -> HandlerResult {
        let Some(target) = reply_target(&ctx) else {
            ctx.reply("You have to reply to a message from this user to ban them.").await?;
            return Ok(());
        };
        self.ban_user(&ctx, &target, true).await
    }

    /// Announce in the chat, as a reply to the command when `threaded`.
    fn announce(&self, ctx: &Context, text: String, threaded: bool) -> <ThrottledBot as Requester>::SendMessage {
        if threaded {
            ctx.reply_html(text)
        } else {
            ctx.bot.send_message(ctx.chat_id, text).parse_mode(ParseMode::Html)
        }
    }

    async fn ban_user(&self, ctx: &Context, target: &User, threaded: bool) -> HandlerResult {
        ctx.state
            .chats
            .set_warnings(ctx.chat_id.0, target.id.0, MAX_WARNINGS)
            .await?;
        ctx.bot.ban_chat_member(ctx.chat_id, target.id).await?;
        ctx.state.permissions.invalidate(ctx.chat_id, target.id);

        info!("Banned user {} in chat {}", target.id, ctx.chat_id);

        let by = ctx.user().map(mention_html).unwrap_or_default();
        self.announce(ctx, format!("{} was banned by {}", mention_html(target), by), threaded)
            .await?;
        Ok(())
    }

    async fn warn(&self, ctx: Context) -> HandlerResult {
        let Some(target) = reply_target(&ctx) else {
            ctx.reply("You have to reply to a message from this user to warn them.").await?;
            return Ok(());
        };
        self.strike(&ctx, &target, true).await
    }

    async fn strike(&self, ctx: &Context, target: &User, threaded: bool) -> HandlerResult {
        let count = ctx.state.chats.add_warning(ctx.chat_id.0, target.id.0).await?;
        if count >= MAX_WARNINGS {
            return self.ban_user(ctx, target, threaded).await;
        }

        let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
            "Remove warning",
            unwarn_data(target.id),
        )]]);

        let text = format!(
            "{} was warned.\nUser has now <code>{}</code> warnings. Users with {} warnings get banned automatically.",
            mention_html(target),
            count,
            MAX_WARNINGS
        );
        self.announce(ctx, text, threaded).reply_markup(keyboard).await?;
        Ok(())
    }

    async fn kick(&self, ctx: Context) -> HandlerResult {
        let Some(target) = reply_target(&ctx) else {
            ctx.reply("You have to reply to a message from this user to kick them.").await?;
            return Ok(());
        };
        let minutes = match kick_minutes(&ctx.args) {
            Ok(minutes) => minutes,
            Err(message) => {
                ctx.reply(message).await?;
                return Ok(());
            }
        };

        let duration = Duration::from_secs_f64(minutes * 60.0);
        let until = Utc::now() + chrono::Duration::from_std(duration)?;
        ctx.bot
            .ban_chat_member(ctx.chat_id, target.id)
            .until_date(until)
            .await?;

        let by = ctx.user().map(mention_html).unwrap_or_default();
        ctx.reply_html(format!(
            "{} was kicked for {} min by {}",
            mention_html(&target),
            minutes,
            by
        ))
        .await?;

        let bot = ctx.bot.clone();
        let chat_id = ctx.chat_id;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let text = format!(
                "{} was kicked {} min ago and can now join again",
                mention_html(&target),
                minutes
            );
            if let Err(e) = bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await {
                warn!("Could not announce end of kick in {}: {}", chat_id, e);
            }
        });
        Ok(())
    }

    async fn delete(&self, ctx: Context) -> HandlerResult {
        let Some(msg) = ctx.message() else {
            return Ok(());
        };
        let Some(reply) = msg.reply_to_message() else {
            return Ok(());
        };
        let Some(target) = reply.from.clone() else {
            return Ok(());
        };

        ctx.bot.delete_message(ctx.chat_id, reply.id).await?;
        ctx.bot.delete_message(ctx.chat_id, msg.id).await?;

        // The command message is gone, nothing to reply to.
        self.strike(&ctx, &target, false).await
    }

    async fn unwarn(&self, ctx: Context) -> HandlerResult {
        let Some(target) = reply_target(&ctx) else {
            ctx.reply("You have to reply to a message from this user to remove their warnings.")
                .await?;
            return Ok(());
        };

        let chat = ctx.state.chats.get(ctx.chat_id.0).await?;
        if !chat.is_some_and(|c| c.was_warned(target.id.0)) {
            ctx.reply_html(format!("{} was never warned", mention_html(&target)))
                .await?;
            return Ok(());
        }

        ctx.state.chats.set_warnings(ctx.chat_id.0, target.id.0, 0).await?;
        ctx.reply_html(format!("Warnings were removed from {}.", mention_html(&target)))
            .await?;
        Ok(())
    }

    /// "Remove warning" button under a warning.
    async fn remove_warning(&self, ctx: Context) -> HandlerResult {
        let Some(query) = ctx.callback_query() else {
            return Ok(());
        };
        let Some(target) = query.data.as_deref().and_then(parse_unwarn_data) else {
            return Ok(());
        };

        if !ctx.state.permissions.is_admin(ctx.chat_id, query.from.id).await? {
            ctx.bot
                .answer_callback_query(query.id.clone())
                .text("Only admins can remove warnings.")
                .await?;
            return Ok(());
        }

        let text = match ctx.state.chats.remove_warning(ctx.chat_id.0, target.0).await? {
            Some(left) => format!(
                "Warning removed by {}. User has now <code>{}</code> warnings.",
                mention_html(&query.from),
                left
            ),
            None => "This user has no warnings.".to_string(),
        };
        ctx.edit_text(text).await?;
        ctx.bot.answer_callback_query(query.id.clone()).await?;
        Ok(())
    }

    async fn rules(&self, ctx: Context) -> HandlerResult {
        let rules = ctx
            .state
            .chats
            .get(ctx.chat_id.0)
            .await?
            .map(|c| c.group_rules)
            .unwrap_or_default();

        if rules.trim().is_empty() {
            ctx.reply("This group has no rules defined, use /rules_define to add them.")
                .await?;
            return Ok(());
        }
        ctx.reply_html(rules).await?;
        Ok(())
    }

    async fn rules_define(&self, ctx: Context) -> HandlerResult {
        let replied = ctx
            .message()
            .and_then(|m| m.reply_to_message())
            .and_then(|r| r.text())
            .map(str::to_string);
        let text = replied.unwrap_or_else(|| ctx.rest_text().to_string());

        if text.trim().is_empty() {
            ctx.reply(
                "You either have to reply to a message with text or give me some text. \
                 The rules accept HTML formatting.",
            )
            .await?;
            return Ok(());
        }

        ctx.state.chats.set_rules(ctx.chat_id.0, &text).await?;
        let by = ctx.user().map(mention_html).unwrap_or_default();
        ctx.reply_html(format!("{by} has set new /rules.")).await?;
        Ok(())
    }

    async fn rules_remove(&self, ctx: Context) -> HandlerResult {
        let has_rules = ctx
            .state
            .chats
            .get(ctx.chat_id.0)
            .await?
            .is_some_and(|c| !c.group_rules.trim().is_empty());

        if !has_rules {
            ctx.reply("This group has no rules defined, use /rules_define to add them.")
                .await?;
            return Ok(());
        }

        ctx.state.chats.set_rules(ctx.chat_id.0, "").await?;
        let by = ctx.user().map(mention_html).unwrap_or_default();
        ctx.reply_html(format!("{by} has removed the group's rules.")).await?;
        Ok(())
    }
}

impl CommandModule for GroupManagement {
    fn group(&self) -> &'static str {
        "Group Management"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        vec![
            moderation(
                CommandDecl::new(handler!(self, ban))
                    .description("Ban a user. Reply to one of their messages with this command (Group Only)"),
            ),
            moderation(CommandDecl::new(handler!(self, warn)).title("Strike").description(
                "Warn a user, after 3 warnings they get banned. Reply to one of their messages with this \
                 command (Group Only)",
            )),
            moderation(CommandDecl::new(handler!(self, kick)).args(["time"]).description(
                "Kick a user for 10 min or give a specific amount of time (in min) between 30sec (0.5 min) \
                 and 366 days (527040 min). Reply to one of their messages with this command (Group Only)",
            )),
            moderation(CommandDecl::new(handler!(self, delete)).title("Delete and Warn").description(
                "Delete a message from a user and warn them. Reply to one of their messages with this command \
                 (Group Only)",
            )),
            moderation(CommandDecl::new(handler!(self, unwarn)).title("Remove Warnings").description(
                "Remove all warnings from a user. Reply to one of their messages with this command (Group Only)",
            )),
            CommandDecl::new(handler!(self, remove_warning))
                .route(Route::callback(&format!(r"^{UNWARN_PREFIX}:\d+$")))
                .hidden(true),
            CommandDecl::new(handler!(self, rules))
                .description("Show rules for this group (Group Only)")
                .filter(MessageFilter::Group),
            CommandDecl::new(handler!(self, rules_define))
                .title("Define Rules")
                .description("Define rules for this group (Group Only)")
                .args(["text"])
                .filter(MessageFilter::Group)
                .gate(Gate::UserGroupAdmin),
            CommandDecl::new(handler!(self, rules_remove))
                .title("Remove Rules")
                .description("Remove rules for this group (Group Only)")
                .filter(MessageFilter::Group)
                .gate(Gate::UserGroupAdmin),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_kick_minutes() {
        assert_eq!(kick_minutes(&[]), Ok(10.0));
        assert_eq!(kick_minutes(&args(&["0.5"])), Ok(0.5));
        assert_eq!(kick_minutes(&args(&["527040"])), Ok(527_040.0));
        assert!(kick_minutes(&args(&["0.1"])).is_err());
        assert!(kick_minutes(&args(&["600000"])).is_err());
        assert!(kick_minutes(&args(&["soon"])).is_err());
    }

    #[test]
    fn test_unwarn_data() {
        let data = unwarn_data(UserId(42));
        assert_eq!(data, "gm_unwarn:42");
        assert_eq!(parse_unwarn_data(&data), Some(UserId(42)));
        assert_eq!(parse_unwarn_data("gm_unwarn:x"), None);
        assert_eq!(parse_unwarn_data("other:42"), None);
    }

    #[test]
    fn test_declarations() {
        let mut builder = crate::registry::RegistryBuilder::default();
        assert!(builder.register(Arc::new(GroupManagement)).is_ok());

        let registry = builder.build();
        let listing = registry.listing();
        let visible: Vec<_> = listing[0].direct.iter().map(|c| c.command_name.as_str()).collect();
        assert_eq!(
            visible,
            vec!["ban", "warn", "kick", "delete", "unwarn", "rules", "rules_define", "rules_remove"]
        );
        assert_eq!(listing[0].direct[1].title, "Strike");
    }
}
