//! Random anime GIFs out of a collection bot admins build up.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::warn;

use crate::database::StoredGif;
use crate::registry::{CommandDecl, CommandModule, Context, Gate, HandlerResult, MediaKind, MessageFilter, Route, handler};

pub fn render_saved(new: bool, count: u64) -> String {
    if new {
        format!("GIF was saved [{count}]")
    } else {
        "GIF was already saved".to_string()
    }
}

pub struct Anime;

impl Anime {
    async fn random(&self, ctx: Context) -> HandlerResult {
        match ctx.state.gifs.random().await? {
            Some(gif) => {
                ctx.bot
                    .send_animation(ctx.chat_id, InputFile::file_id(gif.file_id))
                    .await?;
            }
            None => {
                ctx.reply("No GIFs were saved yet.").await?;
            }
        }
        Ok(())
    }

    async fn toggle_gif_save(&self, ctx: Context) -> HandlerResult {
        let mode = !ctx.state.gifs.save_mode(ctx.chat_id.0).await?;
        ctx.state.gifs.set_save_mode(ctx.chat_id.0, mode).await?;

        ctx.reply_html(format!("GIF save mode turned <code>{}</code>", if mode { "on" } else { "off" }))
            .await?;
        Ok(())
    }

    async fn store(&self, ctx: &Context, gif: StoredGif) -> HandlerResult {
        let new = ctx.state.gifs.save(&gif).await?;
        let count = ctx.state.gifs.count().await?;
        ctx.reply(render_saved(new, count)).await?;
        Ok(())
    }

    async fn save_gif(&self, ctx: Context) -> HandlerResult {
        let gif = ctx
            .message()
            .and_then(|m| m.reply_to_message())
            .and_then(|m| m.animation())
            .map(StoredGif::from);
        match gif {
            Some(gif) => self.store(&ctx, gif).await,
            None => {
                ctx.reply("You have to reply to a GIF").await?;
                Ok(())
            }
        }
    }

    async fn save_sent_gif(&self, ctx: Context) -> HandlerResult {
        let Some(gif) = ctx.message().and_then(|m| m.animation()).map(StoredGif::from) else {
            return Ok(());
        };
        self.store(&ctx, gif).await
    }
}

fn gif_save_mode_on() -> Gate {
    Gate::custom(|view, state| async move {
        match state.gifs.save_mode(view.chat_id).await {
            Ok(mode) => mode,
            Err(e) => {
                warn!("Could not read gif save mode of {}: {:#}", view.chat_id, e);
                false
            }
        }
    })
}

impl CommandModule for Anime {
    fn group(&self) -> &'static str {
        "Anime"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        vec![
            CommandDecl::new(handler!(self, random))
                .description("Send random anime GIF")
                .run_async(),
            CommandDecl::new(handler!(self, toggle_gif_save))
                .hidden(true)
                .filter(!MessageFilter::Group)
                .gate(Gate::BotAdmin),
            CommandDecl::new(handler!(self, save_gif))
                .hidden(true)
                .gate(Gate::BotAdmin),
            CommandDecl::new(handler!(self, save_sent_gif))
                .title("Save Anime Gif")
                .hidden(true)
                .route(Route::message(
                    MessageFilter::Media(MediaKind::Animation) & !MessageFilter::Group,
                ))
                .gate(Gate::BotAdmin)
                .gate(gif_save_mode_on()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{HandlerKind, RegistryBuilder};

    #[test]
    fn test_render_saved() {
        assert_eq!(render_saved(true, 12), "GIF was saved [12]");
        assert_eq!(render_saved(false, 12), "GIF was already saved");
    }

    #[test]
    fn test_declarations() {
        let mut builder = RegistryBuilder::default();
        assert!(builder.register(Arc::new(Anime)).is_ok());
        let registry = builder.build();

        let commands = &registry.modules()[0].commands;
        let names: Vec<_> = commands.iter().map(|c| c.command_name.as_str()).collect();
        assert_eq!(names, vec!["random", "toggle_gif_save", "save_gif", "save_sent_gif"]);
        assert_eq!(commands[3].kind(), HandlerKind::Message);

        let published: Vec<_> = registry.bot_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(published, vec!["random".to_string()]);
    }
}
