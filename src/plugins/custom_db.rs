//! Custom databases: per-chat collections of stickers, media and texts
//! filed under a tag.
//!
//! Objects are saved either while save mode is on in a private chat, or by
//! replying `/db_save` to a message. Tag and content-type choices go through
//! persisted keyboard buttons.

use std::sync::Arc;

use dashmap::DashMap;
use mongodb::bson::doc;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use tracing::{debug, warn};

use crate::buttons;
use crate::database::{Button, ObjectKind, SaveMode, StoredObject};
use crate::registry::{
    CommandDecl, CommandModule, Context, Gate, Handler, HandlerResult, MediaKind, MessageFilter, Route, handler,
};
use crate::utils::html_escape;

const PREFIX: &str = "customdb";
const DEFAULT_TAG: &str = "user";
const TAGS_PER_ROW: usize = 3;

/// Saveable content of a message.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub kind: ObjectKind,
    pub text: Option<String>,
    pub file_id: String,
}

impl Content {
    /// Media first, plain text otherwise. Photos keep their largest size.
    pub fn of(msg: &Message) -> Option<Self> {
        let caption = msg.caption().map(str::to_string);
        let media = |kind, file_id: String| Self {
            kind,
            text: caption.clone(),
            file_id,
        };

        if let Some(document) = msg.document() {
            return Some(media(ObjectKind::Document, document.file.id.to_string()));
        }
        if let Some(video) = msg.video() {
            return Some(media(ObjectKind::Video, video.file.id.to_string()));
        }
        if let Some(photo) = msg.photo().and_then(|sizes| sizes.iter().max_by_key(|p| p.file.size)) {
            return Some(media(ObjectKind::Photo, photo.file.id.to_string()));
        }
        if let Some(sticker) = msg.sticker() {
            return Some(media(ObjectKind::Sticker, sticker.file.id.to_string()));
        }
        if let Some(audio) = msg.audio() {
            return Some(media(ObjectKind::Audio, audio.file.id.to_string()));
        }
        if let Some(voice) = msg.voice() {
            return Some(media(ObjectKind::Voice, voice.file.id.to_string()));
        }

        msg.text().map(|text| Self {
            kind: ObjectKind::Text,
            text: Some(text.to_string()),
            file_id: String::new(),
        })
    }

    fn into_object(self, chat_id: ChatId, tag: &str) -> StoredObject {
        StoredObject {
            chat_id: chat_id.0,
            tag: tag.to_string(),
            kind: self.kind,
            text: self.text,
            file_id: self.file_id,
        }
    }
}

/// Number of objects per kind, in [`ObjectKind::ALL`] order, and the total.
pub fn summarize(objects: &[StoredObject]) -> (Vec<(ObjectKind, usize)>, usize) {
    let counts = ObjectKind::ALL
        .into_iter()
        .map(|kind| (kind, objects.iter().filter(|o| o.kind == kind).count()))
        .collect();
    (counts, objects.len())
}

fn render_summary(tag: &str, objects: &[StoredObject]) -> String {
    let (counts, total) = summarize(objects);
    let mut out = format!("<b>Database {}</b>\n\n", html_escape(tag));
    for (kind, count) in counts {
        out.push_str(&format!("{}: {}\n", capitalize(kind.as_str()), count));
    }
    out.push_str(&format!("\n<b>Total</b>: {total}"));
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn cancel_button() -> Button {
    Button::new(PREFIX, "Cancel", "cancel")
}

/// Tag buttons, three per row, followed by a cancel row.
fn tag_rows(tags: &[String], action: &str, confirm: bool) -> Vec<Vec<Button>> {
    let default = [DEFAULT_TAG.to_string()];
    let tags = if tags.is_empty() { &default[..] } else { tags };

    let mut rows: Vec<Vec<Button>> = tags
        .chunks(TAGS_PER_ROW)
        .map(|chunk| {
            chunk
                .iter()
                .map(|tag| {
                    let button = Button::new(PREFIX, tag.as_str(), action).data(doc! { "tag": tag.as_str() });
                    if confirm { button.confirm(None) } else { button }
                })
                .collect()
        })
        .collect();
    rows.push(vec![cancel_button()]);
    rows
}

fn tag_of(ctx: &Context) -> String {
    ctx.button
        .as_ref()
        .and_then(|b| b.data_str("tag"))
        .unwrap_or(DEFAULT_TAG)
        .to_string()
}

async fn send_object(ctx: &Context, object: &StoredObject) -> anyhow::Result<()> {
    let chat_id = ctx.chat_id;
    let file = || InputFile::file_id(object.file_id.clone());
    let caption = object.text.clone().unwrap_or_default();

    match object.kind {
        ObjectKind::Text => {
            ctx.bot.send_message(chat_id, caption).await?;
        }
        ObjectKind::Sticker => {
            ctx.bot.send_sticker(chat_id, file()).await?;
        }
        ObjectKind::Photo => {
            ctx.bot.send_photo(chat_id, file()).caption(caption).await?;
        }
        ObjectKind::Video => {
            ctx.bot.send_video(chat_id, file()).caption(caption).await?;
        }
        ObjectKind::Document => {
            ctx.bot.send_document(chat_id, file()).caption(caption).await?;
        }
        ObjectKind::Audio => {
            ctx.bot.send_audio(chat_id, file()).caption(caption).await?;
        }
        ObjectKind::Voice => {
            ctx.bot.send_voice(chat_id, file()).caption(caption).await?;
        }
    }
    Ok(())
}

#[derive(Default)]
pub struct CustomDb {
    /// Replied-to messages waiting for a tag from the `/db_save` chooser,
    /// by user id.
    pending: DashMap<u64, Message>,
}

impl CustomDb {
    async fn show_tag_chooser(&self, ctx: &Context, action: &str, text: &str, confirm: bool) -> HandlerResult {
        let tags = ctx.state.custom_db.tags(ctx.chat_id.0).await?;
        let markup = buttons::keyboard(ctx.state.buttons.as_ref(), tag_rows(&tags, action, confirm)).await?;

        ctx.reply(text).reply_markup(markup).await?;
        Ok(())
    }

    async fn save_content(&self, ctx: &Context, content: Content, tag: &str) -> HandlerResult {
        let kind = content.kind;
        let object = content.into_object(ctx.chat_id, tag);
        ctx.state.custom_db.save(&object).await?;

        ctx.bot
            .send_message(
                ctx.chat_id,
                format!("{} was saved to <code>{}</code>!", capitalize(kind.as_str()), html_escape(tag)),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn turn_on(&self, ctx: &Context, tag: String) -> anyhow::Result<String> {
        let mode = SaveMode {
            chat_id: ctx.chat_id.0,
            mode: true,
            tag,
        };
        ctx.state.custom_db.set_save_mode(&mode).await?;
        debug!("Save mode on in {} for {}", mode.chat_id, mode.tag);

        Ok(format!(
            "Save mode turned on for <code>[{}]</code>. You can send me any type of Telegram object to save it.",
            html_escape(&mode.tag)
        ))
    }

    async fn db_save_mode(&self, ctx: Context) -> HandlerResult {
        let mut mode = ctx.state.custom_db.save_mode(ctx.chat_id.0).await?;

        if mode.mode {
            mode.mode = false;
            ctx.state.custom_db.set_save_mode(&mode).await?;
            ctx.reply("Save mode turned off").await?;
        } else if let Some(tag) = ctx.args.first() {
            let text = self.turn_on(&ctx, tag.to_lowercase()).await?;
            ctx.reply_html(text).await?;
        } else {
            self.show_tag_chooser(&ctx, "toggle_save_mode", "Choose a database:", false)
                .await?;
        }
        Ok(())
    }

    async fn save(&self, ctx: Context) -> HandlerResult {
        let Some(content) = ctx.message().and_then(Content::of) else {
            return Ok(());
        };
        let mode = ctx.state.custom_db.save_mode(ctx.chat_id.0).await?;
        let tag = if mode.tag.is_empty() { DEFAULT_TAG } else { mode.tag.as_str() };

        self.save_content(&ctx, content, tag).await
    }

    async fn db_save(&self, ctx: Context) -> HandlerResult {
        let Some(reply) = ctx.message().and_then(|m| m.reply_to_message()).cloned() else {
            ctx.reply("You have to reply to some message.").await?;
            return Ok(());
        };

        if let Some(tag) = ctx.args.first() {
            let Some(content) = Content::of(&reply) else {
                ctx.reply("You either have to send something or reply to something").await?;
                return Ok(());
            };
            return self.save_content(&ctx, content, &tag.to_lowercase()).await;
        }

        if let Some(user) = ctx.user() {
            self.pending.insert(user.id.0, reply);
        }
        self.show_tag_chooser(&ctx, "save", "Choose a database:", false).await
    }

    async fn db_info(&self, ctx: Context) -> HandlerResult {
        self.show_tag_chooser(&ctx, "info", "Select a database to see its info:", false)
            .await
    }

    async fn db_list(&self, ctx: Context) -> HandlerResult {
        self.show_tag_chooser(&ctx, "ask_content_type", "Choose a database:", false)
            .await
    }

    async fn db_delete(&self, ctx: Context) -> HandlerResult {
        self.show_tag_chooser(&ctx, "delete", "Select the database to delete:", true)
            .await
    }

    /// Button presses in groups are reserved for group admins.
    async fn allowed(&self, ctx: &Context) -> anyhow::Result<bool> {
        if !ctx.is_group() {
            return Ok(true);
        }
        match ctx.user() {
            Some(user) => ctx.state.permissions.is_admin(ctx.chat_id, user.id).await,
            None => Ok(false),
        }
    }

    async fn toggle_save_mode(&self, ctx: Context) -> HandlerResult {
        let text = self.turn_on(&ctx, tag_of(&ctx)).await?;
        ctx.edit_text(text).await
    }

    async fn save_pending(&self, ctx: Context) -> HandlerResult {
        let pending = ctx.user().and_then(|u| self.pending.remove(&u.id.0)).map(|(_, msg)| msg);
        let Some(content) = pending.as_ref().and_then(Content::of) else {
            ctx.edit_text("Nothing to save anymore, reply to a message with /db_save again.")
                .await?;
            return Ok(());
        };

        ctx.delete_keyboard().await?;
        self.save_content(&ctx, content, &tag_of(&ctx)).await
    }

    async fn info(&self, ctx: Context) -> HandlerResult {
        let tag = tag_of(&ctx);
        let objects = ctx.state.custom_db.find(ctx.chat_id.0, &tag, None).await?;
        ctx.edit_text(render_summary(&tag, &objects)).await
    }

    async fn ask_content_type(&self, ctx: Context) -> HandlerResult {
        if !self.allowed(&ctx).await? {
            return Ok(());
        }
        let Some(msg) = ctx.message() else {
            return Ok(());
        };

        let tag = tag_of(&ctx);
        let objects = ctx.state.custom_db.find(ctx.chat_id.0, &tag, None).await?;
        let (counts, total) = summarize(&objects);

        let choices: Vec<Button> = counts
            .into_iter()
            .map(|(kind, count)| (kind.as_str(), count))
            .chain(std::iter::once(("all", total)))
            .map(|(kind, count)| {
                Button::new(PREFIX, format!("{} [{}]", capitalize(kind), count), "list")
                    .data(doc! { "tag": tag.as_str(), "kind": kind })
            })
            .collect();
        let mut rows: Vec<Vec<Button>> = choices.chunks(TAGS_PER_ROW).map(<[Button]>::to_vec).collect();
        rows.push(vec![cancel_button()]);

        let markup = buttons::keyboard(ctx.state.buttons.as_ref(), rows).await?;
        ctx.bot
            .edit_message_text(msg.chat.id, msg.id, "What do you want to see:")
            .reply_markup(markup)
            .await?;
        Ok(())
    }

    async fn list(&self, ctx: Context) -> HandlerResult {
        if !self.allowed(&ctx).await? {
            return Ok(());
        }

        let tag = tag_of(&ctx);
        let kind_name = ctx
            .button
            .as_ref()
            .and_then(|b| b.data_str("kind"))
            .unwrap_or("all")
            .to_string();
        let kind = ObjectKind::parse(&kind_name);

        let objects = ctx.state.custom_db.find(ctx.chat_id.0, &tag, kind).await?;
        if objects.is_empty() {
            return ctx.edit_text(format!("No entries for {}:{}", html_escape(&tag), kind_name)).await;
        }

        ctx.delete_keyboard().await?;
        for object in &objects {
            if let Err(e) = send_object(&ctx, object).await {
                warn!("Could not send saved {} from {}: {:#}", object.kind, tag, e);
                ctx.bot
                    .send_message(ctx.chat_id, "Something went wrong for one item, please contact an admin /error")
                    .await?;
            }
        }
        ctx.bot
            .send_message(ctx.chat_id, format!("{}\nAll content sent", "#".repeat(20)))
            .await?;
        Ok(())
    }

    async fn delete(&self, ctx: Context) -> HandlerResult {
        if !self.allowed(&ctx).await? {
            return Ok(());
        }

        let tag = tag_of(&ctx);
        let deleted = ctx.state.custom_db.delete_tag(ctx.chat_id.0, &tag).await?;
        debug!("Deleted {} objects of {} in {}", deleted, tag, ctx.chat_id);

        ctx.edit_text(format!("{} deleted!", html_escape(&capitalize(&tag))))
            .await
    }

    async fn cancel(&self, ctx: Context) -> HandlerResult {
        if let Some(user) = ctx.user() {
            self.pending.remove(&user.id.0);
        }
        ctx.delete_keyboard().await
    }
}

fn save_mode_on() -> Gate {
    Gate::custom(|view, state| async move {
        match state.custom_db.save_mode(view.chat_id).await {
            Ok(mode) => mode.mode,
            Err(e) => {
                warn!("Could not read save mode of {}: {:#}", view.chat_id, e);
                false
            }
        }
    })
}

impl CommandModule for CustomDb {
    fn group(&self) -> &'static str {
        "Custom"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        let saveable = MessageFilter::media(&[
            MediaKind::Video,
            MediaKind::Document,
            MediaKind::Photo,
            MediaKind::Sticker,
            MediaKind::Audio,
            MediaKind::Voice,
        ]) | MessageFilter::Text;

        vec![
            CommandDecl::new(handler!(self, db_save_mode))
                .description("Start database save mode and send your objects")
                .args(["tag"])
                .filter(!MessageFilter::Group),
            CommandDecl::new(handler!(self, db_save))
                .title("Save object")
                .description("Reply to save an object to a custom database")
                .args(["tag"])
                .gate(Gate::UserGroupAdminIfGroup),
            CommandDecl::new(handler!(self, db_info))
                .title("Available DBs")
                .description("Show created databases"),
            CommandDecl::new(handler!(self, db_delete))
                .title("Remove DB")
                .description("Delete selected database")
                .gate(Gate::UserGroupAdminIfGroup),
            CommandDecl::new(handler!(self, db_list))
                .title("List DB Content")
                .description("List the content of a DB")
                .gate(Gate::UserGroupAdminIfGroup),
            CommandDecl::new(handler!(self, save))
                .title("Save object")
                .description("Send objects while save mode is turned on to save them into your defined db")
                .route(Route::message(saveable & !MessageFilter::Group))
                .gate(save_mode_on()),
        ]
    }

    fn button_prefix(&self) -> Option<&'static str> {
        Some(PREFIX)
    }

    fn button_actions(self: Arc<Self>) -> Vec<(&'static str, Handler)> {
        vec![
            ("toggle_save_mode", handler!(self, toggle_save_mode)),
            ("save", handler!(self, save_pending)),
            ("info", handler!(self, info)),
            ("ask_content_type", handler!(self, ask_content_type)),
            ("list", handler!(self, list)),
            ("delete", handler!(self, delete)),
            ("cancel", handler!(self, cancel)),
        ]
    }
}
