//! Reverse image search: publish the media through the uploader and answer
//! with links to the search engines.

use std::sync::Arc;
use std::time::Duration;

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::FileMeta;
use tracing::{debug, info, warn};

use crate::buttons;
use crate::database::Button;
use crate::registry::{CommandDecl, CommandModule, Context, HandlerResult, MediaKind, MessageFilter, Route, handler};
use crate::uploaders::UploadSource;

const PREFIX: &str = "ris";
const SUBDIR: &str = "reverse_image_search";
/// Uploaded images stay public for an hour.
const KEEP_UPLOADS: Duration = Duration::from_secs(3600);

const NOT_CONFIGURED: &str =
    "This bot is not configured for this functionality, contact an admin for more information /support.";

/// Search engines and their reverse-search URL templates.
const ENGINES: &[(&str, &str)] = &[
    ("IQDB", "https://iqdb.org/?url={}"),
    ("Google", "https://www.google.com/searchbyimage?client=app&image_url={}"),
    ("Yandex", "https://yandex.com/images/search?url={}&rpt=imageview"),
    ("Bing", "https://www.bing.com/images/search?q=imgurl:{}&view=detailv2&iss=sbi"),
    ("TinEye", "https://tineye.com/search?url={}"),
    ("SauceNAO", "https://saucenao.com/search.php?url={}"),
    ("trace.moe", "https://trace.moe/?auto&url={}"),
];

/// Search links for a public image URL, in engine order.
pub fn search_links(image_url: &str) -> Vec<(&'static str, String)> {
    let encoded: String = url::form_urlencoded::byte_serialize(image_url.as_bytes()).collect();
    ENGINES
        .iter()
        .map(|(name, template)| (*name, template.replacen("{}", &encoded, 1)))
        .collect()
}

/// "Go To Image" on top, then the engines two per row.
fn link_rows(image_url: &str) -> Vec<Vec<Button>> {
    let engines: Vec<Button> = search_links(image_url)
        .into_iter()
        .map(|(name, link)| Button::link(PREFIX, name, link))
        .collect();

    let mut rows = vec![vec![Button::link(PREFIX, "Go To Image", image_url)]];
    rows.extend(engines.chunks(2).map(<[Button]>::to_vec));
    rows
}

/// The searchable file of a message and the extension to store it under.
fn media_of(msg: &Message) -> Option<(FileMeta, String)> {
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.iter().max_by_key(|p| p.file.size)) {
        return Some((photo.file.clone(), "jpg".to_string()));
    }
    if let Some(sticker) = msg.sticker() {
        return Some((sticker.file.clone(), "webp".to_string()));
    }
    if let Some(video) = msg.video() {
        return Some((video.file.clone(), "mp4".to_string()));
    }
    if let Some(document) = msg.document() {
        let extension = document
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_else(|| "bin".to_string());
        return Some((document.file.clone(), extension));
    }
    None
}

pub struct ReverseImageSearch;

impl ReverseImageSearch {
    async fn auto_search(&self, ctx: Context) -> HandlerResult {
        let Some(msg) = ctx.message().cloned() else {
            return Ok(());
        };
        self.search_media(&ctx, &msg).await
    }

    async fn search(&self, ctx: Context) -> HandlerResult {
        let Some(reply) = ctx.message().and_then(|m| m.reply_to_message()).cloned() else {
            ctx.reply("You have to reply to some media file to start the reverse search.")
                .await?;
            return Ok(());
        };
        self.search_media(&ctx, &reply).await
    }

    async fn search_media(&self, ctx: &Context, media: &Message) -> HandlerResult {
        let Some((file, extension)) = media_of(media) else {
            ctx.reply("I can only search for photos, stickers, videos and documents.")
                .await?;
            return Ok(());
        };

        if !ctx.state.uploader.publishes() {
            info!("Reverse search requested but no public uploader is configured");
            ctx.reply(NOT_CONFIGURED).await?;
            return Ok(());
        }

        let progress = ctx
            .reply("Please wait for the media file to be processed...")
            .await?;

        let telegram_file = ctx.bot.get_file(file.id.clone()).await?;
        let mut content = Vec::with_capacity(telegram_file.meta.size as usize);
        ctx.bot
            .inner()
            .download_file(&telegram_file.path, &mut content)
            .await?;
        debug!("Downloaded {} bytes for reverse search", content.len());

        let name = format!("irs-{:08x}.{}", rand::random::<u32>(), extension);
        let uploaded = ctx
            .state
            .uploader
            .upload(UploadSource::Bytes(content), Some(&name), Some(SUBDIR), Some(KEEP_UPLOADS))
            .await?;

        let Some(image_url) = uploaded.url else {
            warn!("Uploader returned no public url for {:?}", uploaded.path);
            ctx.bot
                .edit_message_text(progress.chat.id, progress.id, NOT_CONFIGURED)
                .await?;
            return Ok(());
        };

        let markup = buttons::keyboard(ctx.state.buttons.as_ref(), link_rows(&image_url)).await?;
        ctx.bot
            .edit_message_text(progress.chat.id, progress.id, "Tap on the search engine of your choice.")
            .reply_markup(markup)
            .await?;
        Ok(())
    }
}

impl CommandModule for ReverseImageSearch {
    fn group(&self) -> &'static str {
        "Image"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        let media = MessageFilter::media(&[
            MediaKind::Video,
            MediaKind::Document,
            MediaKind::Photo,
            MediaKind::Sticker,
        ]);

        vec![
            CommandDecl::new(handler!(self, auto_search))
                .title("Auto Search")
                .description("Send me some kind of media file and I search for it")
                .route(Route::message(media & MessageFilter::Private & !MessageFilter::Reply))
                .run_async(),
            CommandDecl::new(handler!(self, search))
                .title("Reply reverse search")
                .description("Reply to media for reverse search")
                .run_async(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_links_encode_url() {
        let links = search_links("https://files.example.org/irs/a b.jpg?x=1");
        let names: Vec<_> = links.iter().map(|(name, _)| *name).collect();

        assert_eq!(names, vec!["IQDB", "Google", "Yandex", "Bing", "TinEye", "SauceNAO", "trace.moe"]);
        assert_eq!(
            links[0].1,
            "https://iqdb.org/?url=https%3A%2F%2Ffiles.example.org%2Firs%2Fa+b.jpg%3Fx%3D1"
        );
        assert!(links[2].1.ends_with("&rpt=imageview"));
    }

    #[test]
    fn test_link_rows() {
        let rows = link_rows("https://files.example.org/x.jpg");

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0][0].text, "Go To Image");
        assert_eq!(rows[0][0].url.as_deref(), Some("https://files.example.org/x.jpg"));
        assert_eq!(rows[1].len(), 2);
        assert_eq!(rows[4][0].text, "trace.moe");
        assert!(rows.iter().flatten().all(|b| b.url.is_some()));
    }

    #[test]
    fn test_media_of_document_extension() {
        let msg: Message = serde_json::from_value(serde_json::json!({
            "message_id": 1,
            "date": 1_700_000_000,
            "chat": { "id": 5, "type": "private", "first_name": "Ada" },
            "document": { "file_id": "doc", "file_unique_id": "d", "file_size": 3, "file_name": "Scan.PNG" },
        }))
        .unwrap();

        let (file, extension) = media_of(&msg).unwrap();
        assert_eq!(file.size, 3);
        assert_eq!(extension, "png");
    }
}
