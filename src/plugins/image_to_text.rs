//! Text recognition on photos through the tesseract command line tool.

use std::process::Stdio;
use std::sync::Arc;

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::PhotoSize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::translate::{DEFAULT_TARGET, translate_text};
use crate::registry::{CommandDecl, CommandModule, Context, HandlerResult, RetryPolicy, handler};
use crate::utils::{html_escape, take_option};

const NEEDS_IMAGE: &str = "You have to reply to an image.";
const NOTHING_FOUND: &str = "No text was found. Make sure that the text is not rotated and good readable.";
const OCR_FAILED: &str =
    "Either the given language is not supported or there was another error.\nSee all languages with /itt_lang.";

/// Run tesseract on an image, feeding it through stdin.
async fn recognize(tesseract: &str, image: &[u8], language: Option<&str>) -> anyhow::Result<String> {
    let mut command = Command::new(tesseract);
    command.args(["stdin", "stdout"]);
    if let Some(language) = language {
        command.args(["-l", language]);
    }
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(image).await?;
    }
    let output = child.wait_with_output().await?;
    if !output.status.success() {
        anyhow::bail!("tesseract failed: {}", String::from_utf8_lossy(&output.stderr).trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Languages tesseract has data for. The first line of `--list-langs` is a
/// header naming the data directory.
fn parse_languages(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn largest(photo: &[PhotoSize]) -> Option<&PhotoSize> {
    photo.iter().max_by_key(|size| size.width * size.height)
}

pub fn render_found(text: &str) -> String {
    format!("<b>This text was found:</b>\n\n{}", html_escape(text))
}

pub fn render_translated(found: &str, direction: &str, translated: &str) -> String {
    format!(
        "<b>Found Text:</b>\n{}\n\n<b>Translation:</b> <code>{}</code>\n\n{}",
        html_escape(found),
        html_escape(direction),
        html_escape(translated)
    )
}

pub struct ImageToText;

impl ImageToText {
    /// Download the replied-to photo, or tell the user to reply to one.
    async fn replied_photo(&self, ctx: &Context) -> anyhow::Result<Option<Vec<u8>>> {
        let photo = ctx
            .message()
            .and_then(|m| m.reply_to_message())
            .and_then(|m| m.photo())
            .and_then(largest)
            .cloned();
        let Some(photo) = photo else {
            ctx.reply(NEEDS_IMAGE).await?;
            return Ok(None);
        };

        let file = ctx.bot.get_file(photo.file.id).await?;
        let mut content = Vec::with_capacity(file.meta.size as usize);
        ctx.bot.inner().download_file(&file.path, &mut content).await?;
        debug!("Downloaded {} bytes for text recognition", content.len());
        Ok(Some(content))
    }

    /// Recognized text, or `None` after telling the user why there is none.
    async fn extract(&self, ctx: &Context, image: &[u8], language: Option<&str>) -> anyhow::Result<Option<String>> {
        match recognize(&ctx.state.config.tesseract_cmd, image, language).await {
            Ok(text) if text.is_empty() => {
                ctx.reply(NOTHING_FOUND).await?;
                Ok(None)
            }
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                warn!("Text recognition failed: {:#}", e);
                ctx.reply(OCR_FAILED).await?;
                Ok(None)
            }
        }
    }

    async fn itt(&self, ctx: Context) -> HandlerResult {
        let mut args = ctx.args.clone();
        let language = take_option(&mut args, "l");
        let Some(image) = self.replied_photo(&ctx).await? else {
            return Ok(());
        };

        if let Some(text) = self.extract(&ctx, &image, language.as_deref()).await? {
            ctx.reply_html(render_found(&text)).await?;
        }
        Ok(())
    }

    async fn itt_translate(&self, ctx: Context) -> HandlerResult {
        let mut args = ctx.args.clone();
        let image_language = take_option(&mut args, "lf");
        let target = take_option(&mut args, "lt").unwrap_or_else(|| DEFAULT_TARGET.to_string());
        let Some(image) = self.replied_photo(&ctx).await? else {
            return Ok(());
        };

        let Some(text) = self.extract(&ctx, &image, image_language.as_deref()).await? else {
            return Ok(());
        };
        let translation = translate_text(&ctx.state.http, &text, "auto", &target).await?;
        ctx.reply_html(render_translated(&text, &translation.direction(), &translation.text))
            .await?;
        Ok(())
    }

    async fn itt_lang(&self, ctx: Context) -> HandlerResult {
        let output = Command::new(&ctx.state.config.tesseract_cmd)
            .arg("--list-langs")
            .output()
            .await?;
        // Older versions print the list to stderr.
        let listing = if output.stdout.is_empty() { &output.stderr } else { &output.stdout };

        let mut text = String::from("<b>Available languages for Image to Text (/itt)</b>:\n\n");
        for language in parse_languages(&String::from_utf8_lossy(listing)) {
            text.push_str(&format!("<code>{}</code>\n", html_escape(&language)));
        }
        ctx.reply_html(text).await?;
        Ok(())
    }
}

impl CommandModule for ImageToText {
    fn group(&self) -> &'static str {
        "Image"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        vec![
            CommandDecl::new(handler!(self, itt))
                .title("Image to Text")
                .description("Extract text from images")
                .args(["-l LANG"])
                .run_async(),
            CommandDecl::new(handler!(self, itt_translate))
                .title("Image to Text Translation")
                .description(
                    "Extract text from images and translate it. -lf (default: detect, /itt_lang) language on image, to -lt (default: en, normal language codes) language.",
                )
                .args(["text", "-lf LANG", "-lt LANG"])
                .run_async()
                .retry(RetryPolicy::default()),
            CommandDecl::new(handler!(self, itt_lang))
                .title("Languages for ItT")
                .description("Available languages for Image to Text"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_languages() {
        let output = "List of available languages in \"/usr/share/tessdata/\" (3):\neng\nosd\n\ndeu\n";
        assert_eq!(parse_languages(output), vec!["eng", "osd", "deu"]);
        assert!(parse_languages("").is_empty());
    }

    #[test]
    fn test_largest_photo() {
        let sizes: Vec<PhotoSize> = serde_json::from_value(serde_json::json!([
            { "file_id": "small", "file_unique_id": "s", "file_size": 10, "width": 90, "height": 90 },
            { "file_id": "large", "file_unique_id": "l", "file_size": 900, "width": 800, "height": 600 },
        ]))
        .unwrap();

        assert_eq!(largest(&sizes).map(|p| p.file.id.to_string()).as_deref(), Some("large"));
        assert!(largest(&[]).is_none());
    }

    #[test]
    fn test_render() {
        assert_eq!(render_found("a<b"), "<b>This text was found:</b>\n\na&lt;b");
        assert_eq!(
            render_translated("Hallo", "de -> en", "Hello"),
            "<b>Found Text:</b>\nHallo\n\n<b>Translation:</b> <code>de -&gt; en</code>\n\nHello"
        );
    }

    #[tokio::test]
    async fn test_recognize_reports_missing_binary() {
        let result = recognize("/nonexistent/tesseract", b"png", Some("eng")).await;
        assert!(result.is_err());
    }
}
