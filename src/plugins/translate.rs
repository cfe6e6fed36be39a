//! `/translate` through the public Google Translate endpoint.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::registry::{CommandDecl, CommandModule, Context, HandlerResult, RetryPolicy, handler};
use crate::utils::{html_escape, take_option};

const API_URL: &str = "https://translate.googleapis.com/translate_a/single";

pub const DEFAULT_TARGET: &str = "en";

/// Language codes Google Translate accepts.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("af", "afrikaans"),
    ("sq", "albanian"),
    ("am", "amharic"),
    ("ar", "arabic"),
    ("hy", "armenian"),
    ("az", "azerbaijani"),
    ("eu", "basque"),
    ("be", "belarusian"),
    ("bn", "bengali"),
    ("bs", "bosnian"),
    ("bg", "bulgarian"),
    ("ca", "catalan"),
    ("ceb", "cebuano"),
    ("ny", "chichewa"),
    ("zh-cn", "chinese (simplified)"),
    ("zh-tw", "chinese (traditional)"),
    ("co", "corsican"),
    ("hr", "croatian"),
    ("cs", "czech"),
    ("da", "danish"),
    ("nl", "dutch"),
    ("en", "english"),
    ("eo", "esperanto"),
    ("et", "estonian"),
    ("tl", "filipino"),
    ("fi", "finnish"),
    ("fr", "french"),
    ("fy", "frisian"),
    ("gl", "galician"),
    ("ka", "georgian"),
    ("de", "german"),
    ("el", "greek"),
    ("gu", "gujarati"),
    ("ht", "haitian creole"),
    ("ha", "hausa"),
    ("haw", "hawaiian"),
    ("iw", "hebrew"),
    ("he", "hebrew"),
    ("hi", "hindi"),
    ("hmn", "hmong"),
    ("hu", "hungarian"),
    ("is", "icelandic"),
    ("ig", "igbo"),
    ("id", "indonesian"),
    ("ga", "irish"),
    ("it", "italian"),
    ("ja", "japanese"),
    ("jw", "javanese"),
    ("kn", "kannada"),
    ("kk", "kazakh"),
    ("km", "khmer"),
    ("ko", "korean"),
    ("ku", "kurdish (kurmanji)"),
    ("ky", "kyrgyz"),
    ("lo", "lao"),
    ("la", "latin"),
    ("lv", "latvian"),
    ("lt", "lithuanian"),
    ("lb", "luxembourgish"),
    ("mk", "macedonian"),
    ("mg", "malagasy"),
    ("ms", "malay"),
    ("ml", "malayalam"),
    ("mt", "maltese"),
    ("mi", "maori"),
    ("mr", "marathi"),
    ("mn", "mongolian"),
    ("my", "myanmar (burmese)"),
    ("ne", "nepali"),
    ("no", "norwegian"),
    ("or", "odia"),
    ("ps", "pashto"),
    ("fa", "persian"),
    ("pl", "polish"),
    ("pt", "portuguese"),
    ("pa", "punjabi"),
    ("ro", "romanian"),
    ("ru", "russian"),
    ("sm", "samoan"),
    ("gd", "scots gaelic"),
    ("sr", "serbian"),
    ("st", "sesotho"),
    ("sn", "shona"),
    ("sd", "sindhi"),
    ("si", "sinhala"),
    ("sk", "slovak"),
    ("sl", "slovenian"),
    ("so", "somali"),
    ("es", "spanish"),
    ("su", "sundanese"),
    ("sw", "swahili"),
    ("sv", "swedish"),
    ("tg", "tajik"),
    ("ta", "tamil"),
    ("te", "telugu"),
    ("th", "thai"),
    ("tr", "turkish"),
    ("uk", "ukrainian"),
    ("ur", "urdu"),
    ("ug", "uyghur"),
    ("uz", "uzbek"),
    ("vi", "vietnamese"),
    ("cy", "welsh"),
    ("xh", "xhosa"),
    ("yi", "yiddish"),
    ("yo", "yoruba"),
    ("zu", "zulu"),
];

pub fn is_language(code: &str) -> bool {
    LANGUAGES.iter().any(|(known, _)| *known == code)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Detected or given source language.
    pub source: String,
    pub target: String,
    pub text: String,
}

impl Translation {
    pub fn direction(&self) -> String {
        format!("{} -> {}", self.source, self.target)
    }
}

/// Pull the translated text and detected language out of a response.
///
/// The body is `[[["Hallo", "hello", ...], ...], null, "en", ...]`: one
/// entry per sentence, then the source language at index 2.
fn parse_response(body: &Value, source: &str, target: &str) -> Option<Translation> {
    let text: String = body
        .get(0)?
        .as_array()?
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect();
    let source = match body.get(2).and_then(Value::as_str) {
        Some(detected) if source == "auto" => detected.to_string(),
        _ => source.to_string(),
    };

    Some(Translation {
        source,
        target: target.to_string(),
        text,
    })
}

/// Translate `text` from `source` (`auto` to detect) into `target`.
pub async fn translate_text(
    http: &reqwest::Client,
    text: &str,
    source: &str,
    target: &str,
) -> anyhow::Result<Translation> {
    let body: Value = http
        .get(API_URL)
        .query(&[
            ("client", "gtx"),
            ("sl", source),
            ("tl", target),
            ("dt", "t"),
            ("q", text),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let translation = parse_response(&body, source, target)
        .ok_or_else(|| anyhow::anyhow!("unexpected translate response: {body}"))?;
    debug!("Translated {} chars {}", text.len(), translation.direction());
    Ok(translation)
}

/// What `/translate` was asked to do.
#[derive(Debug, PartialEq, Eq)]
pub enum Request {
    Translate { text: String, source: String, target: String },
    UnknownLanguage(String),
    NothingToTranslate,
}

/// Work out text and languages. Replied-to text beats text given inline.
pub fn parse_request(mut args: Vec<String>, replied: Option<&str>) -> Request {
    let source = take_option(&mut args, "lf");
    let target = take_option(&mut args, "lt");
    if let Some(unknown) = [&source, &target].into_iter().flatten().find(|l| !is_language(l)) {
        return Request::UnknownLanguage(unknown.clone());
    }
    let source = source.unwrap_or_else(|| "auto".to_string());
    let target = target.unwrap_or_else(|| DEFAULT_TARGET.to_string());

    let inline = args.join(" ");
    let text = match replied.map(str::trim).filter(|t| !t.is_empty()) {
        Some(replied) => replied.to_string(),
        None if !inline.trim().is_empty() => inline.trim().to_string(),
        None => return Request::NothingToTranslate,
    };

    Request::Translate { text, source, target }
}

pub fn render(translation: &Translation) -> String {
    format!(
        "<b>TRANSLATION</b>: <code>{}</code>\n\n{}",
        html_escape(&translation.direction()),
        html_escape(&translation.text)
    )
}

pub struct Translate;

impl Translate {
    async fn translate(&self, ctx: Context) -> HandlerResult {
        let replied = ctx
            .message()
            .and_then(|m| m.reply_to_message())
            .and_then(|m| m.text().or(m.caption()))
            .map(str::to_string);

        match parse_request(ctx.args.clone(), replied.as_deref()) {
            Request::Translate { text, source, target } => {
                let translation = translate_text(&ctx.state.http, &text, &source, &target).await?;
                ctx.reply_html(render(&translation)).await?;
            }
            Request::UnknownLanguage(language) => {
                ctx.reply_html(format!(
                    "Given language (<code>{}</code>) is not available",
                    html_escape(&language)
                ))
                .await?;
            }
            Request::NothingToTranslate => {
                ctx.reply("You either have to reply to a message or give me some text.")
                    .await?;
            }
        }
        Ok(())
    }
}

impl CommandModule for Translate {
    fn group(&self) -> &'static str {
        "Misc"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        vec![
            CommandDecl::new(handler!(self, translate))
                .title("Translate")
                .description(
                    "Translate a reply or a given text from -lf (default: detect) language to -lt (default: en) language",
                )
                .args(["text", "-lf LANG", "-lt LANG"])
                .run_async()
                .retry(RetryPolicy::default()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_response() {
        let body = serde_json::json!([
            [["Hallo ", "Hello ", null, null, 10], ["Welt", "world", null, null, 10]],
            null,
            "en"
        ]);

        let detected = parse_response(&body, "auto", "de").unwrap();
        assert_eq!(detected.text, "Hallo Welt");
        assert_eq!(detected.direction(), "en -> de");

        let given = parse_response(&body, "fr", "de").unwrap();
        assert_eq!(given.source, "fr");

        assert_eq!(parse_response(&serde_json::json!({}), "auto", "en"), None);
    }

    #[test]
    fn test_parse_request_defaults() {
        assert_eq!(
            parse_request(args("guten morgen"), None),
            Request::Translate {
                text: "guten morgen".to_string(),
                source: "auto".to_string(),
                target: "en".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_request_options_and_reply() {
        assert_eq!(
            parse_request(args("-lf de ignored -lt fr"), Some("guten morgen")),
            Request::Translate {
                text: "guten morgen".to_string(),
                source: "de".to_string(),
                target: "fr".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_request_rejections() {
        assert_eq!(
            parse_request(args("hi -lt klingon"), None),
            Request::UnknownLanguage("klingon".to_string())
        );
        assert_eq!(parse_request(args("-lt de"), None), Request::NothingToTranslate);
        assert_eq!(parse_request(Vec::new(), Some("  ")), Request::NothingToTranslate);
    }

    #[test]
    fn test_render_escapes() {
        let translation = Translation {
            source: "en".to_string(),
            target: "de".to_string(),
            text: "a < b".to_string(),
        };
        assert_eq!(render(&translation), "<b>TRANSLATION</b>: <code>en -&gt; de</code>\n\na &lt; b");
    }
}
