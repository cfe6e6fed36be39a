//! `/define` through the Urban Dictionary API.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::registry::{CommandDecl, CommandModule, Context, HandlerResult, RetryPolicy, handler};
use crate::utils::html_escape;

const API_URL: &str = "https://api.urbandictionary.com/v0/define";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    list: Vec<Definition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Definition {
    pub word: String,
    pub definition: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub thumbs_up: i64,
    #[serde(default)]
    pub thumbs_down: i64,
}

/// Urban Dictionary marks cross references as `[word]`.
fn strip_links(text: &str) -> String {
    text.replace(['[', ']'], "")
}

pub fn render(definition: &Definition) -> String {
    let mut out = format!(
        "<b>Definition for [{}]</b>\n\n{}\n",
        html_escape(&definition.word),
        html_escape(strip_links(&definition.definition).trim())
    );
    let example = strip_links(&definition.example);
    if !example.trim().is_empty() {
        out.push_str(&format!("\n<b>Example</b>\n\n{}\n", html_escape(example.trim())));
    }
    out.push_str(&format!(
        "\n<b>Votes</b>\n👍 {} | 👎 {}",
        definition.thumbs_up, definition.thumbs_down
    ));
    out
}

pub struct UrbanDictionary;

impl UrbanDictionary {
    async fn lookup(&self, ctx: &Context, term: &str) -> anyhow::Result<Option<Definition>> {
        let response: Response = ctx
            .state
            .http
            .get(API_URL)
            .query(&[("term", term)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("Urban Dictionary returned {} definitions for {:?}", response.list.len(), term);
        Ok(response.list.into_iter().next())
    }

    async fn define(&self, ctx: Context) -> HandlerResult {
        let term = ctx.args.join(" ");
        if term.is_empty() {
            ctx.reply("Tell me what to define, e.g. \"/define yeet\"").await?;
            return Ok(());
        }

        match self.lookup(&ctx, &term).await? {
            Some(definition) => {
                ctx.reply_html(render(&definition)).await?;
            }
            None => {
                ctx.reply(format!("Could not find anything for: {term}")).await?;
            }
        }
        Ok(())
    }
}

impl CommandModule for UrbanDictionary {
    fn group(&self) -> &'static str {
        "Misc"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        vec![
            CommandDecl::new(handler!(self, define))
                .title("Urban Dictionary Definition")
                .description("Define a word or a sentence via urban dictionary")
                .args(["text"])
                .run_async()
                .retry(RetryPolicy::default()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = r#"{"list":[{"word":"yeet","definition":"To [throw] something","example":"He [yeeted] it","thumbs_up":10,"thumbs_down":2,"permalink":"x"}]}"#;
        let response: Response = serde_json::from_str(body).unwrap();

        assert_eq!(response.list.len(), 1);
        assert_eq!(response.list[0].thumbs_up, 10);

        let empty: Response = serde_json::from_str("{}").unwrap();
        assert!(empty.list.is_empty());
    }

    #[test]
    fn test_render() {
        let definition = Definition {
            word: "a<b".to_string(),
            definition: "To [throw] something".to_string(),
            example: String::new(),
            thumbs_up: 3,
            thumbs_down: 1,
        };
        let html = render(&definition);

        assert!(html.starts_with("<b>Definition for [a&lt;b]</b>\n\nTo throw something\n"));
        assert!(!html.contains("Example"));
        assert!(html.ends_with("👍 3 | 👎 1"));
    }
}
