//! Tag search on anime image boards.
//!
//! Each board gets a command named after it. Danbooru style boards restrict
//! how many tags a search may use by account level, moebooru boards have a
//! fixed limit and count qualifiers like `order:score` as tags.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction, InputFile, InputMedia, InputMediaPhoto, LinkPreviewOptions, MessageId, ReplyParameters,
};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use crate::config::DanbooruLogin;
use crate::registry::{CommandDecl, CommandModule, Context, Handler, HandlerResult};

pub const MAX_GROUP_SIZE: usize = 10;
const MAX_LIMIT: u64 = 100;
const DEFAULT_LIMIT: u32 = 10;

/// Account level of anonymous danbooru users.
const FREE_LEVEL: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    Danbooru,
    Moebooru,
}

#[derive(Debug)]
pub struct Service {
    pub name: &'static str,
    pub url: &'static str,
    pub api: Api,
}

pub static SERVICES: [Service; 3] = [
    Service {
        name: "danbooru",
        url: "https://danbooru.donmai.us",
        api: Api::Danbooru,
    },
    Service {
        name: "safebooru",
        url: "https://safebooru.donmai.us",
        api: Api::Danbooru,
    },
    Service {
        name: "konachan",
        url: "https://konachan.com",
        api: Api::Moebooru,
    },
];

/// What a search on a service may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub tag_limit: usize,
    /// Some tags are hidden from the account, results may be incomplete.
    pub censored: bool,
    pub count_qualifiers: bool,
}

impl Limits {
    pub const MOEBOORU: Limits = Limits {
        tag_limit: 6,
        censored: false,
        count_qualifiers: true,
    };

    /// Restrictions of a danbooru account level.
    pub fn danbooru(level: u32) -> Self {
        let tag_limit = match level {
            ..30 => 2,
            30 => 6,
            31 => 12,
            // Builders and up may use as many tags as their level.
            level => level.min(50) as usize,
        };
        Self {
            tag_limit,
            censored: level < 30,
            count_qualifiers: false,
        }
    }

    /// Tags of `terms` that count against the limit.
    pub fn counted(&self, terms: &[String]) -> usize {
        if self.count_qualifiers {
            terms.len()
        } else {
            terms.iter().filter(|term| !term.contains(':')).count()
        }
    }
}

/// A parsed `/danbooru tag1 tag2 page=2 limit=20 group=5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub tags: Vec<String>,
    pub page: u32,
    pub limit: u32,
    /// Photos per media group, `None` to send them one by one.
    pub group_size: Option<usize>,
    /// The requested group size was too big and got capped.
    pub group_capped: bool,
}

/// Remove `name=42` (or `name 42`, `name:42`) from `text` and return the number.
fn take_number(text: &mut String, name: &str) -> Option<u64> {
    let pattern = Regex::new(&format!(r"(?i){name}[ =:]+(\d+)")).ok()?;
    let value = pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|number| number.as_str().parse().ok());
    if value.is_some() {
        *text = pattern.replace_all(text, "").into_owned();
    }
    value
}

fn allowed_in_term(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ' ' | '+' | '~' | '*' | ':')
}

/// Clean up search terms, dropping empty ones and duplicates.
pub fn filter_terms<'a>(terms: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .map(|term| {
            let kept: String = term.chars().filter(|c| allowed_in_term(*c)).collect();
            kept.trim().replace(' ', "_")
        })
        .filter(|term| !term.is_empty())
        .filter(|term| seen.insert(term.clone()))
        .collect()
}

pub fn parse_query(args: &[String]) -> Query {
    let mut text = args.join(" ");

    let page = take_number(&mut text, "page").unwrap_or(1) as u32;
    let limit = match take_number(&mut text, "limit") {
        Some(limit) if (1..=MAX_LIMIT).contains(&limit) => limit as u32,
        _ => DEFAULT_LIMIT,
    };
    let requested = take_number(&mut text, "group").map_or(MAX_GROUP_SIZE, |size| size as usize);
    let group_capped = requested > MAX_GROUP_SIZE;
    let group_size = Some(requested.min(MAX_GROUP_SIZE)).filter(|size| *size > 0);

    let tags = if text.contains(',') {
        filter_terms(text.split(','))
    } else {
        filter_terms(text.split(' '))
    };

    Query {
        tags,
        page,
        limit,
        group_size,
        group_capped,
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawPost {
    id: u64,
    #[serde(default)]
    large_file_url: Option<String>,
    #[serde(default)]
    file_url: Option<String>,
}

/// A search hit ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub post_url: String,
    /// Missing when the board hides the file from us.
    pub media: Option<String>,
}

impl Post {
    fn from_raw(service: &Service, raw: RawPost) -> Self {
        let media = match service.api {
            Api::Danbooru => raw.large_file_url.or(raw.file_url),
            Api::Moebooru => raw.file_url,
        };
        Self {
            post_url: format!("{}/posts/{}", service.url, raw.id),
            media,
        }
    }

    fn extension(&self) -> Option<String> {
        let media = self.media.as_deref()?;
        let path = media.split(['?', '#']).next().unwrap_or(media);
        let (_, extension) = path.rsplit_once('.')?;
        Some(extension.to_lowercase())
    }

    pub fn is_video(&self) -> bool {
        matches!(self.extension().as_deref(), Some("webm" | "mp4" | "gif"))
    }

    /// Telegram renders these as photos. Everything else goes as a document.
    pub fn is_photo(&self) -> bool {
        matches!(self.extension().as_deref(), Some("png" | "jpg"))
    }

    pub fn caption(&self) -> String {
        format!("@XenianBot - {}", self.post_url)
    }
}

/// Tally of a search that is reported once everything was sent.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub missing: Vec<String>,
    pub skipped_videos: Vec<String>,
    pub failed: usize,
}

impl Report {
    pub fn summary(&self, group_chat: bool, grouped: bool) -> Option<String> {
        let mut lines = Vec::new();
        if !group_chat {
            lines.push("Images has been sent".to_string());
        }
        if !self.missing.is_empty() {
            lines.push("Some files could not be retrieved".to_string());
            lines.extend(self.missing.iter().map(|url| format!("- {url}")));
        }
        if grouped && !self.skipped_videos.is_empty() {
            lines.push("Videos were skipped because they cannot be sent via a group.".to_string());
            lines.extend(self.skipped_videos.iter().map(|url| format!("- {url}")));
        }
        if self.failed > 0 {
            lines.push("Some files could not be sent".to_string());
        }
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

#[derive(Debug, Deserialize)]
struct DanbooruUser {
    level: u32,
}

#[derive(Default)]
pub struct AnimeDatabases {
    /// Level of the configured donmai account, looked up once.
    danbooru_level: OnceCell<u32>,
}

impl AnimeDatabases {
    fn login<'a>(&self, ctx: &'a Context, service: &Service) -> Option<&'a DanbooruLogin> {
        match service.api {
            Api::Danbooru => ctx.state.config.danbooru.as_ref(),
            Api::Moebooru => None,
        }
    }

    async fn limits(&self, ctx: &Context, service: &Service) -> anyhow::Result<Limits> {
        if service.api == Api::Moebooru {
            return Ok(Limits::MOEBOORU);
        }
        let Some(login) = self.login(ctx, service) else {
            return Ok(Limits::danbooru(FREE_LEVEL));
        };

        let level = self
            .danbooru_level
            .get_or_try_init(|| async {
                let users: Vec<DanbooruUser> = ctx
                    .state
                    .http
                    .get(format!("{}/users.json", service.url))
                    .query(&[
                        ("search[name_matches]", login.username.as_str()),
                        ("login", login.username.as_str()),
                        ("api_key", login.api_key.as_str()),
                    ])
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                let level = users.first().map_or(FREE_LEVEL, |user| user.level);
                debug!("Danbooru account {} has level {}", login.username, level);
                Ok::<_, anyhow::Error>(level)
            })
            .await?;
        Ok(Limits::danbooru(*level))
    }

    async fn fetch(&self, ctx: &Context, service: &Service, query: &Query) -> anyhow::Result<Vec<Post>> {
        let endpoint = match service.api {
            Api::Danbooru => "posts.json",
            Api::Moebooru => "post.json",
        };
        let mut params = vec![
            ("tags", query.tags.join(" ")),
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(login) = self.login(ctx, service) {
            params.push(("login", login.username.clone()));
            params.push(("api_key", login.api_key.clone()));
        }

        let raw: Vec<RawPost> = ctx
            .state
            .http
            .get(format!("{}/{}", service.url, endpoint))
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("{} returned {} posts for {:?}", service.name, raw.len(), query.tags);
        Ok(raw.into_iter().map(|raw| Post::from_raw(service, raw)).collect())
    }

    async fn search(&self, service: &'static Service, ctx: Context) -> HandlerResult {
        let query = parse_query(&ctx.args);
        if query.group_capped {
            ctx.reply(format!("Max group size is {MAX_GROUP_SIZE}, use default ({MAX_GROUP_SIZE})"))
                .await?;
        }

        let limits = self.limits(&ctx, service).await?;
        if limits.counted(&query.tags) > limits.tag_limit {
            ctx.reply(format!("Only {} tags can be used.", limits.tag_limit)).await?;
            return Ok(());
        }
        if limits.censored {
            ctx.reply("Some tags may be censored").await?;
        }

        let posts = self.fetch(&ctx, service, &query).await?;
        if posts.is_empty() {
            ctx.reply(format!("Nothing found on page {}", query.page)).await?;
            return Ok(());
        }

        let report = match query.group_size {
            Some(size) => send_grouped(&ctx, posts, size).await,
            None => send_single(&ctx, posts).await,
        };

        if let Some(summary) = report.summary(ctx.is_group(), query.group_size.is_some_and(|size| size > 1)) {
            ctx.reply(summary)
                .link_preview_options(LinkPreviewOptions {
                    is_disabled: true,
                    url: None,
                    prefer_small_media: false,
                    prefer_large_media: false,
                    show_above_text: false,
                })
                .await?;
        }
        Ok(())
    }
}

fn trigger_id(ctx: &Context) -> Option<MessageId> {
    ctx.message().map(|m| m.id)
}

/// Send photos as media groups. Videos cannot be part of a photo group.
async fn send_grouped(ctx: &Context, posts: Vec<Post>, size: usize) -> Report {
    let mut report = Report::default();
    let mut photos = Vec::new();
    for post in posts {
        let Some(url) = post.media.as_deref().and_then(|media| Url::parse(media).ok()) else {
            report.missing.push(post.post_url);
            continue;
        };
        if post.is_video() {
            report.skipped_videos.push(post.post_url);
            continue;
        }
        let mut photo = InputMediaPhoto::new(InputFile::url(url));
        photo.caption = Some(post.caption());
        photos.push(InputMedia::Photo(photo));
    }

    for chunk in photos.chunks(size) {
        let _ = ctx.bot.send_chat_action(ctx.chat_id, ChatAction::UploadPhoto).await;
        let mut request = ctx
            .bot
            .send_media_group(ctx.chat_id, chunk.to_vec())
            .disable_notification(true);
        if let Some(id) = trigger_id(ctx) {
            request = request.reply_parameters(ReplyParameters::new(id));
        }
        if let Err(e) = request.await {
            warn!("Could not send a group of {}: {}", chunk.len(), e);
            report.failed += chunk.len();
        }
    }
    report
}

/// Send every post on its own: a photo when possible, always the file too.
async fn send_single(ctx: &Context, posts: Vec<Post>) -> Report {
    let mut report = Report::default();
    for post in posts {
        let Some(url) = post.media.as_deref().and_then(|media| Url::parse(media).ok()) else {
            report.missing.push(post.post_url);
            continue;
        };
        let _ = ctx.bot.send_chat_action(ctx.chat_id, ChatAction::UploadPhoto).await;

        let mut reply_to = trigger_id(ctx);
        if post.is_photo() {
            let mut request = ctx
                .bot
                .send_photo(ctx.chat_id, InputFile::url(url.clone()))
                .caption(post.caption())
                .disable_notification(true);
            if let Some(id) = reply_to {
                request = request.reply_parameters(ReplyParameters::new(id));
            }
            match request.await {
                Ok(sent) => reply_to = Some(sent.id),
                Err(e) => debug!("Could not send {} as photo: {}", post.post_url, e),
            }
        }

        let mut request = ctx
            .bot
            .send_document(ctx.chat_id, InputFile::url(url))
            .caption(post.caption())
            .disable_notification(true);
        if let Some(id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(id));
        }
        if let Err(e) = request.await {
            warn!("Could not send {}: {}", post.post_url, e);
            report.failed += 1;
        }
    }
    report
}

impl CommandModule for AnimeDatabases {
    fn group(&self) -> &'static str {
        "Anime"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        SERVICES
            .iter()
            .map(|service| {
                let this = Arc::clone(&self);
                let search = Handler::anonymous(move |ctx| {
                    let this = Arc::clone(&this);
                    async move { this.search(service, ctx).await }
                });
                CommandDecl::new(search)
                    .command_name(service.name)
                    .description(format!("Search on {}", service.name))
                    .args(["tag1", "tag2...", "page=PAGE_NUM", "limit=LIMIT", "group=SIZE"])
                    .run_async()
            })
            .collect()
    }
}
