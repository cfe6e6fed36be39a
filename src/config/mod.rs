//! Configuration module for the Xenian bot.
//!
//! Loads configuration from environment variables (and `.env`).

use std::env;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;

/// Bot running mode
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// Which uploader backend handles public file hosting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploaderConfig {
    /// Files stay local, no public URL is produced.
    None,
    /// Copy files into a directory served under `url`.
    FileSystem { path: PathBuf, url: Option<String> },
    /// Upload over SFTP to a remote host.
    Ssh(SshSettings),
}

/// Where and how the SSH uploader logs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    /// Private key file. Tried before the password.
    pub key_file: Option<PathBuf>,
    /// Remote directory files are placed in.
    pub upload_dir: String,
    /// Public URL of `upload_dir`, without trailing slash.
    pub url: Option<String>,
}

/// Credentials for the Danbooru API. Anonymous access works with lower limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanbooruLogin {
    pub username: String,
    pub api_key: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    /// Bot username (without @). Fetched via getMe if not set.
    pub bot_username: Option<String>,

    /// Users allowed to run admin tasks like /restart.
    pub admins: Vec<u64>,

    /// Users who receive /contribute and /error reports besides the admins.
    pub supporters: Vec<u64>,

    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,

    pub uploader: UploaderConfig,

    pub danbooru: Option<DanbooruLogin>,

    /// Tesseract executable used for image to text.
    pub tesseract_cmd: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_mode = match var("BOT_MODE").map(|m| m.to_lowercase()).as_deref() {
            None | Some("polling") => BotMode::Polling,
            Some("webhook") => BotMode::Webhook,
            Some(other) => {
                return Err(ConfigError::Invalid { key: "BOT_MODE", value: other.to_string() });
            }
        };

        let webhook_url = var("WEBHOOK_URL");
        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            return Err(ConfigError::MissingWebhookUrl);
        }

        let webhook_port = match var("WEBHOOK_PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "WEBHOOK_PORT", value: port })?,
            None => 8443,
        };

        let uploader = match var("UPLOADER").map(|u| u.to_lowercase()).as_deref() {
            None | Some("none") => UploaderConfig::None,
            Some("filesystem") => UploaderConfig::FileSystem {
                path: var("UPLOADER_PATH")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::Missing("UPLOADER_PATH"))?,
                url: var("UPLOADER_URL").map(|u| u.trim_end_matches('/').to_string()),
            },
            Some("ssh") => UploaderConfig::Ssh(SshSettings {
                host: var("UPLOADER_SSH_HOST").ok_or(ConfigError::Missing("UPLOADER_SSH_HOST"))?,
                port: match var("UPLOADER_SSH_PORT") {
                    Some(port) => port
                        .parse()
                        .map_err(|_| ConfigError::Invalid { key: "UPLOADER_SSH_PORT", value: port })?,
                    None => 22,
                },
                user: var("UPLOADER_SSH_USER").ok_or(ConfigError::Missing("UPLOADER_SSH_USER"))?,
                password: var("UPLOADER_SSH_PASSWORD"),
                key_file: var("UPLOADER_SSH_KEY").map(PathBuf::from),
                upload_dir: var("UPLOADER_PATH").ok_or(ConfigError::Missing("UPLOADER_PATH"))?,
                url: var("UPLOADER_URL").map(|u| u.trim_end_matches('/').to_string()),
            }),
            Some(other) => {
                return Err(ConfigError::Invalid { key: "UPLOADER", value: other.to_string() });
            }
        };

        Ok(Self {
            bot_token: var("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?,
            bot_mode,
            webhook_url,
            webhook_port,
            webhook_secret: var("WEBHOOK_SECRET"),
            bot_username: var("BOT_USERNAME").map(|s| s.trim_start_matches('@').to_string()),
            admins: parse_ids(var("ADMINS").as_deref()),
            supporters: parse_ids(var("SUPPORTERS").as_deref()),
            mongodb_uri: var("MONGODB_URI").ok_or(ConfigError::Missing("MONGODB_URI"))?,
            mongodb_database: var("MONGODB_DATABASE").unwrap_or_else(|| "xenian".to_string()),
            uploader,
            danbooru: match (var("DANBOORU_USERNAME"), var("DANBOORU_API_KEY")) {
                (Some(username), Some(api_key)) => Some(DanbooruLogin { username, api_key }),
                _ => None,
            },
            tesseract_cmd: var("TESSERACT_CMD").unwrap_or_else(|| "tesseract".to_string()),
        })
    }
}

/// Parse a comma-separated id list, skipping anything that is not a number.
fn parse_ids(raw: Option<&str>) -> Vec<u64> {
    raw.unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("BOT_TOKEN", "123:abc"), ("MONGODB_URI", "mongodb://localhost")]).unwrap();

        assert_eq!(config.bot_mode, BotMode::Polling);
        assert_eq!(config.mongodb_database, "xenian");
        assert_eq!(config.webhook_port, 8443);
        assert_eq!(config.uploader, UploaderConfig::None);
        assert_eq!(config.danbooru, None);
        assert_eq!(config.tesseract_cmd, "tesseract");
        assert!(config.admins.is_empty());
    }

    #[test]
    fn test_missing_token() {
        let err = load(&[("MONGODB_URI", "mongodb://localhost")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("BOT_TOKEN")));
    }

    #[test]
    fn test_webhook_requires_url() {
        let err = load(&[
            ("BOT_TOKEN", "t"),
            ("MONGODB_URI", "m"),
            ("BOT_MODE", "webhook"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingWebhookUrl));
    }

    #[test]
    fn test_ids_and_uploader() {
        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("MONGODB_URI", "m"),
            ("ADMINS", "1, 2,nope,3"),
            ("BOT_USERNAME", "@xenian_bot"),
            ("UPLOADER", "filesystem"),
            ("UPLOADER_PATH", "/srv/files"),
            ("UPLOADER_URL", "https://files.example.org/"),
        ])
        .unwrap();

        assert_eq!(config.admins, vec![1, 2, 3]);
        assert_eq!(config.bot_username.as_deref(), Some("xenian_bot"));
        assert_eq!(
            config.uploader,
            UploaderConfig::FileSystem {
                path: PathBuf::from("/srv/files"),
                url: Some("https://files.example.org".to_string()),
            }
        );
    }

    #[test]
    fn test_ssh_uploader() {
        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("MONGODB_URI", "m"),
            ("UPLOADER", "ssh"),
            ("UPLOADER_SSH_HOST", "files.example.org"),
            ("UPLOADER_SSH_USER", "xenian"),
            ("UPLOADER_SSH_KEY", "/home/xenian/.ssh/id_ed25519"),
            ("UPLOADER_PATH", "/var/www/files"),
            ("UPLOADER_URL", "https://files.example.org/"),
        ])
        .unwrap();

        assert_eq!(
            config.uploader,
            UploaderConfig::Ssh(SshSettings {
                host: "files.example.org".to_string(),
                port: 22,
                user: "xenian".to_string(),
                password: None,
                key_file: Some(PathBuf::from("/home/xenian/.ssh/id_ed25519")),
                upload_dir: "/var/www/files".to_string(),
                url: Some("https://files.example.org".to_string()),
            })
        );
    }

    #[test]
    fn test_ssh_uploader_needs_host() {
        let err = load(&[
            ("BOT_TOKEN", "t"),
            ("MONGODB_URI", "m"),
            ("UPLOADER", "ssh"),
            ("UPLOADER_SSH_USER", "xenian"),
            ("UPLOADER_PATH", "/var/www/files"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("UPLOADER_SSH_HOST")));
    }

    #[test]
    fn test_danbooru_login_needs_both_parts() {
        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("MONGODB_URI", "m"),
            ("DANBOORU_USERNAME", "xenian"),
        ])
        .unwrap();
        assert_eq!(config.danbooru, None);

        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("MONGODB_URI", "m"),
            ("DANBOORU_USERNAME", "xenian"),
            ("DANBOORU_API_KEY", "secret"),
        ])
        .unwrap();
        assert_eq!(config.danbooru.map(|login| login.username).as_deref(), Some("xenian"));
    }
}
