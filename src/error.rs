//! Typed errors for the parts of the bot that fail in matchable ways.
//!
//! Handlers themselves return `anyhow::Result`; these enums are what ends up
//! inside when startup configuration, registration or the button protocol
//! goes wrong.

use thiserror::Error;

/// Environment configuration errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("WEBHOOK_URL must be set when BOT_MODE is webhook")]
    MissingWebhookUrl,
}

/// Command registration errors. Fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Command group has to be an integer: command {command}, given group {group}")]
    InvalidGroup { command: String, group: String },

    #[error(
        "anonymous handler in module {module:?} needs a command_name unless it answers callback queries"
    )]
    MissingCommandName { module: String },

    #[error("command declaration in module {module:?} has neither a handler nor an alias target")]
    MissingHandler { module: String },

    #[error("invalid callback pattern for command {command}: {message}")]
    InvalidPattern { command: String, message: String },

    #[error("button prefix {prefix:?} of module {module:?} must be non-empty and free of ':'")]
    InvalidButtonPrefix { module: String, prefix: String },
}

/// Button protocol errors.
#[derive(Debug, Error)]
pub enum ButtonError {
    #[error("no button action registered for {prefix}:{name}")]
    UnknownAction { prefix: String, name: String },

    #[error("invalid button url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// File uploader errors.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("a filename is required when uploading from memory")]
    MissingFilename,

    #[error("{action} {path:?} failed: {source}")]
    Io {
        action: &'static str,
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ssh {action} failed: {source}")]
    Ssh {
        action: &'static str,
        #[source]
        source: ssh2::Error,
    },

    #[error("could not reach {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("host key of {host} is not in known_hosts")]
    UnknownHostKey { host: String },

    #[error("ssh session is not connected")]
    NotConnected,

    #[error("upload task panicked")]
    Interrupted,
}
