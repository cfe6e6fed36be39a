//! Command declarations as modules write them.
//!
//! Everything but the handler is optional; [`super::command::normalize`]
//! fills in the defaults.

use super::filter::MessageFilter;
use super::gate::Gate;
use super::handler::{Handler, Layer, RetryPolicy};

/// Handler group as declared. Text is accepted when it parses as an integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupValue {
    Int(i64),
    Text(String),
}

impl From<i64> for GroupValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for GroupValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for GroupValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl GroupValue {
    pub fn resolve(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Slash command route options.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Command word, defaults to the command name.
    pub command: Option<String>,
    pub filter: Option<MessageFilter>,
    pub gates: Vec<Gate>,
}

/// Plain message route options.
#[derive(Debug, Clone, Default)]
pub struct MessageOptions {
    pub filter: Option<MessageFilter>,
    pub gates: Vec<Gate>,
}

/// Callback query route options.
#[derive(Debug, Clone, Default)]
pub struct CallbackOptions {
    /// Regex the callback data has to match. None matches everything.
    pub pattern: Option<String>,
    /// Handler invoked instead of the command's own.
    pub callback: Option<Handler>,
}

/// How updates reach a command.
#[derive(Debug, Clone)]
pub enum Route {
    Command(CommandOptions),
    Message(MessageOptions),
    Callback(CallbackOptions),
}

impl Default for Route {
    fn default() -> Self {
        Self::Command(CommandOptions::default())
    }
}

impl Route {
    pub fn message(filter: MessageFilter) -> Self {
        Self::Message(MessageOptions {
            filter: Some(filter),
            gates: Vec::new(),
        })
    }

    pub fn callback(pattern: &str) -> Self {
        Self::Callback(CallbackOptions {
            pattern: Some(pattern.to_string()),
            callback: None,
        })
    }
}

/// One entry of a module's command list.
#[derive(Debug, Clone, Default)]
pub struct CommandDecl {
    pub title: Option<String>,
    pub description: Option<String>,
    pub command_name: Option<String>,
    /// None for aliases.
    pub command: Option<Handler>,
    pub route: Route,
    pub hidden: Option<bool>,
    pub args: Vec<String>,
    pub group: Option<GroupValue>,
    /// Command name of another command in the same module.
    pub alias: Option<String>,
    pub layers: Vec<Layer>,
}

impl CommandDecl {
    pub fn new(command: Handler) -> Self {
        Self {
            command: Some(command),
            ..Default::default()
        }
    }

    /// A second entry for `target`, sharing its handler and routing.
    pub fn alias(command_name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            command_name: Some(command_name.into()),
            alias: Some(target.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn command_name(mut self, name: impl Into<String>) -> Self {
        self.command_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<GroupValue>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        self.route = route;
        self
    }

    /// Restrict a command or message route with a filter.
    #[must_use]
    pub fn filter(mut self, filter: MessageFilter) -> Self {
        match &mut self.route {
            Route::Command(options) => options.filter = Some(filter),
            Route::Message(options) => options.filter = Some(filter),
            Route::Callback(_) => {}
        }
        self
    }

    /// Add a gate to a command or message route.
    #[must_use]
    pub fn gate(mut self, gate: Gate) -> Self {
        match &mut self.route {
            Route::Command(options) => options.gates.push(gate),
            Route::Message(options) => options.gates.push(gate),
            Route::Callback(_) => {}
        }
        self
    }

    #[must_use]
    pub fn run_async(mut self) -> Self {
        self.layers.push(Layer::Spawn);
        self
    }

    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.layers.push(Layer::Retry(policy));
        self
    }
}
