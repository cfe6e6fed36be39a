//! Normalized commands and the rules that produce them.

use std::fmt;

use regex::Regex;
use tracing::warn;

use super::declaration::{CommandDecl, GroupValue, Route};
use super::filter::MessageFilter;
use super::gate::Gate;
use super::handler::{Handler, Layer, compose};
use crate::error::RegistryError;

/// Command name given to anonymous callback handlers.
const DEFAULT_CALLBACK_NAME: &str = "callback";

/// Which kind of update a command answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Command,
    Message,
    CallbackQuery,
}

/// Routing with every default filled in.
#[derive(Debug, Clone)]
pub enum Routing {
    Command {
        command: String,
        filter: MessageFilter,
        gates: Vec<Gate>,
    },
    Message {
        filter: MessageFilter,
        gates: Vec<Gate>,
    },
    Callback {
        pattern: Option<Regex>,
        callback: Handler,
    },
}

/// A command after normalization. Every field is definite.
#[derive(Debug, Clone)]
pub struct Command {
    pub title: String,
    pub description: String,
    pub command_name: String,
    /// The declared function.
    pub target: Handler,
    /// What the router invokes: the routed function behind its layers.
    pub handler: Handler,
    pub routing: Routing,
    pub hidden: bool,
    pub args: Vec<String>,
    pub group: i64,
    pub layers: Vec<Layer>,
}

impl Command {
    pub fn kind(&self) -> HandlerKind {
        match self.routing {
            Routing::Command { .. } => HandlerKind::Command,
            Routing::Message { .. } => HandlerKind::Message,
            Routing::Callback { .. } => HandlerKind::CallbackQuery,
        }
    }

    /// Slash command word, for command routes.
    pub fn command_word(&self) -> Option<&str> {
        match &self.routing {
            Routing::Command { command, .. } => Some(command),
            _ => None,
        }
    }

    fn routed(&self) -> &Handler {
        match &self.routing {
            Routing::Callback { callback, .. } => callback,
            _ => &self.target,
        }
    }

    fn rebuild_handler(&mut self) {
        self.handler = compose(self.routed(), &self.command_name, &self.layers);
    }
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupValue::Int(value) => write!(f, "{value}"),
            GroupValue::Text(text) => f.write_str(text),
        }
    }
}

/// `show_tag_chooser` -> `Show tag chooser`.
pub fn titleize(name: &str) -> String {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    first
        .to_uppercase()
        .chain(chars.flat_map(char::to_lowercase))
        .collect::<String>()
        .replace('_', " ")
}

fn resolve_group(command: &str, group: &GroupValue) -> Result<i64, RegistryError> {
    group.resolve().ok_or_else(|| RegistryError::InvalidGroup {
        command: command.to_string(),
        group: group.to_string(),
    })
}

/// Normalize a module's declarations.
///
/// Regular declarations come first, in declaration order, followed by the
/// aliases. An alias whose target does not exist in the same module is
/// dropped with a warning.
pub fn normalize(module: &str, decls: Vec<CommandDecl>) -> Result<Vec<Command>, RegistryError> {
    let (aliases, regular): (Vec<_>, Vec<_>) = decls.into_iter().partition(|d| d.alias.is_some());

    let mut commands = regular
        .into_iter()
        .map(|decl| normalize_one(module, decl))
        .collect::<Result<Vec<_>, _>>()?;
    let regular_count = commands.len();

    for alias in aliases {
        let target_name = alias.alias.as_deref().unwrap_or_default();
        let Some(real) = commands[..regular_count]
            .iter()
            .find(|c| c.command_name == target_name)
        else {
            warn!(
                "Dropping alias {:?} in module {}: no command named {:?}",
                alias.command_name, module, target_name
            );
            continue;
        };

        let mut copy = real.clone();
        if let Some(title) = alias.title.filter(|t| !t.is_empty()) {
            copy.title = title;
        }
        if let Some(description) = alias.description {
            copy.description = description;
        }
        if let Some(hidden) = alias.hidden {
            copy.hidden = hidden;
        }
        if let Some(name) = alias.command_name {
            if let Routing::Command { command, .. } = &mut copy.routing
                && *command == real.command_name
            {
                *command = name.clone();
            }
            copy.command_name = name;
        }
        if let Some(group) = &alias.group {
            copy.group = resolve_group(&copy.command_name, group)?;
        }
        copy.rebuild_handler();

        commands.push(copy);
    }

    Ok(commands)
}

fn normalize_one(module: &str, decl: CommandDecl) -> Result<Command, RegistryError> {
    let Some(target) = decl.command else {
        return Err(RegistryError::MissingHandler {
            module: module.to_string(),
        });
    };
    let function_name = target.name();
    let is_callback = matches!(decl.route, Route::Callback(_));

    let command_name = match (decl.command_name, function_name) {
        (Some(name), _) => name,
        (None, Some(name)) => name.to_string(),
        (None, None) if is_callback => DEFAULT_CALLBACK_NAME.to_string(),
        (None, None) => {
            return Err(RegistryError::MissingCommandName {
                module: module.to_string(),
            });
        }
    };

    let title = decl
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| titleize(function_name.unwrap_or(&command_name)));

    let group = match &decl.group {
        Some(group) => resolve_group(&command_name, group)?,
        None => 0,
    };

    let routing = match decl.route {
        Route::Command(options) => Routing::Command {
            command: options.command.unwrap_or_else(|| command_name.clone()),
            filter: options.filter.unwrap_or(MessageFilter::All),
            gates: options.gates,
        },
        Route::Message(options) => Routing::Message {
            filter: options.filter.unwrap_or(MessageFilter::All),
            gates: options.gates,
        },
        Route::Callback(options) => Routing::Callback {
            pattern: options
                .pattern
                .map(|p| Regex::new(&p))
                .transpose()
                .map_err(|e| RegistryError::InvalidPattern {
                    command: command_name.clone(),
                    message: e.to_string(),
                })?,
            callback: options.callback.unwrap_or_else(|| target.clone()),
        },
    };

    let mut command = Command {
        title,
        description: decl.description.unwrap_or_default(),
        command_name,
        handler: target.clone(),
        target,
        routing,
        hidden: decl.hidden.unwrap_or(false),
        args: decl.args,
        group,
        layers: decl.layers,
    };
    command.rebuild_handler();

    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::declaration::CallbackOptions;

    fn named(name: &'static str) -> Handler {
        Handler::named(name, |_| async { Ok(()) })
    }

    fn anonymous() -> Handler {
        Handler::anonymous(|_| async { Ok(()) })
    }

    #[test]
    fn test_titleize() {
        assert_eq!(titleize("show_tag_chooser"), "Show tag chooser");
        assert_eq!(titleize("db_SAVE"), "Db save");
        assert_eq!(titleize(""), "");
    }

    #[test]
    fn test_defaults() {
        let commands = normalize("Echo", vec![CommandDecl::new(named("echo"))]).unwrap();
        let echo = &commands[0];

        assert_eq!(echo.command_name, "echo");
        assert_eq!(echo.title, "Echo");
        assert_eq!(echo.description, "");
        assert_eq!(echo.kind(), HandlerKind::Command);
        assert_eq!(echo.command_word(), Some("echo"));
        assert!(!echo.hidden);
        assert!(echo.args.is_empty());
        assert_eq!(echo.group, 0);
    }

    #[test]
    fn test_explicit_fields_kept() {
        let decl = CommandDecl::new(named("show_tag_chooser"))
            .command_name("db_list")
            .description("List a database")
            .args(["TAG"])
            .hidden(true);
        let command = &normalize("Custom", vec![decl]).unwrap()[0];

        assert_eq!(command.title, "Show tag chooser");
        assert_eq!(command.command_name, "db_list");
        assert_eq!(command.command_word(), Some("db_list"));
        assert_eq!(command.args, vec!["TAG"]);
        assert!(command.hidden);
    }

    #[test]
    fn test_message_route_defaults_to_all() {
        let decl = CommandDecl::new(named("track")).route(Route::Message(Default::default()));
        let command = &normalize("Tracking", vec![decl]).unwrap()[0];

        assert_eq!(command.kind(), HandlerKind::Message);
        assert!(matches!(
            &command.routing,
            Routing::Message {
                filter: MessageFilter::All,
                ..
            }
        ));
    }

    #[test]
    fn test_group_as_text() {
        let decl = CommandDecl::new(named("echo")).group(" 3 ");
        assert_eq!(normalize("Echo", vec![decl]).unwrap()[0].group, 3);
    }

    #[test]
    fn test_invalid_group() {
        let decl = CommandDecl::new(named("echo")).group("abc");
        let err = normalize("Echo", vec![decl]).unwrap_err();

        assert_eq!(
            err,
            RegistryError::InvalidGroup {
                command: "echo".to_string(),
                group: "abc".to_string(),
            }
        );
        assert!(err.to_string().contains("echo"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_alias() {
        let foo = named("foo");
        let decls = vec![
            CommandDecl::alias("bar", "foo").title("Bar"),
            CommandDecl::new(foo.clone()).description("Does foo").args(["X"]),
        ];
        let mut commands = normalize("Foo", decls).unwrap();

        assert_eq!(commands.len(), 2);
        let (real, alias) = (&commands[0], &commands[1]);
        assert_eq!(real.command_name, "foo");
        assert_eq!(alias.command_name, "bar");
        assert_eq!(alias.title, "Bar");
        assert_eq!(alias.description, "Does foo");
        assert_eq!(alias.command_word(), Some("bar"));
        assert!(alias.target.same_target(&foo));
        assert!(alias.target.same_target(&real.target));

        commands[1].args.push("Y".to_string());
        assert_eq!(commands[0].args, vec!["X"]);
    }

    #[test]
    fn test_alias_overrides_group_and_hidden() {
        let decls = vec![
            CommandDecl::new(named("foo")),
            CommandDecl::alias("bar", "foo").hidden(true).group(2),
        ];
        let commands = normalize("Foo", decls).unwrap();

        assert!(commands[1].hidden);
        assert_eq!(commands[1].group, 2);
        assert!(!commands[0].hidden);
        assert_eq!(commands[0].group, 0);
    }

    #[test]
    fn test_alias_without_target_is_dropped() {
        let decls = vec![
            CommandDecl::new(named("foo")),
            CommandDecl::alias("bar", "missing"),
        ];
        let commands = normalize("Foo", decls).unwrap();

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].command_name, "foo");
    }

    #[test]
    fn test_anonymous_needs_command_name() {
        let err = normalize("Misc", vec![CommandDecl::new(anonymous())]).unwrap_err();
        assert!(matches!(err, RegistryError::MissingCommandName { .. }));

        let named = normalize("Misc", vec![CommandDecl::new(anonymous()).command_name("ping")]);
        assert_eq!(named.unwrap()[0].title, "Ping");
    }

    #[test]
    fn test_anonymous_callback() {
        let decl = CommandDecl::new(anonymous()).route(Route::callback(r"^unwarn:\d+$"));
        let command = &normalize("Group Management", vec![decl]).unwrap()[0];

        assert_eq!(command.kind(), HandlerKind::CallbackQuery);
        assert_eq!(command.command_name, "callback");
        let Routing::Callback { pattern, callback } = &command.routing else {
            panic!("expected callback routing");
        };
        assert!(pattern.as_ref().unwrap().is_match("unwarn:5"));
        assert!(callback.same_target(&command.target));
    }

    #[test]
    fn test_explicit_callback() {
        let other = named("other");
        let decl = CommandDecl::new(named("main")).route(Route::Callback(CallbackOptions {
            pattern: None,
            callback: Some(other.clone()),
        }));
        let command = &normalize("Misc", vec![decl]).unwrap()[0];

        let Routing::Callback { pattern, callback } = &command.routing else {
            panic!("expected callback routing");
        };
        assert!(pattern.is_none());
        assert!(callback.same_target(&other));
    }

    #[test]
    fn test_invalid_pattern() {
        let decl = CommandDecl::new(named("broken")).route(Route::callback("(unclosed"));
        let err = normalize("Misc", vec![decl]).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPattern { ref command, .. } if command == "broken"));
    }
}
