//! Command registry.
//!
//! Modules declare their commands as [`CommandDecl`] lists. At startup every
//! module is registered once, its declarations are normalized into
//! [`Command`]s, and the result is frozen into an immutable
//! [`CommandRegistry`] that the router and the help listing read from.
//!
//! ```ignore
//! let mut builder = RegistryBuilder::default();
//! builder.register(Arc::new(Roll))?;
//! let registry = Arc::new(builder.build());
//! ```

mod command;
mod context;
mod declaration;
mod filter;
mod gate;
mod handler;
mod routing;

use std::collections::BTreeMap;
use std::sync::Arc;

use teloxide::types::BotCommand;
use tracing::{debug, info};

pub use command::{Command, HandlerKind};
pub use context::Context;
pub use declaration::{CommandDecl, Route};
pub use filter::{MediaKind, MessageFilter};
pub use gate::Gate;
pub(crate) use handler::handler;
pub use handler::{Handler, HandlerResult, RetryPolicy};
pub use routing::{route_callback, route_message};

use crate::buttons::{ActionRegistry, CallbackData};
use crate::error::RegistryError;

/// A feature module contributing commands.
pub trait CommandModule: Send + Sync + 'static {
    /// Heading the module's commands are listed under.
    fn group(&self) -> &'static str;

    fn commands(self: Arc<Self>) -> Vec<CommandDecl>;

    /// Namespace of the module's buttons, if it renders any.
    fn button_prefix(&self) -> Option<&'static str> {
        None
    }

    /// Actions its buttons can trigger, by name.
    fn button_actions(self: Arc<Self>) -> Vec<(&'static str, Handler)> {
        Vec::new()
    }
}

/// One registered module with its normalized commands.
#[derive(Debug)]
pub struct RegisteredModule {
    pub group: &'static str,
    pub commands: Vec<Command>,
}

/// Collects modules at startup.
#[derive(Default)]
pub struct RegistryBuilder {
    modules: Vec<RegisteredModule>,
    actions: ActionRegistry,
}

impl RegistryBuilder {
    /// Normalize and append a module. Fails on invalid declarations.
    pub fn register<M: CommandModule>(&mut self, module: Arc<M>) -> Result<&mut Self, RegistryError> {
        let group = module.group();
        let commands = command::normalize(group, Arc::clone(&module).commands())?;

        if let Some(prefix) = module.button_prefix() {
            if prefix.is_empty() || prefix.contains(CallbackData::DELIMITER) {
                return Err(RegistryError::InvalidButtonPrefix {
                    module: group.to_string(),
                    prefix: prefix.to_string(),
                });
            }
            for (name, action) in Arc::clone(&module).button_actions() {
                let action = handler::compose(&action, &format!("{prefix}:{name}"), &[]);
                self.actions.register(prefix, name, action);
            }
        }

        debug!("Registered module {} with {} commands", group, commands.len());
        self.modules.push(RegisteredModule { group, commands });
        Ok(self)
    }

    pub fn build(self) -> CommandRegistry {
        let mut routes: BTreeMap<i64, Vec<Command>> = BTreeMap::new();
        for command in self.modules.iter().flat_map(|m| &m.commands) {
            routes.entry(command.group).or_default().push(command.clone());
        }

        info!(
            "Command registry ready: {} modules, {} handler groups",
            self.modules.len(),
            routes.len()
        );

        CommandRegistry {
            modules: self.modules,
            routes,
            actions: self.actions,
        }
    }
}

/// One heading of the command listing.
#[derive(Debug)]
pub struct ListingSection<'a> {
    pub group: &'static str,
    /// Visible slash commands.
    pub direct: Vec<&'a Command>,
    /// Visible free-text and media handlers.
    pub indirect: Vec<&'a Command>,
}

/// Immutable command registry, shared by every update.
#[derive(Debug)]
pub struct CommandRegistry {
    modules: Vec<RegisteredModule>,
    /// Commands per handler group, each in registration order.
    routes: BTreeMap<i64, Vec<Command>>,
    actions: ActionRegistry,
}

impl CommandRegistry {
    pub fn modules(&self) -> &[RegisteredModule] {
        &self.modules
    }

    /// Handler groups in ascending order.
    pub fn routes(&self) -> impl Iterator<Item = (i64, &[Command])> {
        self.routes.iter().map(|(group, commands)| (*group, commands.as_slice()))
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Visible commands grouped by heading. Modules sharing a heading are
    /// merged; headings without visible commands are left out.
    pub fn listing(&self) -> Vec<ListingSection<'_>> {
        let mut sections: Vec<ListingSection<'_>> = Vec::new();

        for module in &self.modules {
            let index = match sections.iter().position(|s| s.group == module.group) {
                Some(index) => index,
                None => {
                    sections.push(ListingSection {
                        group: module.group,
                        direct: Vec::new(),
                        indirect: Vec::new(),
                    });
                    sections.len() - 1
                }
            };

            for command in module.commands.iter().filter(|c| !c.hidden) {
                match command.kind() {
                    HandlerKind::Command => sections[index].direct.push(command),
                    HandlerKind::Message => sections[index].indirect.push(command),
                    HandlerKind::CallbackQuery => {}
                }
            }
        }

        sections.retain(|s| !s.direct.is_empty() || !s.indirect.is_empty());
        sections
    }

    /// Visible slash commands in the shape Telegram's command menu takes.
    pub fn bot_commands(&self) -> Vec<BotCommand> {
        self.listing()
            .iter()
            .flat_map(|section| &section.direct)
            .filter_map(|command| {
                let word = command.command_word()?;
                let description = if command.description.is_empty() {
                    &command.title
                } else {
                    &command.description
                };
                Some(BotCommand::new(word, description.chars().take(256).collect::<String>()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        group: &'static str,
        names: &'static [&'static str],
        prefix: &'static str,
    }

    fn sample(group: &'static str, names: &'static [&'static str]) -> Arc<Sample> {
        Arc::new(Sample { group, names, prefix: "sample" })
    }

    impl Sample {
        async fn noop(&self, _ctx: Context) -> HandlerResult {
            Ok(())
        }
    }

    impl CommandModule for Sample {
        fn group(&self) -> &'static str {
            self.group
        }

        fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
            let mut decls: Vec<CommandDecl> = self
                .names
                .iter()
                .map(|name| CommandDecl::new(handler!(self, noop)).command_name(*name))
                .collect();
            decls.push(
                CommandDecl::new(handler!(self, noop))
                    .command_name("auto")
                    .route(Route::message(MessageFilter::Text))
                    .group(1),
            );
            decls.push(CommandDecl::new(handler!(self, noop)).command_name("secret").hidden(true));
            decls.push(
                CommandDecl::new(handler!(self, noop))
                    .command_name("pick")
                    .route(Route::callback("^pick$")),
            );
            decls
        }

        fn button_prefix(&self) -> Option<&'static str> {
            Some(self.prefix)
        }

        fn button_actions(self: Arc<Self>) -> Vec<(&'static str, Handler)> {
            vec![("noop", handler!(self, noop))]
        }
    }

    fn registry() -> CommandRegistry {
        let mut builder = RegistryBuilder::default();
        builder
            .register(sample("Bot Helpers", &["start", "commands"]))
            .unwrap()
            .register(sample("Random", &["roll"]))
            .unwrap()
            .register(sample("Bot Helpers", &["support"]))
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_modules_kept_in_order() {
        let registry = registry();
        let groups: Vec<_> = registry.modules().iter().map(|m| m.group).collect();
        assert_eq!(groups, vec!["Bot Helpers", "Random", "Bot Helpers"]);
        assert_eq!(registry.modules()[0].commands[0].command_name, "start");
        assert_eq!(registry.modules()[0].commands[0].title, "Noop");
    }

    #[test]
    fn test_routes_by_group() {
        let registry = registry();
        let routes: Vec<_> = registry.routes().map(|(g, c)| (g, c.len())).collect();
        assert_eq!(routes, vec![(0, 10), (1, 3)]);

        let first: Vec<_> = registry.routes().next().unwrap().1.iter().map(|c| c.command_name.as_str()).collect();
        assert_eq!(
            first,
            vec!["start", "commands", "secret", "pick", "roll", "secret", "pick", "support", "secret", "pick"]
        );
    }

    #[test]
    fn test_listing_merges_headings() {
        let registry = registry();
        let listing = registry.listing();

        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].group, "Bot Helpers");
        let direct: Vec<_> = listing[0].direct.iter().map(|c| c.command_name.as_str()).collect();
        assert_eq!(direct, vec!["start", "commands", "support"]);
        assert_eq!(listing[1].group, "Random");
    }

    #[test]
    fn test_listing_indirect_is_message_handlers_only() {
        let registry = registry();
        let listing = registry.listing();

        let indirect: Vec<_> = listing[0]
            .indirect
            .iter()
            .map(|c| (c.command_name.as_str(), c.kind()))
            .collect();
        assert_eq!(indirect, vec![("auto", HandlerKind::Message), ("auto", HandlerKind::Message)]);
        assert!(listing.iter().flat_map(|s| &s.direct).all(|c| c.command_name != "pick"));
    }

    #[test]
    fn test_button_prefix_with_delimiter_rejected() {
        let mut builder = RegistryBuilder::default();
        let err = builder
            .register(Arc::new(Sample { group: "Custom", names: &[], prefix: "custom:db" }))
            .err();

        assert_eq!(
            err,
            Some(RegistryError::InvalidButtonPrefix {
                module: "Custom".to_string(),
                prefix: "custom:db".to_string(),
            })
        );
    }

    #[test]
    fn test_bot_commands_skip_hidden() {
        let commands = registry().bot_commands();
        let names: Vec<_> = commands.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(names, vec!["start", "commands", "support", "roll"]);
        assert!(commands.iter().all(|c| c.description == "Noop"));
    }

    #[test]
    fn test_button_actions_registered() {
        let registry = registry();
        assert!(registry.actions().claims("sample"));
        assert!(registry.actions().resolve("sample", "noop").is_ok());
    }
}
