//! Update routing.
//!
//! Handler groups are visited in ascending order. Within a group the first
//! matching command runs, then routing moves on to the next group, so a
//! single update can reach at most one command per group.

use std::future::Future;
use std::sync::Arc;

use teloxide::prelude::*;
use tracing::debug;

use super::command::{Command, Routing};
use super::filter::MessageView;
use super::gate;
use super::{CommandRegistry, Context};
use crate::bot::{AppState, ThrottledBot, errors};
use crate::buttons::{self, CallbackData};

/// Split `/name[@bot] args...` into the lowercased name and its arguments.
///
/// Commands addressed to another bot are ignored.
pub fn parse_slash(text: &str, bot_username: &str) -> Option<(String, Vec<String>)> {
    let mut words = text.split_whitespace();
    let head = words.next()?.strip_prefix('/')?;

    let name = match head.split_once('@') {
        Some((name, mention)) if mention.eq_ignore_ascii_case(bot_username) => name,
        Some(_) => return None,
        None => head,
    };
    if name.is_empty() {
        return None;
    }

    Some((name.to_lowercase(), words.map(str::to_string).collect()))
}

/// Arguments for the command if the routing accepts this message.
fn accepts(routing: &Routing, view: &MessageView, slash: Option<&(String, Vec<String>)>) -> Option<Vec<String>> {
    match routing {
        Routing::Command { command, filter, .. } => {
            let (name, args) = slash?;
            (name.eq_ignore_ascii_case(command) && filter.matches(view)).then(|| args.clone())
        }
        Routing::Message { filter, .. } => filter.matches(view).then(Vec::new),
        Routing::Callback { .. } => None,
    }
}

fn gates_of(routing: &Routing) -> &[gate::Gate] {
    match routing {
        Routing::Command { gates, .. } | Routing::Message { gates, .. } => gates,
        Routing::Callback { .. } => &[],
    }
}

/// A command picked for an update, with the arguments it runs with.
#[derive(Debug)]
pub struct Selected<'a> {
    pub group: i64,
    pub command: &'a Command,
    pub args: Vec<String>,
}

/// Pick at most one command per handler group, groups ascending.
///
/// Within a group the first command whose route accepts the message and
/// whose gates `admit` wins. A refusal moves on to the next command of the
/// same group.
pub async fn select_message<'a, F, Fut>(
    registry: &'a CommandRegistry,
    view: &MessageView,
    slash: Option<&(String, Vec<String>)>,
    mut admit: F,
) -> Vec<Selected<'a>>
where
    F: FnMut(&'a Command) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut selected = Vec::new();

    for (group, commands) in registry.routes() {
        for command in commands {
            let Some(args) = accepts(&command.routing, view, slash) else {
                continue;
            };
            if !admit(command).await {
                continue;
            }
            selected.push(Selected { group, command, args });
            break;
        }
    }

    selected
}

/// Callback routes whose pattern matches `data`, at most one per group.
pub fn select_callback<'a>(registry: &'a CommandRegistry, data: &str) -> Vec<&'a Command> {
    registry
        .routes()
        .filter_map(|(_, commands)| {
            commands.iter().find(|command| match &command.routing {
                Routing::Callback { pattern, .. } => pattern.as_ref().is_none_or(|p| p.is_match(data)),
                _ => false,
            })
        })
        .collect()
}

/// Route a message through the registry.
pub async fn route_message(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    registry: Arc<CommandRegistry>,
) -> anyhow::Result<()> {
    let view = MessageView::from_message(&msg);
    let slash = if view.is_command() {
        view.text
            .as_deref()
            .and_then(|t| parse_slash(t, &state.bot_username))
    } else {
        None
    };

    let (view_ref, state_ref) = (&view, &state);
    let selected = select_message(&registry, &view, slash.as_ref(), move |command| {
        gate::all_pass(gates_of(&command.routing), view_ref, state_ref)
    })
    .await;

    for Selected { group, command, args } in selected {
        debug!("Group {} matched {}", group, command.command_name);
        let ctx = Context::from_message(
            bot.clone(),
            state.clone(),
            Arc::clone(&registry),
            msg.clone(),
            args,
        );
        if let Err(err) = command.handler.call(ctx).await {
            errors::report(&bot, Some(msg.chat.id), &err).await;
        }
    }

    Ok(())
}

/// Route a callback query: registered buttons first, then callback routes.
pub async fn route_callback(
    bot: ThrottledBot,
    query: CallbackQuery,
    state: AppState,
    registry: Arc<CommandRegistry>,
) -> anyhow::Result<()> {
    let Some(data) = query.data.clone() else {
        return Ok(());
    };

    let ctx = Context::from_callback(bot.clone(), state, Arc::clone(&registry), query.clone());
    let chat_id = ctx.chat_id;

    if registry.actions().claims(CallbackData::prefix_of(&data)) {
        if let Err(err) = buttons::dispatch(ctx, &data).await {
            errors::report(&bot, Some(chat_id), &err).await;
        }
        return Ok(());
    }

    let matched = select_callback(&registry, &data);
    if matched.is_empty() {
        debug!("No route for callback data {:?}", data);
        bot.answer_callback_query(query.id).await?;
        return Ok(());
    }

    for command in matched {
        if let Err(err) = command.handler.call(ctx.clone()).await {
            errors::report(&bot, Some(chat_id), &err).await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use super::*;
    use crate::registry::filter::ChatKind;
    use crate::registry::{
        CommandDecl, CommandModule, Gate, HandlerResult, MessageFilter, RegistryBuilder, Route, handler,
    };

    struct Routed;

    impl Routed {
        async fn noop(&self, _ctx: Context) -> HandlerResult {
            Ok(())
        }
    }

    impl CommandModule for Routed {
        fn group(&self) -> &'static str {
            "Misc"
        }

        fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
            let decl = |name: &str| CommandDecl::new(handler!(self, noop)).command_name(name);
            vec![
                decl("save")
                    .route(Route::message(MessageFilter::Text))
                    .gate(Gate::BotAdmin),
                decl("echo").route(Route::message(MessageFilter::Text)),
                decl("roll"),
                decl("echo_again").route(Route::message(MessageFilter::Text)),
                decl("track").route(Route::message(MessageFilter::All)).group(1),
                decl("calculate").route(Route::message(MessageFilter::Text)).group(2),
                decl("pick").route(Route::callback("^pick:")),
                decl("pick_prefix").route(Route::callback("^pi")),
                decl("pick_late").route(Route::callback("^pick:")).group(3),
            ]
        }
    }

    fn routed() -> CommandRegistry {
        let mut builder = RegistryBuilder::default();
        builder.register(Arc::new(Routed)).unwrap();
        builder.build()
    }

    fn text(t: &str) -> MessageView {
        MessageView {
            text: Some(t.to_string()),
            is_text: true,
            ..Default::default()
        }
    }

    // Stands in for the gate checks: every gated route is refused.
    fn ungated(command: &Command) -> std::future::Ready<bool> {
        ready(gates_of(&command.routing).is_empty())
    }

    async fn picked(registry: &CommandRegistry, view: &MessageView) -> Vec<(i64, String, Vec<String>)> {
        let slash = view.text.as_deref().and_then(|t| parse_slash(t, "xenian_bot"));
        select_message(registry, view, slash.as_ref(), ungated)
            .await
            .into_iter()
            .map(|s| (s.group, s.command.command_name.clone(), s.args))
            .collect()
    }

    #[tokio::test]
    async fn test_one_command_per_group_in_order() {
        let registry = routed();

        assert_eq!(
            picked(&registry, &text("2 + 2")).await,
            vec![
                (0, "echo".to_string(), vec![]),
                (1, "track".to_string(), vec![]),
                (2, "calculate".to_string(), vec![]),
            ]
        );
    }

    #[tokio::test]
    async fn test_slash_command_and_later_groups() {
        let registry = routed();

        assert_eq!(
            picked(&registry, &text("/roll 2 5")).await,
            vec![
                (0, "roll".to_string(), vec!["2".to_string(), "5".to_string()]),
                (1, "track".to_string(), vec![]),
            ]
        );
    }

    #[tokio::test]
    async fn test_refused_gate_falls_through_within_group() {
        let registry = routed();
        let view = text("note to self");

        let everything = select_message(&registry, &view, None, |_| ready(true)).await;
        assert_eq!(everything[0].command.command_name, "save");

        let gated = select_message(&registry, &view, None, ungated).await;
        assert_eq!(gated[0].command.command_name, "echo");
        assert_eq!(gated.len(), 3);
    }

    #[tokio::test]
    async fn test_group_without_match_is_skipped() {
        let registry = routed();
        let photo = MessageView {
            media: Some(crate::registry::MediaKind::Photo),
            ..Default::default()
        };

        assert_eq!(picked(&registry, &photo).await, vec![(1, "track".to_string(), vec![])]);
    }

    #[test]
    fn test_select_callback() {
        let registry = routed();

        let names: Vec<_> = select_callback(&registry, "pick:3")
            .iter()
            .map(|c| c.command_name.as_str())
            .collect();
        assert_eq!(names, vec!["pick", "pick_late"]);

        let names: Vec<_> = select_callback(&registry, "pie")
            .iter()
            .map(|c| c.command_name.as_str())
            .collect();
        assert_eq!(names, vec!["pick_prefix"]);
        assert!(select_callback(&registry, "other").is_empty());
    }

    fn routing(command: &str, filter: MessageFilter) -> Routing {
        Routing::Command {
            command: command.to_string(),
            filter,
            gates: Vec::new(),
        }
    }

    #[test]
    fn test_parse_slash() {
        assert_eq!(
            parse_slash("/roll 1 6", "xenian_bot"),
            Some(("roll".to_string(), vec!["1".to_string(), "6".to_string()]))
        );
        assert_eq!(parse_slash("/Start", "xenian_bot"), Some(("start".to_string(), vec![])));
        assert_eq!(
            parse_slash("/start@Xenian_Bot", "xenian_bot"),
            Some(("start".to_string(), vec![]))
        );
        assert_eq!(parse_slash("/start@other_bot", "xenian_bot"), None);
        assert_eq!(parse_slash("roll 1 6", "xenian_bot"), None);
        assert_eq!(parse_slash("/", "xenian_bot"), None);
    }

    #[test]
    fn test_command_route_accepts() {
        let view = MessageView {
            text: Some("/ban".to_string()),
            is_text: true,
            chat_kind: ChatKind::Group,
            ..Default::default()
        };
        let slash = parse_slash("/ban", "bot");

        assert_eq!(
            accepts(&routing("ban", MessageFilter::Group), &view, slash.as_ref()),
            Some(vec![])
        );
        assert_eq!(accepts(&routing("ban", MessageFilter::Private), &view, slash.as_ref()), None);
        assert_eq!(accepts(&routing("kick", MessageFilter::All), &view, slash.as_ref()), None);
        assert_eq!(accepts(&routing("ban", MessageFilter::All), &view, None), None);
    }

    #[test]
    fn test_message_route_accepts() {
        let view = MessageView {
            text: Some("2 * 3".to_string()),
            is_text: true,
            ..Default::default()
        };
        let text = Routing::Message {
            filter: MessageFilter::Text,
            gates: Vec::new(),
        };
        let group_only = Routing::Message {
            filter: MessageFilter::Group,
            gates: Vec::new(),
        };

        assert_eq!(accepts(&text, &view, None), Some(vec![]));
        assert_eq!(accepts(&group_only, &view, None), None);
    }
}
