//! Glue between resolved button steps and Telegram.

use teloxide::prelude::*;
use tracing::{debug, warn};

use super::protocol::{self, Step};
use super::render;
use crate::database::Button;
use crate::registry::Context;

/// What a resolved press does to the chat.
#[derive(Debug, Clone, PartialEq)]
enum Reaction {
    /// The keyboard is stale or declined: take it off the message.
    RemoveKeyboard,
    /// Swap the keyboard for Yes/No controls.
    AskConfirmation(Button),
    /// Run a registered action with the consumed button.
    Run { button: Button, target: String },
}

fn react(step: Step) -> Reaction {
    match step {
        Step::Stale | Step::Abort { target: None, .. } => Reaction::RemoveKeyboard,
        Step::Confirm(button) => Reaction::AskConfirmation(button),
        Step::Fire { button, target }
        | Step::Abort {
            button,
            target: Some(target),
        } => Reaction::Run { button, target },
    }
}

/// Handle a press on a registered button. The query is always answered,
/// whether the press succeeded or not.
pub async fn dispatch(ctx: Context, data: &str) -> anyhow::Result<()> {
    let Some(query) = ctx.callback_query().cloned() else {
        return Ok(());
    };
    let bot = ctx.bot.clone();

    let result = press(ctx, &query, data).await;

    if let Err(e) = bot.answer_callback_query(query.id).await {
        warn!("Failed to answer callback query: {}", e);
    }

    result
}

async fn press(ctx: Context, query: &CallbackQuery, data: &str) -> anyhow::Result<()> {
    let step = protocol::resolve(ctx.state.buttons.as_ref(), data).await?;

    match react(step) {
        Reaction::RemoveKeyboard => {
            debug!("Removing keyboard of button {:?}", data);
            if let Err(e) = ctx.delete_keyboard().await {
                debug!("Could not remove keyboard: {}", e);
            }
            Ok(())
        }
        Reaction::AskConfirmation(button) => confirm(&ctx, query, &button).await,
        Reaction::Run { button, target } => run(ctx, button, &target).await,
    }
}

async fn confirm(ctx: &Context, query: &CallbackQuery, button: &Button) -> anyhow::Result<()> {
    let Some(msg) = &query.message else {
        return Ok(());
    };

    ctx.bot
        .edit_message_text(msg.chat().id, msg.id(), format!("Are you sure? ({})", button.text))
        .reply_markup(render::confirmation_keyboard(button))
        .await?;
    Ok(())
}

async fn run(mut ctx: Context, button: Button, target: &str) -> anyhow::Result<()> {
    let action = ctx.registry.actions().resolve(&button.prefix, target)?.clone();
    debug!("Running button action {}:{}", button.prefix, target);

    ctx.button = Some(button);
    action.call(ctx).await
}

#[cfg(test)]
mod tests {
    use super::protocol::tests::MemoryStore;
    use super::*;
    use crate::buttons::{ButtonStore, keyboard};

    #[tokio::test]
    async fn test_stale_press_removes_keyboard() {
        let store = MemoryStore::default();
        let step = protocol::resolve(&store, "customdb:65f0:1").await.unwrap();
        assert_eq!(react(step), Reaction::RemoveKeyboard);

        assert_eq!(react(protocol::resolve(&store, "nonsense").await.unwrap()), Reaction::RemoveKeyboard);
    }

    #[tokio::test]
    async fn test_confirmation_flow_reactions() {
        let store = MemoryStore::default();
        let delete = Button::new("customdb", "Delete", "delete").confirm(Some("cancel"));
        let plain = Button::new("customdb", "Info", "info");
        keyboard(&store, vec![vec![delete.clone()]]).await.unwrap();

        let first = react(protocol::resolve(&store, &delete.callback_data(None)).await.unwrap());
        assert!(matches!(first, Reaction::AskConfirmation(ref b) if b.id == delete.id));

        let declined = react(protocol::resolve(&store, &delete.callback_data(Some(false))).await.unwrap());
        assert!(matches!(declined, Reaction::Run { ref target, .. } if target == "cancel"));

        store.insert(&plain).await.unwrap();
        let fired = react(protocol::resolve(&store, &plain.callback_data(None)).await.unwrap());
        assert!(matches!(fired, Reaction::Run { ref target, ref button } if target == "info" && button.id == plain.id));
    }

    #[test]
    fn test_decline_without_abort_removes_keyboard() {
        let button = Button::new("customdb", "Delete", "delete").confirm(None);
        let step = Step::Abort { button, target: None };
        assert_eq!(react(step), Reaction::RemoveKeyboard);
    }
}
