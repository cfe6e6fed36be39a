//! Callback resolution for registered buttons.
//!
//! A press walks one of three paths:
//! - plain button: the record is consumed and its action fires;
//! - confirmation button, first press: the record stays, the keyboard is
//!   swapped for Yes/No controls carrying the answer in the callback data;
//! - confirmation answer: the record is consumed, "Yes" fires the action,
//!   "No" fires the abort action (or just removes the keyboard).
//!
//! Consumption happens before any action runs, through an atomic take, so
//! two racing presses can never both fire.

use async_trait::async_trait;

use super::CallbackData;
use crate::database::Button;

/// Storage for button records.
#[async_trait]
pub trait ButtonStore: Send + Sync {
    async fn insert(&self, button: &Button) -> anyhow::Result<()>;

    async fn get(&self, prefix: &str, id: &str) -> anyhow::Result<Option<Button>>;

    /// Remove and return the record in one step. The other buttons of its
    /// keyboard are removed as well, since the keyboard is done with.
    async fn take(&self, prefix: &str, id: &str) -> anyhow::Result<Option<Button>>;
}

/// What a callback press resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Malformed data, or the record is gone: the keyboard should go too.
    Stale,
    /// Ask the user for Yes/No. The record is kept.
    Confirm(Button),
    /// Run `target`. The record has been consumed.
    Fire { button: Button, target: String },
    /// The user said "No". The record has been consumed.
    Abort {
        button: Button,
        target: Option<String>,
    },
}

/// Resolve raw callback data against the store.
pub async fn resolve<S>(store: &S, raw: &str) -> anyhow::Result<Step>
where
    S: ButtonStore + ?Sized,
{
    let Some(data) = CallbackData::parse(raw) else {
        return Ok(Step::Stale);
    };

    match data.answer {
        None => {
            let Some(button) = store.get(&data.prefix, &data.id).await? else {
                return Ok(Step::Stale);
            };
            if button.confirmation_required {
                return Ok(Step::Confirm(button));
            }
            Ok(fire(store.take(&data.prefix, &data.id).await?))
        }
        Some(true) => Ok(fire(store.take(&data.prefix, &data.id).await?)),
        Some(false) => Ok(match store.take(&data.prefix, &data.id).await? {
            Some(button) => Step::Abort {
                target: button.abort_callback.clone(),
                button,
            },
            None => Step::Stale,
        }),
    }
}

// A record that vanished between get and take was consumed by a racing press.
fn fire(taken: Option<Button>) -> Step {
    match taken {
        Some(button) => Step::Fire {
            target: button.callback.clone(),
            button,
        },
        None => Step::Stale,
    }
}
