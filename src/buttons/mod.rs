//! Persisted inline-keyboard buttons.
//!
//! Every callback button is stored before its keyboard is sent and carries
//! `prefix:id` as callback data. Presses come back through [`dispatch`],
//! which resolves the record, walks the optional Yes/No confirmation and
//! runs the named action the owning module registered.

mod actions;
mod callback_data;
mod dispatch;
mod protocol;
mod render;

use mongodb::bson::oid::ObjectId;
use teloxide::types::InlineKeyboardMarkup;

pub use actions::ActionRegistry;
pub use callback_data::CallbackData;
pub use dispatch::dispatch;
pub use protocol::ButtonStore;
use render::render;

use crate::database::Button;

/// Persist the callback buttons of a keyboard and render it.
///
/// Link buttons never produce callbacks, so they are not stored. The stored
/// buttons share a keyboard id and are consumed together.
pub async fn keyboard<S>(store: &S, mut rows: Vec<Vec<Button>>) -> anyhow::Result<InlineKeyboardMarkup>
where
    S: ButtonStore + ?Sized,
{
    let keyboard_id = ObjectId::new().to_hex();
    for button in rows.iter_mut().flatten().filter(|b| b.url.is_none()) {
        button.keyboard = Some(keyboard_id.clone());
        store.insert(button).await?;
    }
    Ok(render(&rows)?)
}

#[cfg(test)]
mod tests {
    use super::protocol::tests::MemoryStore;
    use super::*;

    #[tokio::test]
    async fn test_keyboard_stores_callback_buttons_only() {
        let store = MemoryStore::default();
        let pick = Button::new("p", "Pick", "pick");
        let link = Button::link("p", "Docs", "https://example.org");

        let markup = keyboard(&store, vec![vec![pick.clone(), link.clone()]]).await.unwrap();

        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert!(store.get("p", &pick.id).await.unwrap().is_some());
        assert!(store.get("p", &link.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_press_consumes_whole_keyboard() {
        let store = MemoryStore::default();
        let a = Button::new("p", "A", "pick");
        let b = Button::new("p", "B", "pick");
        let cancel = Button::new("p", "Cancel", "cancel");
        let other = Button::new("p", "Elsewhere", "pick");

        keyboard(&store, vec![vec![a.clone(), b.clone()], vec![cancel.clone()]])
            .await
            .unwrap();
        keyboard(&store, vec![vec![other.clone()]]).await.unwrap();
        assert_eq!(store.len(), 4);

        let step = protocol::resolve(&store, &a.callback_data(None)).await.unwrap();
        assert!(matches!(step, protocol::Step::Fire { .. }));

        assert!(store.get("p", &b.id).await.unwrap().is_none());
        assert!(store.get("p", &cancel.id).await.unwrap().is_none());
        assert!(store.get("p", &other.id).await.unwrap().is_some());
        assert_eq!(
            protocol::resolve(&store, &b.callback_data(None)).await.unwrap(),
            protocol::Step::Stale
        );
    }

    #[tokio::test]
    async fn test_confirmation_keeps_keyboard_until_answered() {
        let store = MemoryStore::default();
        let delete = Button::new("p", "Delete", "remove").confirm(None);
        let cancel = Button::new("p", "Cancel", "cancel");

        keyboard(&store, vec![vec![delete.clone(), cancel.clone()]]).await.unwrap();

        let step = protocol::resolve(&store, &delete.callback_data(None)).await.unwrap();
        assert!(matches!(step, protocol::Step::Confirm(_)));
        assert_eq!(store.len(), 2);

        let step = protocol::resolve(&store, &delete.callback_data(Some(false))).await.unwrap();
        assert!(matches!(step, protocol::Step::Abort { target: None, .. }));
        assert_eq!(store.len(), 0);
    }
}
