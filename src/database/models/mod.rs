//! Database models.

pub mod button;
pub mod stored_chat;
pub mod stored_gif;
pub mod stored_object;
pub mod stored_user;

pub use button::Button;
pub use stored_chat::{StoredChat, StoredChatKind};
pub use stored_gif::{GifSaveMode, StoredGif};
pub use stored_object::{ObjectKind, SaveMode, StoredObject};
pub use stored_user::StoredUser;
