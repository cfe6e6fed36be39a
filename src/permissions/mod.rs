//! Permission checks behind the admin gates.
//!
//! ```ignore
//! let perms = Permissions::new(bot.clone(), config.admins.clone());
//!
//! if perms.is_admin(chat_id, user_id).await? {
//!     // ...
//! }
//! ```

mod checker;

pub use checker::Permissions;
