//! Persistence: MongoDB connection, documents and repositories.

pub mod models;
mod mongo;
mod repository;

pub use models::*;
pub use mongo::Database;
pub use repository::{ButtonRepository, ChatRepository, CustomDbRepository, GifRepository, UserRepository};
