//! Repository module - data access per collection.

mod button_repository;
mod chat_repository;
mod custom_db_repository;
mod gif_repository;
mod user_repository;

pub use button_repository::ButtonRepository;
pub use chat_repository::ChatRepository;
pub use custom_db_repository::CustomDbRepository;
pub use gif_repository::GifRepository;
pub use user_repository::UserRepository;
