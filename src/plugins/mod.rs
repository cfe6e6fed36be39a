//! Command modules.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Registering the module in `registry()`
//!
//! Registration order is routing order inside a handler group.

pub mod anime;
pub mod anime_databases;
pub mod builtins;
pub mod calculator;
pub mod custom_db;
pub mod decide;
pub mod group_management;
pub mod image_to_text;
pub mod reverse_image_search;
pub mod roll;
pub mod tracking;
pub mod translate;
pub mod urban_dictionary;

use std::sync::Arc;

use crate::error::RegistryError;
use crate::registry::{CommandRegistry, RegistryBuilder};

/// Register every module and freeze the result.
pub fn registry() -> Result<CommandRegistry, RegistryError> {
    let mut builder = RegistryBuilder::default();
    builder
        .register(Arc::new(builtins::Builtins))?
        .register(Arc::new(tracking::Tracking))?
        .register(Arc::new(group_management::GroupManagement))?
        .register(Arc::new(custom_db::CustomDb::default()))?
        .register(Arc::new(reverse_image_search::ReverseImageSearch))?
        .register(Arc::new(image_to_text::ImageToText))?
        .register(Arc::new(roll::Roll))?
        .register(Arc::new(decide::Decide))?
        .register(Arc::new(calculator::Calculator))?
        .register(Arc::new(urban_dictionary::UrbanDictionary))?
        .register(Arc::new(translate::Translate))?
        .register(Arc::new(anime::Anime))?
        .register(Arc::new(anime_databases::AnimeDatabases::default()))?;
    Ok(builder.build())
}
