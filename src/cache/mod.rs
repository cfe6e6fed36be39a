//! Cache module - small typed caches on top of Moka.
//!
//! Repositories own their caches directly; [`CacheConfig`] carries the
//! presets so the same kind of data is cached the same way everywhere.

mod config;
mod typed;

pub use config::CacheConfig;
pub use typed::TypedCache;
