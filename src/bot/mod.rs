//! Bot module - Core bot functionality.

pub mod dispatcher;
pub mod errors;
pub mod restart;
mod runtime;
mod webhook;

pub use dispatcher::{AppState, ThrottledBot, build_dispatcher};
pub use restart::RestartSignal;
pub use runtime::run;
