//! Application runtime composition modules.

pub(crate) mod config;
pub(crate) mod prompt;
pub(crate) mod runtime;
pub(crate) mod terminal;
