//! Schema module - Configuration and demo frame patterns for MVP containers.

mod config;
mod pattern;

pub use config::*;
pub use pattern::*;
