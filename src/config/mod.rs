//! Configuration module
//!
//! This module handles user preferences (converter path, template lists,
//! highlight style, math engine, incremental mode), their JSON persistence
//! in the platform config directory, and template list resolution.

mod persistence;
mod settings;
mod templates;

pub use persistence::*;
pub use settings::*;
pub use templates::*;
