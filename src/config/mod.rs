//! User configuration (`config.toml`).

pub mod settings;

pub use settings::{PolicyMode, Settings};
