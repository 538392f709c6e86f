// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs` holds the TOML-backed data model.
//! - `loader.rs` reads a config file from disk.
//! - `validate.rs` turns the raw form into a [`DispatchConfig`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{CoderSection, DispatchConfig, LoggingSection, RawDispatchConfig, RetrySection};
pub use validate::validate_config;
