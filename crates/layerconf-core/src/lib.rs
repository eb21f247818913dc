//! layerconf-core: Layered settings resolution
//!
//! This crate loads YAML settings sources in a fixed precedence order,
//! deep-merges them into one tree, optionally overlays environment
//! variables, and exposes the result as a queryable [`Settings`] tree.
//!
//! # Example
//!
//! ```rust,no_run
//! use layerconf_core::{setting_files, Settings};
//!
//! let mut settings = Settings::with_sources(setting_files("config", "production"));
//! settings.load().unwrap();
//! settings.load_env("SETTINGS").unwrap();
//!
//! let host = settings.get_str("database.host");
//! ```

pub mod env;
pub mod error;
pub mod global;
pub mod layout;
pub mod merge;
pub mod settings;
pub mod source;
pub mod value;

pub use error::{Error, ErrorKind, Result};
pub use global::{
    load_and_set_nested_settings, load_and_set_settings, load_files, reload, setup,
    SettingsRegistry, SetupOptions, SharedSettings,
};
pub use layout::{nested_sources, setting_files};
pub use merge::merge_sources;
pub use settings::Settings;
pub use source::Source;
pub use value::{Mapping, Value};
