//! Persistent user configuration and startup settings resolution.
//!
//! [`Config`] is the TOML file under the platform config directory.
//! [`Settings`] is what a session actually runs with, after layering CLI
//! flags and environment variables over the file.

pub mod data;
pub mod io;
pub mod settings;

pub use data::{path_display, Config};
pub use io::ConfigError;
pub use settings::{Settings, SettingsError, SettingsOverrides};
