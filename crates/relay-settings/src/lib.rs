//! # relay-settings
//!
//! Configuration for the relay gateway and client, loaded in three layers:
//!
//! 1. Compiled defaults ([`RelaySettings::default()`])
//! 2. `~/.relay/settings.json`, deep-merged over the defaults
//! 3. `RELAY_*` environment variables
//!
//! Settings are loaded explicitly with [`load_settings`] or
//! [`load_settings_from_path`] and handed to the components that need them.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_dir, settings_path};
pub use types::{
    AuthSettings, ClientSettings, LoggingSettings, RegistryBackend, RegistrySettings,
    RelaySettings, ServerSettings,
};
