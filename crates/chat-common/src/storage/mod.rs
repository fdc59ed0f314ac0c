//! Local persisted state

mod settings;

pub use settings::{SettingsError, SettingsStore};
