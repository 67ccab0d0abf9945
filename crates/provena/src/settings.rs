//! Engine configuration.

use provena_engine::SettingsHandle;

use crate::error::{boundary_count, boundary_handle, Result};
use crate::handle::Owned;

/// A mutable configuration object, merged from one or more sources.
///
/// Later updates win key-by-key. Only the `"json"` configuration format is
/// supported.
#[derive(Debug)]
pub struct Settings {
    inner: Owned<SettingsHandle>,
}

impl Settings {
    /// Create an empty configuration.
    pub fn new() -> Result<Self> {
        let handle = boundary_handle(provena_engine::settings_new)?;
        Ok(Self {
            inner: Owned::new(handle, "settings"),
        })
    }

    /// Create a configuration from a single source string.
    pub fn from_config(data: &str, format: &str) -> Result<Self> {
        let mut settings = Self::new()?;
        settings.update(data, format)?;
        Ok(settings)
    }

    /// Create a configuration from a JSON string.
    pub fn from_json(data: &str) -> Result<Self> {
        Self::from_config(data, "json")
    }

    /// Merge another configuration source into this one.
    pub fn update(&mut self, data: &str, format: &str) -> Result<&mut Self> {
        let handle = self.inner.get_mut()?;
        boundary_count(|| provena_engine::settings_update_from_string(handle, data, format))?;
        Ok(self)
    }

    /// Set one value by dot-separated path, e.g.
    /// `settings.set("verify.verify_after_sign", "false")`.
    pub fn set(&mut self, path: &str, json_value: &str) -> Result<&mut Self> {
        let handle = self.inner.get_mut()?;
        boundary_count(|| provena_engine::settings_set_value(handle, path, json_value))?;
        Ok(self)
    }

    /// Whether the underlying handle is still usable.
    pub fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    pub(crate) fn handle(&self) -> Result<&SettingsHandle> {
        self.inner.get()
    }
}
