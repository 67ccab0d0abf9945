//! Contexts: immutable settings snapshots that builders and readers are
//! created from.

use std::path::Path;

use provena_engine::{ContextBuilderHandle, ContextHandle};

use crate::error::{boundary_count, boundary_handle, Error, Result};
use crate::handle::Owned;
use crate::settings::Settings;

/// Anything a builder or reader can be created from.
///
/// Implemented by [`Context`]; a binding with its own context wrapper can
/// implement it too.
pub trait ContextProvider {
    /// The engine context handle, if still usable.
    fn context_handle(&self) -> Option<&ContextHandle>;

    fn is_valid(&self) -> bool {
        self.context_handle().is_some()
    }
}

/// An immutable snapshot of engine settings.
///
/// Builders and readers copy what they need at construction, so dropping the
/// context before them is fine.
pub struct Context {
    inner: Owned<ContextHandle>,
}

impl Context {
    /// Create a context with default settings.
    pub fn new() -> Result<Self> {
        let handle = boundary_handle(provena_engine::context_new)?;
        Ok(Self {
            inner: Owned::new(handle, "context"),
        })
    }

    /// Create a context from an existing configuration.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        ContextBuilder::new()?.with_settings(settings)?.build()
    }

    /// Create a context from a JSON settings string.
    pub fn from_json(json: &str) -> Result<Self> {
        ContextBuilder::new()?.with_json(json)?.build()
    }
}

impl ContextProvider for Context {
    fn context_handle(&self) -> Option<&ContextHandle> {
        self.inner.peek()
    }
}

pub(crate) fn require_context(provider: &impl ContextProvider) -> Result<&ContextHandle> {
    provider
        .context_handle()
        .ok_or(Error::InvalidHandle { what: "context" })
}

/// Accumulates settings sources, then builds a [`Context`].
pub struct ContextBuilder {
    inner: Owned<ContextBuilderHandle>,
}

impl ContextBuilder {
    pub fn new() -> Result<Self> {
        let handle = boundary_handle(provena_engine::context_builder_new)?;
        Ok(Self {
            inner: Owned::new(handle, "context builder"),
        })
    }

    /// Merge a configuration into the builder; later sources win.
    pub fn with_settings(mut self, settings: &Settings) -> Result<Self> {
        let handle = self.inner.get_mut()?;
        let settings = settings.handle()?;
        boundary_count(|| provena_engine::context_builder_set_settings(handle, settings))?;
        Ok(self)
    }

    /// Merge a JSON settings string into the builder.
    pub fn with_json(self, json: &str) -> Result<Self> {
        self.with_settings(&Settings::from_json(json)?)
    }

    /// Merge a JSON settings file into the builder.
    pub fn with_json_settings_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        self.with_json(&data)
    }

    /// Build the context. Consumes the builder, succeed or fail.
    pub fn build(mut self) -> Result<Context> {
        let handle = self.inner.take()?;
        let context = boundary_handle(|| provena_engine::context_builder_build(handle))?;
        Ok(Context {
            inner: Owned::new(context, "context"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_builds_from_layered_settings() {
        let mut base = Settings::new().unwrap();
        base.update(r#"{"builder":{"claim_generator":"app/1.0"}}"#, "json")
            .unwrap();
        let context = ContextBuilder::new()
            .unwrap()
            .with_settings(&base)
            .unwrap()
            .with_json(r#"{"verify":{"verify_after_sign":false}}"#)
            .unwrap()
            .build()
            .unwrap();
        assert!(context.is_valid());
    }

    #[test]
    fn default_context_is_valid() {
        assert!(Context::new().unwrap().is_valid());
    }
}
