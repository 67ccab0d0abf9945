//! Settings, context-builder, and context handles.
//!
//! Settings are a JSON object merged from one or more configuration sources
//! (latest wins). A context snapshots the settings at build time; builders
//! and readers copy what they need from the context at construction, so the
//! context never has to outlive them.

use serde_json::{Map, Value};

use crate::fault::{to_count, to_handle, EngineResult, Fault};

/// Opaque settings handle. Mutable in place; not consumed by updates.
#[derive(Debug)]
pub struct SettingsHandle {
    value: Value,
}

/// Opaque context-builder handle. Consumed by [`context_builder_build`].
pub struct ContextBuilderHandle {
    settings: Value,
}

/// Opaque context handle: an immutable settings snapshot.
pub struct ContextHandle {
    settings: Value,
}

impl ContextHandle {
    pub(crate) fn claim_generator(&self) -> Option<String> {
        self.settings
            .pointer("/builder/claim_generator")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub(crate) fn verify_after_sign(&self) -> bool {
        self.settings
            .pointer("/verify/verify_after_sign")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }
}

/// Create an empty settings object. Never fails.
pub fn settings_new() -> Option<SettingsHandle> {
    Some(SettingsHandle {
        value: Value::Object(Map::new()),
    })
}

/// Merge configuration from a string. Only the `"json"` format is supported;
/// the latest configuration wins key-by-key.
pub fn settings_update_from_string(handle: &mut SettingsHandle, data: &str, format: &str) -> i64 {
    to_count(update_from_string(handle, data, format).map(|()| 0))
}

fn update_from_string(handle: &mut SettingsHandle, data: &str, format: &str) -> EngineResult<()> {
    if !format.eq_ignore_ascii_case("json") {
        return Err(Fault::invalid(format!(
            "unsupported settings format: {format} (only \"json\" is supported)"
        )));
    }
    let incoming: Value = serde_json::from_str(data)
        .map_err(|e| Fault::invalid(format!("invalid settings JSON: {e}")))?;
    if !incoming.is_object() {
        return Err(Fault::invalid("settings must be a JSON object"));
    }
    merge(&mut handle.value, incoming);
    Ok(())
}

/// Set a single value by dot-separated path, e.g.
/// `"verify.verify_after_sign"`.
pub fn settings_set_value(handle: &mut SettingsHandle, path: &str, json_value: &str) -> i64 {
    to_count(set_value(handle, path, json_value).map(|()| 0))
}

fn set_value(handle: &mut SettingsHandle, path: &str, json_value: &str) -> EngineResult<()> {
    let value: Value = serde_json::from_str(json_value)
        .map_err(|e| Fault::invalid(format!("invalid settings value JSON: {e}")))?;

    let mut slot = &mut handle.value;
    for segment in path.split('.') {
        if segment.is_empty() {
            return Err(Fault::invalid(format!("invalid settings path: {path}")));
        }
        let map = match slot {
            Value::Object(map) => map,
            _ => return Err(Fault::invalid(format!(
                "settings path {path} crosses a non-object value"
            ))),
        };
        slot = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    *slot = value;
    Ok(())
}

/// Deep merge: objects merge key-by-key, everything else is replaced.
fn merge(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                merge(base_map.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Create a context builder with empty settings.
pub fn context_builder_new() -> Option<ContextBuilderHandle> {
    Some(ContextBuilderHandle {
        settings: Value::Object(Map::new()),
    })
}

/// Merge a settings object into the builder. The settings handle is copied
/// from, not consumed.
pub fn context_builder_set_settings(
    builder: &mut ContextBuilderHandle,
    settings: &SettingsHandle,
) -> i64 {
    merge(&mut builder.settings, settings.value.clone());
    0
}

/// Build a context from the accumulated settings. Consumes the builder,
/// succeed or fail.
pub fn context_builder_build(builder: ContextBuilderHandle) -> Option<ContextHandle> {
    to_handle(build(builder))
}

fn build(builder: ContextBuilderHandle) -> EngineResult<ContextHandle> {
    if !builder.settings.is_object() {
        return Err(Fault::engine("context settings must be a JSON object"));
    }
    Ok(ContextHandle {
        settings: builder.settings,
    })
}

/// Create a context with default settings.
pub fn context_new() -> Option<ContextHandle> {
    Some(ContextHandle {
        settings: Value::Object(Map::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::{take_last_error, test_guard, FaultCode};

    #[test]
    fn merge_latest_wins() {
        let mut settings = settings_new().unwrap();
        assert_eq!(
            settings_update_from_string(&mut settings, r#"{"a":{"b":1,"c":2}}"#, "json"),
            0
        );
        assert_eq!(
            settings_update_from_string(&mut settings, r#"{"a":{"b":9},"d":true}"#, "json"),
            0
        );
        assert_eq!(
            settings.value,
            serde_json::json!({"a":{"b":9,"c":2},"d":true})
        );
    }

    #[test]
    fn toml_format_is_rejected() {
        let _serial = test_guard();
        let mut settings = settings_new().unwrap();
        assert!(settings_update_from_string(&mut settings, "a = 1", "toml") < 0);
        let err = take_last_error().unwrap();
        assert_eq!(err.code, FaultCode::InvalidArgument);
        assert!(err.message.contains("toml"));
    }

    #[test]
    fn dot_path_set_creates_intermediate_objects() {
        let mut settings = settings_new().unwrap();
        assert_eq!(
            settings_set_value(&mut settings, "verify.verify_after_sign", "false"),
            0
        );
        assert_eq!(
            settings.value,
            serde_json::json!({"verify":{"verify_after_sign":false}})
        );
    }

    #[test]
    fn context_snapshot_reads_claim_generator() {
        let mut settings = settings_new().unwrap();
        settings_update_from_string(
            &mut settings,
            r#"{"builder":{"claim_generator":"provena/0.4"}}"#,
            "json",
        );
        let mut builder = context_builder_new().unwrap();
        context_builder_set_settings(&mut builder, &settings);
        let ctx = context_builder_build(builder).unwrap();
        assert_eq!(ctx.claim_generator().as_deref(), Some("provena/0.4"));
        assert!(ctx.verify_after_sign());
    }
}
