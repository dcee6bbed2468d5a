//! Caller information attributes and the sinks they are written to.

use crate::config::CallerInfoConfig;
use crate::frame::StackFrame;
use crate::location::SourceLocation;
use crate::path;

use opentelemetry::logs::{AnyValue, LogRecord as _};
use opentelemetry::Key;
use opentelemetry_sdk::logs::SdkLogRecord;

use std::collections::HashMap;
use std::hash::BuildHasher;

/// Attribute holding the simple name of the calling method.
pub const METHOD: &str = "Method";
/// Attribute holding the full path of the calling method's declaring type.
pub const NAMESPACE: &str = "Namespace";
/// Attribute holding the (possibly truncated) source file of the caller.
pub const SOURCE_FILE: &str = "SourceFile";
/// Attribute holding the source line of the caller.
pub const LINE_NUMBER: &str = "LineNumber";
/// Attribute holding the source column of the caller.
pub const COLUMN_NUMBER: &str = "ColumnNumber";
/// Attribute recording the key prefix in use. It is never prefixed itself.
pub const PREFIX_MARKER: &str = "callerinfo.prefix";

/// Something caller information can be attached to, typically a log record.
///
/// Writes are add-if-absent: a property that is already present keeps its
/// original value.
pub trait PropertySink {
    /// The value of the property named `key`, if present.
    fn property(&self, key: &str) -> Option<&AnyValue>;

    /// Whether a property with this key is present.
    fn contains_property(&self, key: &Key) -> bool {
        self.property(key.as_str()).is_some()
    }

    /// Adds a property unconditionally.
    fn add_property(&mut self, key: Key, value: AnyValue);

    /// Adds a property unless one with the same key is present. Returns
    /// whether the property was added.
    fn add_property_if_absent(&mut self, key: Key, value: AnyValue) -> bool {
        if self.contains_property(&key) {
            return false;
        }
        self.add_property(key, value);
        true
    }
}

impl PropertySink for SdkLogRecord {
    fn property(&self, key: &str) -> Option<&AnyValue> {
        self.attributes_iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    fn add_property(&mut self, key: Key, value: AnyValue) {
        self.add_attribute(key, value);
    }
}

impl<S: BuildHasher> PropertySink for HashMap<Key, AnyValue, S> {
    fn property(&self, key: &str) -> Option<&AnyValue> {
        self.iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    fn contains_property(&self, key: &Key) -> bool {
        self.contains_key(key)
    }

    fn add_property(&mut self, key: Key, value: AnyValue) {
        self.insert(key, value);
    }
}

/// Builds the caller information attributes for a resolved frame.
///
/// Nothing is produced for a frame without a method or declaring type. File
/// attributes are only produced when enabled and the frame carries a
/// non-blank file name inside its own unit.
pub fn extract(frame: &StackFrame, config: &CallerInfoConfig) -> Vec<(Key, AnyValue)> {
    extract_at(frame, SourceLocation::of_frame(frame), config)
}

/// Like [`extract`], with the source attributes taken from `location`.
pub(crate) fn extract_at(
    frame: &StackFrame,
    location: Option<SourceLocation<'_>>,
    config: &CallerInfoConfig,
) -> Vec<(Key, AnyValue)> {
    let Some(method) = frame.method() else {
        return Vec::new();
    };
    let Some(declaring_type) = method.declaring_type() else {
        return Vec::new();
    };

    let prefix = config.key_prefix();
    let mut properties = Vec::with_capacity(6);
    if !prefix.trim().is_empty() {
        properties.push((
            Key::from_static_str(PREFIX_MARKER),
            AnyValue::String(prefix.to_owned().into()),
        ));
    }
    properties.push((
        prefixed(prefix, METHOD),
        AnyValue::String(method.name().to_owned().into()),
    ));
    properties.push((
        prefixed(prefix, NAMESPACE),
        AnyValue::String(declaring_type.full_name().to_owned().into()),
    ));

    if !config.include_file_info() {
        return properties;
    }
    let Some(location) = location else {
        return properties;
    };
    if let Some(source_file) = path::truncate(location.file, config.file_path_depth()) {
        properties.push((
            prefixed(prefix, SOURCE_FILE),
            AnyValue::String(source_file.into_owned().into()),
        ));
        properties.push((
            prefixed(prefix, LINE_NUMBER),
            AnyValue::Int(location.line.unwrap_or_default()),
        ));
        properties.push((
            prefixed(prefix, COLUMN_NUMBER),
            AnyValue::Int(location.column.unwrap_or_default()),
        ));
    }

    properties
}

fn prefixed(prefix: &str, field: &'static str) -> Key {
    if prefix.is_empty() {
        Key::from_static_str(field)
    } else {
        Key::new(format!("{prefix}{field}"))
    }
}
