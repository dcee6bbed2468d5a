//! Source locations of a resolved caller.
//!
//! Debug info maps code expanded from another crate's macro to that macro's
//! definition. A `tracing::info!` in `my_app::run` therefore resolves to the
//! frame of `run` but to a line in `tracing/src/macros.rs`. Such locations are
//! not reported. The call site recorded on the log record itself is used
//! instead when it belongs to the same unit.

use crate::filter::normalize_unit_name;
use crate::frame::StackFrame;
use crate::properties::PropertySink;

use opentelemetry::logs::AnyValue;

use std::path::{Component, Path};

/// Call site attributes written by `opentelemetry-appender-tracing` with its
/// `experimental_metadata_attributes` feature, newest names first.
const CODE_FILE_PATH: [&str; 2] = ["code.file.path", "code.filepath"];
const CODE_LINE_NUMBER: [&str; 2] = ["code.line.number", "code.lineno"];
const CODE_COLUMN_NUMBER: [&str; 2] = ["code.column.number", "code.column"];
const CODE_NAMESPACE: [&str; 2] = ["code.namespace", "code.function.name"];

/// Length of the commit hash in the `/rustc/<hash>/` prefix of standard
/// library sources.
const RUSTC_COMMIT_LEN: usize = 40;

/// A source file with optional line and column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SourceLocation<'a> {
    pub(crate) file: &'a str,
    pub(crate) line: Option<i64>,
    pub(crate) column: Option<i64>,
}

impl<'a> SourceLocation<'a> {
    /// The location of `frame`, if it has one inside the frame's own unit.
    pub(crate) fn of_frame(frame: &'a StackFrame) -> Option<Self> {
        let file = frame.file_name().filter(|file| !file.trim().is_empty())?;
        let unit = frame.unit()?;
        if !belongs_to_unit(file, unit) {
            return None;
        }
        Some(SourceLocation {
            file,
            line: frame.line_number().map(i64::from),
            column: frame.column_number().map(i64::from),
        })
    }

    /// The call site recorded on `sink`, if it was emitted from `unit`.
    pub(crate) fn call_site<S: PropertySink + ?Sized>(sink: &'a S, unit: &str) -> Option<Self> {
        let file = first_string(sink, &CODE_FILE_PATH)
            .filter(|file| !file.trim().is_empty())?;
        let same_unit = match first_string(sink, &CODE_NAMESPACE) {
            Some(namespace) => {
                let root = namespace.split("::").next().unwrap_or(namespace);
                normalize_unit_name(root) == normalize_unit_name(unit)
            }
            None => belongs_to_unit(file, unit),
        };
        if !same_unit {
            return None;
        }
        Some(SourceLocation {
            file,
            line: first_int(sink, &CODE_LINE_NUMBER),
            column: first_int(sink, &CODE_COLUMN_NUMBER),
        })
    }
}

/// Whether `file` can be a source file of `unit`.
///
/// Standard library sources (`/rustc/<commit>/...`) never are. Neither are
/// sources inside a downloaded package directory (`<name>-<version>`) of a
/// different crate, as found under `~/.cargo/registry` or a vendor directory.
/// Any other path is accepted.
pub(crate) fn belongs_to_unit(file: &str, unit: &str) -> bool {
    let path = Path::new(file);
    if is_rustc_source(path) {
        return false;
    }
    let unit = normalize_unit_name(unit);
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .filter_map(package_name)
        .all(|package| normalize_unit_name(package) == unit)
}

fn is_rustc_source(path: &Path) -> bool {
    let mut names = path.components().filter_map(|component| match component {
        Component::Normal(name) => name.to_str(),
        _ => None,
    });
    names.next() == Some("rustc")
        && names.next().is_some_and(|commit| {
            commit.len() == RUSTC_COMMIT_LEN && commit.bytes().all(|b| b.is_ascii_hexdigit())
        })
}

/// The package name of a `<name>-<major>.<minor>.<patch>` directory.
fn package_name(dir: &str) -> Option<&str> {
    dir.match_indices('-').find_map(|(at, _)| {
        let (name, version) = (&dir[..at], &dir[at + 1..]);
        (!name.is_empty() && is_version(version)).then_some(name)
    })
}

fn is_version(version: &str) -> bool {
    let parts: Vec<&str> = version.splitn(3, '.').collect();
    match parts[..] {
        [major, minor, patch] => {
            is_number(major) && is_number(minor) && patch.starts_with(|c: char| c.is_ascii_digit())
        }
        _ => false,
    }
}

fn is_number(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

fn find<'a, S: PropertySink + ?Sized>(sink: &'a S, keys: &[&str]) -> Option<&'a AnyValue> {
    keys.iter().find_map(|key| sink.property(key))
}

fn first_string<'a, S: PropertySink + ?Sized>(sink: &'a S, keys: &[&str]) -> Option<&'a str> {
    match find(sink, keys)? {
        AnyValue::String(value) => Some(value.as_str()),
        _ => None,
    }
}

fn first_int<S: PropertySink + ?Sized>(sink: &S, keys: &[&str]) -> Option<i64> {
    match find(sink, keys)? {
        AnyValue::Int(value) => Some(*value),
        AnyValue::String(value) => value.as_str().parse().ok(),
        _ => None,
    }
}
