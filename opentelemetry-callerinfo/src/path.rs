use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Shortens a source file path to its last `depth` segments.
///
/// The file name is kept together with up to `depth - 1` enclosing
/// directories, joined with the platform separator. A `depth` of zero or
/// less keeps the full path, and so does a `depth` that reaches the top of
/// the path. Blank paths yield `None`.
pub fn truncate(full_path: &str, depth: i32) -> Option<Cow<'_, str>> {
    if full_path.trim().is_empty() {
        return None;
    }
    if depth <= 0 {
        return Some(Cow::Borrowed(full_path));
    }

    let depth = depth as usize;
    let mut segments = Vec::new();
    let mut current = Some(Path::new(full_path));
    while segments.len() < depth {
        match current.and_then(|p| p.file_name().map(|name| (name, p.parent()))) {
            Some((name, parent)) => {
                segments.push(name);
                current = parent;
            }
            None => return Some(Cow::Borrowed(full_path)),
        }
    }

    if current.and_then(Path::file_name).is_none() {
        return Some(Cow::Borrowed(full_path));
    }

    let truncated: PathBuf = segments.iter().rev().collect();
    Some(Cow::Owned(truncated.to_string_lossy().into_owned()))
}
