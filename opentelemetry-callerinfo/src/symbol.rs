//! Turns demangled Rust symbol names into [`ResolvedMethod`]s.

use crate::frame::{DeclaringType, ResolvedMethod};

/// Length of the hex digest in legacy mangled names, e.g. `h0123456789abcdef`.
const LEGACY_HASH_LEN: usize = 16;

impl ResolvedMethod {
    /// Parses a demangled symbol name such as
    /// `my_app::billing::Invoice::total::h0123456789abcdef`.
    ///
    /// Compiler generated trailing segments (closures, async bodies, shims)
    /// are folded into the enclosing named function, so a log call made from
    /// a closure inside `Invoice::total` resolves to `total`. For qualified
    /// paths like `<my_app::Invoice as core::fmt::Display>::fmt` the self type
    /// is the declaring type.
    ///
    /// Returns `None` for empty symbols or symbols made only of generated
    /// segments.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let symbol = strip_suffixes(symbol.trim());
        let mut segments = split_path(symbol);
        while let Some(last) = segments.last() {
            let is_generic_args = last.starts_with('<') && segments.len() > 1;
            if last.is_empty() || last.starts_with('{') || is_generic_args {
                segments.pop();
            } else {
                break;
            }
        }

        let (name, owner) = segments.split_last()?;
        if owner.is_empty() {
            return Some(ResolvedMethod::new(*name, None));
        }
        Some(ResolvedMethod::new(*name, declaring_type(owner)))
    }
}

fn strip_suffixes(symbol: &str) -> &str {
    let symbol = symbol.split(".llvm.").next().unwrap_or(symbol);
    match symbol.rsplit_once("::") {
        Some((head, hash)) if is_legacy_hash(hash) => head,
        _ => symbol,
    }
}

fn is_legacy_hash(segment: &str) -> bool {
    segment.len() == LEGACY_HASH_LEN + 1
        && segment.starts_with('h')
        && segment[1..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Splits on `::` separators that are not nested in `<>`, `[]` or `()`.
fn split_path(path: &str) -> Vec<&str> {
    let bytes = path.as_bytes();
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' | b'[' | b'(' => depth += 1,
            // `->` in fn pointer types is not a closing bracket
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' | b']' | b')' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                segments.push(&path[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&path[start..]);
    segments
}

fn declaring_type(owner: &[&str]) -> Option<DeclaringType> {
    let (first, rest) = owner.split_first()?;
    let Some(qualified) = first.strip_prefix('<').and_then(|s| s.strip_suffix('>')) else {
        return Some(DeclaringType::new(owner.join("::"), *first));
    };

    let (self_ty, trait_path) = match qualified.split_once(" as ") {
        Some((self_ty, trait_path)) => (self_ty, Some(trait_path)),
        None => (qualified, None),
    };
    let self_ty = self_ty
        .trim_start_matches('&')
        .trim_start_matches("mut ")
        .trim_start_matches("dyn ");

    // primitives and slices have no crate of their own, fall back to the trait
    let unit = path_root(self_ty).or_else(|| trait_path.and_then(path_root))?;
    let full_name = std::iter::once(self_ty)
        .chain(rest.iter().copied())
        .collect::<Vec<_>>()
        .join("::");
    Some(DeclaringType::new(full_name, unit))
}

fn path_root(path: &str) -> Option<&str> {
    let segments = split_path(path);
    if segments.len() < 2 {
        return None;
    }
    segments.first().copied().filter(|root| {
        !root.is_empty()
            && root
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_')
    })
}
