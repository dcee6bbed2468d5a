//! Unit name matching.
//!
//! Unit names are crate names. Comparisons ignore ASCII and Unicode case and
//! treat `-` and `_` as the same character, so the package name `my-app` and
//! the crate name `my_app` found in symbol paths refer to the same unit.

use std::collections::hash_set;
use std::collections::HashSet;

/// Normalizes a unit name for comparison.
pub fn normalize_unit_name(name: &str) -> String {
    name.trim().replace('-', "_").to_lowercase()
}

/// The set of units whose frames count as application code.
///
/// Built once when the processor is configured and only read afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowedUnits {
    names: HashSet<String>,
}

impl AllowedUnits {
    /// Creates an allow list from unit names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().collect()
    }

    /// Whether `unit` is allowed.
    pub fn contains(&self, unit: &str) -> bool {
        self.names.contains(&normalize_unit_name(unit))
    }

    /// Adds a unit, returning `false` if it was already present.
    pub fn insert(&mut self, unit: &str) -> bool {
        self.names.insert(normalize_unit_name(unit))
    }

    /// Number of allowed units.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no unit is allowed.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over the normalized names of the allowed units.
    pub fn iter(&self) -> hash_set::Iter<'_, String> {
        self.names.iter()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowedUnits {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut allowed = AllowedUnits::default();
        for name in iter {
            allowed.insert(name.as_ref());
        }
        allowed
    }
}

impl<'a> IntoIterator for &'a AllowedUnits {
    type Item = &'a String;
    type IntoIter = hash_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Prefix based include/exclude rules used by unit discovery.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitFilter {
    prefix: String,
    excluded_prefixes: Vec<String>,
}

impl UnitFilter {
    /// Includes every unit whose name starts with `prefix`.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        UnitFilter {
            prefix: normalize_unit_name(prefix.as_ref()),
            excluded_prefixes: Vec::new(),
        }
    }

    /// Excludes units whose name starts with any of `prefixes`. Blank
    /// prefixes are ignored.
    pub fn with_excluded_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_prefixes.extend(
            prefixes
                .into_iter()
                .map(|p| normalize_unit_name(p.as_ref()))
                .filter(|p| !p.is_empty()),
        );
        self
    }

    /// Whether `name` starts with the include prefix.
    pub fn includes(&self, name: &str) -> bool {
        normalize_unit_name(name).starts_with(&self.prefix)
    }

    /// Whether `name` starts with any excluded prefix.
    pub fn excludes(&self, name: &str) -> bool {
        let name = normalize_unit_name(name);
        self.excluded_prefixes
            .iter()
            .any(|excluded| name.starts_with(excluded))
    }

    /// Whether `name` is included and not excluded.
    pub fn matches(&self, name: &str) -> bool {
        self.includes(name) && !self.excludes(name)
    }
}
