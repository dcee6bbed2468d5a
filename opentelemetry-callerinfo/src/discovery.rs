//! # Unit Discovery
//!
//! Instead of listing every application crate by hand, the allow list can be
//! discovered from the unit-reference graph (the crate dependency graph).
//! Starting from one or two seed units, [`discover`] walks every unit
//! reachable through references and keeps those matching an include
//! predicate and not matching an exclude predicate.
//!
//! Discovery runs once, while the logging pipeline is being set up. A unit
//! that the graph cannot load aborts discovery with
//! [`CallerInfoError::UnitNotFound`].
//!
//! ```
//! use opentelemetry_callerinfo::{StaticUnitGraph, UnitDiscovery};
//!
//! let graph = StaticUnitGraph::new()
//!     .with_unit("app_server", ["app_core", "tokio"])
//!     .with_unit("app_core", ["app_core_tests", "serde"])
//!     .with_unit("app_core_tests", Vec::<String>::new())
//!     .with_unit("tokio", Vec::<String>::new())
//!     .with_unit("serde", Vec::<String>::new());
//!
//! let allowed = UnitDiscovery::new("app")
//!     .with_starting_unit("app_server")
//!     .with_excluded_prefixes(["app_core_tests"])
//!     .discover(&graph)
//!     .unwrap();
//!
//! assert!(allowed.contains("app_core"));
//! assert!(!allowed.contains("app_core_tests"));
//! ```

use crate::error::{CallerInfoError, CallerInfoResult};
use crate::filter::{normalize_unit_name, AllowedUnits, UnitFilter};

use opentelemetry::otel_debug;

use std::collections::HashSet;
use std::path::Path;

/// A unit together with the units it directly references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unit {
    name: String,
    references: Vec<String>,
}

impl Unit {
    /// Creates a unit.
    pub fn new<I, S>(name: impl Into<String>, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Unit {
            name: name.into(),
            references: references.into_iter().map(Into::into).collect(),
        }
    }

    /// Name of the unit.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the units this unit references.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    pub(crate) fn extend_references<I: IntoIterator<Item = String>>(&mut self, references: I) {
        for reference in references {
            if !self.references.contains(&reference) {
                self.references.push(reference);
            }
        }
    }
}

/// The unit-reference graph of the running program, provided by the host.
pub trait UnitGraph {
    /// Loads a unit by name.
    ///
    /// Returns [`CallerInfoError::UnitNotFound`] when the unit is unknown.
    fn load(&self, name: &str) -> CallerInfoResult<Unit>;

    /// Whether the graph knows `name`.
    fn contains(&self, name: &str) -> bool {
        self.load(name).is_ok()
    }
}

impl<G: UnitGraph + ?Sized> UnitGraph for &G {
    fn load(&self, name: &str) -> CallerInfoResult<Unit> {
        (**self).load(name)
    }

    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }
}

/// Walks the unit graph depth first from `seeds` and returns the names of all
/// reachable units for which `include` holds and `exclude` does not.
///
/// Units that do not match are still expanded, so they can lead to matching
/// units further down. Every unit is expanded at most once, which keeps
/// cyclic and diamond shaped graphs finite.
pub fn discover<G, S, I, E>(
    graph: &G,
    seeds: S,
    include: I,
    exclude: E,
) -> CallerInfoResult<AllowedUnits>
where
    G: UnitGraph + ?Sized,
    S: IntoIterator,
    S::Item: AsRef<str>,
    I: Fn(&str) -> bool,
    E: Fn(&str) -> bool,
{
    let mut pending: Vec<String> = seeds
        .into_iter()
        .map(|seed| seed.as_ref().to_owned())
        .collect();
    // pop from the back, seeds are expanded in the order given
    pending.reverse();

    let mut expanded: HashSet<String> = HashSet::new();
    let mut found = AllowedUnits::default();

    while let Some(name) = pending.pop() {
        if !expanded.insert(normalize_unit_name(&name)) {
            continue;
        }

        let unit = graph.load(&name)?;
        if include(unit.name()) && !exclude(unit.name()) {
            found.insert(unit.name());
        }

        for reference in unit.references().iter().rev() {
            if !expanded.contains(&normalize_unit_name(reference)) {
                pending.push(reference.clone());
            }
        }
    }

    otel_debug!(
        name: "CallerInfo.Discovery.Completed",
        expanded_units = expanded.len(),
        allowed_units = found.len(),
    );
    Ok(found)
}

/// Settings for discovering the allowed units from a [`UnitGraph`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitDiscovery {
    filter: UnitFilter,
    starting_unit: Option<String>,
    calling_unit: Option<String>,
}

impl UnitDiscovery {
    /// Discovers units whose name starts with `prefix`.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        UnitDiscovery {
            filter: UnitFilter::new(prefix),
            starting_unit: None,
            calling_unit: None,
        }
    }

    /// Starts discovery from the named unit only. A blank name is ignored.
    pub fn with_starting_unit(mut self, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        self.starting_unit = (!unit.trim().is_empty()).then_some(unit);
        self
    }

    /// Excludes units whose name starts with any of `prefixes`.
    pub fn with_excluded_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filter = self.filter.with_excluded_prefixes(prefixes);
        self
    }

    /// Sets the unit that configures logging, usually `caller_unit!()`.
    ///
    /// Without a starting unit, discovery is seeded with this unit and the
    /// process entry unit.
    pub fn with_calling_unit(mut self, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        self.calling_unit = (!unit.trim().is_empty()).then_some(unit);
        self
    }

    /// The include/exclude rules applied to discovered units.
    pub fn filter(&self) -> &UnitFilter {
        &self.filter
    }

    /// The seed units discovery starts from.
    ///
    /// An explicit starting unit is always used as is and must be loadable.
    /// Otherwise the calling unit and the entry unit are used. The entry
    /// unit is only kept if `graph` knows it.
    pub fn seeds<G: UnitGraph + ?Sized>(&self, graph: &G) -> Vec<String> {
        if let Some(starting_unit) = &self.starting_unit {
            return vec![starting_unit.clone()];
        }

        let mut seeds: Vec<String> = self.calling_unit.iter().cloned().collect();
        if let Some(entry) = entry_unit() {
            let is_new = seeds.iter().all(|seed| normalize_unit_name(seed) != entry);
            if is_new && graph.contains(&entry) {
                seeds.push(entry);
            }
        }
        seeds
    }

    /// Runs discovery against `graph`.
    pub fn discover<G: UnitGraph + ?Sized>(&self, graph: &G) -> CallerInfoResult<AllowedUnits> {
        let seeds = self.seeds(graph);
        if seeds.is_empty() {
            return Err(CallerInfoError::NoSeedUnits);
        }
        discover(
            graph,
            &seeds,
            |name| self.filter.includes(name),
            |name| self.filter.excludes(name),
        )
    }
}

/// The unit of the running executable, derived from its file name.
///
/// Cargo's test and bench executables carry a `-<hash>` suffix which is
/// removed.
pub fn entry_unit() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    entry_unit_from_path(&exe)
}

fn entry_unit_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let stem = match stem.rsplit_once('-') {
        Some((head, hash)) if is_cargo_hash(hash) => head,
        _ => stem,
    };
    let name = normalize_unit_name(stem);
    (!name.is_empty()).then_some(name)
}

fn is_cargo_hash(suffix: &str) -> bool {
    suffix.len() == 16 && suffix.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Expands to the crate name of the crate the macro is invoked from.
///
/// ```ignore
/// use opentelemetry_callerinfo::{caller_unit, UnitDiscovery};
///
/// let discovery = UnitDiscovery::new("my_app").with_calling_unit(caller_unit!());
/// # let _ = discovery;
/// ```
#[macro_export]
macro_rules! caller_unit {
    () => {
        env!("CARGO_CRATE_NAME")
    };
}

#[cfg(test)]
mod tests {
    use super::{discover, entry_unit_from_path, Unit, UnitDiscovery, UnitGraph};
    use crate::error::{CallerInfoError, CallerInfoResult};
    use crate::filter::UnitFilter;
    use crate::graph::StaticUnitGraph;
    use std::cell::RefCell;
    use std::path::Path;

    fn app_graph() -> StaticUnitGraph {
        StaticUnitGraph::new()
            .with_unit("Seed", ["App.Core", "App.Core.Tests", "Vendor"])
            .with_unit("App.Core", ["Vendor"])
            .with_unit("App.Core.Tests", ["App.Core"])
            .with_unit("Vendor", ["App.Core.Storage"])
            .with_unit("App.Core.Storage", Vec::<String>::new())
    }

    #[test]
    fn excluded_prefixes_are_left_out() {
        let filter = UnitFilter::new("App.Core").with_excluded_prefixes(["App.Core.Tests"]);

        let found = discover(
            &app_graph(),
            ["Seed"],
            |n| filter.includes(n),
            |n| filter.excludes(n),
        )
        .unwrap();

        assert!(found.contains("App.Core"));
        assert!(!found.contains("App.Core.Tests"));
    }

    #[test]
    fn non_matching_units_bridge_to_matching_ones() {
        let filter = UnitFilter::new("App.Core");

        let found = discover(
            &app_graph(),
            ["Seed"],
            |n| filter.includes(n),
            |n| filter.excludes(n),
        )
        .unwrap();

        // reachable only through `Vendor`
        assert!(found.contains("App.Core.Storage"));
        assert!(!found.contains("Vendor"));
        assert_eq!(found.len(), 3);
    }

    #[derive(Debug, Default)]
    struct CountingGraph {
        inner: StaticUnitGraph,
        loads: RefCell<Vec<String>>,
    }

    impl UnitGraph for CountingGraph {
        fn load(&self, name: &str) -> CallerInfoResult<Unit> {
            self.loads.borrow_mut().push(name.to_owned());
            self.inner.load(name)
        }
    }

    #[test]
    fn cycles_and_diamonds_are_expanded_once() {
        let graph = CountingGraph {
            inner: StaticUnitGraph::new()
                .with_unit("a", ["b", "c", "a"])
                .with_unit("b", ["d"])
                .with_unit("c", ["d", "a"])
                .with_unit("d", ["b", "A"]),
            ..Default::default()
        };

        let found = discover(&graph, ["a"], |_| true, |_| false).unwrap();

        assert_eq!(found.len(), 4);
        let mut loads = graph.loads.borrow().clone();
        loads.sort();
        assert_eq!(loads, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn missing_reference_fails_discovery() {
        let graph = StaticUnitGraph::new().with_unit("app", ["app_missing"]);

        let err = discover(&graph, ["app"], |_| true, |_| false).unwrap_err();

        assert!(matches!(err, CallerInfoError::UnitNotFound(name) if name == "app_missing"));
    }

    #[test]
    fn explicit_starting_unit_is_the_only_seed() {
        let discovery = UnitDiscovery::new("App")
            .with_calling_unit("Vendor")
            .with_starting_unit("App.Core");

        assert_eq!(discovery.seeds(&app_graph()), vec!["App.Core".to_owned()]);
    }

    #[test]
    fn missing_starting_unit_is_fatal() {
        let err = UnitDiscovery::new("App")
            .with_starting_unit("Nope")
            .discover(&app_graph())
            .unwrap_err();

        assert!(matches!(err, CallerInfoError::UnitNotFound(_)));
    }

    #[test]
    fn implicit_seeds_start_from_calling_unit() {
        let found = UnitDiscovery::new("App.Core")
            .with_calling_unit("Seed")
            .with_excluded_prefixes(["App.Core.Tests"])
            .discover(&app_graph())
            .unwrap();

        assert!(found.contains("App.Core"));
        assert!(found.contains("App.Core.Storage"));
        assert!(!found.contains("App.Core.Tests"));
    }

    #[test]
    fn no_seed_is_an_error() {
        // the test executable is not part of this graph, so no entry unit either
        let err = UnitDiscovery::new("App")
            .discover(&app_graph())
            .unwrap_err();

        assert!(matches!(err, CallerInfoError::NoSeedUnits));
    }

    #[test]
    fn entry_unit_strips_cargo_hash_suffix() {
        assert_eq!(
            entry_unit_from_path(Path::new("/target/debug/deps/my_app-0123456789abcdef")),
            Some("my_app".to_owned())
        );
        assert_eq!(
            entry_unit_from_path(Path::new("/usr/local/bin/my-app")),
            Some("my_app".to_owned())
        );
    }

    #[test]
    fn caller_unit_is_this_crate() {
        assert_eq!(caller_unit!(), "opentelemetry_callerinfo");
    }
}
