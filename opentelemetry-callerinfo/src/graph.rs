//! [`UnitGraph`] implementations.

use crate::discovery::{Unit, UnitGraph};
use crate::error::{CallerInfoError, CallerInfoResult};
use crate::filter::normalize_unit_name;

use std::collections::HashMap;

/// An in-memory unit graph.
///
/// Useful when the host knows its crate graph up front, e.g. generated at
/// build time, and as the backing store of other graphs.
#[derive(Clone, Debug, Default)]
pub struct StaticUnitGraph {
    units: HashMap<String, Unit>,
}

impl StaticUnitGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        StaticUnitGraph::default()
    }

    /// Adds a unit and the units it references.
    pub fn with_unit<I, S>(mut self, name: impl Into<String>, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(Unit::new(name, references));
        self
    }

    /// Adds a unit. References of a unit that is already present are merged.
    pub fn insert(&mut self, unit: Unit) {
        let key = normalize_unit_name(unit.name());
        match self.units.get_mut(&key) {
            Some(existing) => existing.extend_references(unit.references().iter().cloned()),
            None => {
                self.units.insert(key, unit);
            }
        }
    }

    /// Number of units in the graph.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the graph has no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl UnitGraph for StaticUnitGraph {
    fn load(&self, name: &str) -> CallerInfoResult<Unit> {
        self.units
            .get(&normalize_unit_name(name))
            .cloned()
            .ok_or_else(|| CallerInfoError::UnitNotFound(name.to_owned()))
    }

    fn contains(&self, name: &str) -> bool {
        self.units.contains_key(&normalize_unit_name(name))
    }
}

#[cfg(feature = "cargo-metadata")]
#[cfg_attr(docsrs, doc(cfg(feature = "cargo-metadata")))]
pub use cargo::CargoUnitGraph;

#[cfg(feature = "cargo-metadata")]
mod cargo {
    use super::StaticUnitGraph;
    use crate::discovery::{Unit, UnitGraph};
    use crate::error::CallerInfoResult;

    use cargo_metadata::{Metadata, MetadataCommand, Package};
    use opentelemetry::otel_debug;

    use std::path::PathBuf;

    /// A unit graph read from `cargo metadata`.
    ///
    /// Every package contributes one unit named after its library crate (or
    /// the package name when it has no library), referencing the units of its
    /// resolved dependencies.
    #[derive(Clone, Debug)]
    pub struct CargoUnitGraph {
        units: StaticUnitGraph,
    }

    impl CargoUnitGraph {
        /// Runs `cargo metadata` for the given manifest and builds the graph.
        pub fn from_manifest(manifest_path: impl Into<PathBuf>) -> CallerInfoResult<Self> {
            let metadata = MetadataCommand::new().manifest_path(manifest_path).exec()?;
            Ok(CargoUnitGraph::from_metadata(&metadata))
        }

        /// Builds the graph from already parsed metadata.
        pub fn from_metadata(metadata: &Metadata) -> Self {
            let mut units = StaticUnitGraph::new();
            for package in &metadata.packages {
                units.insert(Unit::new(crate_name(package), Vec::<String>::new()));
            }
            if let Some(resolve) = &metadata.resolve {
                for node in &resolve.nodes {
                    let references: Vec<String> = node
                        .deps
                        .iter()
                        .map(|dep| crate_name(&metadata[&dep.pkg]))
                        .collect();
                    units.insert(Unit::new(crate_name(&metadata[&node.id]), references));
                }
            }
            otel_debug!(
                name: "CallerInfo.CargoUnitGraph.Loaded",
                units = units.len(),
            );
            CargoUnitGraph { units }
        }
    }

    impl UnitGraph for CargoUnitGraph {
        fn load(&self, name: &str) -> CallerInfoResult<Unit> {
            self.units.load(name)
        }

        fn contains(&self, name: &str) -> bool {
            self.units.contains(name)
        }
    }

    fn crate_name(package: &Package) -> String {
        package
            .targets
            .iter()
            .find(|target| target.is_lib() || target.is_proc_macro())
            .map(|target| target.name.clone())
            .unwrap_or_else(|| package.name.to_string())
            .replace('-', "_")
    }

}

#[cfg(test)]
mod tests {
    use super::StaticUnitGraph;
    use crate::discovery::UnitGraph;
    use crate::error::CallerInfoError;

    #[test]
    fn load_is_case_insensitive() {
        let graph = StaticUnitGraph::new().with_unit("My-App", ["serde"]);

        let unit = graph.load("my_app").unwrap();

        assert_eq!(unit.name(), "My-App");
        assert_eq!(unit.references(), ["serde".to_owned()]);
    }

    #[test]
    fn unknown_unit_is_not_found() {
        let graph = StaticUnitGraph::new();

        assert!(!graph.contains("ghost"));
        assert!(matches!(
            graph.load("ghost"),
            Err(CallerInfoError::UnitNotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn inserting_a_unit_twice_merges_references() {
        let graph = StaticUnitGraph::new()
            .with_unit("app", ["serde"])
            .with_unit("APP", ["serde", "tokio"]);

        assert_eq!(graph.len(), 1);
        assert_eq!(
            graph.load("app").unwrap().references(),
            ["serde".to_owned(), "tokio".to_owned()]
        );
    }
}
