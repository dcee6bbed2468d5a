use thiserror::Error;

/// Describe the result of setting up caller information enrichment.
pub type CallerInfoResult<T> = Result<T, CallerInfoError>;

#[derive(Error, Debug)]
#[non_exhaustive]
/// Errors returned while configuring a [`CallerInfoProcessor`].
///
/// All of these are raised at setup time. Enriching an individual log record
/// never fails; a record whose caller cannot be resolved is simply left as is.
///
/// [`CallerInfoProcessor`]: crate::CallerInfoProcessor
pub enum CallerInfoError {
    /// A unit referenced during discovery is not known to the unit graph.
    /// Discovery stops at the first unit it cannot load.
    #[error("unit `{0}` could not be loaded from the unit graph")]
    UnitNotFound(String),

    /// Discovery was requested without a starting unit and no calling or
    /// entry unit could be determined.
    #[error("no seed unit available for discovery; set a starting unit or a calling unit")]
    NoSeedUnits,

    /// Running or parsing `cargo metadata` failed.
    #[cfg(feature = "cargo-metadata")]
    #[cfg_attr(docsrs, doc(cfg(feature = "cargo-metadata")))]
    #[error("failed to read cargo metadata: {0}")]
    Metadata(#[from] cargo_metadata::Error),
}

#[cfg(test)]
mod tests {
    use super::CallerInfoError;

    #[test]
    fn unit_not_found_names_the_unit() {
        let err = CallerInfoError::UnitNotFound("app_core".into());
        assert_eq!(
            err.to_string(),
            "unit `app_core` could not be loaded from the unit graph"
        );
    }
}
