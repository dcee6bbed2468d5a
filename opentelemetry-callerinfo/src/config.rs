use std::env;
use std::str::FromStr;

/// Whether to attach source file, line and column to log records.
pub(crate) const OTEL_RUST_CALLERINFO_INCLUDE_FILE_INFO: &str =
    "OTEL_RUST_CALLERINFO_INCLUDE_FILE_INFO";
/// Default for file information.
pub(crate) const OTEL_RUST_CALLERINFO_INCLUDE_FILE_INFO_DEFAULT: bool = false;
/// Number of trailing path segments kept in the source file attribute.
pub(crate) const OTEL_RUST_CALLERINFO_FILE_PATH_DEPTH: &str =
    "OTEL_RUST_CALLERINFO_FILE_PATH_DEPTH";
/// Default file path depth, zero keeps the full path.
pub(crate) const OTEL_RUST_CALLERINFO_FILE_PATH_DEPTH_DEFAULT: i32 = 0;
/// Prefix prepended to every attribute key.
pub(crate) const OTEL_RUST_CALLERINFO_KEY_PREFIX: &str = "OTEL_RUST_CALLERINFO_KEY_PREFIX";

/// Settings applied to every log record enriched with caller information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerInfoConfig {
    /// Whether source file, line and column are attached.
    pub(crate) include_file_info: bool,

    /// Number of trailing segments kept from the source file path. Zero or
    /// less keeps the full path.
    pub(crate) file_path_depth: i32,

    /// Prefix prepended to every attribute key.
    pub(crate) key_prefix: String,
}

impl Default for CallerInfoConfig {
    fn default() -> Self {
        CallerInfoConfigBuilder::default().build()
    }
}

impl CallerInfoConfig {
    /// Creates a builder, initialized from the environment.
    pub fn builder() -> CallerInfoConfigBuilder {
        CallerInfoConfigBuilder::default()
    }

    /// Whether source file, line and column are attached.
    pub fn include_file_info(&self) -> bool {
        self.include_file_info
    }

    /// Number of trailing segments kept from the source file path.
    pub fn file_path_depth(&self) -> i32 {
        self.file_path_depth
    }

    /// Prefix prepended to every attribute key.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }
}

/// A builder for creating [`CallerInfoConfig`] instances.
#[derive(Debug)]
pub struct CallerInfoConfigBuilder {
    include_file_info: bool,
    file_path_depth: i32,
    key_prefix: String,
}

impl Default for CallerInfoConfigBuilder {
    /// Create a new [`CallerInfoConfigBuilder`] initialized with default
    /// values, overridden by the following environment variables when set:
    ///
    /// * `OTEL_RUST_CALLERINFO_INCLUDE_FILE_INFO`
    /// * `OTEL_RUST_CALLERINFO_FILE_PATH_DEPTH`
    /// * `OTEL_RUST_CALLERINFO_KEY_PREFIX`
    fn default() -> Self {
        CallerInfoConfigBuilder {
            include_file_info: OTEL_RUST_CALLERINFO_INCLUDE_FILE_INFO_DEFAULT,
            file_path_depth: OTEL_RUST_CALLERINFO_FILE_PATH_DEPTH_DEFAULT,
            key_prefix: String::new(),
        }
        .init_from_env_vars()
    }
}

impl CallerInfoConfigBuilder {
    /// Set whether source file, line and column are attached.
    /// The default value is `false`.
    ///
    /// Corresponding environment variable: `OTEL_RUST_CALLERINFO_INCLUDE_FILE_INFO`.
    ///
    /// Note: Programmatically setting this will override any value set via the environment variable.
    pub fn with_file_info(mut self, include_file_info: bool) -> Self {
        self.include_file_info = include_file_info;
        self
    }

    /// Set how many trailing path segments of the source file are kept,
    /// e.g. `2` turns `/home/dev/app/src/main.rs` into `src/main.rs`.
    /// Zero or a negative value keeps the full path, which is the default.
    ///
    /// Corresponding environment variable: `OTEL_RUST_CALLERINFO_FILE_PATH_DEPTH`.
    ///
    /// Note: Programmatically setting this will override any value set via the environment variable.
    pub fn with_file_path_depth(mut self, file_path_depth: i32) -> Self {
        self.file_path_depth = file_path_depth;
        self
    }

    /// Set the prefix prepended to every attribute key, so several enrichers
    /// can attach caller information to the same record. Empty by default.
    ///
    /// Corresponding environment variable: `OTEL_RUST_CALLERINFO_KEY_PREFIX`.
    ///
    /// Note: Programmatically setting this will override any value set via the environment variable.
    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    /// Builds a `CallerInfoConfig`.
    pub fn build(self) -> CallerInfoConfig {
        CallerInfoConfig {
            include_file_info: self.include_file_info,
            file_path_depth: self.file_path_depth,
            key_prefix: self.key_prefix,
        }
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Some(include_file_info) = env::var(OTEL_RUST_CALLERINFO_INCLUDE_FILE_INFO)
            .ok()
            .and_then(|value| bool::from_str(value.trim().to_ascii_lowercase().as_str()).ok())
        {
            self.include_file_info = include_file_info;
        }

        if let Some(file_path_depth) = env::var(OTEL_RUST_CALLERINFO_FILE_PATH_DEPTH)
            .ok()
            .and_then(|depth| i32::from_str(depth.trim()).ok())
        {
            self.file_path_depth = file_path_depth;
        }

        if let Ok(key_prefix) = env::var(OTEL_RUST_CALLERINFO_KEY_PREFIX) {
            self.key_prefix = key_prefix;
        }

        self
    }
}
