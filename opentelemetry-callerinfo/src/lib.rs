//! # OpenTelemetry-CallerInfo
//!
//! This crate provides a [`LogProcessor`](opentelemetry_sdk::logs::LogProcessor) that
//! attaches information about the code that emitted a log record to the record:
//! the calling method, the type or module declaring it and, optionally, the
//! source file, line and column.
//!
//! ## Background
//!
//! Log statements usually travel through several layers before they reach an
//! OpenTelemetry processor: the `tracing` macros, a bridge such as
//! `opentelemetry-appender-tracing`, the SDK logger. The frames of those layers
//! sit between the processor and the application code on the call stack. The
//! processor walks the stack from the innermost frame outwards and picks the
//! first frame that belongs to an *allowed unit*, i.e. one of the crates of
//! the application.
//!
//! ## Getting Started
//!
//! ### 1. Choose the allowed units
//!
//! Either list the application crates explicitly, or discover them from the
//! crate graph starting at the crate that configures logging:
//!
//! ```rust
//! use opentelemetry_callerinfo::{StaticUnitGraph, UnitDiscovery};
//!
//! let graph = StaticUnitGraph::new()
//!     .with_unit("my_app", ["my_app_core", "tokio"])
//!     .with_unit("my_app_core", ["serde"])
//!     .with_unit("tokio", Vec::<String>::new())
//!     .with_unit("serde", Vec::<String>::new());
//!
//! // `caller_unit!()` names the crate it is invoked from
//! let allowed = UnitDiscovery::new("my_app")
//!     .with_calling_unit("my_app")
//!     .discover(&graph)
//!     .unwrap();
//! assert!(allowed.contains("my_app_core"));
//! ```
//!
//! With the `cargo-metadata` feature enabled, a `CargoUnitGraph` reads the
//! graph from `cargo metadata` instead.
//!
//! ### 2. Register the processor before the exporting processor
//!
//! ```rust
//! use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
//! use opentelemetry_callerinfo::CallerInfoProcessor;
//! use opentelemetry_sdk::logs::{InMemoryLogExporter, SdkLoggerProvider};
//! use tracing_subscriber::prelude::*;
//!
//! let caller_info = CallerInfoProcessor::builder()
//!     .with_file_info(true)
//!     .with_file_path_depth(2)
//!     .with_allowed_units(["my_app"])
//!     .build();
//!
//! let provider = SdkLoggerProvider::builder()
//!     .with_log_processor(caller_info)
//!     .with_simple_exporter(InMemoryLogExporter::default())
//!     .build();
//!
//! let subscriber = tracing_subscriber::registry().with(OpenTelemetryTracingBridge::new(&provider));
//! tracing::subscriber::with_default(subscriber, || {
//!     tracing::info!(name: "order-submitted", order_id = 42, message = "Order submitted");
//! });
//! ```
//!
//! ## Attributes
//!
//! | Attribute           | Type     | Notes                                                       |
//! |---------------------|----------|-------------------------------------------------------------|
//! | `Method`            | `String` | Simple name of the calling function                         |
//! | `Namespace`         | `String` | Path of the declaring type, or the module of a free function |
//! | `SourceFile`        | `String` | Only with file info and debug info, truncated to the configured depth |
//! | `LineNumber`        | `Int`    | Only with `SourceFile`, `0` when unknown                     |
//! | `ColumnNumber`      | `Int`    | Only with `SourceFile`, `0` when unknown                     |
//! | `callerinfo.prefix` | `String` | The key prefix, only when one is configured                  |
//!
//! Code expanded from another crate's macro, such as `tracing::info!`, is
//! mapped by debug info to the macro definition. Such a location is never
//! reported. Instead, the call site recorded by the bridge is used. The
//! `opentelemetry-appender-tracing` feature `experimental_metadata_attributes`
//! records it as `code.*` attributes. Without those attributes the source
//! attributes are left out.
//!
//! All keys except `callerinfo.prefix` carry the configured key prefix.
//! Attributes already present on a record are never overwritten. Closures and
//! `async` blocks are attributed to the function that encloses them.
//!
//! ## Configuration
//!
//! | Environment variable                      | Default | Builder method          |
//! |-------------------------------------------|---------|-------------------------|
//! | `OTEL_RUST_CALLERINFO_INCLUDE_FILE_INFO`  | `false` | `with_file_info`        |
//! | `OTEL_RUST_CALLERINFO_FILE_PATH_DEPTH`    | `0`     | `with_file_path_depth`  |
//! | `OTEL_RUST_CALLERINFO_KEY_PREFIX`         | `""`    | `with_key_prefix`       |
//!
//! Values set on the builder override the environment.
//!
//! ## Limitations
//!
//! 1. Symbol names are only as good as the debug info of the binary. Stripped
//!    release builds resolve few or no frames, in which case records are left
//!    as they are.
//! 2. Capturing a backtrace for every record is expensive. Register the
//!    processor only where the cost is acceptable.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/open-telemetry/opentelemetry-rust/main/assets/logo.svg"
)]

mod capture;
mod config;
mod discovery;
mod enricher;
mod error;
mod filter;
mod frame;
mod graph;
mod location;
mod path;
mod processor;
mod properties;
mod symbol;

pub use capture::{BacktraceCapture, StackCapture};
pub use config::{CallerInfoConfig, CallerInfoConfigBuilder};
pub use discovery::{discover, entry_unit, Unit, UnitDiscovery, UnitGraph};
pub use enricher::CallerInfoEnricher;
pub use error::{CallerInfoError, CallerInfoResult};
pub use filter::{normalize_unit_name, AllowedUnits, UnitFilter};
pub use frame::{resolve, DeclaringType, ResolvedMethod, StackFrame};
#[cfg(feature = "cargo-metadata")]
#[cfg_attr(docsrs, doc(cfg(feature = "cargo-metadata")))]
pub use graph::CargoUnitGraph;
pub use graph::StaticUnitGraph;
pub use path::truncate as truncate_path;
pub use processor::{CallerInfoProcessor, CallerInfoProcessorBuilder};
pub use properties::{extract, PropertySink};

/// Attribute keys written by the processor, before prefixing.
pub mod attributes {
    pub use crate::properties::{
        COLUMN_NUMBER, LINE_NUMBER, METHOD, NAMESPACE, PREFIX_MARKER, SOURCE_FILE,
    };
}
