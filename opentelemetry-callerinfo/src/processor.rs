//! # Caller Information Log Processor
//!
//! The `CallerInfoProcessor` is a [`LogProcessor`] that does not export
//! anything. It enriches every log record with information about the code
//! that emitted it and then lets the record continue to the next processor
//! in the chain, so it must be registered *before* the exporting processor.
//!
//! ## Diagram
//!
//! ```ascii
//!   +-----+---------------+   +-----------------------+   +-----------------------+
//!   |     |               |   |                       |   |                       |
//!   | SDK | Logger.emit() +---> CallerInfoProcessor   +---> (Simple)LogProcessor  |
//!   |     |               |   |  adds Method, ...     |   | (Batch)LogProcessor   |
//!   +-----+---------------+   +-----------------------+   +-----------------------+
//! ```

use crate::capture::{BacktraceCapture, StackCapture};
use crate::config::{CallerInfoConfig, CallerInfoConfigBuilder};
use crate::discovery::{UnitDiscovery, UnitGraph};
use crate::enricher::CallerInfoEnricher;
use crate::error::CallerInfoResult;
use crate::filter::AllowedUnits;
use crate::frame::StackFrame;

use opentelemetry::{otel_debug, otel_info, otel_warn, Context, InstrumentationScope};
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::logs::{LogProcessor, SdkLogRecord};

use std::sync::atomic::{AtomicBool, Ordering};

/// A [`LogProcessor`] that attaches the calling method, its declaring type
/// and optionally its source location to each log record.
///
/// The calling frame is the innermost frame of the current stack that
/// belongs to one of the allowed units. Records whose stack has no such frame
/// are passed on unchanged. Attributes already present on a record are never
/// overwritten.
///
/// ## Example
///
/// ```rust
/// use opentelemetry_callerinfo::CallerInfoProcessor;
/// use opentelemetry_sdk::logs::{InMemoryLogExporter, SdkLoggerProvider};
///
/// let caller_info = CallerInfoProcessor::builder()
///     .with_file_info(true)
///     .with_file_path_depth(2)
///     .with_allowed_units(["my_app"])
///     .build();
///
/// let provider = SdkLoggerProvider::builder()
///     .with_log_processor(caller_info)
///     .with_simple_exporter(InMemoryLogExporter::default())
///     .build();
/// # let _ = provider;
/// ```
#[derive(Debug)]
pub struct CallerInfoProcessor<C: StackCapture = BacktraceCapture> {
    enricher: CallerInfoEnricher,
    capture: C,
    is_shutdown: AtomicBool,
}

impl CallerInfoProcessor {
    /// Creates a builder capturing stacks with [`BacktraceCapture`].
    pub fn builder() -> CallerInfoProcessorBuilder {
        CallerInfoProcessorBuilder::default()
    }
}

impl<C: StackCapture> CallerInfoProcessor<C> {
    /// Creates a processor from an enricher and a stack capture.
    pub fn new(enricher: CallerInfoEnricher, capture: C) -> Self {
        CallerInfoProcessor {
            enricher,
            capture,
            is_shutdown: AtomicBool::new(false),
        }
    }

    /// The enricher applied to every record.
    pub fn enricher(&self) -> &CallerInfoEnricher {
        &self.enricher
    }
}

impl<C: StackCapture> LogProcessor for CallerInfoProcessor<C> {
    fn emit(&self, record: &mut SdkLogRecord, _instrumentation: &InstrumentationScope) {
        let _suppress_guard = Context::enter_telemetry_suppressed_scope();
        if self.is_shutdown.load(Ordering::Relaxed) {
            otel_warn!(
                name: "CallerInfoProcessor.Emit.ProcessorShutdown",
            );
            return;
        }

        let frames = self
            .capture
            .capture_until(&|frame: &StackFrame| self.enricher.is_allowed(frame));
        if !self.enricher.enrich(record, &frames) {
            otel_debug!(
                name: "CallerInfoProcessor.Emit.NoCallerFrame",
                frames = frames.len(),
            );
        }
    }

    fn force_flush(&self) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown(&self) -> OTelSdkResult {
        self.is_shutdown.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// A builder for creating [`CallerInfoProcessor`] instances.
///
/// File settings start from [`CallerInfoConfigBuilder::default`], which reads
/// the `OTEL_RUST_CALLERINFO_*` environment variables.
#[derive(Debug)]
pub struct CallerInfoProcessorBuilder<C: StackCapture = BacktraceCapture> {
    config: CallerInfoConfigBuilder,
    allowed_units: AllowedUnits,
    capture: C,
}

impl Default for CallerInfoProcessorBuilder {
    fn default() -> Self {
        CallerInfoProcessorBuilder {
            config: CallerInfoConfigBuilder::default(),
            allowed_units: AllowedUnits::default(),
            capture: BacktraceCapture::default(),
        }
    }
}

impl<C: StackCapture> CallerInfoProcessorBuilder<C> {
    /// Whether source file, line and column are attached.
    pub fn with_file_info(mut self, include_file_info: bool) -> Self {
        self.config = self.config.with_file_info(include_file_info);
        self
    }

    /// How many trailing segments of the source file path are kept. Zero or
    /// less keeps the full path.
    pub fn with_file_path_depth(mut self, file_path_depth: i32) -> Self {
        self.config = self.config.with_file_path_depth(file_path_depth);
        self
    }

    /// Prefix prepended to every attribute key.
    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.config = self.config.with_key_prefix(key_prefix);
        self
    }

    /// Adds units whose frames count as application code. Names are matched
    /// case-insensitively.
    pub fn with_allowed_units<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for unit in units {
            self.allowed_units.insert(unit.as_ref());
        }
        self
    }

    /// Adds the units found by running `discovery` against `graph`.
    ///
    /// Fails if a unit reached during discovery cannot be loaded.
    pub fn with_unit_discovery<G>(
        mut self,
        discovery: &UnitDiscovery,
        graph: &G,
    ) -> CallerInfoResult<Self>
    where
        G: UnitGraph + ?Sized,
    {
        let discovered = discovery.discover(graph)?;
        for unit in &discovered {
            self.allowed_units.insert(unit);
        }
        Ok(self)
    }

    /// Replaces how the call stack is captured.
    pub fn with_capture<D: StackCapture>(self, capture: D) -> CallerInfoProcessorBuilder<D> {
        CallerInfoProcessorBuilder {
            config: self.config,
            allowed_units: self.allowed_units,
            capture,
        }
    }

    /// Builds the processor.
    pub fn build(self) -> CallerInfoProcessor<C> {
        let config: CallerInfoConfig = self.config.build();
        otel_info!(
            name: "CallerInfoProcessor.Built",
            allowed_units = self.allowed_units.len(),
            include_file_info = config.include_file_info(),
            file_path_depth = config.file_path_depth(),
        );
        if self.allowed_units.is_empty() {
            otel_warn!(
                name: "CallerInfoProcessor.Built.NoAllowedUnits",
                message = "No allowed units are configured, log records will not be enriched.",
            );
        }
        CallerInfoProcessor::new(
            CallerInfoEnricher::new(config, self.allowed_units),
            self.capture,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::CallerInfoProcessor;
    use crate::capture::StackCapture;
    use crate::discovery::UnitDiscovery;
    use crate::error::CallerInfoError;
    use crate::frame::{ResolvedMethod, StackFrame};
    use crate::graph::StaticUnitGraph;
    use crate::properties::PREFIX_MARKER;
    use opentelemetry::logs::{AnyValue, LogRecord as _, Logger, LoggerProvider};
    use opentelemetry::Key;
    use opentelemetry_sdk::logs::{InMemoryLogExporter, LogProcessor, SdkLoggerProvider};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct FixedCapture(Vec<StackFrame>);

    impl StackCapture for FixedCapture {
        fn capture(&self) -> Vec<StackFrame> {
            self.0.clone()
        }
    }

    fn app_stack() -> FixedCapture {
        let frame = |symbol: &str| StackFrame::new(ResolvedMethod::from_symbol(symbol).unwrap());
        FixedCapture(vec![
            frame("opentelemetry_sdk::logs::logger::SdkLogger::emit"),
            frame("opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::on_event"),
            frame("app_core::orders::Order::submit::{{closure}}")
                .with_file_name("/srv/app/app-core/src/orders.rs")
                .with_line_number(87)
                .with_column_number(17),
            frame("app_core::orders::Order::submit"),
            frame("app_server::main"),
        ])
    }

    fn attribute(record: &opentelemetry_sdk::logs::SdkLogRecord, key: &str) -> Option<AnyValue> {
        record
            .attributes_iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v.clone())
    }

    #[test]
    fn enriches_records_before_export() {
        let exporter = InMemoryLogExporter::default();
        let processor = CallerInfoProcessor::builder()
            .with_file_info(false)
            .with_key_prefix("")
            .with_allowed_units(["App-Core"])
            .with_capture(app_stack())
            .build();
        let provider = SdkLoggerProvider::builder()
            .with_log_processor(processor)
            .with_simple_exporter(exporter.clone())
            .build();

        let logger = provider.logger("test-logger");
        let mut record = logger.create_log_record();
        record.set_body("order submitted".into());
        logger.emit(record);

        let logs = exporter.get_emitted_logs().unwrap();
        assert_eq!(logs.len(), 1);
        let record = &logs[0].record;
        assert_eq!(
            attribute(record, "Method"),
            Some(AnyValue::String("submit".into()))
        );
        assert_eq!(
            attribute(record, "Namespace"),
            Some(AnyValue::String("app_core::orders::Order".into()))
        );
        assert_eq!(attribute(record, "SourceFile"), None);
    }

    #[test]
    fn discovered_units_and_prefix() {
        let graph = StaticUnitGraph::new()
            .with_unit("app_server", ["app_core", "app_core_tests", "tokio"])
            .with_unit("app_core", ["tokio"])
            .with_unit("app_core_tests", ["app_core"])
            .with_unit("tokio", Vec::<String>::new());
        let discovery = UnitDiscovery::new("app")
            .with_starting_unit("app_server")
            .with_excluded_prefixes(["app_core_tests"]);

        let processor = CallerInfoProcessor::builder()
            .with_file_info(true)
            .with_file_path_depth(1)
            .with_key_prefix("caller.")
            .with_unit_discovery(&discovery, &graph)
            .unwrap()
            .with_capture(app_stack())
            .build();

        assert!(processor.enricher().allowed_units().contains("app_server"));
        assert!(!processor.enricher().allowed_units().contains("app_core_tests"));

        let provider = SdkLoggerProvider::builder().build();
        let mut record = provider.logger("test-logger").create_log_record();
        record.add_attribute(Key::new("caller.LineNumber"), AnyValue::Int(-1));
        processor.emit(&mut record, &Default::default());

        assert_eq!(
            attribute(&record, PREFIX_MARKER),
            Some(AnyValue::String("caller.".into()))
        );
        assert_eq!(
            attribute(&record, "caller.Method"),
            Some(AnyValue::String("submit".into()))
        );
        assert_eq!(
            attribute(&record, "caller.SourceFile"),
            Some(AnyValue::String("orders.rs".into()))
        );
        assert_eq!(
            attribute(&record, "caller.LineNumber"),
            Some(AnyValue::Int(-1))
        );
        assert_eq!(
            attribute(&record, "caller.ColumnNumber"),
            Some(AnyValue::Int(17))
        );
    }

    #[derive(Debug)]
    struct StoppingCapture {
        frames: Vec<StackFrame>,
        walked: Mutex<usize>,
    }

    impl StackCapture for StoppingCapture {
        fn capture(&self) -> Vec<StackFrame> {
            self.frames.clone()
        }

        fn capture_until(&self, is_caller: &dyn Fn(&StackFrame) -> bool) -> Vec<StackFrame> {
            let mut frames = Vec::new();
            for frame in &self.frames {
                frames.push(frame.clone());
                if is_caller(frame) {
                    break;
                }
            }
            *self.walked.lock().unwrap() = frames.len();
            frames
        }
    }

    #[test]
    fn capture_stops_at_the_caller() {
        let processor = CallerInfoProcessor::builder()
            .with_file_info(false)
            .with_key_prefix("")
            .with_allowed_units(["app_core"])
            .with_capture(StoppingCapture {
                frames: app_stack().0,
                walked: Mutex::new(0),
            })
            .build();
        let provider = SdkLoggerProvider::builder().build();
        let mut record = provider.logger("test-logger").create_log_record();

        processor.emit(&mut record, &Default::default());

        assert_eq!(*processor.capture.walked.lock().unwrap(), 3);
        assert_eq!(
            attribute(&record, "Method"),
            Some(AnyValue::String("submit".into()))
        );
    }

    #[test]
    fn failed_discovery_is_reported_at_setup() {
        let graph = StaticUnitGraph::new().with_unit("app_server", ["app_missing"]);
        let discovery = UnitDiscovery::new("app").with_starting_unit("app_server");

        let result = CallerInfoProcessor::builder().with_unit_discovery(&discovery, &graph);

        assert!(matches!(result, Err(CallerInfoError::UnitNotFound(name)) if name == "app_missing"));
    }

    #[test]
    fn no_enrichment_after_shutdown() {
        let processor = CallerInfoProcessor::builder()
            .with_key_prefix("")
            .with_allowed_units(["app_core"])
            .with_capture(app_stack())
            .build();
        let provider = SdkLoggerProvider::builder().build();
        let mut record = provider.logger("test-logger").create_log_record();

        processor.shutdown().unwrap();
        processor.emit(&mut record, &Default::default());

        assert_eq!(record.attributes_iter().count(), 0);
    }
}
