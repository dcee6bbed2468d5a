use crate::config::CallerInfoConfig;
use crate::filter::{normalize_unit_name, AllowedUnits};
use crate::frame::{self, StackFrame};
use crate::location::SourceLocation;
use crate::properties::{self, PropertySink};

/// Resolves the calling frame of a stack and attaches its caller information
/// to a [`PropertySink`].
///
/// The enricher holds only immutable configuration and can be shared freely
/// between threads.
#[derive(Clone, Debug)]
pub struct CallerInfoEnricher {
    config: CallerInfoConfig,
    allowed_units: AllowedUnits,
    own_unit: String,
}

impl CallerInfoEnricher {
    /// Creates an enricher attributing records to frames of `allowed_units`.
    pub fn new(config: CallerInfoConfig, allowed_units: AllowedUnits) -> Self {
        CallerInfoEnricher {
            config,
            allowed_units,
            own_unit: normalize_unit_name(env!("CARGO_CRATE_NAME")),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &CallerInfoConfig {
        &self.config
    }

    /// The units whose frames are considered application code.
    pub fn allowed_units(&self) -> &AllowedUnits {
        &self.allowed_units
    }

    /// Whether a frame is application code.
    ///
    /// Frames of this crate never are, even when a discovery prefix happens
    /// to match it.
    pub fn is_allowed(&self, frame: &StackFrame) -> bool {
        match frame.unit() {
            Some(unit) => {
                self.allowed_units.contains(unit) && normalize_unit_name(unit) != self.own_unit
            }
            None => false,
        }
    }

    /// Returns the calling frame of `frames`, innermost first.
    pub fn resolve<'a>(&self, frames: &'a [StackFrame]) -> Option<&'a StackFrame> {
        frame::resolve(frames, |frame| self.is_allowed(frame))
    }

    /// Attaches caller information from `frames` to `sink`, keeping any
    /// property the sink already has.
    ///
    /// When the caller's own location lies outside its unit, e.g. inside a
    /// `tracing` macro, the call site recorded on the sink is used if it
    /// belongs to the caller's unit.
    ///
    /// Returns `false`, leaving the sink untouched, when no calling frame
    /// could be resolved.
    pub fn enrich<S: PropertySink + ?Sized>(&self, sink: &mut S, frames: &[StackFrame]) -> bool {
        let Some(caller) = self.resolve(frames) else {
            return false;
        };
        let properties = {
            let sink: &S = sink;
            let location = SourceLocation::of_frame(caller).or_else(|| {
                let unit = caller.unit().filter(|_| self.config.include_file_info())?;
                SourceLocation::call_site(sink, unit)
            });
            properties::extract_at(caller, location, &self.config)
        };
        for (key, value) in properties {
            sink.add_property_if_absent(key, value);
        }
        true
    }
}
