//! # Stack Capture
//!
//! Reading the call stack is a platform capability. [`StackCapture`] hides it
//! so the resolver can be exercised with synthetic stacks, while
//! [`BacktraceCapture`] provides the real thing through the `backtrace`
//! crate.

use crate::frame::{ResolvedMethod, StackFrame};

use std::fmt::Debug;

/// Captures the current call stack, innermost frame first.
///
/// Implementations are called on the logging thread for every log record, so
/// they must be `Send + Sync`.
pub trait StackCapture: Send + Sync + Debug {
    /// Returns the frames of the calling thread's stack.
    fn capture(&self) -> Vec<StackFrame>;

    /// Returns the frames of the calling thread's stack up to and including
    /// the first one for which `is_caller` holds.
    ///
    /// The default captures the whole stack.
    fn capture_until(&self, is_caller: &dyn Fn(&StackFrame) -> bool) -> Vec<StackFrame> {
        let _ = is_caller;
        self.capture()
    }
}

/// Captures the stack with [`backtrace::trace`] and resolves each frame's
/// symbols, including file, line and column when debug info is available.
///
/// Inlined functions show up as separate frames, innermost first.
#[derive(Clone, Debug, Default)]
pub struct BacktraceCapture {
    max_frames: Option<usize>,
}

impl BacktraceCapture {
    /// Creates a capture that walks the whole stack.
    pub fn new() -> Self {
        BacktraceCapture::default()
    }

    /// Stops walking after `max_frames` frames.
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    fn walk(&self, is_caller: &dyn Fn(&StackFrame) -> bool) -> Vec<StackFrame> {
        let limit = self.max_frames.unwrap_or(usize::MAX);
        let mut frames = Vec::new();
        backtrace::trace(|frame| {
            let mut resolved = false;
            let mut found = false;
            backtrace::resolve_frame(frame, |symbol| {
                resolved = true;
                let frame = frame_from_symbol(symbol);
                found |= is_caller(&frame);
                frames.push(frame);
            });
            if !resolved {
                frames.push(StackFrame::unresolved());
            }
            !found && frames.len() < limit
        });
        frames.truncate(limit);
        frames
    }
}

impl StackCapture for BacktraceCapture {
    fn capture(&self) -> Vec<StackFrame> {
        self.walk(&|_| false)
    }

    /// Stops symbolizing once the physical frame holding the caller has been
    /// resolved.
    fn capture_until(&self, is_caller: &dyn Fn(&StackFrame) -> bool) -> Vec<StackFrame> {
        self.walk(is_caller)
    }
}

fn frame_from_symbol(symbol: &backtrace::Symbol) -> StackFrame {
    // `{:#}` leaves out the legacy hash suffix
    let method = symbol
        .name()
        .and_then(|name| ResolvedMethod::from_symbol(&format!("{name:#}")));
    let mut frame = match method {
        Some(method) => StackFrame::new(method),
        None => StackFrame::unresolved(),
    };
    if let Some(file_name) = symbol.filename() {
        frame = frame.with_file_name(file_name.to_string_lossy());
    }
    if let Some(line_number) = symbol.lineno() {
        frame = frame.with_line_number(line_number);
    }
    if let Some(column_number) = symbol.colno() {
        frame = frame.with_column_number(column_number);
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::{BacktraceCapture, StackCapture};
    use crate::frame::StackFrame;

    #[inline(never)]
    fn capture_from_named_function() -> Vec<StackFrame> {
        BacktraceCapture::new().capture()
    }

    #[test]
    fn captures_the_calling_function() {
        let frames = capture_from_named_function();

        let caller = frames
            .iter()
            .filter_map(StackFrame::method)
            .find(|method| method.name() == "capture_from_named_function")
            .expect("the calling function should be on the stack");
        let declaring_type = caller.declaring_type().unwrap();
        assert_eq!(declaring_type.unit(), "opentelemetry_callerinfo");
        assert_eq!(
            declaring_type.full_name(),
            "opentelemetry_callerinfo::capture::tests"
        );
    }

    fn named(name: &'static str) -> impl Fn(&StackFrame) -> bool {
        move |frame: &StackFrame| frame.method().is_some_and(|method| method.name() == name)
    }

    #[test]
    fn walk_stops_at_the_caller() {
        let full = capture_from_named_function();
        let until = BacktraceCapture::new().capture_until(&named("walk_stops_at_the_caller"));

        assert!(full.iter().any(named("walk_stops_at_the_caller")));
        assert!(until.iter().any(named("walk_stops_at_the_caller")));
        assert!(until.len() < full.len());
    }

    #[test]
    fn max_frames_limits_the_walk() {
        let frames = BacktraceCapture::new().with_max_frames(2).capture();

        assert!(frames.len() <= 2);
    }
}
