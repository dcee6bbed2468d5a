//! # Stack Frames
//!
//! A [`StackFrame`] is an immutable snapshot of one entry in a call stack, as
//! produced by a [`StackCapture`]. Frames are ordered innermost first: the
//! first frame is the most recent call.
//!
//! [`resolve`] walks such a stack and picks the calling frame, i.e. the first
//! frame that carries method information and belongs to the application
//! rather than to the logging infrastructure.
//!
//! [`StackCapture`]: crate::StackCapture

use crate::filter::AllowedUnits;

/// The path that owns a resolved method, together with the unit (crate) it
/// was compiled into.
///
/// For an associated function `my_app::billing::Invoice::total` the declaring
/// type is `my_app::billing::Invoice`; for a free function
/// `my_app::billing::run` it is the module `my_app::billing`. In both cases the
/// unit is `my_app`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclaringType {
    full_name: String,
    unit: String,
}

impl DeclaringType {
    /// Creates a declaring type from its full path and containing unit.
    pub fn new(full_name: impl Into<String>, unit: impl Into<String>) -> Self {
        DeclaringType {
            full_name: full_name.into(),
            unit: unit.into(),
        }
    }

    /// Fully qualified path of the type or module.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Name of the unit the type is declared in.
    pub fn unit(&self) -> &str {
        &self.unit
    }
}

/// A method whose symbol could be resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedMethod {
    name: String,
    declaring_type: Option<DeclaringType>,
}

impl ResolvedMethod {
    /// Creates a resolved method.
    pub fn new(name: impl Into<String>, declaring_type: Option<DeclaringType>) -> Self {
        ResolvedMethod {
            name: name.into(),
            declaring_type,
        }
    }

    /// Simple name of the method, without its path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaring type, if the symbol carried a path.
    pub fn declaring_type(&self) -> Option<&DeclaringType> {
        self.declaring_type.as_ref()
    }
}

/// One entry in a captured call stack.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackFrame {
    method: Option<ResolvedMethod>,
    file_name: Option<String>,
    line_number: Option<u32>,
    column_number: Option<u32>,
}

impl StackFrame {
    /// Creates a frame for a resolved method without location information.
    pub fn new(method: ResolvedMethod) -> Self {
        StackFrame {
            method: Some(method),
            ..Default::default()
        }
    }

    /// Creates a frame whose symbol could not be resolved.
    pub fn unresolved() -> Self {
        StackFrame::default()
    }

    /// Sets the source file of this frame.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the source line of this frame.
    pub fn with_line_number(mut self, line_number: u32) -> Self {
        self.line_number = Some(line_number);
        self
    }

    /// Sets the source column of this frame.
    pub fn with_column_number(mut self, column_number: u32) -> Self {
        self.column_number = Some(column_number);
        self
    }

    /// Whether this frame carries method information.
    pub fn has_method(&self) -> bool {
        self.method.is_some()
    }

    /// The resolved method, if any.
    pub fn method(&self) -> Option<&ResolvedMethod> {
        self.method.as_ref()
    }

    /// Source file, present only when debug symbols were available.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Source line, present only when debug symbols were available.
    pub fn line_number(&self) -> Option<u32> {
        self.line_number
    }

    /// Source column, present only when debug symbols were available.
    pub fn column_number(&self) -> Option<u32> {
        self.column_number
    }

    /// The unit this frame's declaring type belongs to.
    pub fn unit(&self) -> Option<&str> {
        self.method
            .as_ref()
            .and_then(ResolvedMethod::declaring_type)
            .map(DeclaringType::unit)
    }

    /// Determines whether this frame's declaring type originates in one of the
    /// allowed units. Frames without a declaring type are never allowed.
    pub fn is_in_allowed_unit(&self, allowed_units: &AllowedUnits) -> bool {
        self.unit()
            .map(|unit| allowed_units.contains(unit))
            .unwrap_or(false)
    }
}

/// Returns the first frame, innermost first, that has method information and
/// satisfies `is_allowed`.
///
/// `None` means no enrichment should happen for this stack; it is not an
/// error. The frames are only read.
pub fn resolve<'a, I, F>(frames: I, mut is_allowed: F) -> Option<&'a StackFrame>
where
    I: IntoIterator<Item = &'a StackFrame>,
    F: FnMut(&StackFrame) -> bool,
{
    frames
        .into_iter()
        .find(|frame| frame.has_method() && is_allowed(frame))
}
