//! Rendering outcome with the warnings collected along the way.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Outcome of rendering one page onto one target.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderResult<T> {
    /// Everything on the page was painted.
    Success(T),
    /// Some sub-objects were skipped; the output is still usable.
    Degraded(T, Vec<RenderWarning>),
    /// The page could not be rendered at all.
    Failed(RenderError),
}

impl<T> RenderResult<T> {
    /// Wrap an output, degraded if any warnings were collected.
    pub fn from_parts(output: T, warnings: Vec<RenderWarning>) -> Self {
        if warnings.is_empty() {
            RenderResult::Success(output)
        } else {
            RenderResult::Degraded(output, warnings)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RenderResult::Success(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RenderResult::Degraded(..))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RenderResult::Failed(_))
    }

    /// Warnings collected during rendering (empty unless degraded).
    pub fn warnings(&self) -> &[RenderWarning] {
        match self {
            RenderResult::Degraded(_, warnings) => warnings,
            _ => &[],
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> RenderResult<U> {
        match self {
            RenderResult::Success(output) => RenderResult::Success(f(output)),
            RenderResult::Degraded(output, warnings) => RenderResult::Degraded(f(output), warnings),
            RenderResult::Failed(err) => RenderResult::Failed(err),
        }
    }

    /// Split into the output and its warnings, or the fatal error.
    pub fn into_result(self) -> Result<(T, Vec<RenderWarning>), RenderError> {
        match self {
            RenderResult::Success(output) => Ok((output, Vec::new())),
            RenderResult::Degraded(output, warnings) => Ok((output, warnings)),
            RenderResult::Failed(err) => Err(err),
        }
    }
}

/// Category of skipped content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A feature the renderer does not paint (shadings, patterns, ...)
    Unsupported,
    /// A named resource is missing from the resource dictionary
    MissingResource,
    /// Image data could not be decoded
    Image,
    /// A font could not be resolved and text was substituted
    Font,
    /// An operator had unusable operands
    Operator,
    /// Form XObjects nested too deeply
    NestingLimit,
}

/// A non-fatal omission recorded while rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl RenderWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error view of this warning.
    pub fn to_error(&self) -> RenderError {
        RenderError::UnsupportedContent(self.message.clone())
    }
}

impl std::fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Collects warnings, dropping exact duplicates so a repeated problem is
/// reported once per page.
#[derive(Debug, Default)]
pub(crate) struct WarningLog {
    warnings: Vec<RenderWarning>,
}

impl WarningLog {
    pub(crate) fn push(&mut self, warning: RenderWarning) {
        if !self.warnings.contains(&warning) {
            log::debug!("Render warning: {}", warning);
            self.warnings.push(warning);
        }
    }

    pub(crate) fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        self.push(RenderWarning::new(kind, message));
    }

    pub(crate) fn extend(&mut self, warnings: impl IntoIterator<Item = RenderWarning>) {
        for warning in warnings {
            self.push(warning);
        }
    }

    pub(crate) fn into_vec(self) -> Vec<RenderWarning> {
        self.warnings
    }
}
