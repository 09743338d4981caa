// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Error types surfaced to callers and reported by engines.
//!
//! There are two families of failure:
//!
//! - **Precondition errors** ([`Error::NoHandle`], [`Error::InvalidArgument`],
//!   [`Error::Unsupported`]) are raised before any engine call is made and carry
//!   a message only.
//! - **Native errors** ([`Error::NativeOperationFailed`]) are raised after an
//!   engine call reported failure and carry the engine's severity and code in
//!   addition to the message.
//!
//! [`Error::ConstructionFailed`] sits between the two: the engine call
//! succeeded, but its result could not be turned into something the caller can
//! hold. Whatever the engine allocated has been destroyed by the time the
//! error is returned.

use std::fmt::Display;

/// Severity class of a fault reported by an engine.
///
/// The classes follow the ImageMagick `ExceptionType` ranges: codes in
/// `300..400` are warnings, `400..700` are errors and `700..` are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The engine completed the call but something was not quite right.
    Warning,
    /// The call failed; the engine itself is still usable.
    Error,
    /// The call failed and the engine may be in an unusable state.
    Fatal,
}

impl Severity {
    /// Classifies an ImageMagick-style numeric exception code.
    ///
    /// ```
    /// use frames_and_handles::error::Severity;
    /// assert_eq!(Severity::from_code(350), Severity::Warning);
    /// assert_eq!(Severity::from_code(425), Severity::Error);
    /// assert_eq!(Severity::from_code(700), Severity::Fatal);
    /// ```
    pub const fn from_code(code: u32) -> Self {
        match code {
            0..400 => Severity::Warning,
            400..700 => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// A failure record produced by an engine during a single call.
///
/// This is the value-level counterpart of a native exception record: engines
/// return it from every fallible call instead of stashing it in ambient state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{reason} ({severity}, code {code})")]
pub struct NativeFault {
    pub severity: Severity,
    pub code: u32,
    pub reason: String,
    /// Optional secondary text, such as the file name involved.
    pub description: Option<String>,
}

impl NativeFault {
    pub fn new(severity: Severity, code: u32, reason: impl Into<String>) -> Self {
        NativeFault {
            severity,
            code,
            reason: reason.into(),
            description: None,
        }
    }

    /// Builds a fault whose severity is derived from `code`.
    pub fn coded(code: u32, reason: impl Into<String>) -> Self {
        Self::new(Severity::from_code(code), code, reason)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The message handed to callers: reason, plus description when present.
    pub fn message(&self) -> String {
        match &self.description {
            Some(description) => format!("{} `{}`", self.reason, description),
            None => self.reason.clone(),
        }
    }
}

/// Engine features whose availability varies between engines or engine versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Named string properties (`property` / `set_property`).
    Properties,
    /// Reading and writing named profiles other than "icc" and "8bim".
    GenericProfiles,
    /// Enumerating the names of attached profiles.
    ProfileIteration,
    /// Reading image metadata without decoding pixels.
    Ping,
    /// Encoding a whole sequence into a single blob.
    MultiFrameBlobs,
}

impl Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Properties => write!(f, "properties"),
            Capability::GenericProfiles => write!(f, "generic profiles"),
            Capability::ProfileIteration => write!(f, "profile iteration"),
            Capability::Ping => write!(f, "ping"),
            Capability::MultiFrameBlobs => write!(f, "multi-frame blobs"),
        }
    }
}

/// Errors returned by every public operation of this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The wrapper has no native resource.
    #[error("{operation}: no image handle")]
    NoHandle { operation: &'static str },

    /// A size, bounds or shape check failed before any engine call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine reported a failure.
    #[error("{context}: {message} ({severity}, code {code})")]
    NativeOperationFailed {
        context: String,
        severity: Severity,
        code: u32,
        message: String,
    },

    /// The engine call succeeded but its result could not be turned into a
    /// caller-visible value.
    #[error("construction failed: {0}")]
    ConstructionFailed(String),

    /// The engine does not report the capability this operation requires.
    #[error("engine does not support {capability}")]
    Unsupported { capability: Capability },
}

impl Error {
    /// Wraps a fault reported by the engine during `context`.
    pub fn native(context: impl Into<String>, fault: NativeFault) -> Self {
        Error::NativeOperationFailed {
            context: context.into(),
            severity: fault.severity,
            code: fault.code,
            message: fault.message(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// True for errors raised before any engine call was attempted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::NoHandle { .. } | Error::InvalidArgument(_) | Error::Unsupported { .. }
        )
    }

    /// Severity of the underlying engine fault, if there was one.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Error::NativeOperationFailed { severity, .. } => Some(*severity),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ranges() {
        assert_eq!(Severity::from_code(0), Severity::Warning);
        assert_eq!(Severity::from_code(399), Severity::Warning);
        assert_eq!(Severity::from_code(400), Severity::Error);
        assert_eq!(Severity::from_code(699), Severity::Error);
        assert_eq!(Severity::from_code(799), Severity::Fatal);
    }

    #[test]
    fn native_error_keeps_record() {
        let fault = NativeFault::new(Severity::Fatal, 42, "boom");
        let err = Error::native("blur", fault);
        match &err {
            Error::NativeOperationFailed {
                context,
                severity,
                code,
                message,
            } => {
                assert_eq!(context, "blur");
                assert_eq!(*severity, Severity::Fatal);
                assert_eq!(*code, 42);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!err.is_precondition());
        assert_eq!(err.severity(), Some(Severity::Fatal));
    }

    #[test]
    fn description_is_part_of_message() {
        let fault = NativeFault::coded(430, "unable to open image").with_description("missing.png");
        assert_eq!(fault.severity, Severity::Error);
        assert_eq!(fault.message(), "unable to open image `missing.png`");
    }

    #[test]
    fn precondition_kinds() {
        assert!(Error::NoHandle { operation: "flip" }.is_precondition());
        assert!(Error::invalid("too small").is_precondition());
        assert!(
            Error::Unsupported {
                capability: Capability::Properties
            }
            .is_precondition()
        );
        assert!(!Error::ConstructionFailed("x".into()).is_precondition());
    }
}
