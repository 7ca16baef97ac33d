//! Error taxonomy and propagation discipline
//!
//! Seven built-in error kinds share a common shape (`name`, `message`) and a
//! flat (non-nested) taxonomy, plus two internal kinds that never surface as
//! thrown values: `Memory` (unrecoverable) and `Parse` (producer-side only,
//! raised by the external parser, never constructed here).
//!
//! Every language-level operation that can fail returns `EsResult<T> =
//! Result<T, Value>` where the error is the *thrown value* itself (usually,
//! but not necessarily, a built-in Error object) — mirroring the pending
//! exception slot of spec §3/§7 without a separate thread-local flag, since
//! this crate's `Engine` is a single owned handle rather than a set of FFI
//! entry points sharing process-wide state (contrast with
//! `seq-runtime::error`'s thread-local `LAST_ERROR`, which exists there only
//! because Seq's FFI boundary has no single owning struct to carry it on).

use std::fmt;

use crate::value::Value;

/// Result type used throughout the operations layer and object model: ok,
/// or the thrown value.
pub type EsResult<T> = Result<T, Value>;

/// The seven observable ECMAScript error kinds (spec §4.M / §7), plus two
/// internal-only kinds that are never thrown into user code.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    UriError,
    /// Unrecoverable host-level failure (allocation failure, stack
    /// overflow past the configured limit). Never caught by a `try`.
    Memory,
}

impl ErrorKind {
    /// The `name` property every instance of this kind's prototype carries.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::UriError => "URIError",
            ErrorKind::Memory => "MemoryException",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A host-facing failure report, surfaced through `esr_error()` after an
/// uncaught exception unwinds out of `esr_run`. Distinct from the
/// in-language `EsResult` because the host sees a formatted string, not a
/// live `Value` (the engine may have already torn down by the time the
/// host reads it).
#[derive(Clone, Debug)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_prototype_names() {
        assert_eq!(ErrorKind::TypeError.name(), "TypeError");
        assert_eq!(ErrorKind::UriError.name(), "URIError");
    }

    #[test]
    fn runtime_error_display() {
        let e = RuntimeError {
            kind: ErrorKind::RangeError,
            message: "too deep".into(),
        };
        assert_eq!(e.to_string(), "RangeError: too deep");
    }
}
