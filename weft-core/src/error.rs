//! Error types for the weft core.
//!
//! Every variant here is an internal invariant violation: a descriptor,
//! permutation or index that disagrees with the value it is applied to.
//! Callers propagate these with `?` and never recover from them. Expected
//! local failures (a binding that cannot be strengthened away) are not
//! errors and are reported as `None` by the reindex engine instead.

use thiserror::Error;

use crate::types::Type;

pub type Result<T> = std::result::Result<T, CompilerError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilerError {
    /// An argument list does not have the shape a witness was built for.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// An index points past the top of its environment.
    #[error("index {index} out of range for environment of {len} slots")]
    IndexOutOfRange { index: usize, len: usize },

    /// An index or binder disagrees with the type of the slot it refers to.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: Type, found: Type },

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

/// Build a `CompilerError::Shape` from a format string.
#[macro_export]
macro_rules! err_shape {
    ($($arg:tt)*) => {
        $crate::error::CompilerError::Shape(format!($($arg)*))
    };
}

/// Return early with a `CompilerError::Shape`.
#[macro_export]
macro_rules! bail_shape {
    ($($arg:tt)*) => {
        return Err($crate::err_shape!($($arg)*))
    };
}

/// Build a `CompilerError::Invariant` from a format string.
#[macro_export]
macro_rules! err_invariant {
    ($($arg:tt)*) => {
        $crate::error::CompilerError::Invariant(format!($($arg)*))
    };
}

/// Return early with a `CompilerError::Invariant`.
#[macro_export]
macro_rules! bail_invariant {
    ($($arg:tt)*) => {
        return Err($crate::err_invariant!($($arg)*))
    };
}
