//! Centralized error handling for gridport.
//!
//! Every failure condition in the codec is represented as a `Result` value;
//! the crate forbids panics through `#![deny(clippy::panic)]` and
//! `#![deny(clippy::unwrap_used)]`.
//!
//! ## Error Categories
//!
//! Errors are categorized by the contract they violate:
//!
//! - **Framing** ([`GridportError::ProtocolViolation`]): a write or read that
//!   breaks the frame protocol (e.g. a named-field write after the raw-mode
//!   switch, a malformed frame header).
//! - **Encoding** ([`GridportError::UnknownVariantKind`]): a wire flag that
//!   does not correspond to any variant kind.
//! - **Typing** ([`GridportError::UnknownTypeId`], [`GridportError::TypeMismatch`]):
//!   a type code or user type id the decoder cannot satisfy.
//! - **Bounds** ([`GridportError::BufferUnderrun`]): a read past the end of
//!   the input buffer; always surfaced, never truncated.
//! - **References** ([`GridportError::InvalidHandle`]): a shared-reference
//!   handle with no registered instance.
//! - **Internal** ([`GridportError::Internal`]): logic errors that indicate a
//!   bug in the library rather than bad input.
//!
//! All variants are `Clone`, so errors can be stored or shared freely.
//!
//! ## Propagation Policy
//!
//! Every error is surfaced to the immediate caller of the operation that
//! detected it. Nothing is retried internally and nothing is downgraded to a
//! default value, with one documented exception: reading a named field that
//! is simply absent yields the field's type-appropriate default.

use std::fmt;

/// A specialized `Result` type for gridport operations.
pub type Result<T> = std::result::Result<T, GridportError>;

/// The master error enum covering all failure domains in gridport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridportError {
    /// The frame protocol was violated, e.g. a named-field write was issued
    /// after the frame switched to raw mode, or a frame header is malformed.
    ProtocolViolation(String),

    /// A wire flag byte does not denote any known variant kind.
    UnknownVariantKind(String),

    /// A type code or user type id that neither the standard-kind decoder nor
    /// the type registry recognizes.
    UnknownTypeId(i32),

    /// A named field's stored type code disagrees with the one the reader
    /// expected.
    TypeMismatch {
        /// The type code the reader asked for.
        expected: u8,
        /// The type code actually stored in the field.
        found: u8,
    },

    /// A read would cross the end of the buffer (or the end of the current
    /// frame). Decoding truncated input surfaces this rather than reading out
    /// of bounds.
    BufferUnderrun {
        /// Offset at which the read started.
        offset: usize,
        /// Number of bytes the read needed.
        wanted: usize,
        /// Number of bytes actually available at that offset.
        available: usize,
    },

    /// A shared-reference handle index with no registered instance, or one
    /// whose instance is not yet materialized (a cyclic self-reference).
    InvalidHandle(i32),

    /// Logic error in the codec itself. This should not occur in production;
    /// please report it with a reproduction case.
    Internal(String),
}

impl fmt::Display for GridportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtocolViolation(s) => write!(f, "Protocol Violation: {s}"),
            Self::UnknownVariantKind(s) => write!(f, "Unknown Variant Kind: {s}"),
            Self::UnknownTypeId(id) => write!(f, "Unknown Type Id: {id}"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "Type Mismatch: expected code {expected}, found {found}")
            }
            Self::BufferUnderrun {
                offset,
                wanted,
                available,
            } => write!(
                f,
                "Buffer Underrun: {wanted} byte(s) at offset {offset}, {available} available"
            ),
            Self::InvalidHandle(idx) => write!(f, "Invalid Handle: {idx}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for GridportError {}
