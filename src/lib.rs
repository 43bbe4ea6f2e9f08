//! # gridport
//!
//! A portable, self-describing binary object codec for distributed-grid
//! clients: primitives, arrays, ordered collections, key/value maps, and
//! user-defined record types, with schema-less field access,
//! shared-reference deduplication, and a two-region frame encoding that lets
//! consumers skip unknown named fields while still reading a stable raw tail.
//!
//! ## Overview
//!
//! Every encoded value is a *frame*: a flag byte, a fixed 18-byte header
//! (backpatched with the frame's total length and raw-region offset once the
//! body is written), a region of named fields addressable by stable numeric
//! id in any order, and a trailing raw region addressed by position. Record
//! instances encoded more than once within a call collapse into 5-byte
//! handles, so shared object graphs are represented once.
//!
//! ## Core Concepts
//!
//! ### `Marshaller`
//!
//! The [`Marshaller`] is the entry point: [`Marshaller::marshal`] turns a
//! [`Variant`] into wire bytes, [`Marshaller::unmarshal`] turns wire bytes
//! back into a [`Variant`]. Each call owns a fresh context (byte buffer,
//! handle table, resolver), so one marshaller is freely shared across
//! threads.
//!
//! ### `Variant`
//!
//! The [`Variant`] tagged union is the common currency at the codec
//! boundary: every encodable kind, with `Null` for absence. Equality is
//! bitwise for floats and identity-based for record references.
//!
//! ### Records
//!
//! User types implement [`Portable`] to write their own named and raw
//! fields; a [`TypeRegistry`] maps their numeric type ids back to factories
//! on decode. Without a registry, user frames decode as [`PortableObject`]
//! blobs whose fields remain readable by name, no schema required.
//!
//! ## Usage
//!
//! ```rust
//! use gridport::{Marshaller, Variant};
//!
//! let marshaller = Marshaller::new();
//! let bytes = marshaller.marshal(&Variant::Int(42))?;
//! assert_eq!(marshaller.unmarshal(&bytes)?, Variant::Int(42));
//! # Ok::<(), gridport::GridportError>(())
//! ```
//!
//! ## Safety and Error Handling
//!
//! * **No unsafe code**, enforced by `#![deny(unsafe_code)]`.
//! * **No panics:** all failures are [`GridportError`] values (enforced by
//!   clippy lints); truncated input surfaces `BufferUnderrun`, never an
//!   out-of-bounds read.
//! * **Fixed wire layout:** all multi-byte values are little-endian on the
//!   wire regardless of host architecture.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod error;
pub mod format;
pub mod portable;
pub mod reader;
pub mod registry;
pub mod variant;
pub mod writer;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod handles;
#[doc(hidden)]
pub mod io;

// --- RE-EXPORTS ---

pub use api::{Marshaller, MarshallerBuilder};
pub use error::{GridportError, Result};
pub use portable::{Portable, PortableObject, PortableRef};
pub use reader::{PortableRawReader, PortableReader, ReadContext};
pub use registry::{IdResolver, RecordFactory, TypeRegistry};
pub use variant::Variant;
pub use writer::{PortableRawWriter, PortableWriter, WriteContext};

/// Constants used throughout the library.
pub mod constants {
    /// Default initial capacity of the output buffer.
    pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

    /// Initial slot capacity of the write-side handle table.
    pub const HANDLE_TABLE_CAPACITY: usize = 10;

    /// Load factor at which the write-side handle table's bucket spine grows.
    pub const HANDLE_TABLE_LOAD_FACTOR: f32 = 3.0;

    /// Initial capacity of the read-side handle registry.
    pub const READ_HANDLE_CAPACITY: usize = 10;
}
