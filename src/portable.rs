//! The record capability: user-defined types that write their own fields and
//! are reconstructed from a numeric type id.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{GridportError, Result};
use crate::format::{FrameHeader, FLAG_OBJECT, HEADER_SIZE};
use crate::io::ByteCursor;
use crate::reader::{PortableReader, ReadContext};
use crate::registry::{IdResolver, TypeRegistry};
use crate::variant::Variant;
use crate::writer::PortableWriter;

/// A user-defined record type the codec can carry.
///
/// Implementors describe themselves through a numeric type id and write their
/// own fields through the frame writer handed to them; reconstruction goes
/// through a factory registered in a [`TypeRegistry`] under the same id.
/// `as_any` enables caller-side downcasting of a materialized record.
pub trait Portable: fmt::Debug + Send + Sync {
    /// The stable numeric identifier of this record type.
    fn type_id(&self) -> i32;

    /// Writes this record's fields into its enclosing frame.
    fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()>;

    /// Upcast hook for downcasting a materialized record to its concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Process-wide source of identity tokens. Only ever increments; never reused.
static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

pub(crate) fn mint_identity() -> u64 {
    NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed)
}

/// A shared, identity-bearing reference to a [`Portable`] record.
///
/// The identity token is minted when the record is first wrapped; clones share
/// it. Shared-reference deduplication keys on this token, so encoding the same
/// `PortableRef` (or its clones) twice within one marshal call emits the
/// second occurrence as a 5-byte handle. Wrapping an equal record a second
/// time mints a fresh identity; sharing is expressed by cloning the ref.
#[derive(Clone)]
pub struct PortableRef {
    identity: u64,
    record: Arc<dyn Portable>,
}

impl PortableRef {
    /// Wraps a record, minting a fresh identity token.
    pub fn new<T: Portable + 'static>(record: T) -> Self {
        Self::from_arc(Arc::new(record))
    }

    /// Wraps an already shared record, minting a fresh identity token.
    pub fn from_arc(record: Arc<dyn Portable>) -> Self {
        Self {
            identity: mint_identity(),
            record,
        }
    }

    /// The identity token this reference carries.
    pub fn identity(&self) -> u64 {
        self.identity
    }

    /// The record's numeric type id.
    pub fn type_id(&self) -> i32 {
        Portable::type_id(self.record.as_ref())
    }

    /// Borrows the underlying record.
    pub fn record(&self) -> &dyn Portable {
        self.record.as_ref()
    }

    /// Downcasts the record to a concrete type.
    pub fn downcast<T: Portable + 'static>(&self) -> Option<&T> {
        self.record.as_any().downcast_ref::<T>()
    }

    /// Returns true if both references resolve to the same instance.
    pub fn same_instance(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl fmt::Debug for PortableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortableRef")
            .field("identity", &self.identity)
            .field("record", &self.record)
            .finish()
    }
}

/// An opaque, pre-serialized record: one complete user frame plus the id
/// resolver needed to address its fields later.
///
/// This is the schema-less access path: fields can be read by name without
/// the concrete type being registered anywhere, and the blob can be
/// materialized later through a [`TypeRegistry`]. Blobs are value types:
/// equality and hashing are over the frame bytes.
#[derive(Clone)]
pub struct PortableObject {
    bytes: Arc<[u8]>,
    type_id: i32,
    resolver: Option<Arc<dyn IdResolver>>,
}

impl PortableObject {
    /// Wraps the bytes of one complete user frame.
    ///
    /// Fails with `ProtocolViolation` if the bytes do not start with a user
    /// object frame or the frame's declared length disagrees with them.
    pub fn new(bytes: Vec<u8>, resolver: Option<Arc<dyn IdResolver>>) -> Result<Self> {
        if bytes.len() < HEADER_SIZE || bytes[0] != FLAG_OBJECT {
            return Err(GridportError::ProtocolViolation(
                "portable object bytes must start with a user object frame".into(),
            ));
        }
        let cursor = ByteCursor::new(&bytes);
        let header = FrameHeader::read_at(&cursor, 0)?;
        if !header.user_type {
            return Err(GridportError::ProtocolViolation(
                "portable object bytes hold a standard-kind frame".into(),
            ));
        }
        if header.total_length as usize != bytes.len() {
            return Err(GridportError::ProtocolViolation(format!(
                "portable object frame declares {} bytes but holds {}",
                header.total_length,
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: bytes.into(),
            type_id: header.type_id,
            resolver,
        })
    }

    /// The frame's user type id.
    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    /// The complete frame bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Reads one named field without materializing the record.
    ///
    /// An absent field yields [`Variant::Null`].
    pub fn field(&self, name: &str) -> Result<Variant> {
        let mut ctx = ReadContext::new(&self.bytes, self.resolver.clone(), None);
        let mut reader = PortableReader::at_frame(&mut ctx, 0)?;
        reader.read_variant(name)
    }

    /// Materializes the record through the registered factory for its type id.
    pub fn deserialize(&self, registry: &Arc<TypeRegistry>) -> Result<PortableRef> {
        let mut ctx = ReadContext::new(
            &self.bytes,
            self.resolver.clone(),
            Some(Arc::clone(registry)),
        );
        let mut reader = PortableReader::at_frame(&mut ctx, 0)?;
        registry.create(self.type_id, &mut reader)
    }
}

impl PartialEq for PortableObject {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for PortableObject {}

impl fmt::Debug for PortableObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortableObject")
            .field("type_id", &self.type_id)
            .field("len", &self.bytes.len())
            .finish()
    }
}
