//! The marshaller facade: top-level entry points owning a fresh context per
//! call.

use std::sync::Arc;

use crate::constants::DEFAULT_BUFFER_CAPACITY;
use crate::error::{GridportError, Result};
use crate::portable::PortableRef;
use crate::reader::{PortableReader, ReadContext};
use crate::registry::{IdResolver, TypeRegistry};
use crate::variant::Variant;
use crate::writer::{PortableWriter, WriteContext};

/// The main entry point for encoding and decoding portable values.
///
/// A marshaller is cheap to clone and carries only configuration: the type
/// registry used to materialize user records, the optional field-id resolver,
/// and the initial output buffer capacity. Every `marshal`/`unmarshal` call
/// gets a fresh context, so a single marshaller is safe to share across
/// threads.
#[derive(Clone)]
pub struct Marshaller {
    registry: Option<Arc<TypeRegistry>>,
    id_resolver: Option<Arc<dyn IdResolver>>,
    buffer_capacity: usize,
}

impl Default for Marshaller {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Marshaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marshaller")
            .field("registry", &self.registry)
            .field("has_id_resolver", &self.id_resolver.is_some())
            .field("buffer_capacity", &self.buffer_capacity)
            .finish()
    }
}

impl Marshaller {
    /// A marshaller with no registry and no resolver: user frames decode as
    /// schema-less blobs and field ids come from the name hash.
    pub fn new() -> Self {
        Self {
            registry: None,
            id_resolver: None,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// A marshaller that materializes user frames through `registry`.
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry: Some(registry),
            id_resolver: None,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Starts building a marshaller with explicit configuration.
    pub fn builder() -> MarshallerBuilder {
        MarshallerBuilder::default()
    }

    /// Encodes one value as a top-level frame and returns the wire bytes.
    ///
    /// On failure no buffer is returned; the partial encoding is discarded
    /// with the call's context.
    pub fn marshal(&self, value: &Variant) -> Result<Vec<u8>> {
        let mut ctx = WriteContext::new(self.buffer_capacity, self.id_resolver.clone());
        {
            let mut writer = PortableWriter::top_level(&mut ctx);
            writer.write_variant_value(value)?;
        }
        Ok(ctx.into_bytes())
    }

    /// Encodes one record as a top-level frame.
    pub fn marshal_record(&self, record: &PortableRef) -> Result<Vec<u8>> {
        self.marshal(&Variant::Portable(record.clone()))
    }

    /// Decodes one top-level frame from the wire bytes.
    ///
    /// With a registry configured, user frames come back as
    /// [`Variant::Portable`]; without one they come back as
    /// [`Variant::Blob`].
    pub fn unmarshal(&self, bytes: &[u8]) -> Result<Variant> {
        let mut ctx = ReadContext::new(bytes, self.id_resolver.clone(), self.registry.clone());
        let mut reader = PortableReader::root(&mut ctx);
        let (value, _) = reader.read_variant_at(0)?;
        Ok(value)
    }

    /// Decodes one top-level frame and materializes it as a record.
    ///
    /// A blob result (no registry configured on this marshaller) is an
    /// `UnknownTypeId` failure; a non-record result is a `ProtocolViolation`.
    pub fn unmarshal_record(&self, bytes: &[u8]) -> Result<PortableRef> {
        match self.unmarshal(bytes)? {
            Variant::Portable(record) => Ok(record),
            Variant::Blob(blob) => match &self.registry {
                Some(registry) => blob.deserialize(registry),
                None => Err(GridportError::UnknownTypeId(blob.type_id())),
            },
            other => Err(GridportError::ProtocolViolation(format!(
                "top-level value is not a record: {other:?}"
            ))),
        }
    }
}

/// Step-wise configuration for a [`Marshaller`].
#[derive(Default)]
pub struct MarshallerBuilder {
    registry: Option<Arc<TypeRegistry>>,
    id_resolver: Option<Arc<dyn IdResolver>>,
    buffer_capacity: Option<usize>,
}

impl MarshallerBuilder {
    /// Sets the type registry used to materialize user records.
    pub fn registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the field-id resolver shared by the write and read paths.
    pub fn id_resolver(mut self, resolver: Arc<dyn IdResolver>) -> Self {
        self.id_resolver = Some(resolver);
        self
    }

    /// Sets the initial output buffer capacity.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = Some(capacity);
        self
    }

    /// Finishes the configuration.
    pub fn build(self) -> Marshaller {
        Marshaller {
            registry: self.registry,
            id_resolver: self.id_resolver,
            buffer_capacity: self.buffer_capacity.unwrap_or(DEFAULT_BUFFER_CAPACITY),
        }
    }
}
