//! The boundary to external collaborators: the type registry that
//! reconstructs concrete record types, and the pluggable field-id resolver.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{GridportError, Result};
use crate::portable::PortableRef;
use crate::reader::PortableReader;

/// Maps `(type id, field name)` to a stable numeric field id.
///
/// When absent, or when it returns `None` for a name, the codec falls back to
/// the deterministic field-name hash ([`crate::format::field_name_hash`]),
/// which is shared identically between the write and read paths.
pub trait IdResolver: Send + Sync {
    /// Resolves a field name within a record type to its numeric id.
    fn field_id(&self, type_id: i32, field_name: &str) -> Option<i32>;
}

/// A factory reconstructing one record type from its frame reader.
pub type RecordFactory =
    Arc<dyn for<'r, 'buf> Fn(&mut PortableReader<'r, 'buf>) -> Result<PortableRef> + Send + Sync>;

/// Maps numeric type identifiers to record factories.
///
/// Injected into the read context; decoding a user frame with a type id that
/// has no registered factory is an `UnknownTypeId` failure surfaced to the
/// caller, never silently ignored.
#[derive(Default)]
pub struct TypeRegistry {
    factories: HashMap<i32, RecordFactory>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for a type id, replacing any previous one.
    pub fn register<F>(&mut self, type_id: i32, factory: F)
    where
        F: for<'r, 'buf> Fn(&mut PortableReader<'r, 'buf>) -> Result<PortableRef>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(type_id, Arc::new(factory));
    }

    /// Reconstructs a record of the given type from a reader scoped to its
    /// frame.
    pub fn create(&self, type_id: i32, reader: &mut PortableReader<'_, '_>) -> Result<PortableRef> {
        let factory = self
            .factories
            .get(&type_id)
            .ok_or(GridportError::UnknownTypeId(type_id))?;
        (**factory)(reader)
    }

    /// Returns true if a factory is registered for the type id.
    pub fn contains(&self, type_id: i32) -> bool {
        self.factories.contains_key(&type_id)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<i32> = self.factories.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("TypeRegistry").field("type_ids", &ids).finish()
    }
}
