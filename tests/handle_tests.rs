#![allow(missing_docs)]

//! Shared-reference deduplication: 5-byte handle frames on the write side,
//! single-instance resolution on the read side, and handle-table growth
//! stability.

use std::any::Any;
use std::sync::Arc;

use gridport::format::{FLAG_HANDLE, FLAG_OBJECT, HEADER_SIZE, TOTAL_LENGTH_OFFSET};
use gridport::handles::WriteHandleTable;
use gridport::{
    Marshaller, Portable, PortableReader, PortableRef, PortableWriter, Result, TypeRegistry,
    Variant,
};

#[derive(Debug, PartialEq, Clone)]
struct NodeBean {
    id: i32,
    name: String,
}

const NODE_BEAN_TYPE_ID: i32 = 7;

impl Portable for NodeBean {
    fn type_id(&self) -> i32 {
        NODE_BEAN_TYPE_ID
    }

    fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()> {
        writer.write_int("id", self.id)?;
        writer.write_string("name", &self.name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn node_factory(reader: &mut PortableReader<'_, '_>) -> Result<PortableRef> {
    Ok(PortableRef::new(NodeBean {
        id: reader.read_int("id")?,
        name: reader.read_string("name")?.unwrap_or_default(),
    }))
}

fn node_registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry.register(NODE_BEAN_TYPE_ID, node_factory);
    Arc::new(registry)
}

fn i32_at(bytes: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

#[test]
fn second_occurrence_is_a_five_byte_handle() -> Result<()> {
    let shared = PortableRef::new(NodeBean {
        id: 9,
        name: "a reasonably long node name, to make the point".into(),
    });
    let bytes = Marshaller::new().marshal(&Variant::Collection(vec![
        Variant::Portable(shared.clone()),
        Variant::Portable(shared),
    ]))?;

    // Outer collection frame: header, then count, then the two elements.
    let first = HEADER_SIZE + 4;
    assert_eq!(bytes[first], FLAG_OBJECT);
    let first_len = i32_at(&bytes, first + TOTAL_LENGTH_OFFSET) as usize;

    // The second element is flag + 4-byte slot index, regardless of record size.
    let second = first + first_len;
    assert_eq!(bytes.len(), second + 5);
    assert_eq!(bytes[second], FLAG_HANDLE);
    assert_eq!(i32_at(&bytes, second + 1), 0); // first assigned slot
    Ok(())
}

#[test]
fn handles_resolve_to_one_instance() -> Result<()> {
    let shared = PortableRef::new(NodeBean {
        id: 3,
        name: "shared".into(),
    });
    let marshaller = Marshaller::with_registry(node_registry());
    let bytes = marshaller.marshal(&Variant::Collection(vec![
        Variant::Portable(shared.clone()),
        Variant::Portable(shared),
    ]))?;

    let decoded = marshaller.unmarshal(&bytes)?;
    let items = decoded.as_collection().expect("collection");
    let a = items[0].as_portable().expect("record");
    let b = items[1].as_portable().expect("record");

    // Both elements are references to the same materialized instance.
    assert!(a.same_instance(b));
    assert_eq!(a.downcast::<NodeBean>().expect("concrete").id, 3);
    Ok(())
}

#[test]
fn distinct_instances_are_not_deduplicated() -> Result<()> {
    // Equal payloads, separately wrapped: two full frames, two instances.
    let first = PortableRef::new(NodeBean {
        id: 1,
        name: "twin".into(),
    });
    let second = PortableRef::new(NodeBean {
        id: 1,
        name: "twin".into(),
    });
    let marshaller = Marshaller::with_registry(node_registry());
    let bytes = marshaller.marshal(&Variant::Collection(vec![
        Variant::Portable(first),
        Variant::Portable(second),
    ]))?;

    let decoded = marshaller.unmarshal(&bytes)?;
    let items = decoded.as_collection().expect("collection");
    let a = items[0].as_portable().expect("record");
    let b = items[1].as_portable().expect("record");
    assert!(!a.same_instance(b));
    Ok(())
}

#[test]
fn shared_reference_roundtrip_through_named_fields() -> Result<()> {
    // A record holding the same child twice in named fields.
    #[derive(Debug)]
    struct Pair {
        left: PortableRef,
        right: PortableRef,
    }

    impl Portable for Pair {
        fn type_id(&self) -> i32 {
            21
        }

        fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()> {
            writer.write_portable("left", &self.left)?;
            writer.write_portable("right", &self.right)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn pair_factory(reader: &mut PortableReader<'_, '_>) -> Result<PortableRef> {
        let left = match reader.read_variant("left")? {
            Variant::Portable(r) => r,
            other => panic!("left is not a record: {other:?}"),
        };
        let right = match reader.read_variant("right")? {
            Variant::Portable(r) => r,
            other => panic!("right is not a record: {other:?}"),
        };
        Ok(PortableRef::new(Pair { left, right }))
    }

    let mut registry = TypeRegistry::new();
    registry.register(NODE_BEAN_TYPE_ID, node_factory);
    registry.register(21, pair_factory);
    let marshaller = Marshaller::with_registry(Arc::new(registry));

    let child = PortableRef::new(NodeBean {
        id: 77,
        name: "child".into(),
    });
    let pair = Pair {
        left: child.clone(),
        right: child,
    };
    let bytes = marshaller.marshal_record(&PortableRef::new(pair))?;
    let record = marshaller.unmarshal_record(&bytes)?;
    let decoded = record.downcast::<Pair>().expect("concrete");
    assert!(decoded.left.same_instance(&decoded.right));
    Ok(())
}

#[test]
fn write_table_growth_preserves_slots() {
    // Small capacity and load factor to force both spine and entry growth.
    let mut table = WriteHandleTable::new(4, 0.75);

    let tokens: Vec<u64> = (1..=40).map(|i| i * 1000 + 3).collect();
    for (slot, token) in tokens.iter().enumerate() {
        assert_eq!(table.lookup(*token), None, "token {token} seen too early");
        assert_eq!(table.len(), slot + 1);
    }

    // Every identity inserted before the rehashes still resolves to the slot
    // it was assigned at first sight.
    for (slot, token) in tokens.iter().enumerate() {
        assert_eq!(table.lookup(*token), Some(slot as u32));
    }
}

#[test]
fn write_table_assigns_on_first_sight() {
    let mut table = WriteHandleTable::new(10, 3.0);
    assert_eq!(table.lookup(42), None);
    assert_eq!(table.lookup(42), Some(0));
    assert_eq!(table.lookup(43), None);
    assert_eq!(table.lookup(43), Some(1));
    assert_eq!(table.lookup(42), Some(0));
}
