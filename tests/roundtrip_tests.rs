#![allow(missing_docs)]

//! Round-trip coverage: every variant kind survives marshal/unmarshal under
//! its defined equality (bitwise for floats).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use gridport::{
    Marshaller, Portable, PortableReader, PortableRef, PortableWriter, Result, TypeRegistry,
    Variant,
};
use uuid::Uuid;

#[derive(Debug, PartialEq, Clone)]
struct NodeBean {
    id: i32,
    name: String,
    load: f64,
}

const NODE_BEAN_TYPE_ID: i32 = 7;

impl Portable for NodeBean {
    fn type_id(&self) -> i32 {
        NODE_BEAN_TYPE_ID
    }

    fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()> {
        writer.write_int("id", self.id)?;
        writer.write_string("name", &self.name)?;
        writer.write_double("load", self.load)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn node_factory(reader: &mut PortableReader<'_, '_>) -> Result<PortableRef> {
    Ok(PortableRef::new(NodeBean {
        id: reader.read_int("id")?,
        name: reader.read_string("name")?.unwrap_or_default(),
        load: reader.read_double("load")?,
    }))
}

fn node_registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry.register(NODE_BEAN_TYPE_ID, node_factory);
    Arc::new(registry)
}

fn assert_roundtrip(value: Variant) -> Result<()> {
    let marshaller = Marshaller::new();
    let bytes = marshaller.marshal(&value)?;
    let decoded = marshaller.unmarshal(&bytes)?;
    assert_eq!(decoded, value);
    Ok(())
}

#[test]
fn roundtrip_null() -> Result<()> {
    assert_roundtrip(Variant::Null)
}

#[test]
fn roundtrip_primitives() -> Result<()> {
    assert_roundtrip(Variant::Byte(-7))?;
    assert_roundtrip(Variant::Short(-30_000))?;
    assert_roundtrip(Variant::Int(123_456_789))?;
    assert_roundtrip(Variant::Long(-9_007_199_254_740_993))?;
    assert_roundtrip(Variant::Float(3.5))?;
    assert_roundtrip(Variant::Double(-2.25e300))?;
    assert_roundtrip(Variant::Char(0x30C4))?;
    assert_roundtrip(Variant::Bool(true))?;
    assert_roundtrip(Variant::Bool(false))
}

#[test]
fn roundtrip_floats_bitwise() -> Result<()> {
    // NaN payloads and signed zeros must survive byte-identically.
    assert_roundtrip(Variant::Float(f32::NAN))?;
    assert_roundtrip(Variant::Float(-0.0))?;
    assert_roundtrip(Variant::Double(f64::NAN))?;
    assert_roundtrip(Variant::Double(-0.0))?;
    assert_roundtrip(Variant::FloatArr(vec![f32::INFINITY, f32::NAN, -0.0]))?;
    assert_roundtrip(Variant::DoubleArr(vec![f64::NEG_INFINITY, f64::NAN]))
}

#[test]
fn roundtrip_strings() -> Result<()> {
    assert_roundtrip(Variant::Str(String::new()))?;
    assert_roundtrip(Variant::Str("grid node / кластер / ノード".into()))?;
    let wide: Vec<u16> = "portable".encode_utf16().collect();
    assert_roundtrip(Variant::WideStr(wide))?;
    assert_roundtrip(Variant::WideStr(Vec::new()))
}

#[test]
fn roundtrip_uuid() -> Result<()> {
    assert_roundtrip(Variant::Uuid(Uuid::from_u64_pair(
        0x0123_4567_89AB_CDEF,
        0xFEDC_BA98_7654_3210,
    )))
}

#[test]
fn roundtrip_arrays() -> Result<()> {
    assert_roundtrip(Variant::ByteArr(vec![-1, 0, 1, 127, -128]))?;
    assert_roundtrip(Variant::ShortArr(vec![-2, 0, 2, i16::MAX]))?;
    assert_roundtrip(Variant::IntArr(vec![i32::MIN, -1, 0, 1, i32::MAX]))?;
    assert_roundtrip(Variant::LongArr(vec![i64::MIN, 0, i64::MAX]))?;
    assert_roundtrip(Variant::FloatArr(vec![1.0, -2.5, 0.125]))?;
    assert_roundtrip(Variant::DoubleArr(vec![6.02e23, -1.0]))?;
    assert_roundtrip(Variant::CharArr(vec![0, 0xFFFF, 0x1234]))?;
    assert_roundtrip(Variant::BoolArr(vec![true, false, true, true]))?;
    assert_roundtrip(Variant::IntArr(Vec::new()))
}

#[test]
fn roundtrip_sequences() -> Result<()> {
    assert_roundtrip(Variant::StrSeq(vec![
        "alpha".into(),
        String::new(),
        "gamma".into(),
    ]))?;
    assert_roundtrip(Variant::UuidSeq(vec![
        Uuid::from_u64_pair(1, 2),
        Uuid::from_u64_pair(u64::MAX, 0),
    ]))
}

#[test]
fn roundtrip_collection() -> Result<()> {
    assert_roundtrip(Variant::Collection(vec![
        Variant::Int(1),
        Variant::Str("two".into()),
        Variant::Null,
        Variant::Collection(vec![Variant::Bool(true)]),
    ]))
}

#[test]
fn roundtrip_map() -> Result<()> {
    let mut map = HashMap::new();
    map.insert(Variant::Str("reads".into()), Variant::Long(1024));
    map.insert(Variant::Str("writes".into()), Variant::Long(512));
    map.insert(Variant::Int(3), Variant::Collection(vec![Variant::Byte(9)]));
    assert_roundtrip(Variant::Map(map))
}

#[test]
fn roundtrip_nested_map_keys() -> Result<()> {
    // A map is itself hashable, so it can key another map.
    let mut inner = HashMap::new();
    inner.insert(Variant::Int(1), Variant::Bool(true));
    let mut outer = HashMap::new();
    outer.insert(Variant::Map(inner), Variant::Str("nested".into()));
    assert_roundtrip(Variant::Map(outer))
}

#[test]
fn roundtrip_record() -> Result<()> {
    let marshaller = Marshaller::with_registry(node_registry());
    let bean = NodeBean {
        id: 42,
        name: "grid-node-7".into(),
        load: 0.75,
    };
    let bytes = marshaller.marshal_record(&PortableRef::new(bean.clone()))?;
    let record = marshaller.unmarshal_record(&bytes)?;

    assert_eq!(record.type_id(), NODE_BEAN_TYPE_ID);
    let decoded = record.downcast::<NodeBean>().expect("concrete type");
    assert_eq!(decoded, &bean);
    Ok(())
}

#[test]
fn roundtrip_record_inside_collection() -> Result<()> {
    let marshaller = Marshaller::with_registry(node_registry());
    let bean = PortableRef::new(NodeBean {
        id: 1,
        name: "n".into(),
        load: 1.0,
    });
    let bytes = marshaller.marshal(&Variant::Collection(vec![
        Variant::Int(5),
        Variant::Portable(bean),
    ]))?;
    let decoded = marshaller.unmarshal(&bytes)?;

    let items = decoded.as_collection().expect("collection");
    assert_eq!(items[0], Variant::Int(5));
    let record = items[1].as_portable().expect("record");
    assert_eq!(record.downcast::<NodeBean>().expect("concrete").id, 1);
    Ok(())
}

#[test]
fn record_raw_tail_roundtrip() -> Result<()> {
    // A record mixing named fields with a raw sequential tail.
    #[derive(Debug, PartialEq, Clone)]
    struct MetricsBean {
        node: String,
        samples: Vec<i64>,
        healthy: bool,
    }

    impl Portable for MetricsBean {
        fn type_id(&self) -> i32 {
            8
        }

        fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()> {
            writer.write_string("node", &self.node)?;
            let mut raw = writer.raw_writer()?;
            raw.write_long_arr(&self.samples);
            raw.write_bool(self.healthy);
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn metrics_factory(reader: &mut PortableReader<'_, '_>) -> Result<PortableRef> {
        let node = reader.read_string("node")?.unwrap_or_default();
        let mut raw = reader.raw_reader();
        let samples = raw.read_long_arr()?.unwrap_or_default();
        let healthy = raw.read_bool()?;
        Ok(PortableRef::new(MetricsBean {
            node,
            samples,
            healthy,
        }))
    }

    let mut registry = TypeRegistry::new();
    registry.register(8, metrics_factory);
    let marshaller = Marshaller::with_registry(Arc::new(registry));

    let bean = MetricsBean {
        node: "node-3".into(),
        samples: vec![10, -20, 30],
        healthy: true,
    };
    let bytes = marshaller.marshal_record(&PortableRef::new(bean.clone()))?;
    let record = marshaller.unmarshal_record(&bytes)?;
    assert_eq!(record.downcast::<MetricsBean>().expect("concrete"), &bean);
    Ok(())
}
