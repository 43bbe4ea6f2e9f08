#![allow(missing_docs)]

//! Frame-level properties: header layout, backpatching, endianness, field
//! order independence, raw-mode lockout, and bounds safety.

use std::any::Any;
use std::sync::Arc;

use gridport::format::{
    FLAG_HANDLE, FLAG_METADATA, FLAG_NULL, FLAG_OBJECT, HEADER_SIZE, RAW_OFFSET_OFFSET,
    TOTAL_LENGTH_OFFSET, TYPE_INT,
};
use gridport::{
    GridportError, Marshaller, Portable, PortableReader, PortableRef, PortableWriter, Result,
    TypeRegistry, Variant,
};

fn i32_at(bytes: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

#[test]
fn int_frame_layout() -> Result<()> {
    // Marshalling 42 as a standalone value: OBJECT flag, standard int frame,
    // 18-byte header plus 4-byte payload.
    let bytes = Marshaller::new().marshal(&Variant::Int(42))?;

    assert_eq!(bytes.len(), 22);
    assert_eq!(bytes[0], FLAG_OBJECT);
    assert_eq!(bytes[1], 0); // not a user type
    assert_eq!(i32_at(&bytes, 2), TYPE_INT as i32);
    assert_eq!(i32_at(&bytes, TOTAL_LENGTH_OFFSET), 22);
    assert_eq!(i32_at(&bytes, RAW_OFFSET_OFFSET), 0);
    assert_eq!(&bytes[18..], &[42, 0, 0, 0]);

    assert_eq!(Marshaller::new().unmarshal(&bytes)?, Variant::Int(42));
    Ok(())
}

#[test]
fn little_endian_invariant() -> Result<()> {
    let bytes = Marshaller::new().marshal(&Variant::Int(1))?;
    assert_eq!(&bytes[18..], &[0x01, 0x00, 0x00, 0x00]);
    Ok(())
}

#[test]
fn null_frame_is_one_byte() -> Result<()> {
    let bytes = Marshaller::new().marshal(&Variant::Null)?;
    assert_eq!(bytes, vec![FLAG_NULL]);
    Ok(())
}

// A record with two named fields and a two-value raw tail, used by the
// backpatch and lockout tests.
#[derive(Debug, PartialEq, Clone)]
struct TaskResult {
    task: String,
    code: i32,
    started: i64,
    finished: i64,
}

const TASK_RESULT_TYPE_ID: i32 = 11;

impl Portable for TaskResult {
    fn type_id(&self) -> i32 {
        TASK_RESULT_TYPE_ID
    }

    fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()> {
        writer.write_string("task", &self.task)?;
        writer.write_int("code", self.code)?;
        let mut raw = writer.raw_writer()?;
        raw.write_long(self.started);
        raw.write_long(self.finished);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn task_result_factory(reader: &mut PortableReader<'_, '_>) -> Result<PortableRef> {
    let task = reader.read_string("task")?.unwrap_or_default();
    let code = reader.read_int("code")?;
    let mut raw = reader.raw_reader();
    let started = raw.read_long()?;
    let finished = raw.read_long()?;
    Ok(PortableRef::new(TaskResult {
        task,
        code,
        started,
        finished,
    }))
}

fn task_registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry.register(TASK_RESULT_TYPE_ID, task_result_factory);
    Arc::new(registry)
}

#[test]
fn backpatch_correctness() -> Result<()> {
    let marshaller = Marshaller::with_registry(task_registry());
    let bean = TaskResult {
        task: "rebalance".into(),
        code: -3,
        started: 1_000,
        finished: 2_000,
    };
    let bytes = marshaller.marshal_record(&PortableRef::new(bean.clone()))?;

    // totalLength spans the whole frame.
    assert_eq!(i32_at(&bytes, TOTAL_LENGTH_OFFSET) as usize, bytes.len());
    assert_eq!(bytes[0], FLAG_OBJECT);
    assert_eq!(bytes[1], 1); // user type
    assert_eq!(i32_at(&bytes, 2), TASK_RESULT_TYPE_ID);

    // rawDataOffset points at the first raw byte: the tail is exactly two
    // little-endian i64 values.
    let raw_off = i32_at(&bytes, RAW_OFFSET_OFFSET) as usize;
    assert_eq!(raw_off, bytes.len() - 16);
    assert!(raw_off >= HEADER_SIZE);
    assert_eq!(&bytes[raw_off..raw_off + 8], &1_000i64.to_le_bytes());
    assert_eq!(&bytes[raw_off + 8..], &2_000i64.to_le_bytes());

    let record = marshaller.unmarshal_record(&bytes)?;
    assert_eq!(record.downcast::<TaskResult>().expect("concrete"), &bean);
    Ok(())
}

#[test]
fn raw_mode_locks_out_named_fields() {
    #[derive(Debug)]
    struct RawThenNamed;

    impl Portable for RawThenNamed {
        fn type_id(&self) -> i32 {
            12
        }

        fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()> {
            writer.raw_writer()?.write_int(1);
            writer.write_int("late", 2)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    let err = Marshaller::new()
        .marshal_record(&PortableRef::new(RawThenNamed))
        .expect_err("named write after raw switch must fail");
    assert!(matches!(err, GridportError::ProtocolViolation(_)));
}

#[test]
fn switch_to_raw_is_idempotent() -> Result<()> {
    #[derive(Debug)]
    struct DoubleSwitch;

    impl Portable for DoubleSwitch {
        fn type_id(&self) -> i32 {
            13
        }

        fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()> {
            writer.write_int("n", 9)?;
            writer.raw_writer()?.write_int(1);
            writer.raw_writer()?.write_int(2);
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    let bytes = Marshaller::new().marshal_record(&PortableRef::new(DoubleSwitch))?;
    // The raw offset was patched once: it points before both raw ints.
    let raw_off = i32_at(&bytes, RAW_OFFSET_OFFSET) as usize;
    assert_eq!(raw_off, bytes.len() - 8);
    Ok(())
}

// Field order independence: two record types emit the same fields in
// different orders; one factory reads them by name in a third order.
#[derive(Debug)]
struct ForwardOrder;
#[derive(Debug)]
struct ReverseOrder;

const ORDERED_TYPE_ID: i32 = 14;

impl Portable for ForwardOrder {
    fn type_id(&self) -> i32 {
        ORDERED_TYPE_ID
    }

    fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()> {
        writer.write_int("a", 1)?;
        writer.write_string("b", "two")?;
        writer.write_bool("c", true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Portable for ReverseOrder {
    fn type_id(&self) -> i32 {
        ORDERED_TYPE_ID
    }

    fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()> {
        writer.write_bool("c", true)?;
        writer.write_string("b", "two")?;
        writer.write_int("a", 1)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, PartialEq)]
struct OrderedView {
    a: i32,
    b: Option<String>,
    c: bool,
}

impl Portable for OrderedView {
    fn type_id(&self) -> i32 {
        ORDERED_TYPE_ID
    }

    fn write_fields(&self, _writer: &mut PortableWriter<'_>) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn ordered_factory(reader: &mut PortableReader<'_, '_>) -> Result<PortableRef> {
    // Deliberately reads b, then a, then c.
    let b = reader.read_string("b")?;
    let a = reader.read_int("a")?;
    let c = reader.read_bool("c")?;
    Ok(PortableRef::new(OrderedView { a, b, c }))
}

#[test]
fn field_order_independence() -> Result<()> {
    let mut registry = TypeRegistry::new();
    registry.register(ORDERED_TYPE_ID, ordered_factory);
    let marshaller = Marshaller::with_registry(Arc::new(registry));

    let expected = OrderedView {
        a: 1,
        b: Some("two".into()),
        c: true,
    };

    for bytes in [
        marshaller.marshal_record(&PortableRef::new(ForwardOrder))?,
        marshaller.marshal_record(&PortableRef::new(ReverseOrder))?,
    ] {
        let record = marshaller.unmarshal_record(&bytes)?;
        assert_eq!(record.downcast::<OrderedView>().expect("concrete"), &expected);
    }
    Ok(())
}

#[test]
fn absent_field_yields_default() -> Result<()> {
    #[derive(Debug)]
    struct Sparse;

    impl Portable for Sparse {
        fn type_id(&self) -> i32 {
            15
        }

        fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()> {
            writer.write_int("present", 5)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct SparseView {
        present: i32,
        missing_int: i32,
        missing_str: Option<String>,
    }

    impl Portable for SparseView {
        fn type_id(&self) -> i32 {
            15
        }

        fn write_fields(&self, _writer: &mut PortableWriter<'_>) -> Result<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn sparse_factory(reader: &mut PortableReader<'_, '_>) -> Result<PortableRef> {
        Ok(PortableRef::new(SparseView {
            present: reader.read_int("present")?,
            missing_int: reader.read_int("nope")?,
            missing_str: reader.read_string("also_nope")?,
        }))
    }

    let mut registry = TypeRegistry::new();
    registry.register(15, sparse_factory);
    let marshaller = Marshaller::with_registry(Arc::new(registry));

    let bytes = marshaller.marshal_record(&PortableRef::new(Sparse))?;
    let record = marshaller.unmarshal_record(&bytes)?;
    let view = record.downcast::<SparseView>().expect("concrete");
    assert_eq!(view.present, 5);
    assert_eq!(view.missing_int, 0);
    assert_eq!(view.missing_str, None);
    Ok(())
}

#[test]
fn type_mismatch_is_detected() {
    fn mismatched_factory(reader: &mut PortableReader<'_, '_>) -> Result<PortableRef> {
        reader.read_string("code")?; // stored as an int
        Ok(PortableRef::new(ForwardOrder))
    }

    #[derive(Debug)]
    struct IntField;

    impl Portable for IntField {
        fn type_id(&self) -> i32 {
            16
        }

        fn write_fields(&self, writer: &mut PortableWriter<'_>) -> Result<()> {
            writer.write_int("code", 200)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    let mut registry = TypeRegistry::new();
    registry.register(16, mismatched_factory);
    let marshaller = Marshaller::with_registry(Arc::new(registry));

    let bytes = marshaller
        .marshal_record(&PortableRef::new(IntField))
        .expect("marshal");
    let err = marshaller.unmarshal(&bytes).expect_err("mismatched read");
    assert!(matches!(err, GridportError::TypeMismatch { .. }));
}

#[test]
fn truncated_buffer_is_an_underrun() -> Result<()> {
    let bytes = Marshaller::new().marshal(&Variant::Int(42))?;

    // Cut mid-payload and mid-header.
    for cut in [20, 10, 3] {
        let err = Marshaller::new()
            .unmarshal(&bytes[..cut])
            .expect_err("truncated input must fail");
        assert!(
            matches!(err, GridportError::BufferUnderrun { .. }),
            "cut at {cut}: {err}"
        );
    }

    let err = Marshaller::new().unmarshal(&[]).expect_err("empty input");
    assert!(matches!(err, GridportError::BufferUnderrun { .. }));
    Ok(())
}

#[test]
fn unknown_flags_are_rejected() {
    let err = Marshaller::new()
        .unmarshal(&[FLAG_METADATA])
        .expect_err("metadata frames are unsupported");
    assert!(matches!(err, GridportError::UnknownVariantKind(_)));

    // A handle stub pointing nowhere.
    let err = Marshaller::new()
        .unmarshal(&[FLAG_HANDLE, 0, 0, 0, 0])
        .expect_err("dangling handle");
    assert!(matches!(err, GridportError::InvalidHandle(0)));
}

#[test]
fn unknown_type_id_is_rejected() -> Result<()> {
    // A registry-backed unmarshal of a type nobody registered.
    let marshaller = Marshaller::with_registry(Arc::new(TypeRegistry::new()));
    let bytes = Marshaller::new().marshal_record(&PortableRef::new(ForwardOrder))?;
    let err = marshaller.unmarshal(&bytes).expect_err("unregistered type");
    assert_eq!(err, GridportError::UnknownTypeId(ORDERED_TYPE_ID));
    Ok(())
}
