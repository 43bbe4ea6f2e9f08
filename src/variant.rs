//! The closed tagged union carried across the codec boundary.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use twox_hash::XxHash32;
use uuid::Uuid;

use crate::portable::{PortableObject, PortableRef};

/// Any value the portable codec can encode. Exactly one payload kind is
/// active per instance; [`Variant::Null`] represents absence.
///
/// Variants are value types (equality and hashing are over payload content,
/// bitwise for floats) except [`Variant::Portable`], which is
/// identity-bearing: its identity token participates in equality, hashing,
/// and shared-reference deduplication.
#[derive(Debug, Clone, Default)]
pub enum Variant {
    /// No value.
    #[default]
    Null,
    /// A signed byte.
    Byte(i8),
    /// A 16-bit signed integer.
    Short(i16),
    /// A 32-bit signed integer.
    Int(i32),
    /// A 64-bit signed integer.
    Long(i64),
    /// A 32-bit float.
    Float(f32),
    /// A 64-bit float.
    Double(f64),
    /// A UTF-16 code unit.
    Char(u16),
    /// A boolean.
    Bool(bool),
    /// A UTF-8 string.
    Str(String),
    /// A wide string: UTF-16 code units, length-prefixed by unit count.
    WideStr(Vec<u16>),
    /// A 128-bit UUID.
    Uuid(Uuid),
    /// A byte array.
    ByteArr(Vec<i8>),
    /// An i16 array.
    ShortArr(Vec<i16>),
    /// An i32 array.
    IntArr(Vec<i32>),
    /// An i64 array.
    LongArr(Vec<i64>),
    /// An f32 array.
    FloatArr(Vec<f32>),
    /// An f64 array.
    DoubleArr(Vec<f64>),
    /// A UTF-16 code-unit array.
    CharArr(Vec<u16>),
    /// A bool array (one byte per element on the wire).
    BoolArr(Vec<bool>),
    /// A string sequence.
    StrSeq(Vec<String>),
    /// A UUID sequence.
    UuidSeq(Vec<Uuid>),
    /// An ordered collection of variants.
    Collection(Vec<Variant>),
    /// A variant-to-variant mapping with unique keys.
    Map(HashMap<Variant, Variant>),
    /// A reference to a user record instance.
    Portable(PortableRef),
    /// An opaque pre-serialized record frame.
    Blob(PortableObject),
}

// Hash discriminants. Wire type codes where one exists; the rest are local.
const KIND_NULL: u8 = 0;
const KIND_PORTABLE: u8 = 251;
const KIND_BLOB: u8 = 252;

impl Variant {
    /// Returns true if no payload kind is active.
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// The i32 payload, if that kind is active.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Variant::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The i64 payload, if that kind is active.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Variant::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// The bool payload, if that kind is active.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The string payload, if that kind is active.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(v) => Some(v),
            _ => None,
        }
    }

    /// The record reference, if that kind is active.
    pub fn as_portable(&self) -> Option<&PortableRef> {
        match self {
            Variant::Portable(v) => Some(v),
            _ => None,
        }
    }

    /// The pre-serialized record blob, if that kind is active.
    pub fn as_blob(&self) -> Option<&PortableObject> {
        match self {
            Variant::Blob(v) => Some(v),
            _ => None,
        }
    }

    /// The collection payload, if that kind is active.
    pub fn as_collection(&self) -> Option<&[Variant]> {
        match self {
            Variant::Collection(v) => Some(v),
            _ => None,
        }
    }

    /// The map payload, if that kind is active.
    pub fn as_map(&self) -> Option<&HashMap<Variant, Variant>> {
        match self {
            Variant::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Deterministic content hash written into standard-kind frame headers.
    ///
    /// A pure function of the payload: stable across processes and across
    /// encode/decode. Record kinds hash to zero; their headers do not carry
    /// content hashes.
    pub fn content_hash(&self) -> i32 {
        match self {
            Variant::Portable(_) | Variant::Blob(_) => 0,
            _ => {
                let mut hasher = XxHash32::with_seed(0);
                self.hash(&mut hasher);
                hasher.finish() as i32
            }
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        use Variant::*;
        match (self, other) {
            (Null, Null) => true,
            (Byte(a), Byte(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            // Floats compare bitwise: NaNs with equal bits are equal and
            // +0.0 != -0.0, matching the wire payload comparison.
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Char(a), Char(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (WideStr(a), WideStr(b)) => a == b,
            (Uuid(a), Uuid(b)) => a == b,
            (ByteArr(a), ByteArr(b)) => a == b,
            (ShortArr(a), ShortArr(b)) => a == b,
            (IntArr(a), IntArr(b)) => a == b,
            (LongArr(a), LongArr(b)) => a == b,
            (FloatArr(a), FloatArr(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (DoubleArr(a), DoubleArr(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (CharArr(a), CharArr(b)) => a == b,
            (BoolArr(a), BoolArr(b)) => a == b,
            (StrSeq(a), StrSeq(b)) => a == b,
            (UuidSeq(a), UuidSeq(b)) => a == b,
            (Collection(a), Collection(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Portable(a), Portable(b)) => a.identity() == b.identity(),
            (Blob(a), Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Variant {}

impl Hash for Variant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use crate::format::*;
        match self {
            Variant::Null => state.write_u8(KIND_NULL),
            Variant::Byte(v) => {
                state.write_u8(TYPE_BYTE);
                state.write_i8(*v);
            }
            Variant::Short(v) => {
                state.write_u8(TYPE_SHORT);
                state.write_i16(*v);
            }
            Variant::Int(v) => {
                state.write_u8(TYPE_INT);
                state.write_i32(*v);
            }
            Variant::Long(v) => {
                state.write_u8(TYPE_LONG);
                state.write_i64(*v);
            }
            Variant::Float(v) => {
                state.write_u8(TYPE_FLOAT);
                state.write_u32(v.to_bits());
            }
            Variant::Double(v) => {
                state.write_u8(TYPE_DOUBLE);
                state.write_u64(v.to_bits());
            }
            Variant::Char(v) => {
                state.write_u8(TYPE_CHAR);
                state.write_u16(*v);
            }
            Variant::Bool(v) => {
                state.write_u8(TYPE_BOOL);
                state.write_u8(u8::from(*v));
            }
            Variant::Str(v) => {
                state.write_u8(TYPE_STRING);
                state.write(v.as_bytes());
                state.write_usize(v.len());
            }
            Variant::WideStr(v) => {
                state.write_u8(TYPE_WSTRING);
                for unit in v {
                    state.write_u16(*unit);
                }
                state.write_usize(v.len());
            }
            Variant::Uuid(v) => {
                state.write_u8(TYPE_UUID);
                state.write_u128(v.as_u128());
            }
            Variant::ByteArr(v) => {
                state.write_u8(TYPE_BYTE_ARR);
                for b in v {
                    state.write_i8(*b);
                }
                state.write_usize(v.len());
            }
            Variant::ShortArr(v) => {
                state.write_u8(TYPE_SHORT_ARR);
                for x in v {
                    state.write_i16(*x);
                }
                state.write_usize(v.len());
            }
            Variant::IntArr(v) => {
                state.write_u8(TYPE_INT_ARR);
                for x in v {
                    state.write_i32(*x);
                }
                state.write_usize(v.len());
            }
            Variant::LongArr(v) => {
                state.write_u8(TYPE_LONG_ARR);
                for x in v {
                    state.write_i64(*x);
                }
                state.write_usize(v.len());
            }
            Variant::FloatArr(v) => {
                state.write_u8(TYPE_FLOAT_ARR);
                for x in v {
                    state.write_u32(x.to_bits());
                }
                state.write_usize(v.len());
            }
            Variant::DoubleArr(v) => {
                state.write_u8(TYPE_DOUBLE_ARR);
                for x in v {
                    state.write_u64(x.to_bits());
                }
                state.write_usize(v.len());
            }
            Variant::CharArr(v) => {
                state.write_u8(TYPE_CHAR_ARR);
                for x in v {
                    state.write_u16(*x);
                }
                state.write_usize(v.len());
            }
            Variant::BoolArr(v) => {
                state.write_u8(TYPE_BOOL_ARR);
                for x in v {
                    state.write_u8(u8::from(*x));
                }
                state.write_usize(v.len());
            }
            Variant::StrSeq(v) => {
                state.write_u8(TYPE_STRING_ARR);
                for s in v {
                    state.write(s.as_bytes());
                    state.write_usize(s.len());
                }
                state.write_usize(v.len());
            }
            Variant::UuidSeq(v) => {
                state.write_u8(TYPE_UUID_ARR);
                for u in v {
                    state.write_u128(u.as_u128());
                }
                state.write_usize(v.len());
            }
            Variant::Collection(v) => {
                state.write_u8(TYPE_COLLECTION);
                for item in v {
                    item.hash(state);
                }
                state.write_usize(v.len());
            }
            Variant::Map(m) => {
                // Entry order in a hash map is arbitrary, so the map hash is
                // an order-independent aggregate of per-entry hashes.
                state.write_u8(TYPE_MAP);
                state.write_usize(m.len());
                let mut acc: u64 = 0;
                for (k, v) in m {
                    let mut entry = XxHash32::with_seed(0);
                    k.hash(&mut entry);
                    v.hash(&mut entry);
                    acc = acc.wrapping_add(entry.finish());
                }
                state.write_u64(acc);
            }
            Variant::Portable(r) => {
                state.write_u8(KIND_PORTABLE);
                state.write_u64(r.identity());
            }
            Variant::Blob(b) => {
                state.write_u8(KIND_BLOB);
                state.write(b.bytes());
            }
        }
    }
}

impl From<i8> for Variant {
    fn from(v: i8) -> Self {
        Variant::Byte(v)
    }
}

impl From<i16> for Variant {
    fn from(v: i16) -> Self {
        Variant::Short(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Long(v)
    }
}

impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Variant::Float(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::Str(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::Str(v.to_owned())
    }
}

impl From<Uuid> for Variant {
    fn from(v: Uuid) -> Self {
        Variant::Uuid(v)
    }
}

impl From<PortableRef> for Variant {
    fn from(v: PortableRef) -> Self {
        Variant::Portable(v)
    }
}

impl From<PortableObject> for Variant {
    fn from(v: PortableObject) -> Self {
        Variant::Blob(v)
    }
}
