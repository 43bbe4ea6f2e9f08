//! The decode engine: lazy named-field indexing, variant decoding, raw-region
//! cursors, and shared-reference resolution.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::constants::READ_HANDLE_CAPACITY;
use crate::error::{GridportError, Result};
use crate::format::{
    FrameHeader, FLAG_HANDLE, FLAG_METADATA, FLAG_NULL, FLAG_OBJECT, HEADER_SIZE, TYPE_BOOL,
    TYPE_BOOL_ARR, TYPE_BYTE, TYPE_BYTE_ARR, TYPE_CHAR, TYPE_CHAR_ARR, TYPE_COLLECTION,
    TYPE_DOUBLE, TYPE_DOUBLE_ARR, TYPE_FLOAT, TYPE_FLOAT_ARR, TYPE_INT, TYPE_INT_ARR, TYPE_LONG,
    TYPE_LONG_ARR, TYPE_MAP, TYPE_SHORT, TYPE_SHORT_ARR, TYPE_STRING, TYPE_STRING_ARR, TYPE_UUID,
    TYPE_UUID_ARR, TYPE_WSTRING,
};
use crate::format::field_name_hash;
use crate::handles::ReadHandleTable;
use crate::io::ByteCursor;
use crate::portable::PortableObject;
use crate::registry::{IdResolver, TypeRegistry};
use crate::variant::Variant;

/// Per-call read state: the input cursor, the handle registry, the optional
/// field-id resolver, and the optional type registry. Lives for exactly one
/// unmarshal call.
pub struct ReadContext<'buf> {
    pub(crate) input: ByteCursor<'buf>,
    pub(crate) handles: ReadHandleTable,
    pub(crate) id_resolver: Option<Arc<dyn IdResolver>>,
    pub(crate) registry: Option<Arc<TypeRegistry>>,
}

impl<'buf> ReadContext<'buf> {
    /// Creates a fresh context over the input bytes.
    ///
    /// With a registry, user frames materialize through their registered
    /// factories; without one, they decode as schema-less
    /// [`PortableObject`] blobs.
    pub fn new(
        bytes: &'buf [u8],
        id_resolver: Option<Arc<dyn IdResolver>>,
        registry: Option<Arc<TypeRegistry>>,
    ) -> Self {
        Self {
            input: ByteCursor::new(bytes),
            handles: ReadHandleTable::with_capacity(READ_HANDLE_CAPACITY),
            id_resolver,
            registry,
        }
    }
}

/// Reads one frame: random-access named fields plus a sequential raw tail.
///
/// Named-field access builds a fieldId-to-offset index lazily, with a single
/// scan of the frame's own named region (never past it). An absent field is
/// not an error: typed reads yield the kind's default without consuming
/// bytes. Raw reads advance a separate cursor seeded from the frame's
/// raw-data offset and never cross the frame end.
pub struct PortableReader<'r, 'buf> {
    ctx: &'r mut ReadContext<'buf>,
    frame_start: usize,
    type_id: i32,
    frame_end: usize,
    raw_rel: usize,
    raw_pos: usize,
    field_offs: HashMap<i32, usize>,
    index_built: bool,
}

impl<'r, 'buf> PortableReader<'r, 'buf> {
    /// A reader spanning the whole buffer, for one top-level decode. Only the
    /// facade creates these.
    pub(crate) fn root(ctx: &'r mut ReadContext<'buf>) -> Self {
        let end = ctx.input.len();
        Self {
            ctx,
            frame_start: 0,
            type_id: 0,
            frame_end: end,
            raw_rel: 0,
            raw_pos: end,
            field_offs: HashMap::new(),
            index_built: false,
        }
    }

    /// A reader scoped to the OBJECT frame starting at `frame_start`.
    pub fn at_frame(ctx: &'r mut ReadContext<'buf>, frame_start: usize) -> Result<Self> {
        let header = FrameHeader::read_at(&ctx.input, frame_start)?;
        let frame_end = header.frame_end(frame_start);
        let raw_rel = header.raw_offset as usize;
        let raw_pos = if raw_rel > 0 {
            frame_start + raw_rel
        } else {
            frame_end
        };
        Ok(Self {
            ctx,
            frame_start,
            type_id: header.type_id,
            frame_end,
            raw_rel,
            raw_pos,
            field_offs: HashMap::new(),
            index_built: false,
        })
    }

    /// The type id of the record owning the current frame.
    pub fn frame_type_id(&self) -> i32 {
        self.type_id
    }

    fn field_id(&self, field_name: &str) -> i32 {
        if let Some(resolver) = &self.ctx.id_resolver {
            if let Some(id) = resolver.field_id(self.type_id, field_name) {
                return id;
            }
        }
        field_name_hash(field_name)
    }

    /// One-time scan of this frame's named region, recording each field's
    /// payload offset. Stops at the raw region (or the frame end when no raw
    /// region exists), never past it.
    fn build_index(&mut self) -> Result<()> {
        let scan_end = if self.raw_rel > 0 {
            self.frame_start + self.raw_rel
        } else {
            self.frame_end
        };
        let mut off = self.frame_start + HEADER_SIZE;
        while off + 8 <= scan_end {
            let id = self.ctx.input.i32_at(off)?;
            let len = self.ctx.input.i32_at(off + 4)?;
            if len < 0 {
                return Err(GridportError::ProtocolViolation(format!(
                    "field {id} declares negative length {len}"
                )));
            }
            let payload = off + 8;
            let next = payload + len as usize;
            if next > scan_end {
                return Err(GridportError::BufferUnderrun {
                    offset: payload,
                    wanted: len as usize,
                    available: scan_end - payload,
                });
            }
            self.field_offs.insert(id, payload);
            off = next;
        }
        self.index_built = true;
        Ok(())
    }

    /// Payload offset of a field by id, or the not-found sentinel `None`.
    fn field_offset(&mut self, id: i32) -> Result<Option<usize>> {
        if !self.index_built {
            self.build_index()?;
        }
        Ok(self.field_offs.get(&id).copied())
    }

    /// Resolves a typed field's payload start (past the code byte), checking
    /// the stored code. Absent fields and null payloads yield `None`.
    fn named_payload(&mut self, field_name: &str, expected: u8) -> Result<Option<usize>> {
        let id = self.field_id(field_name);
        let Some(payload) = self.field_offset(id)? else {
            return Ok(None);
        };
        let code = self.ctx.input.u8_at(payload)?;
        if code == FLAG_NULL {
            return Ok(None);
        }
        if code != expected {
            return Err(GridportError::TypeMismatch {
                expected,
                found: code,
            });
        }
        Ok(Some(payload + 1))
    }

    // --- Typed named reads. Absent fields yield the kind's default.

    /// Reads a named signed-byte field (default 0).
    pub fn read_byte(&mut self, field_name: &str) -> Result<i8> {
        match self.named_payload(field_name, TYPE_BYTE)? {
            Some(p) => self.ctx.input.i8_at(p),
            None => Ok(0),
        }
    }

    /// Reads a named i16 field (default 0).
    pub fn read_short(&mut self, field_name: &str) -> Result<i16> {
        match self.named_payload(field_name, TYPE_SHORT)? {
            Some(p) => self.ctx.input.i16_at(p),
            None => Ok(0),
        }
    }

    /// Reads a named i32 field (default 0).
    pub fn read_int(&mut self, field_name: &str) -> Result<i32> {
        match self.named_payload(field_name, TYPE_INT)? {
            Some(p) => self.ctx.input.i32_at(p),
            None => Ok(0),
        }
    }

    /// Reads a named i64 field (default 0).
    pub fn read_long(&mut self, field_name: &str) -> Result<i64> {
        match self.named_payload(field_name, TYPE_LONG)? {
            Some(p) => self.ctx.input.i64_at(p),
            None => Ok(0),
        }
    }

    /// Reads a named f32 field (default 0.0).
    pub fn read_float(&mut self, field_name: &str) -> Result<f32> {
        match self.named_payload(field_name, TYPE_FLOAT)? {
            Some(p) => self.ctx.input.f32_at(p),
            None => Ok(0.0),
        }
    }

    /// Reads a named f64 field (default 0.0).
    pub fn read_double(&mut self, field_name: &str) -> Result<f64> {
        match self.named_payload(field_name, TYPE_DOUBLE)? {
            Some(p) => self.ctx.input.f64_at(p),
            None => Ok(0.0),
        }
    }

    /// Reads a named UTF-16 code-unit field (default 0).
    pub fn read_char(&mut self, field_name: &str) -> Result<u16> {
        match self.named_payload(field_name, TYPE_CHAR)? {
            Some(p) => self.ctx.input.u16_at(p),
            None => Ok(0),
        }
    }

    /// Reads a named bool field (default false).
    pub fn read_bool(&mut self, field_name: &str) -> Result<bool> {
        match self.named_payload(field_name, TYPE_BOOL)? {
            Some(p) => self.ctx.input.bool_at(p),
            None => Ok(false),
        }
    }

    /// Reads a named string field (`None` when absent or null).
    pub fn read_string(&mut self, field_name: &str) -> Result<Option<String>> {
        match self.named_payload(field_name, TYPE_STRING)? {
            Some(p) => Ok(self.decode_str_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named wide-string field (`None` when absent or null).
    pub fn read_wstring(&mut self, field_name: &str) -> Result<Option<Vec<u16>>> {
        match self.named_payload(field_name, TYPE_WSTRING)? {
            Some(p) => Ok(self.decode_u16s_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named UUID field (`None` when absent or null).
    pub fn read_uuid(&mut self, field_name: &str) -> Result<Option<Uuid>> {
        match self.named_payload(field_name, TYPE_UUID)? {
            Some(p) => Ok(self.decode_uuid_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named byte-array field (`None` when absent or null).
    pub fn read_byte_arr(&mut self, field_name: &str) -> Result<Option<Vec<i8>>> {
        match self.named_payload(field_name, TYPE_BYTE_ARR)? {
            Some(p) => Ok(self.decode_byte_arr_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named i16-array field (`None` when absent or null).
    pub fn read_short_arr(&mut self, field_name: &str) -> Result<Option<Vec<i16>>> {
        match self.named_payload(field_name, TYPE_SHORT_ARR)? {
            Some(p) => Ok(self.decode_short_arr_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named i32-array field (`None` when absent or null).
    pub fn read_int_arr(&mut self, field_name: &str) -> Result<Option<Vec<i32>>> {
        match self.named_payload(field_name, TYPE_INT_ARR)? {
            Some(p) => Ok(self.decode_int_arr_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named i64-array field (`None` when absent or null).
    pub fn read_long_arr(&mut self, field_name: &str) -> Result<Option<Vec<i64>>> {
        match self.named_payload(field_name, TYPE_LONG_ARR)? {
            Some(p) => Ok(self.decode_long_arr_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named f32-array field (`None` when absent or null).
    pub fn read_float_arr(&mut self, field_name: &str) -> Result<Option<Vec<f32>>> {
        match self.named_payload(field_name, TYPE_FLOAT_ARR)? {
            Some(p) => Ok(self.decode_float_arr_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named f64-array field (`None` when absent or null).
    pub fn read_double_arr(&mut self, field_name: &str) -> Result<Option<Vec<f64>>> {
        match self.named_payload(field_name, TYPE_DOUBLE_ARR)? {
            Some(p) => Ok(self.decode_double_arr_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named UTF-16 code-unit-array field (`None` when absent or null).
    pub fn read_char_arr(&mut self, field_name: &str) -> Result<Option<Vec<u16>>> {
        match self.named_payload(field_name, TYPE_CHAR_ARR)? {
            Some(p) => Ok(self.decode_u16s_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named bool-array field (`None` when absent or null).
    pub fn read_bool_arr(&mut self, field_name: &str) -> Result<Option<Vec<bool>>> {
        match self.named_payload(field_name, TYPE_BOOL_ARR)? {
            Some(p) => Ok(self.decode_bool_arr_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named string-sequence field (`None` when absent or null).
    pub fn read_str_seq(&mut self, field_name: &str) -> Result<Option<Vec<String>>> {
        match self.named_payload(field_name, TYPE_STRING_ARR)? {
            Some(p) => Ok(self.decode_str_seq_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named UUID-sequence field (`None` when absent or null).
    pub fn read_uuid_seq(&mut self, field_name: &str) -> Result<Option<Vec<Uuid>>> {
        match self.named_payload(field_name, TYPE_UUID_ARR)? {
            Some(p) => Ok(self.decode_uuid_seq_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named variant-collection field (`None` when absent or null).
    pub fn read_collection(&mut self, field_name: &str) -> Result<Option<Vec<Variant>>> {
        match self.named_payload(field_name, TYPE_COLLECTION)? {
            Some(p) => Ok(self.decode_collection_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named variant-map field (`None` when absent or null).
    pub fn read_map(&mut self, field_name: &str) -> Result<Option<HashMap<Variant, Variant>>> {
        match self.named_payload(field_name, TYPE_MAP)? {
            Some(p) => Ok(self.decode_map_at(p)?.0),
            None => Ok(None),
        }
    }

    /// Reads a named field of any kind ([`Variant::Null`] when absent).
    pub fn read_variant(&mut self, field_name: &str) -> Result<Variant> {
        let id = self.field_id(field_name);
        match self.field_offset(id)? {
            Some(payload) => Ok(self.read_variant_at(payload)?.0),
            None => Ok(Variant::Null),
        }
    }

    /// Returns the raw reader for this frame, positioned at the raw region.
    pub fn raw_reader(&mut self) -> PortableRawReader<'_, 'r, 'buf> {
        PortableRawReader { r: self }
    }

    // --- Variant decoding.

    /// Decodes one variant starting at an absolute offset. Returns the value
    /// and the offset just past it.
    pub(crate) fn read_variant_at(&mut self, pos: usize) -> Result<(Variant, usize)> {
        let flag = self.ctx.input.u8_at(pos)?;
        match flag {
            FLAG_NULL => Ok((Variant::Null, pos + 1)),
            FLAG_HANDLE => {
                let handle = self.ctx.input.i32_at(pos + 1)?;
                Ok((self.ctx.handles.get(handle)?, pos + 5))
            }
            FLAG_OBJECT => {
                let header = FrameHeader::read_at(&self.ctx.input, pos)?;
                let end = header.frame_end(pos);
                if header.user_type {
                    // Reserve before the body is read so handle numbering
                    // matches the write side, which assigns before writing.
                    let slot = self.ctx.handles.reserve();
                    let value = if let Some(registry) = self.ctx.registry.clone() {
                        let mut nested = PortableReader::at_frame(&mut *self.ctx, pos)?;
                        let record = registry.create(header.type_id, &mut nested)?;
                        Variant::Portable(record)
                    } else {
                        let bytes = self
                            .ctx
                            .input
                            .bytes_at(pos, header.total_length as usize)?
                            .to_vec();
                        Variant::Blob(PortableObject::new(bytes, self.ctx.id_resolver.clone())?)
                    };
                    self.ctx.handles.fill(slot, value.clone())?;
                    Ok((value, end))
                } else {
                    let code = u8::try_from(header.type_id)
                        .map_err(|_| GridportError::UnknownTypeId(header.type_id))?;
                    let (value, _) = self.decode_standard_at(code, pos + HEADER_SIZE)?;
                    Ok((value, end))
                }
            }
            FLAG_METADATA => Err(GridportError::UnknownVariantKind(
                "metadata frames are not supported".into(),
            )),
            code => {
                // A typed named-field payload: bare code byte plus value.
                self.decode_standard_at(code, pos + 1)
            }
        }
    }

    /// Decodes a standard-kind body. Returns the value and the offset just
    /// past it.
    fn decode_standard_at(&mut self, code: u8, body: usize) -> Result<(Variant, usize)> {
        match code {
            TYPE_BYTE => Ok((Variant::Byte(self.ctx.input.i8_at(body)?), body + 1)),
            TYPE_SHORT => Ok((Variant::Short(self.ctx.input.i16_at(body)?), body + 2)),
            TYPE_INT => Ok((Variant::Int(self.ctx.input.i32_at(body)?), body + 4)),
            TYPE_LONG => Ok((Variant::Long(self.ctx.input.i64_at(body)?), body + 8)),
            TYPE_FLOAT => Ok((Variant::Float(self.ctx.input.f32_at(body)?), body + 4)),
            TYPE_DOUBLE => Ok((Variant::Double(self.ctx.input.f64_at(body)?), body + 8)),
            TYPE_CHAR => Ok((Variant::Char(self.ctx.input.u16_at(body)?), body + 2)),
            TYPE_BOOL => Ok((Variant::Bool(self.ctx.input.bool_at(body)?), body + 1)),
            TYPE_STRING => {
                let (val, end) = self.decode_str_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::Str), end))
            }
            TYPE_WSTRING => {
                let (val, end) = self.decode_u16s_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::WideStr), end))
            }
            TYPE_UUID => {
                let (val, end) = self.decode_uuid_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::Uuid), end))
            }
            TYPE_BYTE_ARR => {
                let (val, end) = self.decode_byte_arr_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::ByteArr), end))
            }
            TYPE_SHORT_ARR => {
                let (val, end) = self.decode_short_arr_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::ShortArr), end))
            }
            TYPE_INT_ARR => {
                let (val, end) = self.decode_int_arr_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::IntArr), end))
            }
            TYPE_LONG_ARR => {
                let (val, end) = self.decode_long_arr_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::LongArr), end))
            }
            TYPE_FLOAT_ARR => {
                let (val, end) = self.decode_float_arr_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::FloatArr), end))
            }
            TYPE_DOUBLE_ARR => {
                let (val, end) = self.decode_double_arr_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::DoubleArr), end))
            }
            TYPE_CHAR_ARR => {
                let (val, end) = self.decode_u16s_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::CharArr), end))
            }
            TYPE_BOOL_ARR => {
                let (val, end) = self.decode_bool_arr_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::BoolArr), end))
            }
            TYPE_STRING_ARR => {
                let (val, end) = self.decode_str_seq_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::StrSeq), end))
            }
            TYPE_UUID_ARR => {
                let (val, end) = self.decode_uuid_seq_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::UuidSeq), end))
            }
            TYPE_COLLECTION => {
                let (val, end) = self.decode_collection_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::Collection), end))
            }
            TYPE_MAP => {
                let (val, end) = self.decode_map_at(body)?;
                Ok((val.map_or(Variant::Null, Variant::Map), end))
            }
            other => Err(GridportError::UnknownTypeId(other as i32)),
        }
    }

    // --- Body decoders. Each returns the decoded value (None for a negative
    // count, the absent-value convention) and the offset just past the body.

    fn read_count(&self, pos: usize) -> Result<(Option<usize>, usize)> {
        let count = self.ctx.input.i32_at(pos)?;
        if count < 0 {
            Ok((None, pos + 4))
        } else {
            Ok((Some(count as usize), pos + 4))
        }
    }

    fn decode_str_at(&self, pos: usize) -> Result<(Option<String>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let bytes = self.ctx.input.bytes_at(body, len)?;
        let val = String::from_utf8(bytes.to_vec()).map_err(|_| {
            GridportError::ProtocolViolation("invalid UTF-8 in string payload".into())
        })?;
        Ok((Some(val), body + len))
    }

    fn decode_u16s_at(&self, pos: usize) -> Result<(Option<Vec<u16>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let mut units = Vec::with_capacity(len);
        for i in 0..len {
            units.push(self.ctx.input.u16_at(body + 2 * i)?);
        }
        Ok((Some(units), body + 2 * len))
    }

    fn decode_uuid_at(&self, pos: usize) -> Result<(Option<Uuid>, usize)> {
        if !self.ctx.input.bool_at(pos)? {
            return Ok((None, pos + 1));
        }
        let msb = self.ctx.input.u64_at(pos + 1)?;
        let lsb = self.ctx.input.u64_at(pos + 9)?;
        Ok((Some(Uuid::from_u64_pair(msb, lsb)), pos + 17))
    }

    fn decode_byte_arr_at(&self, pos: usize) -> Result<(Option<Vec<i8>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let bytes = self.ctx.input.bytes_at(body, len)?;
        Ok((Some(bytes.iter().map(|b| *b as i8).collect()), body + len))
    }

    fn decode_short_arr_at(&self, pos: usize) -> Result<(Option<Vec<i16>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let mut vals = Vec::with_capacity(len);
        for i in 0..len {
            vals.push(self.ctx.input.i16_at(body + 2 * i)?);
        }
        Ok((Some(vals), body + 2 * len))
    }

    fn decode_int_arr_at(&self, pos: usize) -> Result<(Option<Vec<i32>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let mut vals = Vec::with_capacity(len);
        for i in 0..len {
            vals.push(self.ctx.input.i32_at(body + 4 * i)?);
        }
        Ok((Some(vals), body + 4 * len))
    }

    fn decode_long_arr_at(&self, pos: usize) -> Result<(Option<Vec<i64>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let mut vals = Vec::with_capacity(len);
        for i in 0..len {
            vals.push(self.ctx.input.i64_at(body + 8 * i)?);
        }
        Ok((Some(vals), body + 8 * len))
    }

    fn decode_float_arr_at(&self, pos: usize) -> Result<(Option<Vec<f32>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let mut vals = Vec::with_capacity(len);
        for i in 0..len {
            vals.push(self.ctx.input.f32_at(body + 4 * i)?);
        }
        Ok((Some(vals), body + 4 * len))
    }

    fn decode_double_arr_at(&self, pos: usize) -> Result<(Option<Vec<f64>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let mut vals = Vec::with_capacity(len);
        for i in 0..len {
            vals.push(self.ctx.input.f64_at(body + 8 * i)?);
        }
        Ok((Some(vals), body + 8 * len))
    }

    fn decode_bool_arr_at(&self, pos: usize) -> Result<(Option<Vec<bool>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let bytes = self.ctx.input.bytes_at(body, len)?;
        Ok((Some(bytes.iter().map(|b| *b != 0).collect()), body + len))
    }

    fn decode_str_seq_at(&self, pos: usize) -> Result<(Option<Vec<String>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let mut vals = Vec::with_capacity(len);
        let mut off = body;
        for _ in 0..len {
            let (item, next) = self.decode_str_at(off)?;
            let Some(item) = item else {
                return Err(GridportError::ProtocolViolation(
                    "null entry in string sequence".into(),
                ));
            };
            vals.push(item);
            off = next;
        }
        Ok((Some(vals), off))
    }

    fn decode_uuid_seq_at(&self, pos: usize) -> Result<(Option<Vec<Uuid>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let mut vals = Vec::with_capacity(len);
        let mut off = body;
        for _ in 0..len {
            let (item, next) = self.decode_uuid_at(off)?;
            let Some(item) = item else {
                return Err(GridportError::ProtocolViolation(
                    "null entry in uuid sequence".into(),
                ));
            };
            vals.push(item);
            off = next;
        }
        Ok((Some(vals), off))
    }

    fn decode_collection_at(&mut self, pos: usize) -> Result<(Option<Vec<Variant>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let mut items = Vec::with_capacity(len.min(1024));
        let mut off = body;
        for _ in 0..len {
            let (item, next) = self.read_variant_at(off)?;
            items.push(item);
            off = next;
        }
        Ok((Some(items), off))
    }

    fn decode_map_at(
        &mut self,
        pos: usize,
    ) -> Result<(Option<HashMap<Variant, Variant>>, usize)> {
        let (count, body) = self.read_count(pos)?;
        let Some(len) = count else {
            return Ok((None, body));
        };
        let mut map = HashMap::with_capacity(len.min(1024));
        let mut off = body;
        for _ in 0..len {
            let (key, after_key) = self.read_variant_at(off)?;
            let (value, next) = self.read_variant_at(after_key)?;
            map.insert(key, value);
            off = next;
        }
        Ok((Some(map), off))
    }

    // --- Raw-region plumbing, used by the raw reader.

    fn raw_take(&mut self, wanted: usize) -> Result<usize> {
        let pos = self.raw_pos;
        if pos + wanted > self.frame_end {
            return Err(GridportError::BufferUnderrun {
                offset: pos,
                wanted,
                available: self.frame_end.saturating_sub(pos),
            });
        }
        self.raw_pos = pos + wanted;
        Ok(pos)
    }

    fn raw_advance_to(&mut self, end: usize) -> Result<()> {
        if end > self.frame_end {
            return Err(GridportError::BufferUnderrun {
                offset: self.raw_pos,
                wanted: end - self.raw_pos,
                available: self.frame_end.saturating_sub(self.raw_pos),
            });
        }
        self.raw_pos = end;
        Ok(())
    }
}

/// Sequential reads over a frame's raw region.
///
/// Obtained through [`PortableReader::raw_reader`]; the cursor starts at the
/// frame's raw-data offset and every read advances it by the full width it
/// consumed, never crossing the frame end.
pub struct PortableRawReader<'p, 'r, 'buf> {
    r: &'p mut PortableReader<'r, 'buf>,
}

impl PortableRawReader<'_, '_, '_> {
    /// Reads a signed byte.
    pub fn read_byte(&mut self) -> Result<i8> {
        let pos = self.r.raw_take(1)?;
        self.r.ctx.input.i8_at(pos)
    }

    /// Reads an i16.
    pub fn read_short(&mut self) -> Result<i16> {
        let pos = self.r.raw_take(2)?;
        self.r.ctx.input.i16_at(pos)
    }

    /// Reads an i32.
    pub fn read_int(&mut self) -> Result<i32> {
        let pos = self.r.raw_take(4)?;
        self.r.ctx.input.i32_at(pos)
    }

    /// Reads an i64.
    pub fn read_long(&mut self) -> Result<i64> {
        let pos = self.r.raw_take(8)?;
        self.r.ctx.input.i64_at(pos)
    }

    /// Reads an f32.
    pub fn read_float(&mut self) -> Result<f32> {
        let pos = self.r.raw_take(4)?;
        self.r.ctx.input.f32_at(pos)
    }

    /// Reads an f64.
    pub fn read_double(&mut self) -> Result<f64> {
        let pos = self.r.raw_take(8)?;
        self.r.ctx.input.f64_at(pos)
    }

    /// Reads a UTF-16 code unit.
    pub fn read_char(&mut self) -> Result<u16> {
        let pos = self.r.raw_take(2)?;
        self.r.ctx.input.u16_at(pos)
    }

    /// Reads a bool.
    pub fn read_bool(&mut self) -> Result<bool> {
        let pos = self.r.raw_take(1)?;
        self.r.ctx.input.bool_at(pos)
    }

    /// Reads a count-prefixed string (`None` for an absent value).
    pub fn read_string(&mut self) -> Result<Option<String>> {
        let (val, end) = self.r.decode_str_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed wide string (`None` for an absent value).
    pub fn read_wstring(&mut self) -> Result<Option<Vec<u16>>> {
        let (val, end) = self.r.decode_u16s_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a UUID (`None` for an absent value).
    pub fn read_uuid(&mut self) -> Result<Option<Uuid>> {
        let (val, end) = self.r.decode_uuid_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed byte array (`None` for an absent value).
    pub fn read_byte_arr(&mut self) -> Result<Option<Vec<i8>>> {
        let (val, end) = self.r.decode_byte_arr_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed i16 array (`None` for an absent value).
    pub fn read_short_arr(&mut self) -> Result<Option<Vec<i16>>> {
        let (val, end) = self.r.decode_short_arr_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed i32 array (`None` for an absent value).
    pub fn read_int_arr(&mut self) -> Result<Option<Vec<i32>>> {
        let (val, end) = self.r.decode_int_arr_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed i64 array (`None` for an absent value).
    pub fn read_long_arr(&mut self) -> Result<Option<Vec<i64>>> {
        let (val, end) = self.r.decode_long_arr_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed f32 array (`None` for an absent value).
    pub fn read_float_arr(&mut self) -> Result<Option<Vec<f32>>> {
        let (val, end) = self.r.decode_float_arr_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed f64 array (`None` for an absent value).
    pub fn read_double_arr(&mut self) -> Result<Option<Vec<f64>>> {
        let (val, end) = self.r.decode_double_arr_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed UTF-16 code-unit array (`None` for an absent value).
    pub fn read_char_arr(&mut self) -> Result<Option<Vec<u16>>> {
        let (val, end) = self.r.decode_u16s_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed bool array (`None` for an absent value).
    pub fn read_bool_arr(&mut self) -> Result<Option<Vec<bool>>> {
        let (val, end) = self.r.decode_bool_arr_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed string sequence (`None` for an absent value).
    pub fn read_str_seq(&mut self) -> Result<Option<Vec<String>>> {
        let (val, end) = self.r.decode_str_seq_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed UUID sequence (`None` for an absent value).
    pub fn read_uuid_seq(&mut self) -> Result<Option<Vec<Uuid>>> {
        let (val, end) = self.r.decode_uuid_seq_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads one complete variant frame.
    pub fn read_variant(&mut self) -> Result<Variant> {
        let (val, end) = self.r.read_variant_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed sequence of variant frames (`None` for an
    /// absent value).
    pub fn read_collection(&mut self) -> Result<Option<Vec<Variant>>> {
        let (val, end) = self.r.decode_collection_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }

    /// Reads a count-prefixed sequence of variant key/value pairs (`None`
    /// for an absent value).
    pub fn read_map(&mut self) -> Result<Option<HashMap<Variant, Variant>>> {
        let (val, end) = self.r.decode_map_at(self.r.raw_pos)?;
        self.r.raw_advance_to(end)?;
        Ok(val)
    }
}
