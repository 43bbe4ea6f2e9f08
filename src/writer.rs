//! The encode engine: named/raw field framing, variant encoding, and
//! nested-record frames with backpatched headers.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::constants::{HANDLE_TABLE_CAPACITY, HANDLE_TABLE_LOAD_FACTOR};
use crate::error::{GridportError, Result};
use crate::format::{
    field_name_hash, FLAG_HANDLE, FLAG_NULL, FLAG_OBJECT, RAW_OFFSET_OFFSET, TOTAL_LENGTH_OFFSET,
    TYPE_BOOL, TYPE_BOOL_ARR, TYPE_BYTE, TYPE_BYTE_ARR, TYPE_CHAR, TYPE_CHAR_ARR, TYPE_COLLECTION,
    TYPE_DOUBLE, TYPE_DOUBLE_ARR, TYPE_FLOAT, TYPE_FLOAT_ARR, TYPE_INT, TYPE_INT_ARR, TYPE_LONG,
    TYPE_LONG_ARR, TYPE_MAP, TYPE_SHORT, TYPE_SHORT_ARR, TYPE_STRING, TYPE_STRING_ARR, TYPE_UUID,
    TYPE_UUID_ARR, TYPE_WSTRING,
};
use crate::handles::WriteHandleTable;
use crate::io::ByteSink;
use crate::portable::{mint_identity, PortableRef};
use crate::registry::IdResolver;
use crate::variant::Variant;

/// Per-call write state: the output sink, the identity handle table, and the
/// optional field-id resolver. Lives for exactly one marshal call.
pub struct WriteContext {
    pub(crate) out: ByteSink,
    pub(crate) handles: WriteHandleTable,
    pub(crate) id_resolver: Option<Arc<dyn IdResolver>>,
}

impl WriteContext {
    /// Creates a fresh context with the given initial sink capacity.
    pub fn new(capacity: usize, id_resolver: Option<Arc<dyn IdResolver>>) -> Self {
        Self {
            out: ByteSink::with_capacity(capacity),
            handles: WriteHandleTable::new(HANDLE_TABLE_CAPACITY, HANDLE_TABLE_LOAD_FACTOR),
            id_resolver,
        }
    }

    /// Consumes the context and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.out.into_bytes()
    }
}

/// Writes one frame: named fields first, then (optionally) a raw tail.
///
/// A writer is scoped to a single frame; records receive a fresh writer for
/// their own nested frame. Named-field writes fail with `ProtocolViolation`
/// once the frame has switched to raw mode; raw writes are only reachable
/// through [`PortableWriter::raw_writer`], which performs the switch.
pub struct PortableWriter<'a> {
    ctx: &'a mut WriteContext,
    start: usize,
    type_id: i32,
    allow_fields: bool,
}

impl<'a> PortableWriter<'a> {
    /// A writer for a top-level value. Only the facade creates these.
    pub(crate) fn top_level(ctx: &'a mut WriteContext) -> Self {
        let start = ctx.out.len();
        Self {
            ctx,
            start,
            type_id: 0,
            allow_fields: true,
        }
    }

    /// A writer scoped to the record frame starting at `start`.
    pub(crate) fn for_frame(ctx: &'a mut WriteContext, start: usize, type_id: i32) -> Self {
        Self {
            ctx,
            start,
            type_id,
            allow_fields: true,
        }
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

    fn named_header(&mut self, field_name: &str) -> Result<()> {
        if !self.allow_fields {
            return Err(GridportError::ProtocolViolation(
                "Named fields are not allowed after raw data.".into(),
            ));
        }
        let id = self.field_id(field_name);
        self.ctx.out.write_i32(id);
        Ok(())
    }

    /// Switches the frame to raw mode: backpatches the header's raw-data
    /// offset to the current position and locks out named fields. Idempotent.
    fn switch_to_raw(&mut self) -> Result<()> {
        if self.allow_fields {
            let rel = (self.ctx.out.len() - self.start) as i32;
            self.ctx
                .out
                .patch_i32(self.start + RAW_OFFSET_OFFSET, rel)?;
            self.allow_fields = false;
        }
        Ok(())
    }

    /// Enters raw mode (idempotently) and returns the raw writer for this
    /// frame. After this call every named-field write on the frame fails.
    pub fn raw_writer(&mut self) -> Result<PortableRawWriter<'_, 'a>> {
        self.switch_to_raw()?;
        Ok(PortableRawWriter { w: self })
    }

    // --- Named typed fields.
    // Entry layout: fieldId(4) | fieldLength(4) | code(1) | payload.
    // Fixed-size payload lengths are computed up front; variable ones
    // reserve the length and backpatch it.

    /// Writes a named signed-byte field.
    pub fn write_byte(&mut self, field_name: &str, val: i8) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(2);
        self.ctx.out.write_u8(TYPE_BYTE);
        self.ctx.out.write_i8(val);
        Ok(())
    }

    /// Writes a named i16 field.
    pub fn write_short(&mut self, field_name: &str, val: i16) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(3);
        self.ctx.out.write_u8(TYPE_SHORT);
        self.ctx.out.write_i16(val);
        Ok(())
    }

    /// Writes a named i32 field.
    pub fn write_int(&mut self, field_name: &str, val: i32) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5);
        self.ctx.out.write_u8(TYPE_INT);
        self.ctx.out.write_i32(val);
        Ok(())
    }

    /// Writes a named i64 field.
    pub fn write_long(&mut self, field_name: &str, val: i64) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(9);
        self.ctx.out.write_u8(TYPE_LONG);
        self.ctx.out.write_i64(val);
        Ok(())
    }

    /// Writes a named f32 field.
    pub fn write_float(&mut self, field_name: &str, val: f32) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5);
        self.ctx.out.write_u8(TYPE_FLOAT);
        self.ctx.out.write_f32(val);
        Ok(())
    }

    /// Writes a named f64 field.
    pub fn write_double(&mut self, field_name: &str, val: f64) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(9);
        self.ctx.out.write_u8(TYPE_DOUBLE);
        self.ctx.out.write_f64(val);
        Ok(())
    }

    /// Writes a named UTF-16 code-unit field.
    pub fn write_char(&mut self, field_name: &str, val: u16) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(3);
        self.ctx.out.write_u8(TYPE_CHAR);
        self.ctx.out.write_u16(val);
        Ok(())
    }

    /// Writes a named bool field.
    pub fn write_bool(&mut self, field_name: &str, val: bool) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(2);
        self.ctx.out.write_u8(TYPE_BOOL);
        self.ctx.out.write_bool(val);
        Ok(())
    }

    /// Writes a named UTF-8 string field (length-prefixed by byte count).
    pub fn write_string(&mut self, field_name: &str, val: &str) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5 + val.len() as i32);
        self.ctx.out.write_u8(TYPE_STRING);
        str_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named wide-string field (length-prefixed by code-unit count).
    pub fn write_wstring(&mut self, field_name: &str, val: &[u16]) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5 + 2 * val.len() as i32);
        self.ctx.out.write_u8(TYPE_WSTRING);
        wstr_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named UUID field.
    pub fn write_uuid(&mut self, field_name: &str, val: Uuid) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(18);
        self.ctx.out.write_u8(TYPE_UUID);
        uuid_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named byte-array field.
    pub fn write_byte_arr(&mut self, field_name: &str, val: &[i8]) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5 + val.len() as i32);
        self.ctx.out.write_u8(TYPE_BYTE_ARR);
        byte_arr_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named i16-array field.
    pub fn write_short_arr(&mut self, field_name: &str, val: &[i16]) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5 + 2 * val.len() as i32);
        self.ctx.out.write_u8(TYPE_SHORT_ARR);
        short_arr_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named i32-array field.
    pub fn write_int_arr(&mut self, field_name: &str, val: &[i32]) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5 + 4 * val.len() as i32);
        self.ctx.out.write_u8(TYPE_INT_ARR);
        int_arr_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named i64-array field.
    pub fn write_long_arr(&mut self, field_name: &str, val: &[i64]) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5 + 8 * val.len() as i32);
        self.ctx.out.write_u8(TYPE_LONG_ARR);
        long_arr_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named f32-array field.
    pub fn write_float_arr(&mut self, field_name: &str, val: &[f32]) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5 + 4 * val.len() as i32);
        self.ctx.out.write_u8(TYPE_FLOAT_ARR);
        float_arr_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named f64-array field.
    pub fn write_double_arr(&mut self, field_name: &str, val: &[f64]) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5 + 8 * val.len() as i32);
        self.ctx.out.write_u8(TYPE_DOUBLE_ARR);
        double_arr_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named UTF-16 code-unit-array field.
    pub fn write_char_arr(&mut self, field_name: &str, val: &[u16]) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5 + 2 * val.len() as i32);
        self.ctx.out.write_u8(TYPE_CHAR_ARR);
        char_arr_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named bool-array field (one byte per element).
    pub fn write_bool_arr(&mut self, field_name: &str, val: &[bool]) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5 + val.len() as i32);
        self.ctx.out.write_u8(TYPE_BOOL_ARR);
        bool_arr_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named string-sequence field.
    pub fn write_str_seq(&mut self, field_name: &str, val: &[String]) -> Result<()> {
        self.named_header(field_name)?;
        let len_pos = self.ctx.out.reserve_i32();
        let payload_start = self.ctx.out.len();
        self.ctx.out.write_u8(TYPE_STRING_ARR);
        str_seq_body(&mut self.ctx.out, val);
        let len = (self.ctx.out.len() - payload_start) as i32;
        self.ctx.out.patch_i32(len_pos, len)
    }

    /// Writes a named UUID-sequence field.
    pub fn write_uuid_seq(&mut self, field_name: &str, val: &[Uuid]) -> Result<()> {
        self.named_header(field_name)?;
        self.ctx.out.write_i32(5 + 17 * val.len() as i32);
        self.ctx.out.write_u8(TYPE_UUID_ARR);
        uuid_seq_body(&mut self.ctx.out, val);
        Ok(())
    }

    /// Writes a named variant-collection field.
    pub fn write_collection(&mut self, field_name: &str, val: &[Variant]) -> Result<()> {
        self.named_header(field_name)?;
        let len_pos = self.ctx.out.reserve_i32();
        let payload_start = self.ctx.out.len();
        self.ctx.out.write_u8(TYPE_COLLECTION);
        self.collection_body(val)?;
        let len = (self.ctx.out.len() - payload_start) as i32;
        self.ctx.out.patch_i32(len_pos, len)
    }

    /// Writes a named variant-map field.
    pub fn write_map(&mut self, field_name: &str, val: &HashMap<Variant, Variant>) -> Result<()> {
        self.named_header(field_name)?;
        let len_pos = self.ctx.out.reserve_i32();
        let payload_start = self.ctx.out.len();
        self.ctx.out.write_u8(TYPE_MAP);
        self.map_body(val)?;
        let len = (self.ctx.out.len() - payload_start) as i32;
        self.ctx.out.patch_i32(len_pos, len)
    }

    /// Writes a named field holding any variant. The payload is a complete
    /// nested frame, so record references participate in handle dedup.
    pub fn write_variant(&mut self, field_name: &str, val: &Variant) -> Result<()> {
        self.named_header(field_name)?;
        let len_pos = self.ctx.out.reserve_i32();
        let payload_start = self.ctx.out.len();
        self.write_variant_value(val)?;
        let len = (self.ctx.out.len() - payload_start) as i32;
        self.ctx.out.patch_i32(len_pos, len)
    }

    /// Writes a named field holding a record reference.
    pub fn write_portable(&mut self, field_name: &str, val: &PortableRef) -> Result<()> {
        self.write_variant(field_name, &Variant::Portable(val.clone()))
    }

    // --- Variant framing.

    /// Encodes one variant as a complete frame (or a NULL/HANDLE stub).
    pub(crate) fn write_variant_value(&mut self, val: &Variant) -> Result<()> {
        match val {
            Variant::Null => {
                self.ctx.out.write_u8(FLAG_NULL);
                Ok(())
            }
            Variant::Portable(record) => {
                if let Some(handle) = self.ctx.handles.lookup(record.identity()) {
                    self.ctx.out.write_u8(FLAG_HANDLE);
                    self.ctx.out.write_i32(handle as i32);
                    return Ok(());
                }
                let start = self.ctx.out.len();
                self.ctx.out.write_u8(FLAG_OBJECT);
                self.ctx.out.write_bool(true);
                self.ctx.out.write_i32(record.type_id());
                self.ctx.out.write_i32(0);
                self.ctx.out.write_i32(0); // total length, backpatched below
                self.ctx.out.write_i32(0); // raw offset, backpatched on switch
                {
                    let mut nested =
                        PortableWriter::for_frame(&mut *self.ctx, start, record.type_id());
                    record.record().write_fields(&mut nested)?;
                }
                let total = (self.ctx.out.len() - start) as i32;
                self.ctx.out.patch_i32(start + TOTAL_LENGTH_OFFSET, total)
            }
            Variant::Blob(blob) => {
                // A blob is already a complete user frame; splice it in
                // verbatim. It still consumes one handle slot so write- and
                // read-side slot numbering stay aligned.
                let _ = self.ctx.handles.lookup(mint_identity());
                self.ctx.out.write_bytes(blob.bytes());
                Ok(())
            }
            Variant::Byte(v) => self.standard_frame(TYPE_BYTE, val, |out| out.write_i8(*v)),
            Variant::Short(v) => self.standard_frame(TYPE_SHORT, val, |out| out.write_i16(*v)),
            Variant::Int(v) => self.standard_frame(TYPE_INT, val, |out| out.write_i32(*v)),
            Variant::Long(v) => self.standard_frame(TYPE_LONG, val, |out| out.write_i64(*v)),
            Variant::Float(v) => self.standard_frame(TYPE_FLOAT, val, |out| out.write_f32(*v)),
            Variant::Double(v) => self.standard_frame(TYPE_DOUBLE, val, |out| out.write_f64(*v)),
            Variant::Char(v) => self.standard_frame(TYPE_CHAR, val, |out| out.write_u16(*v)),
            Variant::Bool(v) => self.standard_frame(TYPE_BOOL, val, |out| out.write_bool(*v)),
            Variant::Str(v) => self.standard_frame(TYPE_STRING, val, |out| str_body(out, v)),
            Variant::WideStr(v) => self.standard_frame(TYPE_WSTRING, val, |out| wstr_body(out, v)),
            Variant::Uuid(v) => self.standard_frame(TYPE_UUID, val, |out| uuid_body(out, *v)),
            Variant::ByteArr(v) => {
                self.standard_frame(TYPE_BYTE_ARR, val, |out| byte_arr_body(out, v))
            }
            Variant::ShortArr(v) => {
                self.standard_frame(TYPE_SHORT_ARR, val, |out| short_arr_body(out, v))
            }
            Variant::IntArr(v) => {
                self.standard_frame(TYPE_INT_ARR, val, |out| int_arr_body(out, v))
            }
            Variant::LongArr(v) => {
                self.standard_frame(TYPE_LONG_ARR, val, |out| long_arr_body(out, v))
            }
            Variant::FloatArr(v) => {
                self.standard_frame(TYPE_FLOAT_ARR, val, |out| float_arr_body(out, v))
            }
            Variant::DoubleArr(v) => {
                self.standard_frame(TYPE_DOUBLE_ARR, val, |out| double_arr_body(out, v))
            }
            Variant::CharArr(v) => {
                self.standard_frame(TYPE_CHAR_ARR, val, |out| char_arr_body(out, v))
            }
            Variant::BoolArr(v) => {
                self.standard_frame(TYPE_BOOL_ARR, val, |out| bool_arr_body(out, v))
            }
            Variant::StrSeq(v) => {
                self.standard_frame(TYPE_STRING_ARR, val, |out| str_seq_body(out, v))
            }
            Variant::UuidSeq(v) => {
                self.standard_frame(TYPE_UUID_ARR, val, |out| uuid_seq_body(out, v))
            }
            Variant::Collection(items) => {
                let start = self.begin_standard_frame(TYPE_COLLECTION, val.content_hash());
                self.collection_body(items)?;
                self.end_frame(start)
            }
            Variant::Map(map) => {
                let start = self.begin_standard_frame(TYPE_MAP, val.content_hash());
                self.map_body(map)?;
                self.end_frame(start)
            }
        }
    }

    fn standard_frame<F>(&mut self, code: u8, val: &Variant, body: F) -> Result<()>
    where
        F: FnOnce(&mut ByteSink),
    {
        let start = self.begin_standard_frame(code, val.content_hash());
        body(&mut self.ctx.out);
        self.end_frame(start)
    }

    fn begin_standard_frame(&mut self, code: u8, content_hash: i32) -> usize {
        let start = self.ctx.out.len();
        self.ctx.out.write_u8(FLAG_OBJECT);
        self.ctx.out.write_bool(false);
        self.ctx.out.write_i32(code as i32);
        self.ctx.out.write_i32(content_hash);
        self.ctx.out.write_i32(0); // total length, backpatched
        self.ctx.out.write_i32(0); // raw offset, unused for standard kinds
        start
    }

    fn end_frame(&mut self, start: usize) -> Result<()> {
        let total = (self.ctx.out.len() - start) as i32;
        self.ctx.out.patch_i32(start + TOTAL_LENGTH_OFFSET, total)
    }

    fn collection_body(&mut self, items: &[Variant]) -> Result<()> {
        self.ctx.out.write_i32(items.len() as i32);
        for item in items {
            self.write_variant_value(item)?;
        }
        Ok(())
    }

    fn map_body(&mut self, map: &HashMap<Variant, Variant>) -> Result<()> {
        self.ctx.out.write_i32(map.len() as i32);
        for (key, value) in map {
            self.write_variant_value(key)?;
            self.write_variant_value(value)?;
        }
        Ok(())
    }
}

/// Raw-mode writes for one frame.
///
/// Obtained through [`PortableWriter::raw_writer`], which performs the
/// (idempotent) switch to raw mode, so raw writes cannot happen before the
/// switch. Payloads carry no field id, length, or type code; variable-length
/// payloads keep their own count prefixes.
pub struct PortableRawWriter<'w, 'a> {
    w: &'w mut PortableWriter<'a>,
}

impl PortableRawWriter<'_, '_> {
    /// Appends a signed byte.
    pub fn write_byte(&mut self, val: i8) {
        self.w.ctx.out.write_i8(val);
    }

    /// Appends an i16.
    pub fn write_short(&mut self, val: i16) {
        self.w.ctx.out.write_i16(val);
    }

    /// Appends an i32.
    pub fn write_int(&mut self, val: i32) {
        self.w.ctx.out.write_i32(val);
    }

    /// Appends an i64.
    pub fn write_long(&mut self, val: i64) {
        self.w.ctx.out.write_i64(val);
    }

    /// Appends an f32.
    pub fn write_float(&mut self, val: f32) {
        self.w.ctx.out.write_f32(val);
    }

    /// Appends an f64.
    pub fn write_double(&mut self, val: f64) {
        self.w.ctx.out.write_f64(val);
    }

    /// Appends a UTF-16 code unit.
    pub fn write_char(&mut self, val: u16) {
        self.w.ctx.out.write_u16(val);
    }

    /// Appends a bool as one byte.
    pub fn write_bool(&mut self, val: bool) {
        self.w.ctx.out.write_bool(val);
    }

    /// Appends a count-prefixed UTF-8 string.
    pub fn write_string(&mut self, val: &str) {
        str_body(&mut self.w.ctx.out, val);
    }

    /// Appends a count-prefixed wide string.
    pub fn write_wstring(&mut self, val: &[u16]) {
        wstr_body(&mut self.w.ctx.out, val);
    }

    /// Appends a UUID (presence byte plus both 64-bit halves).
    pub fn write_uuid(&mut self, val: Uuid) {
        uuid_body(&mut self.w.ctx.out, val);
    }

    /// Appends a count-prefixed byte array.
    pub fn write_byte_arr(&mut self, val: &[i8]) {
        byte_arr_body(&mut self.w.ctx.out, val);
    }

    /// Appends a count-prefixed i16 array.
    pub fn write_short_arr(&mut self, val: &[i16]) {
        short_arr_body(&mut self.w.ctx.out, val);
    }

    /// Appends a count-prefixed i32 array.
    pub fn write_int_arr(&mut self, val: &[i32]) {
        int_arr_body(&mut self.w.ctx.out, val);
    }

    /// Appends a count-prefixed i64 array.
    pub fn write_long_arr(&mut self, val: &[i64]) {
        long_arr_body(&mut self.w.ctx.out, val);
    }

    /// Appends a count-prefixed f32 array.
    pub fn write_float_arr(&mut self, val: &[f32]) {
        float_arr_body(&mut self.w.ctx.out, val);
    }

    /// Appends a count-prefixed f64 array.
    pub fn write_double_arr(&mut self, val: &[f64]) {
        double_arr_body(&mut self.w.ctx.out, val);
    }

    /// Appends a count-prefixed UTF-16 code-unit array.
    pub fn write_char_arr(&mut self, val: &[u16]) {
        char_arr_body(&mut self.w.ctx.out, val);
    }

    /// Appends a count-prefixed bool array, one byte per element.
    pub fn write_bool_arr(&mut self, val: &[bool]) {
        bool_arr_body(&mut self.w.ctx.out, val);
    }

    /// Appends a count-prefixed string sequence.
    pub fn write_str_seq(&mut self, val: &[String]) {
        str_seq_body(&mut self.w.ctx.out, val);
    }

    /// Appends a count-prefixed UUID sequence.
    pub fn write_uuid_seq(&mut self, val: &[Uuid]) {
        uuid_seq_body(&mut self.w.ctx.out, val);
    }

    /// Appends a complete variant frame.
    pub fn write_variant(&mut self, val: &Variant) -> Result<()> {
        self.w.write_variant_value(val)
    }

    /// Appends a count-prefixed sequence of variant frames.
    pub fn write_collection(&mut self, val: &[Variant]) -> Result<()> {
        self.w.collection_body(val)
    }

    /// Appends a count-prefixed sequence of variant key/value frame pairs.
    pub fn write_map(&mut self, val: &HashMap<Variant, Variant>) -> Result<()> {
        self.w.map_body(val)
    }
}

// --- Payload body encoders, shared between named, raw, and frame writes.

fn str_body(out: &mut ByteSink, val: &str) {
    out.write_i32(val.len() as i32);
    out.write_bytes(val.as_bytes());
}

fn wstr_body(out: &mut ByteSink, val: &[u16]) {
    // The count is the number of code units, written as-is.
    out.write_i32(val.len() as i32);
    for unit in val {
        out.write_u16(*unit);
    }
}

fn uuid_body(out: &mut ByteSink, val: Uuid) {
    let (msb, lsb) = val.as_u64_pair();
    out.write_bool(true);
    out.write_u64(msb);
    out.write_u64(lsb);
}

fn byte_arr_body(out: &mut ByteSink, val: &[i8]) {
    out.write_i32(val.len() as i32);
    for b in val {
        out.write_i8(*b);
    }
}

fn short_arr_body(out: &mut ByteSink, val: &[i16]) {
    out.write_i32(val.len() as i32);
    for x in val {
        out.write_i16(*x);
    }
}

fn int_arr_body(out: &mut ByteSink, val: &[i32]) {
    out.write_i32(val.len() as i32);
    for x in val {
        out.write_i32(*x);
    }
}

fn long_arr_body(out: &mut ByteSink, val: &[i64]) {
    out.write_i32(val.len() as i32);
    for x in val {
        out.write_i64(*x);
    }
}

fn float_arr_body(out: &mut ByteSink, val: &[f32]) {
    out.write_i32(val.len() as i32);
    for x in val {
        out.write_f32(*x);
    }
}

fn double_arr_body(out: &mut ByteSink, val: &[f64]) {
    out.write_i32(val.len() as i32);
    for x in val {
        out.write_f64(*x);
    }
}

fn char_arr_body(out: &mut ByteSink, val: &[u16]) {
    out.write_i32(val.len() as i32);
    for x in val {
        out.write_u16(*x);
    }
}

fn bool_arr_body(out: &mut ByteSink, val: &[bool]) {
    out.write_i32(val.len() as i32);
    for x in val {
        out.write_bool(*x);
    }
}

fn str_seq_body(out: &mut ByteSink, val: &[String]) {
    out.write_i32(val.len() as i32);
    for s in val {
        str_body(out, s);
    }
}

fn uuid_seq_body(out: &mut ByteSink, val: &[Uuid]) {
    out.write_i32(val.len() as i32);
    for u in val {
        uuid_body(out, *u);
    }
}
