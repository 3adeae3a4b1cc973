//! The Hessian 2.0 decoder
//!
//! A single-pass state machine that reads a self-describing byte stream
//! with many overlapping tag ranges and recursively materializes
//! [`Value`]s. One `Decoder` is created per logical message; its
//! reference table is scoped to that decoder and discarded with it. The
//! class registry it consults is the process-wide [`REGISTRY`].

use chrono::{TimeZone, Utc};

use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::registry::REGISTRY;
use crate::tag::*;
use crate::value::{ListValue, MapValue, ObjectValue, Value};

/// A decoder over an in-memory byte buffer.
pub struct Decoder {
    data: Vec<u8>,
    pos: usize,
    refs: Vec<Value>,
    config: CodecConfig,
    depth: usize,
}

impl Decoder {
    /// Construct a decoder over `data` with the default [`CodecConfig`].
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self::with_config(data, CodecConfig::default())
    }

    /// Construct a decoder over `data` with an explicit [`CodecConfig`].
    pub fn with_config(data: impl Into<Vec<u8>>, config: CodecConfig) -> Self {
        Self { data: data.into(), pos: 0, refs: Vec::new(), config, depth: 0 }
    }

    /// Bytes remaining, unconsumed.
    pub fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether no bytes remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Peek the next byte without consuming it.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| Error::not_enough_buf(1, 0))
    }

    /// The reference table built up so far by this decoder's container
    /// materializations, in the order they completed.
    pub fn refs(&self) -> &[Value] {
        &self.refs
    }

    fn read_byte(&mut self) -> Result<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Ok(b)
    }

    fn read(&mut self, n: usize) -> Result<&[u8]> {
        if self.len() < n {
            return Err(Error::not_enough_buf(n, self.len()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read exactly `n` code points starting at the current position,
    /// validating each one's own byte span rather than the whole
    /// remaining buffer (the tail past this string's end is frequently
    /// not valid UTF-8 on its own, e.g. a following `Binary` payload or
    /// direct-tagged integer).
    fn read_chars(&mut self, n: usize) -> Result<String> {
        let mut out = String::with_capacity(n);
        for _ in 0..n {
            let start = self.pos;
            let b0 = *self
                .data
                .get(start)
                .ok_or_else(|| Error::not_enough_buf(n, out.chars().count()))?;
            let char_len = utf8_char_len(b0)?;
            let end = start + char_len;
            let slice = self
                .data
                .get(start..end)
                .ok_or_else(|| Error::not_enough_buf(n, out.chars().count()))?;
            let s = std::str::from_utf8(slice)
                .map_err(|_| Error::Unsupported("invalid utf-8 in string payload".to_string()))?;
            out.push_str(s);
            self.pos = end;
        }
        Ok(out)
    }

    /// Read exactly one top-level value. Returns `Ok(None)` when the
    /// buffer is exhausted (true end of stream), distinct from an
    /// explicit `BC_END`/`BC_NULL` byte, both of which decode to
    /// `Ok(Some(Value::Null))`.
    pub fn decode(&mut self) -> Result<Option<Value>> {
        if self.is_empty() {
            return Ok(None);
        }
        let tag = self.read_byte()?;
        if self.config.log_verbose_decode {
            tracing::trace!(tag = format!("{:#04x}", tag), "decode dispatch");
        }
        let value = self.decode_tagged(tag).map_err(|err| {
            tracing::warn!(error = %err, "decode failed");
            err
        })?;
        Ok(Some(value))
    }

    /// Decode exactly one value, failing with `NotEnoughBuf` rather than
    /// returning `None` on exhaustion. Used internally for values that
    /// must be present (container elements, envelope fields).
    fn decode_required(&mut self) -> Result<Value> {
        self.decode()?.ok_or_else(|| Error::not_enough_buf(1, 0))
    }

    fn enter_container(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(Error::NestingTooDeep { max_depth: self.config.max_depth });
        }
        Ok(())
    }

    fn exit_container(&mut self) {
        self.depth -= 1;
    }

    /// Reserve a slot in the reference table for a container that is
    /// about to be decoded, so that a `BC_REF` inside its own children
    /// can resolve back to it. Bounded by `CodecConfig::max_ref_table_len`
    /// so a corrupt or adversarial stream cannot grow the table without
    /// bound.
    fn reserve_ref(&mut self) -> Result<usize> {
        if self.refs.len() >= self.config.max_ref_table_len {
            return Err(Error::RefTableTooLarge { max_ref_table_len: self.config.max_ref_table_len });
        }
        let ref_index = self.refs.len();
        self.refs.push(Value::Null);
        Ok(ref_index)
    }

    fn decode_tagged(&mut self, tag: u8) -> Result<Value> {
        match tag {
            BC_END | BC_NULL => Ok(Value::Null),
            BC_TRUE => Ok(Value::Bool(true)),
            BC_FALSE => Ok(Value::Bool(false)),

            0x80..=0xbf | 0xc0..=0xcf | 0xd0..=0xd7 => self.decode_int32(tag).map(Value::Int32),
            t if t == BC_INT => self.decode_int32(t).map(Value::Int32),

            0xd8..=0xef | 0xf0..=0xff | 0x38..=0x3f => self.decode_int64(tag).map(Value::Int64),
            t if t == BC_LONG_INT || t == BC_LONG => self.decode_int64(t).map(Value::Int64),

            t if t == BC_DATE || t == BC_DATE_MINUTE => self.decode_date(t),

            t if t == BC_DOUBLE_ZERO
                || t == BC_DOUBLE_ONE
                || t == BC_DOUBLE_BYTE
                || t == BC_DOUBLE_SHORT
                || t == BC_DOUBLE_MILL
                || t == BC_DOUBLE =>
            {
                self.decode_double(t).map(Value::Double)
            }

            0x00..=0x1f | 0x30..=0x33 => self.decode_string(tag).map(Value::String),
            t if t == BC_STRING || t == BC_STRING_CHUNK => {
                self.decode_string(t).map(Value::String)
            }

            0x20..=0x2f | 0x34..=0x37 => self.decode_binary(tag).map(Value::Binary),
            t if t == BC_BINARY || t == BC_BINARY_CHUNK => {
                self.decode_binary(t).map(Value::Binary)
            }

            BC_LIST_DIRECT..=LIST_DIRECT_MAX => self.decode_list(tag, true).map(Value::List),
            t if t == BC_LIST_FIXED || t == BC_LIST_VARIABLE => {
                self.decode_list(t, true).map(Value::List)
            }
            BC_LIST_DIRECT_UNTYPED..=LIST_DIRECT_UNTYPED_MAX => {
                self.decode_list(tag, false).map(Value::List)
            }
            t if t == BC_LIST_FIXED_UNTYPED || t == BC_LIST_VARIABLE_UNTYPED => {
                self.decode_list(t, false).map(Value::List)
            }

            t if t == BC_MAP || t == BC_MAP_UNTYPED => self.decode_map(t == BC_MAP),

            t if t == BC_OBJECT_DEF => self.decode_object_def(),
            BC_OBJECT_DIRECT..=OBJECT_DIRECT_MAX => {
                let idx = (tag - BC_OBJECT_DIRECT) as i32;
                self.decode_object_instance(idx).map(Value::Object)
            }
            t if t == BC_OBJECT => {
                let idx = self.read_plain_i32()?;
                self.decode_object_instance(idx).map(Value::Object)
            }

            t if t == BC_REF => {
                let idx = self.read_plain_i32()?;
                if idx < 0 || idx as usize >= self.refs.len() {
                    return Err(Error::IllegalRefIndex { index: idx, len: self.refs.len() });
                }
                Ok(Value::Ref(idx))
            }

            other => Err(Error::UnknownTag(other)),
        }
    }

    /// Read a raw big-endian int32 that is not itself tag-prefixed (the
    /// class index following `BC_OBJECT`, or the count following
    /// `BC_LIST_FIXED`/`BC_LIST_FIXED_UNTYPED`/`BC_REF`).
    fn read_plain_i32(&mut self) -> Result<i32> {
        let bytes = self.read(4)?;
        Ok(unpack_i32(bytes))
    }

    fn decode_int32(&mut self, tag: u8) -> Result<i32> {
        match tag {
            0x80..=0xbf => Ok(tag as i32 - BC_INT_ZERO as i32),
            0xc0..=0xcf => {
                let b0 = self.read(1)?[0];
                Ok((tag as i32 - BC_INT_BYTE_ZERO as i32) * 256 + b0 as i32)
            }
            0xd0..=0xd7 => {
                let bytes = self.read(2)?;
                Ok((tag as i32 - BC_INT_SHORT_ZERO as i32) * 65536
                    + (bytes[0] as i32) * 256
                    + bytes[1] as i32)
            }
            t if t == BC_INT => {
                let bytes = self.read(4)?;
                Ok(unpack_i32(bytes))
            }
            t => Err(Error::UnknownTag(t)),
        }
    }

    fn decode_int64(&mut self, tag: u8) -> Result<i64> {
        match tag {
            0xd8..=0xef => Ok(tag as i64 - BC_LONG_ZERO as i64),
            0xf0..=0xff => {
                let b0 = self.read(1)?[0];
                Ok((tag as i64 - BC_LONG_BYTE_ZERO as i64) * 256 + b0 as i64)
            }
            0x38..=0x3f => {
                let bytes = self.read(2)?;
                Ok((tag as i64 - BC_LONG_SHORT_ZERO as i64) * 65536
                    + (bytes[0] as i64) * 256
                    + bytes[1] as i64)
            }
            t if t == BC_LONG_INT => {
                let bytes = self.read(4)?;
                Ok(unpack_i32(bytes) as i64)
            }
            t if t == BC_LONG => {
                let bytes = self.read(8)?;
                Ok(unpack_i64(bytes))
            }
            t => Err(Error::UnknownTag(t)),
        }
    }

    fn decode_double(&mut self, tag: u8) -> Result<f64> {
        match tag {
            t if t == BC_DOUBLE_ZERO => Ok(0.0),
            t if t == BC_DOUBLE_ONE => Ok(1.0),
            t if t == BC_DOUBLE_BYTE => {
                let b = self.read(1)?[0] as i8;
                Ok(b as f64)
            }
            t if t == BC_DOUBLE_SHORT => {
                let bytes = self.read(2)?;
                let v = unpack_i16(bytes);
                Ok(v as f64)
            }
            t if t == BC_DOUBLE_MILL => {
                let bytes = self.read(4)?;
                let bits = u32::from_be_bytes(bytes.try_into().unwrap());
                Ok(f32::from_bits(bits) as f64)
            }
            t if t == BC_DOUBLE => {
                let bytes = self.read(8)?;
                Ok(unpack_f64(bytes))
            }
            t => Err(Error::UnknownTag(t)),
        }
    }

    fn decode_date(&mut self, tag: u8) -> Result<Value> {
        if tag == BC_DATE {
            let bytes = self.read(8)?;
            let ms = unpack_i64(bytes);
            let dt = Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| Error::Unsupported(format!("date out of range: {ms} ms")))?;
            Ok(Value::Date(dt))
        } else {
            let bytes = self.read(4)?;
            let minutes = unpack_i32(bytes) as i64;
            let dt = Utc
                .timestamp_millis_opt(minutes * 60_000)
                .single()
                .ok_or_else(|| Error::Unsupported(format!("date out of range: {minutes} min")))?;
            Ok(Value::Date(dt))
        }
    }

    fn get_str_len(&mut self, tag: u8) -> Result<(i32, bool)> {
        match tag {
            BC_STRING_DIRECT..=STRING_DIRECT_MAX => Ok(((tag - BC_STRING_DIRECT) as i32, true)),
            BC_STRING_SHORT..=STRING_SHORT_MAX_TAG => {
                let b0 = self.read(1)?[0];
                Ok(((tag - BC_STRING_SHORT) as i32 * 256 + b0 as i32, true))
            }
            t if t == BC_STRING_CHUNK || t == BC_STRING => {
                let bytes = self.read(2)?;
                let len = (bytes[0] as i32) * 256 + bytes[1] as i32;
                Ok((len, t == BC_STRING))
            }
            t => Err(Error::UnknownTag(t)),
        }
    }

    fn decode_string(&mut self, first_tag: u8) -> Result<String> {
        let mut out = String::new();
        let mut tag = first_tag;
        loop {
            let (len, is_final) = self.get_str_len(tag)?;
            out.push_str(&self.read_chars(len as usize)?);
            if is_final {
                return Ok(out);
            }
            tag = self.read_byte()?;
        }
    }

    fn get_bin_len(&mut self, tag: u8) -> Result<(i32, bool)> {
        match tag {
            BC_BINARY_DIRECT..=BINARY_DIRECT_MAX => Ok(((tag - BC_BINARY_DIRECT) as i32, true)),
            BC_BINARY_SHORT..=BINARY_SHORT_MAX_TAG => {
                let b0 = self.read(1)?[0];
                Ok(((tag - BC_BINARY_SHORT) as i32 * 256 + b0 as i32, true))
            }
            t if t == BC_BINARY_CHUNK || t == BC_BINARY => {
                let bytes = self.read(2)?;
                let len = (bytes[0] as i32) * 256 + bytes[1] as i32;
                Ok((len, t == BC_BINARY))
            }
            t => Err(Error::UnknownTag(t)),
        }
    }

    fn decode_binary(&mut self, first_tag: u8) -> Result<bytes::Bytes> {
        let mut out = Vec::new();
        let mut tag = first_tag;
        loop {
            let (len, is_final) = self.get_bin_len(tag)?;
            out.extend_from_slice(self.read(len as usize)?);
            if is_final {
                return Ok(bytes::Bytes::from(out));
            }
            tag = self.read_byte()?;
        }
    }

    /// Read an inline type descriptor preceding a typed list or map: a
    /// string (class name) or an int32 index into a type table. The
    /// index form is read and discarded; see SPEC_FULL.md §9.
    fn decode_type_descriptor(&mut self) -> Result<Option<String>> {
        match self.decode_required()? {
            Value::String(s) => Ok(Some(s)),
            Value::Int32(_) | Value::Int64(_) => Ok(None),
            other => Err(Error::Unsupported(format!(
                "unexpected type descriptor value: {other:?}"
            ))),
        }
    }

    fn decode_list(&mut self, tag: u8, typed: bool) -> Result<ListValue> {
        self.enter_container()?;
        let result = self.decode_list_inner(tag, typed);
        self.exit_container();
        result
    }

    fn decode_list_inner(&mut self, tag: u8, typed: bool) -> Result<ListValue> {
        let type_name = if typed { self.decode_type_descriptor()? } else { None };

        let ref_index = self.reserve_ref()?;

        let items = if (BC_LIST_DIRECT..=LIST_DIRECT_MAX).contains(&tag) {
            let count = (tag - BC_LIST_DIRECT) as usize;
            self.decode_n_items(count)?
        } else if (BC_LIST_DIRECT_UNTYPED..=LIST_DIRECT_UNTYPED_MAX).contains(&tag) {
            let count = (tag - BC_LIST_DIRECT_UNTYPED) as usize;
            self.decode_n_items(count)?
        } else if tag == BC_LIST_FIXED || tag == BC_LIST_FIXED_UNTYPED {
            let count = self.read_plain_i32()? as usize;
            self.decode_n_items(count)?
        } else {
            self.decode_until_end()?
        };

        let list = ListValue { type_name, items };
        self.refs[ref_index] = Value::List(list.clone());
        Ok(list)
    }

    fn decode_n_items(&mut self, n: usize) -> Result<Vec<Value>> {
        let mut items = Vec::with_capacity(n);
        for _ in 0..n {
            items.push(self.decode_required()?);
        }
        Ok(items)
    }

    fn decode_until_end(&mut self) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        while self.peek_byte()? != BC_END {
            items.push(self.decode_required()?);
        }
        self.read_byte()?;
        Ok(items)
    }

    fn decode_map(&mut self, typed: bool) -> Result<Value> {
        self.enter_container()?;
        let result = self.decode_map_inner(typed);
        self.exit_container();
        result
    }

    fn decode_map_inner(&mut self, typed: bool) -> Result<Value> {
        let type_name = if typed { self.decode_type_descriptor()? } else { None };

        if let Some(wire_name) = type_name.as_deref() {
            if let Some(info) = REGISTRY.lookup_by_wire_name(wire_name) {
                return self
                    .decode_map_into_object(info.user_type_name.clone(), info.field_names)
                    .map(Value::Object);
            }
        }

        let ref_index = self.reserve_ref()?;

        let mut entries = Vec::new();
        loop {
            if self.is_empty() {
                break; // tolerate end-of-stream as an equivalent terminator
            }
            if self.peek_byte()? == BC_END {
                self.read_byte()?;
                break;
            }
            let key = self.decode_required()?;
            let value = self.decode_required()?;
            entries.push((key, value));
        }

        let map = MapValue { type_name, entries };
        self.refs[ref_index] = Value::Map(map.clone());
        Ok(Value::Map(map))
    }

    /// Materialize a typed map whose wire class name resolves in the
    /// registry as a (generic) object: each key is a field name,
    /// matched case-insensitively with the wire's lower-cased
    /// convention, and set positionally into the registered field order.
    fn decode_map_into_object(
        &mut self,
        user_type_name: String,
        field_names: Vec<String>,
    ) -> Result<ObjectValue> {
        let skeleton = REGISTRY
            .new_instance(&user_type_name)
            .ok_or_else(|| Error::Unsupported(format!("no instance for {user_type_name}")))?;

        let ref_index = self.reserve_ref()?;

        let mut fields = skeleton.fields;
        loop {
            if self.is_empty() {
                break;
            }
            if self.peek_byte()? == BC_END {
                self.read_byte()?;
                break;
            }
            let key = self.decode_required()?;
            let value = self.decode_required()?;
            if let Value::String(key_name) = key {
                let lower = key_name.to_lowercase();
                if let Some(idx) = field_names.iter().position(|f| *f == lower) {
                    fields[idx] = value;
                }
            }
        }

        let object = ObjectValue { class_index: skeleton.class_index, fields };
        self.refs[ref_index] = Value::Object(object.clone());
        Ok(object)
    }

    fn decode_object_def(&mut self) -> Result<Value> {
        let class_name = match self.decode_required()? {
            Value::String(s) => s,
            other => {
                return Err(Error::Unsupported(format!(
                    "expected class name string, got {other:?}"
                )))
            }
        };
        let field_count = self.read_plain_i32()? as usize;
        let mut field_names = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            match self.decode_required()? {
                Value::String(s) => field_names.push(s),
                other => {
                    return Err(Error::Unsupported(format!(
                        "expected field name string, got {other:?}"
                    )))
                }
            }
        }

        REGISTRY.append_class_def(class_name, field_names);

        // A BC_OBJECT_DEF is immediately followed by the first instance
        // of the class it describes.
        self.decode_required()
    }

    fn decode_object_instance(&mut self, class_index: i32) -> Result<ObjectValue> {
        self.enter_container()?;
        let result = self.decode_object_instance_inner(class_index);
        self.exit_container();
        result
    }

    fn decode_object_instance_inner(&mut self, class_index: i32) -> Result<ObjectValue> {
        let (_, def) = REGISTRY.struct_by_index(class_index)?;

        let ref_index = self.reserve_ref()?;

        let mut fields = Vec::with_capacity(def.field_count());
        for _ in 0..def.field_count() {
            fields.push(self.decode_required()?);
        }

        let object = ObjectValue { class_index, fields };
        self.refs[ref_index] = Value::Object(object.clone());
        Ok(object)
    }
}

/// The number of bytes a UTF-8 code point occupies, given its leading byte.
fn utf8_char_len(b0: u8) -> Result<usize> {
    if b0 & 0x80 == 0x00 {
        Ok(1)
    } else if b0 & 0xe0 == 0xc0 {
        Ok(2)
    } else if b0 & 0xf0 == 0xe0 {
        Ok(3)
    } else if b0 & 0xf8 == 0xf0 {
        Ok(4)
    } else {
        Err(Error::Unsupported("invalid utf-8 in string payload".to_string()))
    }
}
