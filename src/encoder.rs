//! The Hessian 2.0 encoder
//!
//! `encode` appends the shortest legal tag encoding for a [`Value`] to a
//! caller-owned byte buffer and returns the extended buffer. Dispatch is
//! purely on the `Value` variant; no heap allocation is required beyond
//! buffer growth, and recognized shapes never panic.

use chrono::{DateTime, Utc};

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::registry::{ClassDef, Pojo, REGISTRY};
use crate::tag::*;
use crate::value::{ListValue, MapValue, ObjectValue, Value};

/// Encode a single value, appending to `buf` and returning it.
pub fn encode(value: &Value, mut buf: Vec<u8>) -> Vec<u8> {
    match value {
        Value::Null => enc_null(buf),
        Value::Bool(b) => enc_bool(*b, buf),
        Value::Int32(i) => enc_int32(*i, buf),
        Value::Int64(i) => enc_int64(*i, buf),
        Value::Double(d) => enc_double(*d, buf),
        Value::Date(d) => enc_date(*d, buf),
        Value::String(s) => enc_string(s, buf),
        Value::Binary(b) => enc_binary(b, buf),
        Value::List(l) => enc_list(l, buf),
        Value::Map(m) => enc_map(m, buf),
        Value::Object(o) => {
            enc_object_header(o.class_index, &mut buf);
            for field in &o.fields {
                buf = encode(field, buf);
            }
            buf
        }
        Value::Ref(idx) => {
            buf.push(BC_REF);
            pack_i32(*idx, &mut buf);
            buf
        }
    }
}

/// Register `T` if needed (emitting its class definition to `buf` the
/// first time it is seen process-wide) and encode `fields` as an
/// instance of it, in `T::field_names()` order.
pub fn encode_struct<T: Pojo>(fields: Vec<Value>, mut buf: Vec<u8>) -> Vec<u8> {
    let newly_registered = REGISTRY.register::<T>();
    let class_index = if newly_registered >= 0 {
        let (_, def) = REGISTRY
            .struct_by_index(newly_registered)
            .expect("index just returned by register() must be valid");
        enc_class_def(&def, &mut buf);
        newly_registered
    } else {
        REGISTRY
            .lookup_by_user_type::<T>()
            .expect("register() returned -1, so T must already be registered")
    };

    enc_object_header(class_index, &mut buf);
    for field in &fields {
        buf = encode(field, buf);
    }
    buf
}

fn enc_null(mut buf: Vec<u8>) -> Vec<u8> {
    buf.push(BC_NULL);
    buf
}

fn enc_bool(b: bool, mut buf: Vec<u8>) -> Vec<u8> {
    buf.push(if b { BC_TRUE } else { BC_FALSE });
    buf
}

fn enc_int32(v: i32, mut buf: Vec<u8>) -> Vec<u8> {
    if (INT_DIRECT_MIN..=INT_DIRECT_MAX).contains(&v) {
        buf.push((v + BC_INT_ZERO as i32) as u8);
    } else if (INT_BYTE_MIN..=INT_BYTE_MAX).contains(&v) {
        buf.push((BC_INT_BYTE_ZERO as i32 + (v >> 8)) as u8);
        buf.push((v & 0xff) as u8);
    } else if (INT_SHORT_MIN..=INT_SHORT_MAX).contains(&v) {
        buf.push((BC_INT_SHORT_ZERO as i32 + (v >> 16)) as u8);
        buf.push(((v >> 8) & 0xff) as u8);
        buf.push((v & 0xff) as u8);
    } else {
        buf.push(BC_INT);
        pack_i32(v, &mut buf);
    }
    buf
}

fn enc_int64(v: i64, mut buf: Vec<u8>) -> Vec<u8> {
    if (LONG_DIRECT_MIN..=LONG_DIRECT_MAX).contains(&v) {
        buf.push((v + BC_LONG_ZERO as i64) as u8);
    } else if (LONG_BYTE_MIN..=LONG_BYTE_MAX).contains(&v) {
        buf.push((BC_LONG_BYTE_ZERO as i64 + (v >> 8)) as u8);
        buf.push((v & 0xff) as u8);
    } else if (LONG_SHORT_MIN..=LONG_SHORT_MAX).contains(&v) {
        buf.push((BC_LONG_SHORT_ZERO as i64 + (v >> 16)) as u8);
        buf.push(((v >> 8) & 0xff) as u8);
        buf.push((v & 0xff) as u8);
    } else if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
        buf.push(BC_LONG_INT);
        pack_i32(v as i32, &mut buf);
    } else {
        buf.push(BC_LONG);
        pack_i64(v, &mut buf);
    }
    buf
}

fn enc_double(v: f64, mut buf: Vec<u8>) -> Vec<u8> {
    if v == 0.0 {
        buf.push(BC_DOUBLE_ZERO);
    } else if v == 1.0 {
        buf.push(BC_DOUBLE_ONE);
    } else if v.fract() == 0.0 && (-128.0..=127.0).contains(&v) {
        buf.push(BC_DOUBLE_BYTE);
        buf.push(v as i64 as u8);
    } else if v.fract() == 0.0 && (-32768.0..=32767.0).contains(&v) {
        let i = v as i64;
        buf.push(BC_DOUBLE_SHORT);
        buf.push(((i >> 8) & 0xff) as u8);
        buf.push((i & 0xff) as u8);
    } else if (v as f32) as f64 == v {
        buf.push(BC_DOUBLE_MILL);
        buf.extend_from_slice(&(v as f32).to_bits().to_be_bytes());
    } else {
        buf.push(BC_DOUBLE);
        pack_f64(v, &mut buf);
    }
    buf
}

fn enc_date(v: DateTime<Utc>, mut buf: Vec<u8>) -> Vec<u8> {
    let ms = v.timestamp_millis();
    if ms % 60_000 == 0 {
        buf.push(BC_DATE_MINUTE);
        pack_i32((ms / 60_000) as i32, &mut buf);
    } else {
        buf.push(BC_DATE);
        pack_i64(ms, &mut buf);
    }
    buf
}

fn enc_string(s: &str, mut buf: Vec<u8>) -> Vec<u8> {
    let chars: Vec<char> = s.chars().collect();
    if chars.is_empty() {
        buf.push(BC_STRING_DIRECT);
        return buf;
    }

    let chunk_size = DEFAULT_CHUNK_SIZE;
    let mut offset = 0;
    while offset < chars.len() {
        let remaining = chars.len() - offset;
        if remaining > chunk_size {
            buf.push(BC_STRING_CHUNK);
            write_len16(chunk_size as i32, &mut buf);
            write_chars(&chars[offset..offset + chunk_size], &mut buf);
            offset += chunk_size;
            continue;
        }

        let len = remaining as i32;
        if offset == 0 {
            if len as u8 <= STRING_DIRECT_MAX {
                buf.push(BC_STRING_DIRECT + len as u8);
            } else if len <= STRING_SHORT_MAX_LEN {
                buf.push(BC_STRING_SHORT + (len >> 8) as u8);
                buf.push((len & 0xff) as u8);
            } else {
                buf.push(BC_STRING);
                write_len16(len, &mut buf);
            }
        } else {
            buf.push(BC_STRING);
            write_len16(len, &mut buf);
        }
        write_chars(&chars[offset..], &mut buf);
        offset = chars.len();
    }
    buf
}

fn enc_binary(b: &[u8], mut buf: Vec<u8>) -> Vec<u8> {
    if b.is_empty() {
        buf.push(BC_BINARY_DIRECT);
        return buf;
    }

    let chunk_size = DEFAULT_CHUNK_SIZE;
    let mut offset = 0;
    while offset < b.len() {
        let remaining = b.len() - offset;
        if remaining > chunk_size {
            buf.push(BC_BINARY_CHUNK);
            write_len16(chunk_size as i32, &mut buf);
            buf.extend_from_slice(&b[offset..offset + chunk_size]);
            offset += chunk_size;
            continue;
        }

        let len = remaining as i32;
        if offset == 0 {
            if len as u8 <= (BINARY_DIRECT_MAX - BC_BINARY_DIRECT) {
                buf.push(BC_BINARY_DIRECT + len as u8);
            } else if len <= BINARY_SHORT_MAX_LEN {
                buf.push(BC_BINARY_SHORT + (len >> 8) as u8);
                buf.push((len & 0xff) as u8);
            } else {
                buf.push(BC_BINARY);
                write_len16(len, &mut buf);
            }
        } else {
            buf.push(BC_BINARY);
            write_len16(len, &mut buf);
        }
        buf.extend_from_slice(&b[offset..]);
        offset = b.len();
    }
    buf
}

fn write_len16(len: i32, buf: &mut Vec<u8>) {
    buf.push(((len >> 8) & 0xff) as u8);
    buf.push((len & 0xff) as u8);
}

fn write_chars(chars: &[char], buf: &mut Vec<u8>) {
    let mut tmp = [0u8; 4];
    for c in chars {
        buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
    }
}

fn enc_list(list: &ListValue, mut buf: Vec<u8>) -> Vec<u8> {
    // Always emitted as a fixed-length untyped list, per SPEC_FULL.md §4.3:
    // the type descriptor carried on typed lists is decode-only support
    // for peer-originated streams.
    buf.push(BC_LIST_FIXED_UNTYPED);
    pack_i32(list.items.len() as i32, &mut buf);
    for item in &list.items {
        buf = encode(item, buf);
    }
    buf
}

fn enc_map(map: &MapValue, mut buf: Vec<u8>) -> Vec<u8> {
    buf.push(BC_MAP_UNTYPED);
    'entries: for (k, v) in &map.entries {
        // Keys whose dynamic type is not a recognized primitive are
        // skipped by leaving the buffer unchanged for that entry -
        // documented fail-open behavior, see SPEC_FULL.md §9.
        if !is_supported_key(k) {
            continue 'entries;
        }
        buf = encode(k, buf);
        buf = encode(v, buf);
    }
    buf.push(BC_END);
    buf
}

fn is_supported_key(v: &Value) -> bool {
    matches!(
        v,
        Value::String(_) | Value::Bool(_) | Value::Int32(_) | Value::Int64(_) | Value::Binary(_)
    )
}

fn enc_object_header(class_index: i32, buf: &mut Vec<u8>) {
    if (0..=(OBJECT_DIRECT_MAX - BC_OBJECT_DIRECT) as i32).contains(&class_index) {
        buf.push(BC_OBJECT_DIRECT + class_index as u8);
    } else {
        buf.push(BC_OBJECT);
        pack_i32(class_index, buf);
    }
}

fn enc_class_def(def: &ClassDef, buf: &mut Vec<u8>) {
    buf.push(BC_OBJECT_DEF);
    let mut tmp = encode(&Value::string(def.wire_class_name.clone()), Vec::new());
    buf.append(&mut tmp);
    pack_i32(def.field_count() as i32, buf);
    for name in &def.field_names {
        let mut tmp = encode(&Value::string(name.clone()), Vec::new());
        buf.append(&mut tmp);
    }
}

/// Build a [`Value::Object`] for an already-known class index, useful
/// when re-encoding a decoded value without a concrete Rust type.
pub fn object_value(class_index: i32, fields: Vec<Value>) -> ObjectValue {
    ObjectValue { class_index, fields }
}
