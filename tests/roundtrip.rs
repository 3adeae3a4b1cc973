use chrono::{TimeZone, Utc};
use hessian2::{
    decode, encode, registry::Pojo, ListValue, MapValue, ObjectValue, Value, REGISTRY,
};
use proptest::prelude::*;

fn roundtrip(v: Value) -> Value {
    let bytes = encode(&v, Vec::new());
    decode(bytes).expect("decode of freshly encoded value must succeed")
}

// --- literal scenarios from the concrete-scenario list ---------------------

#[test]
fn literal_bool_and_null_tags() {
    assert_eq!(encode(&Value::Bool(true), Vec::new()), vec![0x54]);
    assert_eq!(encode(&Value::Bool(false), Vec::new()), vec![0x46]);
    assert_eq!(encode(&Value::Null, Vec::new()), vec![0x4e]);
}

#[test]
fn literal_int32_direct_roundtrips() {
    assert_eq!(roundtrip(Value::Int32(0xe6)), Value::Int32(0xe6));
}

#[test]
fn literal_int32_five_byte_form() {
    let v = 0x2016_1024_i32;
    let bytes = encode(&Value::Int32(v), Vec::new());
    assert_eq!(bytes.len(), 5);
    assert_eq!(bytes[0], 0x49);
    assert_eq!(decode(bytes).unwrap(), Value::Int32(v));
}

#[test]
fn literal_int64_nine_byte_form() {
    let v = 0x2016_1024_1145_30_i64;
    let bytes = encode(&Value::Int64(v), Vec::new());
    assert_eq!(bytes.len(), 9);
    assert_eq!(bytes[0], 0x4c);
    assert_eq!(decode(bytes).unwrap(), Value::Int64(v));
}

#[test]
fn literal_string_roundtrips() {
    assert_eq!(roundtrip(Value::string("hello")), Value::string("hello"));
}

#[test]
fn literal_heterogeneous_list_roundtrips() {
    let inner = ListValue::untyped(vec![
        Value::Int32(0),
        Value::Int32(2),
        Value::Int32(4),
        Value::Int32(6),
        Value::Int32(8),
        Value::Int32(10),
    ]);
    let list = ListValue::untyped(vec![
        Value::Int32(100),
        Value::Double(10.001),
        Value::string("hello"),
        Value::List(inner),
        Value::Bool(true),
        Value::Null,
        Value::Bool(false),
    ]);
    let v = Value::List(list);
    assert_eq!(roundtrip(v.clone()), v);
}

#[test]
fn literal_date_roundtrips() {
    let dt = Utc.with_ymd_and_hms(2014, 2, 9, 6, 15, 23).unwrap();
    assert_eq!(roundtrip(Value::Date(dt)), Value::Date(dt));
}

#[test]
fn literal_date_on_minute_boundary_uses_minute_form() {
    let dt = Utc.with_ymd_and_hms(2014, 2, 9, 6, 15, 0).unwrap();
    let bytes = encode(&Value::Date(dt), Vec::new());
    assert_eq!(bytes[0], 0x4b); // BC_DATE_MINUTE
    assert_eq!(decode(bytes).unwrap(), Value::Date(dt));
}

#[test]
fn literal_binary_roundtrips() {
    assert_eq!(roundtrip(Value::binary(Vec::<u8>::new())), Value::binary(Vec::<u8>::new()));

    let raw: Vec<u8> = vec![10, 9, 8, 7, 6, 5, 4, 3, 2, 1, b'a', b'b', b'c', b'd'];
    assert_eq!(roundtrip(Value::binary(raw.clone())), Value::binary(raw));
}

#[test]
fn literal_map_roundtrips() {
    let map = MapValue::untyped(vec![
        (Value::string("hello"), Value::string("world")),
        (Value::Int32(100), Value::string("100")),
        (Value::Double(100.1010), Value::Int32(101910)),
        (Value::Bool(true), Value::Bool(true)),
        (Value::Bool(false), Value::Bool(true)),
    ]);
    let decoded = roundtrip(Value::Map(map.clone()));
    match decoded {
        Value::Map(got) => {
            assert_eq!(got.entries.len(), map.entries.len());
            for entry in &map.entries {
                assert!(got.entries.contains(entry), "missing entry {entry:?}");
            }
        }
        other => panic!("expected Value::Map, got {other:?}"),
    }
}

// --- registry / object instance round trips ---------------------------------

struct Greeting {
    text: String,
    loud: bool,
}

impl Pojo for Greeting {
    fn wire_class_name() -> &'static str {
        "com.example.Greeting"
    }
    fn field_names() -> &'static [&'static str] {
        &["text", "loud"]
    }
}

#[test]
fn register_then_register_is_idempotent() {
    let first = REGISTRY.register::<Greeting>();
    let second = REGISTRY.register::<Greeting>();
    assert_eq!(second, -1);
    assert!(first < 0 || REGISTRY.len() > 0);
}

#[test]
fn object_instance_roundtrips_through_registry() {
    let _ = REGISTRY.register::<Greeting>();
    let fields = vec![Value::string("hi"), Value::Bool(true)];
    let bytes = hessian2::encode_struct::<Greeting>(fields.clone(), Vec::new());
    let decoded = decode(bytes).expect("decode must succeed");
    match decoded {
        Value::Object(ObjectValue { fields: got, .. }) => assert_eq!(got, fields),
        other => panic!("expected Value::Object, got {other:?}"),
    }
}

#[test]
fn back_reference_resolves_to_same_list_instance() {
    use hessian2::Decoder;

    // A 2-element list whose second element is a back-reference to the
    // list itself: [ref(0)] where ref(0) points at the list's own slot.
    let mut buf = Vec::new();
    buf.push(0x58); // BC_LIST_FIXED_UNTYPED
    buf.extend_from_slice(&1i32.to_be_bytes());
    buf.push(0x51); // BC_REF
    buf.extend_from_slice(&0i32.to_be_bytes());

    let mut decoder = Decoder::new(buf);
    let value = decoder.decode().unwrap().unwrap();
    match &value {
        Value::List(l) => assert_eq!(l.items, vec![Value::Ref(0)]),
        other => panic!("expected Value::List, got {other:?}"),
    }
    assert_eq!(decoder.refs().len(), 1);
    assert_eq!(decoder.refs()[0], value);
}

// --- property-based round trips ---------------------------------------------

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::Int32),
        any::<i64>().prop_map(Value::Int64),
        any::<String>().prop_map(Value::string),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(|b| Value::binary(b)),
        (-8_000_000_000_000i64..=8_000_000_000_000i64)
            .prop_map(|ms| Value::Date(Utc.timestamp_millis_opt(ms).unwrap())),
    ]
}

proptest! {
    #[test]
    fn scalar_values_roundtrip(v in arb_scalar()) {
        prop_assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn int32_picks_shortest_form(i in -16i32..=47) {
        let bytes = encode(&Value::Int32(i), Vec::new());
        prop_assert_eq!(bytes.len(), 1);
    }

    #[test]
    fn int32_byte_form_is_two_bytes(i in prop_oneof![(-2048i32..-16), (48i32..=2047)]) {
        let bytes = encode(&Value::Int32(i), Vec::new());
        prop_assert_eq!(bytes.len(), 2);
        prop_assert_eq!(decode(bytes).unwrap(), Value::Int32(i));
    }

    #[test]
    fn lists_of_scalars_roundtrip(items in prop::collection::vec(arb_scalar(), 0..8)) {
        let v = Value::List(ListValue::untyped(items));
        prop_assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn strings_roundtrip_across_chunk_boundary(n in 32760usize..32780) {
        let s: String = "x".repeat(n);
        let v = Value::string(s);
        prop_assert_eq!(roundtrip(v.clone()), v);
    }
}
