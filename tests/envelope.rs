use hessian2::{unpack_response, Error, Value};

const MAGIC: [u8; 2] = [0xda, 0xbb];

fn build_envelope(status: u8, body: Vec<u8>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + body.len());
    buf.extend_from_slice(&MAGIC);
    buf.push(0x05); // serialization id = 5, no request/event/two-way flags
    buf.push(status);
    buf.extend_from_slice(&[0u8; 8]); // request id, unused by unpack_response
    buf.extend_from_slice(&(body.len() as i32).to_be_bytes());
    buf.extend_from_slice(&body);
    buf
}

fn value_body(discriminator: i32, value: &Value) -> Vec<u8> {
    let mut buf = hessian2::encode(&Value::Int32(discriminator), Vec::new());
    buf = hessian2::encode(value, buf);
    buf
}

#[test]
fn unpacks_a_value_response() {
    let body = value_body(1, &Value::string("ok"));
    let buf = build_envelope(20, body);
    let decoded = unpack_response(&buf).expect("envelope must parse");
    assert_eq!(decoded, Value::string("ok"));
}

#[test]
fn unpacks_a_null_response() {
    let mut body = hessian2::encode(&Value::Int32(2), Vec::new());
    body.extend_from_slice(&[]);
    let buf = build_envelope(20, body);
    let decoded = unpack_response(&buf).expect("envelope must parse");
    assert_eq!(decoded, Value::Null);
}

#[test]
fn rejects_short_buffer() {
    let err = unpack_response(&[0xda, 0xbb, 0x05]).unwrap_err();
    assert!(matches!(err, Error::IllegalPackage(_)));
}

#[test]
fn rejects_bad_magic() {
    let buf = build_envelope(20, value_body(1, &Value::Null));
    let mut bad = buf.clone();
    bad[0] = 0x00;
    let err = unpack_response(&bad).unwrap_err();
    assert!(matches!(err, Error::IllegalPackage(_)));
}

#[test]
fn rejects_zero_serialization_id() {
    let mut buf = build_envelope(20, value_body(1, &Value::Null));
    buf[2] &= !0x1f;
    let err = unpack_response(&buf).unwrap_err();
    assert!(matches!(err, Error::IllegalPackage(_)));
}

#[test]
fn rejects_request_flag_set() {
    let mut buf = build_envelope(20, value_body(1, &Value::Null));
    buf[2] |= 0x80;
    let err = unpack_response(&buf).unwrap_err();
    assert!(matches!(err, Error::IllegalPackage(_)));
}

#[test]
fn non_ok_status_surfaces_peer_exception() {
    let mut buf = build_envelope(70, b"boom".to_vec());
    // exception text occupies buf[18..len-1]; pad so that window holds "boom".
    buf.truncate(16);
    buf.extend_from_slice(b"XXboomX"); // bytes 16,17 are padding, 18..len-1 = "boom"
    let err = unpack_response(&buf).unwrap_err();
    match err {
        Error::PeerException(msg) => assert_eq!(msg, "boom"),
        other => panic!("expected PeerException, got {other:?}"),
    }
}

#[test]
fn rejects_body_length_mismatch() {
    let mut buf = build_envelope(20, value_body(1, &Value::Null));
    let correct_body_len = (buf.len() - 16) as i32;
    buf[12..16].copy_from_slice(&(correct_body_len + 1).to_be_bytes());
    let err = unpack_response(&buf).unwrap_err();
    assert!(matches!(err, Error::IllegalPackage(_)));
}
