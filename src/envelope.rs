//! RPC response envelope framing
//!
//! A thin 16-byte header wraps the Hessian-encoded payload on the wire:
//! two magic bytes, a flags byte, a status byte, an 8-byte request id,
//! and a 4-byte big-endian body length. This module validates the
//! header and hands the remaining bytes to a fresh [`Decoder`].

use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::value::Value;

const MAGIC_HIGH: u8 = 0xda;
const MAGIC_LOW: u8 = 0xbb;
const HEADER_LENGTH: usize = 16;
const SERIALIZATION_MASK: u8 = 0x1f;
const FLAG_REQUEST: u8 = 0x80;

/// Response status sentinels, from the header's status byte.
pub mod status {
    /// Success.
    pub const OK: u8 = 20;
    /// Client-observed timeout.
    pub const CLIENT_TIMEOUT: u8 = 30;
    /// Server-observed timeout.
    pub const SERVER_TIMEOUT: u8 = 31;
    /// Malformed request.
    pub const BAD_REQUEST: u8 = 40;
    /// Malformed response.
    pub const BAD_RESPONSE: u8 = 50;
    /// Requested service not found.
    pub const SERVICE_NOT_FOUND: u8 = 60;
    /// Service-side error.
    pub const SERVICE_ERROR: u8 = 70;
    /// Server-side error.
    pub const SERVER_ERROR: u8 = 80;
    /// Client-side error.
    pub const CLIENT_ERROR: u8 = 90;
}

/// Envelope discriminator values: the first `Value` decoded from the
/// body, classifying what follows.
mod discriminator {
    pub const WITH_EXCEPTION: i32 = 0;
    pub const VALUE: i32 = 1;
    pub const NULL_VALUE: i32 = 2;
}

/// Validate and unwrap a 16-byte-headered RPC response, returning the
/// decoded payload value.
pub fn unpack_response(buf: &[u8]) -> Result<Value> {
    let length = buf.len();
    if length < HEADER_LENGTH {
        tracing::warn!(length, "response buffer shorter than header");
        return Err(Error::IllegalPackage("buffer shorter than header".to_string()));
    }
    if buf[0] != MAGIC_HIGH || buf[1] != MAGIC_LOW {
        tracing::warn!("response buffer has bad magic bytes");
        return Err(Error::IllegalPackage("bad magic bytes".to_string()));
    }

    let serialization_id = buf[2] & SERIALIZATION_MASK;
    if serialization_id == 0 {
        tracing::warn!("response buffer has zero serialization id");
        return Err(Error::IllegalPackage("zero serialization id".to_string()));
    }

    let request_flag = buf[2] & FLAG_REQUEST;
    if request_flag != 0 {
        tracing::warn!("response buffer has request flag set");
        return Err(Error::IllegalPackage("request flag set on a response".to_string()));
    }

    let status = buf[3];
    if status != status::OK {
        let exception_bytes = buf.get(18..length.saturating_sub(1)).unwrap_or(&[]);
        let message = String::from_utf8_lossy(exception_bytes).into_owned();
        tracing::warn!(status, "response status not OK");
        return Err(Error::PeerException(message));
    }

    let body_len = i32::from_be_bytes(buf[12..16].try_into().unwrap());
    if body_len < 0 || body_len as usize + HEADER_LENGTH != length {
        tracing::warn!(body_len, length, "response body length mismatch");
        return Err(Error::IllegalPackage("body length mismatch".to_string()));
    }

    tracing::debug!(serialization_id, status, "accepted response envelope");

    let mut decoder = Decoder::new(buf[HEADER_LENGTH..].to_vec());
    let kind = match decoder.decode()? {
        Some(Value::Int32(n)) => n,
        Some(other) => {
            return Err(Error::IllegalPackage(format!(
                "expected integer envelope discriminator, got {other:?}"
            )))
        }
        None => return Err(Error::IllegalPackage("missing envelope discriminator".to_string())),
    };

    match kind {
        discriminator::WITH_EXCEPTION => {
            let exception = decoder
                .decode()?
                .ok_or_else(|| Error::not_enough_buf(1, 0))?;
            let message = match exception {
                Value::String(s) => s,
                other => format!("{other:?}"),
            };
            Err(Error::PeerException(message))
        }
        discriminator::VALUE => decoder.decode()?.ok_or_else(|| Error::not_enough_buf(1, 0)),
        discriminator::NULL_VALUE => Ok(Value::Null),
        other => Err(Error::IllegalPackage(format!("unknown envelope discriminator {other}"))),
    }
}
