//! A Hessian 2.0 binary codec with lightweight RPC response framing.
//!
//! The wire format is tag-byte driven: a single leading byte identifies
//! both the value's type and, for small scalars, part of its payload.
//! [`encode`]/[`Decoder::decode`] round-trip [`Value`], the crate's
//! in-memory tagged union; [`envelope::unpack_response`] peels the
//! 16-byte response envelope some RPC transports wrap it in.
//!
//! User-declared struct types participate by implementing [`Pojo`] and
//! going through [`encode_struct`]; the process-wide [`registry::REGISTRY`]
//! tracks the resulting class definitions so later instances (and
//! anything learned from the wire) resolve consistently.

#![warn(missing_docs)]

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod tag;
pub mod value;

pub use config::CodecConfig;
pub use decoder::Decoder;
pub use encoder::{encode, encode_struct};
pub use envelope::unpack_response;
pub use error::{Error, Result};
pub use registry::{Pojo, REGISTRY};
pub use value::{ListValue, MapValue, ObjectValue, Value};

/// Decode a single top-level value from a byte slice, using the default
/// [`CodecConfig`]. Convenience wrapper over [`Decoder`] for callers
/// that only need one value and don't care about the reference table.
pub fn decode(data: impl Into<Vec<u8>>) -> Result<Value> {
    let mut decoder = Decoder::new(data);
    decoder
        .decode()?
        .ok_or_else(|| Error::not_enough_buf(1, 0))
}
