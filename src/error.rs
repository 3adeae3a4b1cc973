//! Error types for the Hessian 2.0 codec
//!
//! This module defines every failure mode the codec can surface, optimized
//! for zero-cost propagation with `?` and messages that carry enough context
//! (offending tag byte, expected vs. actual length) to diagnose without
//! re-reading the source buffer.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Codec-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The input ended before a value could be fully read.
    #[error("not enough buffer: needed {needed} byte(s), had {available}")]
    NotEnoughBuf {
        /// Bytes required to complete the read.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The next byte is not a recognized tag.
    #[error("unknown tag: {0:#04x}")]
    UnknownTag(u8),

    /// A `BC_REF` index pointed outside the decoder's reference table.
    #[error("illegal ref index {index}: reference table has {len} entries")]
    IllegalRefIndex {
        /// The index that was read off the wire.
        index: i32,
        /// The current length of the reference table.
        len: usize,
    },

    /// A class index referenced a definition that was never registered or observed on the wire.
    #[error("illegal class index {index}: {len} class definition(s) known")]
    IllegalClassIndex {
        /// The index that was read off the wire.
        index: i32,
        /// The number of class definitions known at the time.
        len: usize,
    },

    /// Response envelope framing was rejected.
    #[error("illegal package: {0}")]
    IllegalPackage(String),

    /// The peer's response carried a non-OK status with an exception payload.
    #[error("peer exception: {0}")]
    PeerException(String),

    /// The encoder was asked to serialize a value shape it does not recognize.
    #[error("unsupported value shape: {0}")]
    Unsupported(String),

    /// Container nesting exceeded `CodecConfig::max_depth`.
    #[error("nesting too deep: exceeded max depth {max_depth}")]
    NestingTooDeep {
        /// The configured limit that was exceeded.
        max_depth: usize,
    },

    /// The reference table grew past `CodecConfig::max_ref_table_len`.
    #[error("reference table too large: exceeded max length {max_ref_table_len}")]
    RefTableTooLarge {
        /// The configured limit that was exceeded.
        max_ref_table_len: usize,
    },

    /// A configuration file existed but failed to parse as TOML.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error bubbled up from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::NotEnoughBuf`] from the requested and available lengths.
    pub fn not_enough_buf(needed: usize, available: usize) -> Self {
        Error::NotEnoughBuf { needed, available }
    }
}
