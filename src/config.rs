//! Codec configuration
//!
//! Tunables that are not part of the wire contract but govern resource
//! usage and logging verbosity. None of these fields affect wire
//! compatibility, so peers running with different configs remain
//! interoperable.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default chunk size (code points for strings, bytes for binaries) the
/// encoder uses before splitting a value into multiple chunks.
pub const DEFAULT_CHUNK_SIZE: usize = 32_768;

/// Default recursion guard for nested containers.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Default sanity ceiling on reference-table growth per decode session.
pub const DEFAULT_MAX_REF_TABLE_LEN: usize = 1_000_000;

/// Codec-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Code points (strings) or bytes (binaries) per chunk before the
    /// encoder splits a value into a chunked representation.
    pub chunk_size: usize,

    /// Maximum container nesting depth the decoder will recurse into
    /// before failing with [`crate::error::Error::NestingTooDeep`].
    pub max_depth: usize,

    /// Maximum number of entries the decoder's reference table may grow
    /// to within a single decode session.
    pub max_ref_table_len: usize,

    /// Whether to emit per-value `trace!` events during decode, in
    /// addition to the always-on `debug!`/`warn!` events.
    pub log_verbose_decode: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            max_ref_table_len: DEFAULT_MAX_REF_TABLE_LEN,
            log_verbose_decode: false,
        }
    }
}

impl CodecConfig {
    /// Load configuration from a TOML file, failing if it cannot be read
    /// or parsed.
    pub fn load(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a TOML file if a path is given, falling
    /// back to [`CodecConfig::default`] when the path is absent or the
    /// load fails. Load failures are logged, not propagated.
    pub fn load_or_default(path: Option<&str>) -> Self {
        match path {
            Some(path) => match Self::load(path) {
                Ok(config) => {
                    tracing::info!(path, "loaded codec configuration");
                    config
                }
                Err(err) => {
                    tracing::warn!(path, error = %err, "failed to load codec configuration, using defaults");
                    Self::default()
                }
            },
            None => {
                tracing::debug!("no codec configuration path given, using defaults");
                Self::default()
            }
        }
    }
}
