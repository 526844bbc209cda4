//! Value Codec Module
//!
//! Reversible serialize-and-compress transform for cached values.
//!
//! Compression is CPU-bound and runs inline on the calling task. At high
//! throughput it is the first thing worth moving to `spawn_blocking`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Highest level handed to zstd.
const MAX_ZSTD_LEVEL: i32 = 22;

// == Compression Settings ==
/// Whether and how hard stored values are compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    /// False when compression is globally disabled
    pub enabled: bool,
    /// zstd level; 0 selects zstd's default
    pub quality: i32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: 3,
        }
    }
}

impl CompressionSettings {
    pub fn new(enabled: bool, quality: i32) -> Self {
        Self {
            enabled,
            quality: quality.clamp(0, MAX_ZSTD_LEVEL),
        }
    }

    /// Values are stored as-is.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    // == Encode ==
    /// Converts a value into its stored form.
    pub fn encode<V: Serialize>(&self, value: V) -> Result<Payload<V>> {
        if !self.enabled {
            return Ok(Payload::Raw(value));
        }

        let json = serde_json::to_vec(&value)?;
        let packed = zstd::encode_all(json.as_slice(), self.quality)?;
        Ok(Payload::Packed(Arc::from(packed)))
    }

    // == Decode ==
    /// Recovers the value from its stored form.
    ///
    /// Raw payloads decode regardless of the current settings.
    pub fn decode<V>(&self, payload: &Payload<V>) -> Result<V>
    where
        V: DeserializeOwned + Clone,
    {
        match payload {
            Payload::Raw(value) => Ok(value.clone()),
            Payload::Packed(bytes) => {
                let json = zstd::decode_all(&bytes[..])?;
                Ok(serde_json::from_slice(&json)?)
            }
        }
    }
}

// == Payload ==
/// Stored form of a cached value.
#[derive(Debug, Clone)]
pub enum Payload<V> {
    Raw(V),
    /// zstd-compressed JSON
    Packed(Arc<[u8]>),
}

impl<V> Payload<V> {
    pub fn is_packed(&self) -> bool {
        matches!(self, Payload::Packed(_))
    }
}
