//! Configuration for the store and the media pipeline.
//!
//! Every field is optional; accessors resolve the defaults below. A `Config`
//! can be deserialized from JSON, with missing sections taking their defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default namespace prefix for local storage keys.
pub const DEFAULT_KEY_PREFIX: &str = "class_store_";

/// Default prefix for generated document ids.
pub const DEFAULT_ID_PREFIX: &str = "id_";

/// Default bound on the longer side of an inlined image, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Default JPEG quality (1–100) for inlined images.
pub const DEFAULT_JPEG_QUALITY: u8 = 70;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub media: MediaConfig,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Local store and facade settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prefix prepended to the collection name to form the storage key.
    pub key_prefix: Option<String>,
    /// Prefix of ids assigned by `save` to documents without one.
    pub id_prefix: Option<String>,
}

impl StoreConfig {
    pub fn key_prefix(&self) -> &str {
        self.key_prefix.as_deref().unwrap_or(DEFAULT_KEY_PREFIX)
    }

    pub fn id_prefix(&self) -> &str {
        self.id_prefix.as_deref().unwrap_or(DEFAULT_ID_PREFIX)
    }
}

/// Fallback-encoding settings for the media pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub max_dimension: Option<u32>,
    pub jpeg_quality: Option<u8>,
}

impl MediaConfig {
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension.unwrap_or(DEFAULT_MAX_DIMENSION).max(1)
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100)
    }
}
