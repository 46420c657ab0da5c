//! Device configuration.
//!
//! Strongly-typed configuration with per-field defaults, loadable from a TOML
//! file plus `NIBBLE_PIPE_`-prefixed environment variables (environment wins).
//! Semantic validation is a separate step from parsing: values that parse but
//! are logically invalid (a zero page size, a zero reader limit) are caught by
//! [`DeviceConfig::validate`].

use crate::error::{Error, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_ring_capacity() -> usize {
    4096
}

fn default_page_size() -> usize {
    4096
}

fn default_terminator() -> u8 {
    0x00
}

fn default_max_readers() -> usize {
    1
}

/// Tunable parameters of one pipeline device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Capacity of the staging ring buffer in bytes. Fixed at construction;
    /// a full ring rejects pushes rather than growing or blocking.
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,

    /// Size of each page in the per-file byte store.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// In-band byte value marking the end of one logical file.
    #[serde(default = "default_terminator")]
    pub terminator: u8,

    /// Initial cap on concurrent reader sessions. Adjustable at runtime via
    /// [`Device::set_max_readers`](crate::device::Device::set_max_readers).
    #[serde(default = "default_max_readers")]
    pub max_readers: usize,

    /// Optional cap on pages in use across all records; `None` is bounded
    /// only by the allocator.
    #[serde(default)]
    pub max_pages: Option<usize>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ring_capacity: default_ring_capacity(),
            page_size: default_page_size(),
            terminator: default_terminator(),
            max_readers: default_max_readers(),
            max_pages: None,
        }
    }
}

impl DeviceConfig {
    /// Load from a TOML file overlaid with `NIBBLE_PIPE_` environment
    /// variables, then validate. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("NIBBLE_PIPE_"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints that parsing cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.ring_capacity == 0 {
            return Err(Error::InvalidConfig("ring_capacity must be > 0".into()));
        }
        if self.page_size == 0 {
            return Err(Error::InvalidConfig("page_size must be > 0".into()));
        }
        if self.max_readers == 0 {
            return Err(Error::InvalidConfig("max_readers must be >= 1".into()));
        }
        if self.max_pages == Some(0) {
            return Err(Error::InvalidConfig(
                "max_pages must be > 0 when set".into(),
            ));
        }
        Ok(())
    }
}
