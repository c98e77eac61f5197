//! Target platform description.
//!
//! Loads [`SocConfig`] from a TOML file (`soc.toml`) with environment variable
//! overrides via `AICORE_*` prefixed variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::DType;

/// Bytes of the unified buffer held back for the runtime.
pub const RESERVED_UB_SIZE: usize = 8 * 1024;

/// Largest transfer block: one full vector repeat.
pub const MAX_BLOCK_BYTES: usize = 256;

/// Staging carves the usable buffer into shares of this many bytes, each
/// holding one 32-byte part per buffer.
const UB_SHARE_BYTES: usize = 96;

/// Known accelerator platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SocVersion {
    Ascend310,
    Ascend610,
    Ascend910,
    Hi3796CV300ES,
    Hi3796CV300CS,
    SD3403,
}

impl SocVersion {
    pub const ALL: &'static [SocVersion] = &[
        SocVersion::Ascend310,
        SocVersion::Ascend610,
        SocVersion::Ascend910,
        SocVersion::Hi3796CV300ES,
        SocVersion::Hi3796CV300CS,
        SocVersion::SD3403,
    ];

    /// Whether the vector unit multiplies float32 operands.
    pub fn supports_fp32_vector_mul(self) -> bool {
        !matches!(self, Self::Hi3796CV300ES | Self::Hi3796CV300CS | Self::SD3403)
    }

    /// Dtypes the loss kernels are offered in on this platform.
    pub fn loss_dtypes(self) -> &'static [DType] {
        if self.supports_fp32_vector_mul() {
            &[DType::Float16, DType::Float32]
        } else {
            &[DType::Float16]
        }
    }
}

impl std::fmt::Display for SocVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ascend310 => "Ascend310",
            Self::Ascend610 => "Ascend610",
            Self::Ascend910 => "Ascend910",
            Self::Hi3796CV300ES => "Hi3796CV300ES",
            Self::Hi3796CV300CS => "Hi3796CV300CS",
            Self::SD3403 => "SD3403",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for SocVersion {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown SoC version: {s}"))
    }
}

/// Platform configuration loaded from TOML with environment variable overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocConfig {
    /// Target platform.
    /// Override: `AICORE_SOC_VERSION`
    pub soc_version: SocVersion,

    /// Number of physical execution units.
    /// Override: `AICORE_CORE_NUM`
    pub core_num: usize,

    /// Unified (on-chip) buffer size in bytes, before the runtime reservation.
    /// Override: `AICORE_UB_SIZE`
    pub ub_size: usize,

    /// Global-memory transfer granule in bytes.
    /// Override: `AICORE_BLOCK_BYTES`
    pub block_bytes: usize,

    /// Verify in every build that accepted scatter targets stay inside the
    /// owning unit's range. Debug builds always check.
    /// Override: `AICORE_DEBUG_PARTITION_CHECKS`
    pub debug_partition_checks: bool,
}

impl Default for SocConfig {
    fn default() -> Self {
        Self {
            soc_version: SocVersion::Ascend910,
            core_num: 32,
            ub_size: 256 * 1024,
            block_bytes: 32,
            debug_partition_checks: false,
        }
    }
}

/// Errors that can occur when loading or validating a [`SocConfig`].
#[derive(Debug, thiserror::Error)]
pub enum SocConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render TOML: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid environment override {key}={value}: {reason}")]
    EnvOverride { key: String, value: String, reason: String },
}

impl SocConfig {
    /// Render the default configuration as TOML.
    pub fn default_toml() -> Result<String, SocConfigError> {
        Self::default().to_toml()
    }

    pub fn to_toml(&self) -> Result<String, SocConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields, then apply environment variable overrides.
    pub fn load(path: &Path) -> Result<Self, SocConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SocConfigError> {
        let mut cfg: SocConfig = toml::from_str(toml_str)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load only from environment variables, starting from defaults.
    pub fn from_env() -> Result<Self, SocConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Unified buffer bytes left after the runtime reservation.
    pub fn usable_ub_bytes(&self) -> usize {
        self.ub_size.saturating_sub(RESERVED_UB_SIZE)
    }

    /// Elements of `dtype` moved by one transfer block.
    pub fn block_elems(&self, dtype: DType) -> usize {
        self.block_bytes / dtype.size_in_bytes()
    }

    pub fn validate(&self) -> Result<(), SocConfigError> {
        if self.core_num == 0 {
            return Err(SocConfigError::Validation("core_num must be > 0".into()));
        }
        if !self.block_bytes.is_power_of_two()
            || !(8..=MAX_BLOCK_BYTES).contains(&self.block_bytes)
        {
            return Err(SocConfigError::Validation(format!(
                "block_bytes must be a power of two in 8..={MAX_BLOCK_BYTES}, got {}",
                self.block_bytes
            )));
        }
        // every staging part must hold at least one block
        let minimum = RESERVED_UB_SIZE + UB_SHARE_BYTES * self.block_bytes.div_ceil(32);
        if self.ub_size < minimum {
            return Err(SocConfigError::Validation(format!(
                "ub_size must be >= {minimum} bytes, got {}",
                self.ub_size
            )));
        }
        Ok(())
    }

    /// Apply `AICORE_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), SocConfigError> {
        if let Ok(val) = std::env::var("AICORE_SOC_VERSION") {
            self.soc_version = val.parse::<SocVersion>().map_err(|reason| {
                SocConfigError::EnvOverride {
                    key: "AICORE_SOC_VERSION".into(),
                    value: val.clone(),
                    reason,
                }
            })?;
        }

        if let Ok(val) = std::env::var("AICORE_CORE_NUM") {
            self.core_num = parse_env("AICORE_CORE_NUM", &val)?;
        }

        if let Ok(val) = std::env::var("AICORE_UB_SIZE") {
            self.ub_size = parse_env("AICORE_UB_SIZE", &val)?;
        }

        if let Ok(val) = std::env::var("AICORE_BLOCK_BYTES") {
            self.block_bytes = parse_env("AICORE_BLOCK_BYTES", &val)?;
        }

        if let Ok(val) = std::env::var("AICORE_DEBUG_PARTITION_CHECKS") {
            self.debug_partition_checks = matches!(val.as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }
}

fn parse_env(key: &str, val: &str) -> Result<usize, SocConfigError> {
    val.parse::<usize>().map_err(|e| SocConfigError::EnvOverride {
        key: key.into(),
        value: val.into(),
        reason: e.to_string(),
    })
}
