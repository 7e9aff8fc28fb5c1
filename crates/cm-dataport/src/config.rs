use thiserror::Error;

use crate::atomic::AtomicOp;

pub const ENV_ATOMIC_OPS: &str = "CM_EMU_ATOMIC_OPS";
pub const ENV_OOB_WRITE: &str = "CM_EMU_OOB_WRITE";
pub const ENV_ABORT_ON_ERROR: &str = "CM_EMU_ABORT_ON_ERROR";

/// Which generation of the atomic opcode table a kernel was compiled against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AtomicOpSet {
    /// Integer ops only, up to `MAXSINT`.
    Legacy,
    /// Integer and float ops, up to `FMAX`.
    #[default]
    Extended,
}

impl AtomicOpSet {
    /// Highest opcode accepted by this set.
    pub fn ceiling(self) -> AtomicOp {
        match self {
            AtomicOpSet::Legacy => AtomicOp::MaxSint,
            AtomicOpSet::Extended => AtomicOp::FMax,
        }
    }

    pub fn supports(self, op: AtomicOp) -> bool {
        op.raw() <= self.ceiling().raw()
    }
}

/// What a scattered, untyped or typed write does with a lane whose address is out of bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OobWritePolicy {
    /// Drop that lane and keep going.
    #[default]
    SkipLane,
    /// Drop that lane and every lane after it.
    StopAtFirst,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataportConfig {
    pub atomic_ops: AtomicOpSet,
    pub oob_write: OobWritePolicy,
    /// Terminate the process on the first rejected call instead of returning the error.
    /// Only consulted by front ends; the library always returns errors.
    pub abort_on_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for env var {var}")]
    InvalidEnv { var: &'static str, value: String },
}

impl DataportConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable source. Unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_ATOMIC_OPS) {
            config.atomic_ops = match raw.trim().to_ascii_lowercase().as_str() {
                "legacy" => AtomicOpSet::Legacy,
                "extended" | "" => AtomicOpSet::Extended,
                _ => return Err(invalid(ENV_ATOMIC_OPS, raw)),
            };
        }

        if let Some(raw) = lookup(ENV_OOB_WRITE) {
            config.oob_write = match raw.trim().to_ascii_lowercase().as_str() {
                "skip" | "" => OobWritePolicy::SkipLane,
                "stop" => OobWritePolicy::StopAtFirst,
                _ => return Err(invalid(ENV_OOB_WRITE, raw)),
            };
        }

        if let Some(raw) = lookup(ENV_ABORT_ON_ERROR) {
            config.abort_on_error = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => return Err(invalid(ENV_ABORT_ON_ERROR, raw)),
            };
        }

        Ok(config)
    }
}

fn invalid(var: &'static str, value: String) -> ConfigError {
    ConfigError::InvalidEnv { var, value }
}
