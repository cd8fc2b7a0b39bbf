//! Protocol tunables
//!
//! Every field defaults to the value the wire protocol was designed around;
//! changing the MTU or pool size must be done identically on both ends.

use crate::packet::{DEFAULT_MTU, HEADER_SIZE};
use crate::sequence::{MAX_POOL_SIZE, POOL_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ticks an unacknowledged fragment may age before it is resent
pub const RETRANSMIT_AFTER_TICKS: u32 = 12;

/// Weight of the previous estimate in the smoothed RTT
pub const RTT_ALPHA: f64 = 0.05;

/// RTT estimate before the first sample
pub const INITIAL_RTT_TICKS: f64 = 10.0;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("MTU {mtu} leaves no room for payload (header is {header} bytes)")]
    MtuTooSmall { mtu: usize, header: usize },

    #[error("Sequence pool must hold at least 2 ids, got {0}")]
    EmptyPool(u32),

    #[error("Sequence pool may hold at most {max} ids, got {size}")]
    PoolTooLarge { size: u32, max: u32 },

    #[error("RTT alpha must be within [0, 1], got {0}")]
    InvalidAlpha(f64),
}

/// Protocol configuration shared by sender and receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Largest packet the link will carry
    #[serde(default = "default_mtu")]
    pub mtu: usize,
    /// Number of sequence ids in the pool
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Age (in ticks) beyond which an unacknowledged fragment is resent
    #[serde(default = "default_retransmit_after")]
    pub retransmit_after_ticks: u32,
    /// EWMA weight of the previous RTT estimate
    #[serde(default = "default_rtt_alpha")]
    pub rtt_alpha: f64,
    /// RTT estimate before the first acknowledgment
    #[serde(default = "default_initial_rtt")]
    pub initial_rtt_ticks: f64,
}

fn default_mtu() -> usize {
    DEFAULT_MTU
}

fn default_pool_size() -> u32 {
    POOL_SIZE
}

fn default_retransmit_after() -> u32 {
    RETRANSMIT_AFTER_TICKS
}

fn default_rtt_alpha() -> f64 {
    RTT_ALPHA
}

fn default_initial_rtt() -> f64 {
    INITIAL_RTT_TICKS
}

impl ProtocolConfig {
    /// Default configuration with a different MTU
    pub fn with_mtu(mtu: usize) -> Self {
        ProtocolConfig {
            mtu,
            ..ProtocolConfig::default()
        }
    }

    /// Largest payload that fits in one fragment
    pub fn effective_mtu(&self) -> usize {
        self.mtu.saturating_sub(HEADER_SIZE)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.effective_mtu() == 0 {
            return Err(ConfigError::MtuTooSmall {
                mtu: self.mtu,
                header: HEADER_SIZE,
            });
        }
        if self.pool_size < 2 {
            return Err(ConfigError::EmptyPool(self.pool_size));
        }
        if self.pool_size > MAX_POOL_SIZE {
            return Err(ConfigError::PoolTooLarge {
                size: self.pool_size,
                max: MAX_POOL_SIZE,
            });
        }
        if !(0.0..=1.0).contains(&self.rtt_alpha) {
            return Err(ConfigError::InvalidAlpha(self.rtt_alpha));
        }
        Ok(())
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            mtu: DEFAULT_MTU,
            pool_size: POOL_SIZE,
            retransmit_after_ticks: RETRANSMIT_AFTER_TICKS,
            rtt_alpha: RTT_ALPHA,
            initial_rtt_ticks: INITIAL_RTT_TICKS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProtocolConfig::default();
        assert_eq!(config.mtu, 1500);
        assert_eq!(config.effective_mtu(), 1488);
        assert_eq!(config.pool_size, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mtu_too_small() {
        let config = ProtocolConfig::with_mtu(HEADER_SIZE);
        assert_eq!(
            config.validate(),
            Err(ConfigError::MtuTooSmall { mtu: 12, header: 12 })
        );
        assert!(ProtocolConfig::with_mtu(13).validate().is_ok());
    }

    #[test]
    fn test_invalid_alpha() {
        let config = ProtocolConfig {
            rtt_alpha: 1.5,
            ..ProtocolConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidAlpha(1.5)));
    }

    #[test]
    fn test_pool_too_small() {
        let config = ProtocolConfig {
            pool_size: 1,
            ..ProtocolConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyPool(1)));
    }

    #[test]
    fn test_pool_too_large() {
        let config = ProtocolConfig {
            pool_size: u32::MAX,
            ..ProtocolConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::PoolTooLarge {
                size: u32::MAX,
                max: 1 << 31
            })
        );

        let largest = ProtocolConfig {
            pool_size: MAX_POOL_SIZE,
            ..ProtocolConfig::default()
        };
        assert!(largest.validate().is_ok());
    }
}
