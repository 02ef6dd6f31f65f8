//! Types for the watcher parameters.

use serde::{Deserialize, Serialize};

/// Default number of root-chain blocks an invalid exit may stay unchallenged before the
/// chain is considered byzantine beyond repair.
pub const DEFAULT_SLA_MARGIN: u64 = 10;

/// Default spacing of child-chain block numbers as enforced by the root contract.
pub const DEFAULT_CHILD_BLOCK_INTERVAL: u64 = 1000;

/// Deployment-tunable parameters of the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatcherParams {
    /// The root-chain block-height window after which an unchallenged invalid exit is
    /// considered an SLA breach.
    pub sla_margin: u64,

    /// The interval between consecutive child-chain block numbers.
    pub child_block_interval: u64,
}

impl Default for WatcherParams {
    fn default() -> Self {
        WatcherParams {
            sla_margin: DEFAULT_SLA_MARGIN,
            child_block_interval: DEFAULT_CHILD_BLOCK_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let params = WatcherParams::default();
        assert_eq!(params.sla_margin, 10);
        assert_eq!(params.child_block_interval, 1000);
    }

    #[test]
    fn deserializes_from_config_json() {
        let params: WatcherParams =
            serde_json::from_str(r#"{"sla_margin": 20, "child_block_interval": 1000}"#).unwrap();
        assert_eq!(params.sla_margin, 20);
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = serde_json::from_str::<WatcherParams>(
            r#"{"sla_margin": 20, "child_block_interval": 1000, "extra": 1}"#,
        );
        assert!(result.is_err());
    }
}
