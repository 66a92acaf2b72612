//! Engine settings

use serde::{Deserialize, Serialize};

/// Order in which replaced payments absorb a replacement's amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationOrder {
    /// Largest remaining balance first; ties broken by payment id
    #[default]
    LargestRemainingFirst,
    /// Smallest remaining balance first; ties broken by payment id
    SmallestRemainingFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub allocation_order: AllocationOrder,
    /// Apply customer blocking when the capability is installed
    pub counterparty_blocking: bool,
    /// Reaching the last regular stage marks the payment as paid
    pub mark_paid_on_last_stage: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            allocation_order: AllocationOrder::default(),
            counterparty_blocking: true,
            mark_paid_on_last_stage: true,
        }
    }
}
