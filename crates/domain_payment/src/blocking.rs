//! Counterparty blocking
//!
//! Blocking a customer is an optional capability owned by a separate policy
//! service. The engine only emits directives; they are applied after the
//! action commits, and skipped with a warning when no capability is
//! installed or it is switched off.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::RwLock;
use tracing::{info, warn};

use core_kernel::{ActionContext, AuditEventId, PartyId, UserId};

/// Port to the counterparty blocking policy service
pub trait CounterpartyBlocking: Send + Sync {
    /// Whether the policy is enabled for the acting company
    fn is_enabled(&self, ctx: &ActionContext) -> bool;

    fn block(&self, partner: PartyId, reason: &str, ctx: &ActionContext);

    fn unblock(&self, partner: PartyId, reason: &str, ctx: &ActionContext);
}

/// A blocking side effect collected during an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BlockingDirective {
    Block { partner: PartyId, reason: String },
    Unblock { partner: PartyId, reason: String },
}

impl BlockingDirective {
    pub fn partner(&self) -> PartyId {
        match self {
            BlockingDirective::Block { partner, .. } | BlockingDirective::Unblock { partner, .. } => *partner,
        }
    }
}

/// Applies collected directives through the capability, if present
pub fn apply_directives(
    blocking: Option<&dyn CounterpartyBlocking>,
    directives: &[BlockingDirective],
    ctx: &ActionContext,
) {
    if directives.is_empty() {
        return;
    }
    let Some(policy) = blocking.filter(|p| p.is_enabled(ctx)) else {
        warn!(
            count = directives.len(),
            "Counterparty blocking capability unavailable, directives skipped"
        );
        return;
    };

    for directive in directives {
        match directive {
            BlockingDirective::Block { partner, reason } => policy.block(*partner, reason, ctx),
            BlockingDirective::Unblock { partner, reason } => policy.unblock(*partner, reason, ctx),
        }
    }
}

/// Audit trail record of a block or unblock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAuditEntry {
    pub id: AuditEventId,
    pub partner: PartyId,
    pub blocked: bool,
    pub reason: String,
    pub user: UserId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RegistryState {
    blocked: HashSet<PartyId>,
    audit: Vec<BlockAuditEntry>,
}

/// In-process blocking policy keeping a blocked set and an audit trail
#[derive(Debug)]
pub struct PartnerBlockRegistry {
    enabled: bool,
    state: RwLock<RegistryState>,
}

impl PartnerBlockRegistry {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn is_blocked(&self, partner: &PartyId) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.blocked.contains(partner)
    }

    pub fn audit_trail(&self, partner: &PartyId) -> Vec<BlockAuditEntry> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .audit
            .iter()
            .filter(|e| e.partner == *partner)
            .cloned()
            .collect()
    }

    fn record(&self, partner: PartyId, blocked: bool, reason: &str, ctx: &ActionContext) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let changed = if blocked {
            state.blocked.insert(partner)
        } else {
            state.blocked.remove(&partner)
        };
        state.audit.push(BlockAuditEntry {
            id: AuditEventId::new_v7(),
            partner,
            blocked,
            reason: reason.to_string(),
            user: ctx.user_id,
            at: Utc::now(),
        });
        info!(partner = %partner, blocked, changed, reason, "Counterparty block updated");
    }
}

impl Default for PartnerBlockRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CounterpartyBlocking for PartnerBlockRegistry {
    fn is_enabled(&self, _ctx: &ActionContext) -> bool {
        self.enabled
    }

    fn block(&self, partner: PartyId, reason: &str, ctx: &ActionContext) {
        self.record(partner, true, reason, ctx);
    }

    fn unblock(&self, partner: PartyId, reason: &str, ctx: &ActionContext) {
        self.record(partner, false, reason, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::CompanyId;

    fn ctx() -> ActionContext {
        ActionContext::new(
            CompanyId::new(),
            UserId::new(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
    }

    #[test]
    fn test_directives_applied_in_order() {
        let registry = PartnerBlockRegistry::new(true);
        let partner = PartyId::new();
        let directives = vec![
            BlockingDirective::Block { partner, reason: "unpaid check".into() },
            BlockingDirective::Unblock { partner, reason: "regularized".into() },
            BlockingDirective::Block { partner, reason: "prior notice".into() },
        ];

        apply_directives(Some(&registry), &directives, &ctx());

        assert!(registry.is_blocked(&partner));
        let trail = registry.audit_trail(&partner);
        assert_eq!(trail.len(), 3);
        assert_eq!(trail[1].reason, "regularized");
        assert!(!trail[1].blocked);
    }

    #[test]
    fn test_disabled_capability_is_skipped() {
        let registry = PartnerBlockRegistry::new(false);
        let partner = PartyId::new();
        apply_directives(
            Some(&registry),
            &[BlockingDirective::Block { partner, reason: "unpaid".into() }],
            &ctx(),
        );
        assert!(!registry.is_blocked(&partner));
        assert!(registry.audit_trail(&partner).is_empty());
    }

    #[test]
    fn test_absent_capability_is_tolerated() {
        apply_directives(
            None,
            &[BlockingDirective::Block { partner: PartyId::new(), reason: "unpaid".into() }],
            &ctx(),
        );
    }
}
