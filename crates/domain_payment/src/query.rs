//! Typed payment search

use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, PartyId, PaymentId, PaymentMethodId};

use crate::payment::{ExceptionKind, Payment, PaymentDirection, PaymentState};

/// Query parameters for finding payments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentQuery {
    pub partner_id: Option<PartyId>,
    pub direction: Option<PaymentDirection>,
    pub method_id: Option<PaymentMethodId>,
    pub state: Option<PaymentState>,
    /// Payment must have one of these exceptions active
    #[serde(default)]
    pub active_exceptions: Vec<ExceptionKind>,
    pub batch_id: Option<BatchId>,
    /// Skip this payment
    pub exclude: Option<PaymentId>,
    /// Only original payments, not bank-side clones
    #[serde(default)]
    pub originals_only: bool,
}

impl PaymentQuery {
    pub fn for_partner(partner_id: PartyId) -> Self {
        Self {
            partner_id: Some(partner_id),
            ..Default::default()
        }
    }

    pub fn in_batch(batch_id: BatchId) -> Self {
        Self {
            batch_id: Some(batch_id),
            ..Default::default()
        }
    }

    pub fn direction(mut self, direction: PaymentDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn method(mut self, method_id: PaymentMethodId) -> Self {
        self.method_id = Some(method_id);
        self
    }

    pub fn state(mut self, state: PaymentState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_active_exception(mut self, kind: ExceptionKind) -> Self {
        if !self.active_exceptions.contains(&kind) {
            self.active_exceptions.push(kind);
        }
        self
    }

    /// Payments whose active exception blocks their counterparty
    pub fn blocking(self) -> Self {
        ExceptionKind::ALL
            .into_iter()
            .filter(|k| k.blocks_counterparty())
            .fold(self, |q, k| q.with_active_exception(k))
    }

    pub fn excluding(mut self, payment_id: PaymentId) -> Self {
        self.exclude = Some(payment_id);
        self
    }

    pub fn originals(mut self) -> Self {
        self.originals_only = true;
        self
    }

    pub fn matches(&self, payment: &Payment) -> bool {
        self.partner_id.map_or(true, |p| payment.partner_id == p)
            && self.direction.map_or(true, |d| payment.direction == d)
            && self.method_id.map_or(true, |m| payment.method_id == m)
            && self.state.map_or(true, |s| payment.state == s)
            && self.batch_id.map_or(true, |b| payment.batch_id == Some(b))
            && self.exclude.map_or(true, |id| payment.id != id)
            && (!self.originals_only || !payment.is_bank_side())
            && (self.active_exceptions.is_empty()
                || self
                    .active_exceptions
                    .iter()
                    .any(|k| payment.exceptions.get(*k).is_active()))
    }
}
