//! Core Kernel - Foundational types for the payment stage engine
//!
//! This crate provides the building blocks shared by the ledger and payment crates:
//! - Money types with precise decimal arithmetic and remainder-safe splitting
//! - Strongly-typed identifiers for every entity
//! - The explicit action context passed into every engine call

pub mod money;
pub mod identifiers;
pub mod context;
pub mod error;

pub use money::{Money, Currency, MoneyError};
pub use context::ActionContext;
pub use identifiers::{
    AccountId, JournalId, JournalEntryId, JournalLineId, ReconciliationId, MatchingId,
    PartyId, CompanyId, UserId, PaymentId, PaymentMethodId, StageId, BatchId,
    ReplacementLinkId, StatementLineId, AuditEventId,
};
pub use error::CoreError;
