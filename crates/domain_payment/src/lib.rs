//! Payment Domain - Staged Payment Workflow
//!
//! This crate moves payment instruments (checks, promissory notes, transfers)
//! through the stages configured for their payment method, booking and
//! reconciling a ledger entry at each step.
//!
//! # Components
//!
//! - **Stage catalog**: ordered stages per payment method
//! - **Stage engine**: posting, advancing, reset to draft and cancellation
//! - **Exceptions**: butterfly, prior notice and unpaid branches, and their regularization
//! - **Replacement**: settling defaulted payments with new instruments, and unwinding
//! - **Batch switch**: handing a batch of instruments to the bank journal
//!
//! # Atomicity
//!
//! Every action runs in a [`UnitOfWork`] over the [`PaymentBook`]: it either
//! commits entirely or leaves the book untouched. A batch switch commits one
//! member at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_payment::{PaymentService, EngineSettings};
//!
//! let mut service = PaymentService::new(ledger, EngineSettings::default());
//! service.register_catalog(catalog)?;
//! let payment = service.create_payment(input, &ctx)?;
//! service.post_payment(payment, &ctx)?;
//! service.advance(payment, &ctx)?;
//! ```

pub mod error;
pub mod settings;
pub mod stage;
pub mod payment;
pub mod query;
pub mod statement;
pub mod blocking;
pub mod book;
pub mod unit_of_work;
pub mod engine;
pub mod exceptions;
pub mod replacement;
pub mod batch;
pub mod service;

pub use error::PaymentError;
pub use settings::{AllocationOrder, EngineSettings};
pub use stage::{BanknoteType, PaymentMethod, PaymentMethodKind, Stage, StageCatalog, StageConfig, StageType};
pub use payment::{
    ExceptionFlag, ExceptionFlags, ExceptionKind, MoveReason, NewPayment, Payment,
    PaymentDirection, PaymentState, StageMove,
};
pub use query::PaymentQuery;
pub use statement::StatementLine;
pub use blocking::{BlockAuditEntry, BlockingDirective, CounterpartyBlocking, PartnerBlockRegistry};
pub use book::PaymentBook;
pub use unit_of_work::UnitOfWork;
pub use engine::{AdvanceOutcome, AdvancePlan, StageEngine};
pub use exceptions::ExceptionOutcome;
pub use replacement::{ReplacementLink, ReplacementOutcome};
pub use batch::{BankSidePair, BatchPayment, BatchState, BatchSwitchReport, NewBatch, SwitchedPayment};
pub use service::PaymentService;
