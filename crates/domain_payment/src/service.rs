//! Payment service
//!
//! Entry point for callers. Each action runs in its own unit of work and
//! applies the blocking directives it produced only after commit.

use std::sync::Arc;
use tracing::instrument;

use core_kernel::{ActionContext, BatchId, JournalEntryId, PaymentId, PaymentMethodId, StatementLineId};
use domain_ledger::Ledger;

use crate::batch::{BatchPayment, BatchSwitchReport, NewBatch};
use crate::blocking::{apply_directives, BlockingDirective, CounterpartyBlocking};
use crate::book::PaymentBook;
use crate::engine::{AdvanceOutcome, StageEngine};
use crate::error::PaymentError;
use crate::exceptions::ExceptionOutcome;
use crate::payment::{NewPayment, Payment};
use crate::query::PaymentQuery;
use crate::replacement::{ReplacementLink, ReplacementOutcome};
use crate::settings::EngineSettings;
use crate::stage::{Stage, StageCatalog};
use crate::statement::StatementLine;
use crate::unit_of_work::UnitOfWork;

pub struct PaymentService {
    book: PaymentBook,
    engine: StageEngine,
    blocking: Option<Arc<dyn CounterpartyBlocking>>,
}

impl PaymentService {
    pub fn new(ledger: Ledger, settings: EngineSettings) -> Self {
        Self {
            book: PaymentBook::new(ledger),
            engine: StageEngine::new(settings),
            blocking: None,
        }
    }

    /// Installs the counterparty blocking capability
    pub fn with_blocking(mut self, blocking: Arc<dyn CounterpartyBlocking>) -> Self {
        self.blocking = Some(blocking);
        self
    }

    pub fn book(&self) -> &PaymentBook {
        &self.book
    }

    pub fn settings(&self) -> &EngineSettings {
        self.engine.settings()
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        self.book.ledger_mut()
    }

    pub fn register_catalog(&mut self, catalog: StageCatalog) -> Result<PaymentMethodId, PaymentError> {
        let id = catalog.method().id;
        self.book.register_catalog(catalog)?;
        Ok(id)
    }

    pub fn get_available_stages(&self, method: &PaymentMethodId) -> Result<&[Stage], PaymentError> {
        self.book.catalog(method)?.get_available_stages()
    }

    pub fn payment(&self, id: &PaymentId) -> Result<&Payment, PaymentError> {
        self.book.payment(id)
    }

    pub fn search(&self, query: &PaymentQuery) -> Vec<&Payment> {
        self.book.search(query)
    }

    pub fn batch(&self, id: &BatchId) -> Result<&BatchPayment, PaymentError> {
        self.book.batch(id)
    }

    pub fn links(&self) -> &[ReplacementLink] {
        self.book.links()
    }

    fn finish<T>(&self, result: (T, Vec<BlockingDirective>), ctx: &ActionContext) -> T {
        let (value, directives) = result;
        if self.engine.settings().counterparty_blocking {
            apply_directives(self.blocking.as_deref(), &directives, ctx);
        }
        value
    }

    #[instrument(skip(self, input, ctx), fields(partner = %input.partner_id))]
    pub fn create_payment(&mut self, input: NewPayment, ctx: &ActionContext) -> Result<PaymentId, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.create_payment(uow, input, ctx))?;
        Ok(self.finish(result, ctx))
    }

    #[instrument(skip(self, ctx), fields(payment = %payment_id))]
    pub fn post_payment(&mut self, payment_id: PaymentId, ctx: &ActionContext) -> Result<JournalEntryId, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.post_payment(uow, payment_id, ctx))?;
        Ok(self.finish(result, ctx))
    }

    #[instrument(skip(self, ctx), fields(payment = %payment_id))]
    pub fn advance(&mut self, payment_id: PaymentId, ctx: &ActionContext) -> Result<AdvanceOutcome, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.advance(uow, payment_id, ctx))?;
        Ok(self.finish(result, ctx))
    }

    #[instrument(skip(self, ctx), fields(payment = %payment_id))]
    pub fn set_butterfly(&mut self, payment_id: PaymentId, ctx: &ActionContext) -> Result<ExceptionOutcome, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.set_butterfly(uow, payment_id, ctx))?;
        Ok(self.finish(result, ctx))
    }

    #[instrument(skip(self, ctx), fields(payment = %payment_id))]
    pub fn set_prior_notice(&mut self, payment_id: PaymentId, ctx: &ActionContext) -> Result<ExceptionOutcome, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.set_prior_notice(uow, payment_id, ctx))?;
        Ok(self.finish(result, ctx))
    }

    #[instrument(skip(self, ctx), fields(payment = %payment_id))]
    pub fn set_unpaid(&mut self, payment_id: PaymentId, ctx: &ActionContext) -> Result<ExceptionOutcome, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.set_unpaid(uow, payment_id, ctx))?;
        Ok(self.finish(result, ctx))
    }

    #[instrument(skip(self, ctx), fields(payment = %payment_id))]
    pub fn set_paid(&mut self, payment_id: PaymentId, ctx: &ActionContext) -> Result<Option<JournalEntryId>, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.set_paid(uow, payment_id, ctx))?;
        Ok(self.finish(result, ctx))
    }

    #[instrument(skip(self, ctx), fields(payment = %payment_id))]
    pub fn action_draft(&mut self, payment_id: PaymentId, ctx: &ActionContext) -> Result<JournalEntryId, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.action_draft(uow, payment_id, ctx))?;
        Ok(self.finish(result, ctx))
    }

    #[instrument(skip(self, ctx), fields(payment = %payment_id))]
    pub fn action_cancel(
        &mut self,
        payment_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<Option<JournalEntryId>, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.action_cancel(uow, payment_id, ctx))?;
        Ok(self.finish(result, ctx))
    }

    #[instrument(skip(self, originals, ctx), fields(replacement = %replacement_id, originals = originals.len()))]
    pub fn replace(
        &mut self,
        originals: &[PaymentId],
        replacement_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<ReplacementOutcome, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| {
            self.engine.replace(uow, originals, replacement_id, ctx)
        })?;
        Ok(self.finish(result, ctx))
    }

    #[instrument(skip(self, ctx), fields(replacement = %replacement_id))]
    pub fn unwind_replacement(
        &mut self,
        replacement_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<JournalEntryId, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| {
            self.engine.unwind_replacement(uow, replacement_id, ctx)
        })?;
        Ok(self.finish(result, ctx))
    }

    #[instrument(skip(self, input, ctx), fields(payments = input.payment_ids.len()))]
    pub fn create_batch(&mut self, input: NewBatch, ctx: &ActionContext) -> Result<BatchId, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.create_batch(uow, input, ctx))?;
        Ok(self.finish(result, ctx))
    }

    pub fn set_batch_reference(
        &mut self,
        batch_id: BatchId,
        external_ref: String,
        ctx: &ActionContext,
    ) -> Result<(), PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| {
            self.engine.set_external_ref(uow, batch_id, external_ref)
        })?;
        Ok(self.finish(result, ctx))
    }

    pub fn validate_batch(&mut self, batch_id: BatchId, ctx: &ActionContext) -> Result<(), PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.validate_batch(uow, batch_id))?;
        Ok(self.finish(result, ctx))
    }

    /// Switches a batch; see [`StageEngine::switch_batch`] for the partial failure contract
    pub fn switch_batch(&mut self, batch_id: BatchId, ctx: &ActionContext) -> Result<BatchSwitchReport, PaymentError> {
        self.engine.switch_batch(&mut self.book, batch_id, ctx)
    }

    pub fn register_statement_line(
        &mut self,
        line: StatementLine,
        ctx: &ActionContext,
    ) -> Result<StatementLineId, PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.register_statement_line(uow, line))?;
        Ok(self.finish(result, ctx))
    }

    pub fn link_statement_line(
        &mut self,
        payment_id: PaymentId,
        line_id: StatementLineId,
        ctx: &ActionContext,
    ) -> Result<(), PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| {
            self.engine.link_statement_line(uow, payment_id, line_id)
        })?;
        Ok(self.finish(result, ctx))
    }

    pub fn mark_statement_reconciled(
        &mut self,
        line_id: StatementLineId,
        ctx: &ActionContext,
    ) -> Result<(), PaymentError> {
        let result = UnitOfWork::run(&mut self.book, |uow| self.engine.mark_statement_reconciled(uow, line_id))?;
        Ok(self.finish(result, ctx))
    }
}
