//! In-memory payment book
//!
//! Holds every piece of mutable state the engine touches. The book is
//! cloned into a unit of work for each action, so it must stay `Clone`.

use std::collections::{BTreeMap, HashMap};

use core_kernel::{BatchId, PaymentId, PaymentMethodId, StatementLineId};
use domain_ledger::Ledger;

use crate::batch::BatchPayment;
use crate::error::PaymentError;
use crate::payment::Payment;
use crate::query::PaymentQuery;
use crate::replacement::ReplacementLink;
use crate::stage::StageCatalog;
use crate::statement::StatementLine;

#[derive(Debug, Clone)]
pub struct PaymentBook {
    ledger: Ledger,
    catalogs: HashMap<PaymentMethodId, StageCatalog>,
    payments: BTreeMap<PaymentId, Payment>,
    batches: BTreeMap<BatchId, BatchPayment>,
    links: Vec<ReplacementLink>,
    statement_lines: BTreeMap<StatementLineId, StatementLine>,
}

impl PaymentBook {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            catalogs: HashMap::new(),
            payments: BTreeMap::new(),
            batches: BTreeMap::new(),
            links: Vec::new(),
            statement_lines: BTreeMap::new(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    /// Registers a method's catalog after checking its accounts exist
    pub fn register_catalog(&mut self, catalog: StageCatalog) -> Result<(), PaymentError> {
        let method = catalog.method().id;
        if self.catalogs.contains_key(&method) {
            return Err(PaymentError::validation(format!(
                "Payment method {} already has a catalog",
                catalog.method().code
            )));
        }
        for stage in catalog.get_available_stages().unwrap_or(&[]) {
            if let Some(account) = &stage.account_id {
                self.ledger.require_account(account)?;
            }
        }
        self.catalogs.insert(method, catalog);
        Ok(())
    }

    pub fn catalog(&self, method: &PaymentMethodId) -> Result<&StageCatalog, PaymentError> {
        self.catalogs
            .get(method)
            .ok_or_else(|| PaymentError::not_found("Payment method", method))
    }

    pub fn catalogs(&self) -> impl Iterator<Item = &StageCatalog> {
        self.catalogs.values()
    }

    pub fn insert_payment(&mut self, payment: Payment) {
        self.payments.insert(payment.id, payment);
    }

    pub fn payment(&self, id: &PaymentId) -> Result<&Payment, PaymentError> {
        self.payments
            .get(id)
            .ok_or_else(|| PaymentError::not_found("Payment", id))
    }

    pub fn payment_mut(&mut self, id: &PaymentId) -> Result<&mut Payment, PaymentError> {
        self.payments
            .get_mut(id)
            .ok_or_else(|| PaymentError::not_found("Payment", id))
    }

    /// Payments matching a typed query, ordered by id
    pub fn search(&self, query: &PaymentQuery) -> Vec<&Payment> {
        self.payments.values().filter(|p| query.matches(p)).collect()
    }

    pub fn insert_batch(&mut self, batch: BatchPayment) {
        self.batches.insert(batch.id, batch);
    }

    pub fn batch(&self, id: &BatchId) -> Result<&BatchPayment, PaymentError> {
        self.batches
            .get(id)
            .ok_or_else(|| PaymentError::not_found("Batch", id))
    }

    pub fn batch_mut(&mut self, id: &BatchId) -> Result<&mut BatchPayment, PaymentError> {
        self.batches
            .get_mut(id)
            .ok_or_else(|| PaymentError::not_found("Batch", id))
    }

    pub fn batches(&self) -> impl Iterator<Item = &BatchPayment> {
        self.batches.values()
    }

    pub fn push_link(&mut self, link: ReplacementLink) {
        self.links.push(link);
    }

    pub fn links(&self) -> &[ReplacementLink] {
        &self.links
    }

    pub fn links_mut(&mut self) -> impl Iterator<Item = &mut ReplacementLink> {
        self.links.iter_mut()
    }

    /// Links still in force created by a replacement payment
    pub fn active_links_of(&self, replacement: &PaymentId) -> Vec<&ReplacementLink> {
        self.links
            .iter()
            .filter(|l| l.replacement == *replacement && l.is_active())
            .collect()
    }

    pub fn insert_statement_line(&mut self, line: StatementLine) {
        self.statement_lines.insert(line.id, line);
    }

    pub fn statement_line(&self, id: &StatementLineId) -> Result<&StatementLine, PaymentError> {
        self.statement_lines
            .get(id)
            .ok_or_else(|| PaymentError::not_found("Statement line", id))
    }

    pub fn statement_line_mut(&mut self, id: &StatementLineId) -> Result<&mut StatementLine, PaymentError> {
        self.statement_lines
            .get_mut(id)
            .ok_or_else(|| PaymentError::not_found("Statement line", id))
    }
}
