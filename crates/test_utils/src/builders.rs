//! Test Data Builders
//!
//! Provides builders for payments and for a fully wired payment service.
//! Tests specify only the fields they care about and take defaults for the
//! rest.

use std::sync::Arc;

use core_kernel::{
    AccountId, ActionContext, BatchId, JournalId, Money, PartyId, PaymentId, PaymentMethodId,
};
use domain_payment::{
    BanknoteType, EngineSettings, NewBatch, NewPayment, PartnerBlockRegistry, PaymentDirection,
    PaymentService, StatementLine,
};

use crate::fixtures::{CatalogFixtures, ChartFixtures, ContextFixtures, DateFixtures, MoneyFixtures, TestChart};

/// Builder for constructing payment input
pub struct TestPaymentBuilder {
    method_id: PaymentMethodId,
    journal_id: JournalId,
    partner_id: PartyId,
    direction: PaymentDirection,
    amount: Money,
    counterpart_account: AccountId,
    transaction_number: Option<String>,
    banknote_type: BanknoteType,
}

impl TestPaymentBuilder {
    /// Creates an inbound 1000 MAD check from `partner`
    pub fn new(method_id: PaymentMethodId, journal_id: JournalId, partner_id: PartyId, receivable: AccountId) -> Self {
        Self {
            method_id,
            journal_id,
            partner_id,
            direction: PaymentDirection::Inbound,
            amount: MoneyFixtures::mad_1000(),
            counterpart_account: receivable,
            transaction_number: Some("CHK-0001".to_string()),
            banknote_type: BanknoteType::None,
        }
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_partner(mut self, partner_id: PartyId) -> Self {
        self.partner_id = partner_id;
        self
    }

    /// Makes the payment outbound, settling `payable`
    pub fn outbound(mut self, payable: AccountId) -> Self {
        self.direction = PaymentDirection::Outbound;
        self.counterpart_account = payable;
        self
    }

    /// Settles `account` instead of the receivable
    pub fn with_counterpart(mut self, account: AccountId) -> Self {
        self.counterpart_account = account;
        self
    }

    pub fn with_transaction_number(mut self, number: impl Into<String>) -> Self {
        self.transaction_number = Some(number.into());
        self
    }

    pub fn with_banknote_type(mut self, banknote_type: BanknoteType) -> Self {
        self.banknote_type = banknote_type;
        self
    }

    pub fn build(self) -> NewPayment {
        NewPayment {
            method_id: self.method_id,
            journal_id: self.journal_id,
            partner_id: self.partner_id,
            direction: self.direction,
            amount: self.amount,
            counterpart_account: self.counterpart_account,
            transaction_number: self.transaction_number,
            due_date: Some(DateFixtures::due_date()),
            certified: false,
            banknote_type: self.banknote_type,
        }
    }
}

/// Builder for a payment service wired with the test chart and catalogs
pub struct ScenarioBuilder {
    settings: EngineSettings,
    with_blocking: bool,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self {
            settings: EngineSettings::default(),
            with_blocking: true,
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Leaves the blocking capability uninstalled
    pub fn without_blocking(mut self) -> Self {
        self.with_blocking = false;
        self
    }

    pub fn build(self) -> Scenario {
        let (ledger, chart) = ChartFixtures::ledger();
        let registry = Arc::new(PartnerBlockRegistry::new(true));

        let mut service = PaymentService::new(ledger, self.settings);
        if self.with_blocking {
            service = service.with_blocking(registry.clone());
        }
        let two_stage = service
            .register_catalog(CatalogFixtures::two_stage_check(&chart))
            .unwrap();
        let batched = service
            .register_catalog(CatalogFixtures::batched_check(&chart))
            .unwrap();
        let deposited = service
            .register_catalog(CatalogFixtures::deposited_check(&chart))
            .unwrap();

        Scenario {
            service,
            chart,
            ctx: ContextFixtures::context(),
            partner: PartyId::new(),
            two_stage,
            batched,
            deposited,
            registry,
        }
    }
}

/// A payment service ready for scenario tests
pub struct Scenario {
    pub service: PaymentService,
    pub chart: TestChart,
    pub ctx: ActionContext,
    /// Default counterparty of the payments built here
    pub partner: PartyId,
    /// Must be sent (10), in bank (20)
    pub two_stage: PaymentMethodId,
    /// Batched check with exception stages
    pub batched: PaymentMethodId,
    /// Check deposited without batches, with exception stages
    pub deposited: PaymentMethodId,
    pub registry: Arc<PartnerBlockRegistry>,
}

impl Scenario {
    /// Payment input builder for `method` with the scenario defaults
    pub fn payment(&self, method: PaymentMethodId) -> TestPaymentBuilder {
        TestPaymentBuilder::new(method, self.chart.checks_journal, self.partner, self.chart.receivable)
    }

    /// Creates and posts a payment
    pub fn posted(&mut self, input: NewPayment) -> PaymentId {
        let id = self.service.create_payment(input, &self.ctx).unwrap();
        self.service.post_payment(id, &self.ctx).unwrap();
        id
    }

    /// A deposited check of `amount` advanced into the bank
    pub fn in_bank(&mut self, amount: Money) -> PaymentId {
        let input = self.payment(self.deposited).with_amount(amount).build();
        let id = self.posted(input);
        self.service.advance(id, &self.ctx).unwrap();
        id
    }

    /// A deposited check of `amount` in the unpaid stage
    pub fn unpaid(&mut self, amount: Money) -> PaymentId {
        let id = self.in_bank(amount);
        self.service.set_unpaid(id, &self.ctx).unwrap();
        id
    }

    /// Creates and validates a batch from the checks journal to the bank journal
    pub fn validated_batch(&mut self, payments: Vec<PaymentId>, external_ref: &str, move_to_next_stage: bool) -> BatchId {
        let batch = self
            .service
            .create_batch(
                NewBatch {
                    name: "Remittance".to_string(),
                    journal_id: self.chart.checks_journal,
                    destination_journal_id: self.chart.bank_journal,
                    external_ref: external_ref.to_string(),
                    banknote_type: BanknoteType::None,
                    payment_ids: payments,
                    move_to_next_stage,
                },
                &self.ctx,
            )
            .unwrap();
        self.service.validate_batch(batch, &self.ctx).unwrap();
        batch
    }

    /// Registers a statement line for the payment, links it and marks it reconciled
    pub fn reconciled_statement(&mut self, payment: PaymentId) {
        let amount = self.service.payment(&payment).unwrap().amount;
        let line = StatementLine::new(self.chart.bank_journal, amount, self.ctx.as_of, "DEP-1");
        let line_id = self.service.register_statement_line(line, &self.ctx).unwrap();
        self.service.link_statement_line(payment, line_id, &self.ctx).unwrap();
        self.service.mark_statement_reconciled(line_id, &self.ctx).unwrap();
    }
}
