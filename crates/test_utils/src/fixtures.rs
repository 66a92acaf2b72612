//! Pre-built Test Fixtures
//!
//! Provides a small chart of accounts, two journals and the stage catalogs
//! used across the test suites. Everything is in MAD.

use chrono::NaiveDate;
use core_kernel::{AccountId, ActionContext, CompanyId, Currency, JournalId, Money, UserId};
use domain_ledger::{Account, AccountType, Journal, JournalKind, Ledger};
use domain_payment::{
    BanknoteType, PaymentMethod, PaymentMethodKind, Stage, StageCatalog, StageType,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn mad(amount: Decimal) -> Money {
        Money::new(amount, Currency::MAD)
    }

    /// The standard check amount of the scenarios
    pub fn mad_1000() -> Money {
        Money::new(dec!(1000.00), Currency::MAD)
    }

    pub fn mad_zero() -> Money {
        Money::zero(Currency::MAD)
    }

    /// Creates a EUR amount for currency mismatch tests
    pub fn eur_100() -> Money {
        Money::new(dec!(100.00), Currency::EUR)
    }
}

/// Fixture for dates
pub struct DateFixtures;

impl DateFixtures {
    /// Business date the scenarios run on
    pub fn business_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    pub fn due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()
    }
}

/// Fixture for the acting context
pub struct ContextFixtures;

impl ContextFixtures {
    pub fn context() -> ActionContext {
        ActionContext::new(CompanyId::new(), UserId::new(), DateFixtures::business_day())
    }
}

/// Account and journal ids of the test chart
#[derive(Debug, Clone, Copy)]
pub struct TestChart {
    pub receivable: AccountId,
    pub payable: AccountId,
    pub portfolio: AccountId,
    pub to_send: AccountId,
    pub in_bank: AccountId,
    pub cashed: AccountId,
    pub butterfly: AccountId,
    pub prior_notice: AccountId,
    pub unpaid: AccountId,
    /// Transfer account of the bank journal
    pub transfer: AccountId,
    pub bank_fees: AccountId,
    /// Journal the checks are received in
    pub checks_journal: JournalId,
    /// Bank journal receiving batches
    pub bank_journal: JournalId,
}

/// Fixture for the chart of accounts
pub struct ChartFixtures;

impl ChartFixtures {
    /// Builds a MAD ledger with the test chart
    ///
    /// Every stage account and the partner accounts are reconcilable so
    /// stage entries can be matched against each other.
    pub fn ledger() -> (Ledger, TestChart) {
        let chart = TestChart {
            receivable: AccountId::new(),
            payable: AccountId::new(),
            portfolio: AccountId::new(),
            to_send: AccountId::new(),
            in_bank: AccountId::new(),
            cashed: AccountId::new(),
            butterfly: AccountId::new(),
            prior_notice: AccountId::new(),
            unpaid: AccountId::new(),
            transfer: AccountId::new(),
            bank_fees: AccountId::new(),
            checks_journal: JournalId::new(),
            bank_journal: JournalId::new(),
        };

        let mut ledger = Ledger::new(Currency::MAD);
        let accounts = [
            (chart.receivable, "3421", "Customers", AccountType::Asset, true),
            (chart.payable, "4411", "Suppliers", AccountType::Liability, true),
            (chart.portfolio, "5111", "Checks in portfolio", AccountType::Asset, true),
            (chart.to_send, "5112", "Checks to send", AccountType::Asset, true),
            (chart.in_bank, "5113", "Checks in bank", AccountType::Asset, true),
            (chart.cashed, "5141", "Bank", AccountType::Asset, true),
            (chart.butterfly, "3424", "Butterfly checks", AccountType::Asset, true),
            (chart.prior_notice, "3425", "Prior notice", AccountType::Asset, true),
            (chart.unpaid, "3426", "Unpaid checks", AccountType::Asset, true),
            (chart.transfer, "5115", "Bank transfer", AccountType::Asset, true),
            (chart.bank_fees, "6147", "Bank fees", AccountType::Expense, false),
        ];
        for (id, code, name, account_type, reconcilable) in accounts {
            let account = Account::new(id, code, name, account_type);
            let account = if reconcilable { account.reconcilable() } else { account };
            ledger.add_account(account).unwrap();
        }

        ledger
            .add_journal(Journal::new(chart.checks_journal, "CHK", "Checks received", JournalKind::General))
            .unwrap();
        ledger
            .add_journal(
                Journal::new(chart.bank_journal, "BNK", "Bank", JournalKind::Bank)
                    .with_transfer_account(chart.transfer)
                    .with_skip_account(chart.bank_fees),
            )
            .unwrap();

        (ledger, chart)
    }
}

/// Fixture for stage catalogs
pub struct CatalogFixtures;

impl CatalogFixtures {
    pub fn stage(
        method: &PaymentMethod,
        name: &str,
        sequence: u32,
        stage_type: StageType,
        account: AccountId,
    ) -> Stage {
        Stage {
            id: core_kernel::StageId::new_v7(),
            method_id: method.id,
            name: name.to_string(),
            sequence,
            stage_type,
            account_id: Some(account),
            with_journal_entry: true,
            with_bank_statement: false,
            banknote_type: BanknoteType::None,
        }
    }

    /// Two stages: must be sent (10), in bank (20)
    pub fn two_stage_check(chart: &TestChart) -> StageCatalog {
        let method = PaymentMethod::new("CHK2", "Check", PaymentMethodKind::Check);
        let stages = vec![
            Self::stage(&method, "To send", 10, StageType::MustBeSent, chart.to_send),
            Self::stage(&method, "In bank", 20, StageType::InBank, chart.in_bank),
        ];
        StageCatalog::new(method, stages).unwrap()
    }

    /// Check sent to the bank in batches, with every exception branch
    ///
    /// must be sent (10), in bank (20), cashed (30), butterfly (40),
    /// prior notice (50), unpaid (60)
    pub fn batched_check(chart: &TestChart) -> StageCatalog {
        let method = PaymentMethod::new("CHK", "Check", PaymentMethodKind::Check);
        let stages = vec![
            Self::stage(&method, "To send", 10, StageType::MustBeSent, chart.to_send),
            Self::stage(&method, "In bank", 20, StageType::InBank, chart.in_bank),
            Self::stage(&method, "Cashed", 30, StageType::Reconcile, chart.cashed),
            Self::stage(&method, "Butterfly", 40, StageType::Butterfly, chart.butterfly),
            Self::stage(&method, "Prior notice", 50, StageType::PriorNotice, chart.prior_notice),
            Self::stage(&method, "Unpaid", 60, StageType::Unpaid, chart.unpaid),
        ];
        StageCatalog::new(method, stages).unwrap()
    }

    /// Check deposited directly, without batches
    ///
    /// portfolio (10), in bank (20), cashed (30), butterfly (40),
    /// prior notice (50), unpaid (60)
    pub fn deposited_check(chart: &TestChart) -> StageCatalog {
        let method = PaymentMethod::new("CHD", "Deposited check", PaymentMethodKind::Check);
        let stages = vec![
            Self::stage(&method, "Portfolio", 10, StageType::Generic, chart.portfolio),
            Self::stage(&method, "In bank", 20, StageType::InBank, chart.in_bank),
            Self::stage(&method, "Cashed", 30, StageType::Reconcile, chart.cashed),
            Self::stage(&method, "Butterfly", 40, StageType::Butterfly, chart.butterfly),
            Self::stage(&method, "Prior notice", 50, StageType::PriorNotice, chart.prior_notice),
            Self::stage(&method, "Unpaid", 60, StageType::Unpaid, chart.unpaid),
        ];
        StageCatalog::new(method, stages).unwrap()
    }
}
