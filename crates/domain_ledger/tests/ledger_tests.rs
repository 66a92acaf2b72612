//! Integration tests for the ledger
//!
//! Exercises posting, reversal and reconciliation through the public API the
//! payment engine relies on.

use chrono::NaiveDate;
use core_kernel::{AccountId, Currency, JournalId, Money, PartyId};
use domain_ledger::{
    Account, AccountType, EntryDraft, Journal, JournalKind, Ledger, LedgerError, LineQuery, LineSide,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct Books {
    ledger: Ledger,
    journal: JournalId,
    receivable: AccountId,
    in_bank: AccountId,
    transfer: AccountId,
    fees: AccountId,
}

fn books() -> Books {
    let mut ledger = Ledger::new(Currency::MAD);
    let receivable = AccountId::new();
    let in_bank = AccountId::new();
    let transfer = AccountId::new();
    let fees = AccountId::new();
    let journal = JournalId::new();

    ledger
        .add_account(Account::new(receivable, "3421", "Customers", AccountType::Asset).reconcilable())
        .unwrap();
    ledger
        .add_account(Account::new(in_bank, "5113", "Checks in bank", AccountType::Asset).reconcilable())
        .unwrap();
    ledger
        .add_account(Account::new(transfer, "5115", "Bank transfer", AccountType::Asset).reconcilable())
        .unwrap();
    ledger
        .add_account(Account::new(fees, "6147", "Bank fees", AccountType::Expense))
        .unwrap();
    ledger
        .add_journal(
            Journal::new(journal, "BNK", "Bank", JournalKind::Bank)
                .with_transfer_account(transfer)
                .with_skip_account(fees),
        )
        .unwrap();

    Books {
        ledger,
        journal,
        receivable,
        in_bank,
        transfer,
        fees,
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn mad(amount: Decimal) -> Money {
    Money::new(amount, Currency::MAD)
}

mod posting {
    use super::*;

    #[test]
    fn test_balances_follow_debits_and_credits() {
        let mut b = books();
        let partner = PartyId::new();
        b.ledger
            .post(
                EntryDraft::new(b.journal, date())
                    .debit(b.in_bank, Some(partner), mad(dec!(1000)), "Deposit")
                    .credit(b.receivable, Some(partner), mad(dec!(1000)), "Deposit"),
            )
            .unwrap();

        assert_eq!(b.ledger.balance(&b.in_bank).unwrap().amount(), dec!(1000));
        assert_eq!(b.ledger.balance(&b.receivable).unwrap().amount(), dec!(-1000));
        assert!(b.ledger.trial_balance().unwrap().is_balanced);
    }

    #[test]
    fn test_unknown_journal_rejected() {
        let mut b = books();
        let result = b.ledger.post(
            EntryDraft::new(JournalId::new(), date())
                .debit(b.in_bank, None, mad(dec!(1)), "x")
                .credit(b.receivable, None, mad(dec!(1)), "x"),
        );
        assert!(matches!(result, Err(LedgerError::JournalNotFound(_))));
    }

    #[test]
    fn test_document_reference_is_kept() {
        let mut b = books();
        let doc = uuid::Uuid::new_v4();
        let id = b
            .ledger
            .post(
                EntryDraft::new(b.journal, date())
                    .with_reference("CHK-0042")
                    .for_document("payment", doc)
                    .debit(b.in_bank, None, mad(dec!(5)), "x")
                    .credit(b.receivable, None, mad(dec!(5)), "x"),
            )
            .unwrap();

        let entry = b.ledger.require_entry(&id).unwrap();
        assert_eq!(entry.reference.as_deref(), Some("CHK-0042"));
        assert_eq!(entry.reference_type.as_deref(), Some("payment"));
        assert_eq!(entry.reference_id, Some(doc));
    }
}

mod handoff_drafts {
    use super::*;

    #[test]
    fn test_skip_account_lines_dropped_and_draft_rebalanced() {
        let b = books();
        let mut draft = EntryDraft::new(b.journal, date())
            .debit(b.transfer, None, mad(dec!(990)), "Deposit")
            .debit(b.fees, None, mad(dec!(10)), "Fees")
            .credit(b.in_bank, None, mad(dec!(1000)), "Deposit");

        assert_eq!(draft.drop_account(b.fees), 1);
        assert!(!draft.is_balanced());

        draft.rebalance().unwrap();
        assert!(draft.is_balanced());
        let (debits, credits) = draft.totals().unwrap();
        assert_eq!(debits.amount(), dec!(990));
        assert_eq!(credits.amount(), dec!(990));
    }
}

mod reconciliation {
    use super::*;

    #[test]
    fn test_two_partial_matches_settle_the_group() {
        let mut b = books();
        let opening = b
            .ledger
            .post(
                EntryDraft::new(b.journal, date())
                    .debit(b.in_bank, None, mad(dec!(800)), "Checks")
                    .credit(b.receivable, None, mad(dec!(800)), "Checks"),
            )
            .unwrap();
        let first = b
            .ledger
            .post(
                EntryDraft::new(b.journal, date())
                    .debit(b.transfer, None, mad(dec!(500)), "Part 1")
                    .credit(b.in_bank, None, mad(dec!(500)), "Part 1"),
            )
            .unwrap();
        let second = b
            .ledger
            .post(
                EntryDraft::new(b.journal, date())
                    .debit(b.transfer, None, mad(dec!(300)), "Part 2")
                    .credit(b.in_bank, None, mad(dec!(300)), "Part 2"),
            )
            .unwrap();

        let debit_line = b.ledger.require_entry(&opening).unwrap().lines_on(b.in_bank, LineSide::Debit).next().unwrap().id;
        let first_line = b.ledger.require_entry(&first).unwrap().lines_on(b.in_bank, LineSide::Credit).next().unwrap().id;
        let second_line = b.ledger.require_entry(&second).unwrap().lines_on(b.in_bank, LineSide::Credit).next().unwrap().id;

        let outcome = b.ledger.reconcile(&[debit_line, first_line]).unwrap();
        assert!(!outcome.is_full());
        assert_eq!(b.ledger.residual(&debit_line).unwrap().amount(), dec!(300));

        let outcome = b.ledger.reconcile(&[debit_line, second_line]).unwrap();
        assert!(outcome.is_full());
        let matching = b.ledger.matching_of(&debit_line);
        assert!(matching.is_some());
        assert_eq!(b.ledger.matching_of(&first_line), matching);
        assert_eq!(b.ledger.matching_of(&second_line), matching);

        let open = b.ledger.lines(&LineQuery::on_account(b.in_bank).unreconciled());
        assert!(open.is_empty());
    }

    #[test]
    fn test_reverse_settles_original_lines() {
        let mut b = books();
        let id = b
            .ledger
            .post(
                EntryDraft::new(b.journal, date())
                    .debit(b.in_bank, None, mad(dec!(1000)), "Deposit")
                    .credit(b.receivable, None, mad(dec!(1000)), "Deposit"),
            )
            .unwrap();

        let reversal = b.ledger.reverse(&id, date(), "cancelled").unwrap();

        assert_eq!(b.ledger.require_entry(&id).unwrap().reversed_by, Some(reversal));
        assert!(b.ledger.balance(&b.in_bank).unwrap().is_zero());
        for line in &b.ledger.require_entry(&id).unwrap().lines {
            assert!(b.ledger.is_fully_reconciled(&line.id));
        }
    }

    #[test]
    fn test_reconcile_already_settled_is_a_miss() {
        let mut b = books();
        let id = b
            .ledger
            .post(
                EntryDraft::new(b.journal, date())
                    .debit(b.in_bank, None, mad(dec!(10)), "x")
                    .credit(b.in_bank, None, mad(dec!(10)), "x"),
            )
            .unwrap();
        let lines: Vec<_> = b.ledger.require_entry(&id).unwrap().lines.iter().map(|l| l.id).collect();

        b.ledger.reconcile(&lines).unwrap();
        let err = b.ledger.reconcile(&lines).unwrap_err();
        assert!(err.is_reconciliation_miss());
    }
}

proptest! {
    #[test]
    fn prop_trial_balance_stays_balanced(amounts in prop::collection::vec(1i64..10_000_000, 1..12)) {
        let mut b = books();
        for (i, minor) in amounts.iter().enumerate() {
            let amount = Money::from_minor(*minor, Currency::MAD);
            let (debit, credit) = if i % 2 == 0 {
                (b.in_bank, b.receivable)
            } else {
                (b.transfer, b.in_bank)
            };
            b.ledger
                .post(
                    EntryDraft::new(b.journal, date())
                        .debit(debit, None, amount, "x")
                        .credit(credit, None, amount, "x"),
                )
                .unwrap();
        }

        let tb = b.ledger.trial_balance().unwrap();
        prop_assert!(tb.is_balanced);
        prop_assert_eq!(tb.total_debits, tb.total_credits);
    }
}
