//! Integration tests for batches and the bank journal switch

use rust_decimal_macros::dec;

use core_kernel::{AccountId, PaymentId, PaymentMethodId};
use domain_ledger::{Account, AccountType, LineSide};
use domain_payment::{
    BanknoteType, BatchState, MoveReason, NewBatch, PaymentError, PaymentMethod, PaymentMethodKind, PaymentQuery,
    StageCatalog, StageType,
};
use test_utils::{
    assert_entry_balanced, assert_err_variant, assert_money_eq, CatalogFixtures, MoneyFixtures, Scenario,
    ScenarioBuilder,
};

/// A two-stage check whose in-bank stage books on its own account
fn remote_bank_method(s: &mut Scenario) -> (PaymentMethodId, AccountId) {
    let account = AccountId::new();
    s.service
        .ledger_mut()
        .add_account(Account::new(account, "5116", "Checks at remote bank", AccountType::Asset).reconcilable())
        .unwrap();
    let method = PaymentMethod::new("CHR", "Remote bank check", PaymentMethodKind::Check);
    let stages = vec![
        CatalogFixtures::stage(&method, "To send", 10, StageType::MustBeSent, s.chart.to_send),
        CatalogFixtures::stage(&method, "In bank", 20, StageType::InBank, account),
    ];
    let method_id = s
        .service
        .register_catalog(StageCatalog::new(method, stages).unwrap())
        .unwrap();
    (method_id, account)
}

// ============================================================================
// Batch lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn test_create_batch_claims_payments() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);

        let batch = s.validated_batch(vec![id, id], "SLIP-1", true);

        let stored = s.service.batch(&batch).unwrap();
        assert_eq!(stored.payment_ids, vec![id]);
        assert_eq!(stored.state, BatchState::Validated);
        assert_eq!(s.service.payment(&id).unwrap().batch_id, Some(batch));
    }

    #[test]
    fn test_payment_cannot_join_two_batches() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);
        s.validated_batch(vec![id], "SLIP-1", true);

        let result = s.service.create_batch(
            NewBatch {
                name: "Second".to_string(),
                journal_id: s.chart.checks_journal,
                destination_journal_id: s.chart.bank_journal,
                external_ref: "SLIP-2".to_string(),
                banknote_type: BanknoteType::None,
                payment_ids: vec![id],
                move_to_next_stage: true,
            },
            &s.ctx,
        );

        assert_err_variant!(result, PaymentError::Validation(_));
    }

    #[test]
    fn test_same_source_and_destination_rejected() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);

        let result = s.service.create_batch(
            NewBatch {
                name: "Loop".to_string(),
                journal_id: s.chart.checks_journal,
                destination_journal_id: s.chart.checks_journal,
                external_ref: String::new(),
                banknote_type: BanknoteType::None,
                payment_ids: vec![id],
                move_to_next_stage: true,
            },
            &s.ctx,
        );

        assert_err_variant!(result, PaymentError::Validation(_));
    }
}

// ============================================================================
// Journal switch
// ============================================================================

mod switch {
    use super::*;

    #[test]
    fn test_switch_hands_off_and_advances() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);
        let batch = s.validated_batch(vec![id], "SLIP-1", true);

        let report = s.service.switch_batch(batch, &s.ctx).unwrap();

        assert_eq!(report.switched.len(), 1);
        let member = &report.switched[0];
        assert_eq!(member.original, id);
        assert!(member.advanced);

        let stored = s.service.batch(&batch).unwrap();
        assert_eq!(stored.state, BatchState::Sent);
        assert_eq!(stored.sent_at, Some(s.ctx.as_of));
        assert_eq!(stored.bank_side_payments.len(), 1);
        assert_eq!(stored.bank_side_payments[0].bank_side, member.bank_side);

        let in_bank = s.service.get_available_stages(&s.two_stage).unwrap()[1].id;
        let original = s.service.payment(&id).unwrap();
        assert_eq!(original.stage_id, Some(in_bank));
        assert!(original.is_paid);
        assert!(original.history.iter().any(|m| m.reason == MoveReason::Handoff));

        let clone = s.service.payment(&member.bank_side).unwrap();
        assert_eq!(clone.origin_payment, Some(id));
        assert_eq!(clone.journal_id, s.chart.bank_journal);
        assert_eq!(clone.stage_id, Some(in_bank));
        // Bank-side clones move without booking
        assert!(clone.history.last().unwrap().entry_id.is_none());

        let ledger = s.service.book().ledger();
        let handoff = ledger.entry(&member.handoff_entry).unwrap();
        assert_eq!(handoff.journal_id, s.chart.bank_journal);
        assert_entry_balanced(ledger, &member.handoff_entry);
        assert_eq!(handoff.lines_on(s.chart.to_send, LineSide::Credit).count(), 1);
        assert_eq!(handoff.lines_on(s.chart.transfer, LineSide::Debit).count(), 1);

        assert!(ledger.balance(&s.chart.to_send).unwrap().is_zero());
        assert!(ledger.balance(&s.chart.transfer).unwrap().is_zero());
        assert_money_eq(&ledger.balance(&s.chart.in_bank).unwrap(), dec!(1000));
    }

    #[test]
    fn test_switch_without_move_then_advance() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);
        let batch = s.validated_batch(vec![id], "SLIP-1", false);
        s.service.switch_batch(batch, &s.ctx).unwrap();
        let to_send = s.service.get_available_stages(&s.two_stage).unwrap()[0].id;
        assert_eq!(s.service.payment(&id).unwrap().stage_id, Some(to_send));

        let outcome = s.service.advance(id, &s.ctx).unwrap();

        let entry_id = outcome.entry_id.unwrap();
        let (debit, credit) = assert_entry_balanced(s.service.book().ledger(), &entry_id);
        assert_eq!((debit, credit), (dec!(1000), dec!(1000)));
        assert_eq!(s.service.book().ledger().entry(&entry_id).unwrap().lines.len(), 2);
    }

    #[test]
    fn test_empty_reference_rejected_before_any_change() {
        let mut s = ScenarioBuilder::new().build();
        let first = s.payment(s.two_stage).build();
        let second = s.payment(s.two_stage).build();
        let a = s.posted(first);
        let b = s.posted(second);
        let batch = s.validated_batch(vec![a, b], "   ", true);
        let entries = s.service.book().ledger().entries().count();

        assert_err_variant!(s.service.switch_batch(batch, &s.ctx), PaymentError::Validation(_));

        assert_eq!(s.service.batch(&batch).unwrap().state, BatchState::Validated);
        assert!(s.service.batch(&batch).unwrap().bank_side_payments.is_empty());
        assert_eq!(s.service.book().ledger().entries().count(), entries);
        for id in [a, b] {
            assert_eq!(s.service.payment(&id).unwrap().history.len(), 1);
        }
    }

    #[test]
    fn test_reference_can_be_set_before_switch() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);
        let batch = s.validated_batch(vec![id], "", true);

        s.service.set_batch_reference(batch, "SLIP-9".to_string(), &s.ctx).unwrap();

        assert!(s.service.switch_batch(batch, &s.ctx).is_ok());
    }

    #[test]
    fn test_draft_batch_cannot_be_switched() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);
        let batch = s
            .service
            .create_batch(
                NewBatch {
                    name: "Remittance".to_string(),
                    journal_id: s.chart.checks_journal,
                    destination_journal_id: s.chart.bank_journal,
                    external_ref: "SLIP-1".to_string(),
                    banknote_type: BanknoteType::None,
                    payment_ids: vec![id],
                    move_to_next_stage: true,
                },
                &s.ctx,
            )
            .unwrap();

        assert_err_variant!(
            s.service.switch_batch(batch, &s.ctx),
            PaymentError::InvalidStateTransition(_)
        );
    }

    #[test]
    fn test_sent_batch_cannot_be_switched_again() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);
        let batch = s.validated_batch(vec![id], "SLIP-1", true);
        s.service.switch_batch(batch, &s.ctx).unwrap();

        assert_err_variant!(
            s.service.switch_batch(batch, &s.ctx),
            PaymentError::InvalidStateTransition(_)
        );
        assert_err_variant!(
            s.service.set_batch_reference(batch, "SLIP-2".to_string(), &s.ctx),
            PaymentError::InvalidStateTransition(_)
        );
    }

    #[test]
    fn test_member_past_must_be_sent_fails_whole_check() {
        let mut s = ScenarioBuilder::new().build();
        let first = s.payment(s.two_stage).build();
        let a = s.posted(first);
        let batch = s.validated_batch(vec![a], "SLIP-1", true);
        let wrong = s.in_bank(MoneyFixtures::mad_1000());
        // Force a payment that is not at a must-be-sent stage into the batch
        let result = s.service.create_batch(
            NewBatch {
                name: "Mixed".to_string(),
                journal_id: s.chart.checks_journal,
                destination_journal_id: s.chart.bank_journal,
                external_ref: "SLIP-2".to_string(),
                banknote_type: BanknoteType::None,
                payment_ids: vec![wrong],
                move_to_next_stage: true,
            },
            &s.ctx,
        );
        let mixed = result.unwrap();
        s.service.validate_batch(mixed, &s.ctx).unwrap();

        assert_err_variant!(s.service.switch_batch(mixed, &s.ctx), PaymentError::Validation(_));
        assert_eq!(s.service.batch(&batch).unwrap().state, BatchState::Validated);
    }

    #[test]
    fn test_bank_side_payments_found_by_batch_query() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);
        let batch = s.validated_batch(vec![id], "SLIP-1", true);
        s.service.switch_batch(batch, &s.ctx).unwrap();

        let all = s.service.search(&PaymentQuery::in_batch(batch));
        let originals = s.service.search(&PaymentQuery::in_batch(batch).originals());

        assert_eq!(all.len(), 2);
        assert_eq!(originals.len(), 1);
        assert_eq!(originals[0].id, id);
    }

    #[test]
    fn test_reset_blocked_once_batch_sent() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);
        let batch = s.validated_batch(vec![id], "SLIP-1", false);
        s.service.switch_batch(batch, &s.ctx).unwrap();

        assert_err_variant!(
            s.service.action_draft(id, &s.ctx),
            PaymentError::InvalidStateTransition(_)
        );
    }
}

// ============================================================================
// Handoff accounting
// ============================================================================

mod handoff {
    use super::*;

    #[test]
    fn test_counterpart_on_skip_account_moves_whole_value() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).with_counterpart(s.chart.bank_fees).build();
        let id = s.posted(input);
        let batch = s.validated_batch(vec![id], "SLIP-1", true);

        let report = s.service.switch_batch(batch, &s.ctx).unwrap();

        let member = &report.switched[0];
        let ledger = s.service.book().ledger();
        let (debit, credit) = assert_entry_balanced(ledger, &member.handoff_entry);
        assert_eq!((debit, credit), (dec!(1000), dec!(1000)));
        let handoff = ledger.entry(&member.handoff_entry).unwrap();
        assert_eq!(handoff.lines.len(), 2);
        assert_eq!(handoff.lines_on(s.chart.to_send, LineSide::Credit).count(), 1);
        assert_eq!(handoff.lines_on(s.chart.transfer, LineSide::Debit).count(), 1);
        assert!(handoff.lines.iter().all(|l| l.account_id != s.chart.bank_fees));

        assert!(ledger.balance(&s.chart.to_send).unwrap().is_zero());
        assert!(ledger.balance(&s.chart.transfer).unwrap().is_zero());
        assert_money_eq(&ledger.balance(&s.chart.in_bank).unwrap(), dec!(1000));
    }
}

// ============================================================================
// Partial failure and resume
// ============================================================================

mod partial_failure {
    use super::*;

    #[test]
    fn test_failing_member_stops_switch_and_keeps_earlier_members() {
        let mut s = ScenarioBuilder::new().build();
        let (remote, account) = remote_bank_method(&mut s);
        let first = s.payment(s.two_stage).build();
        let second = s.payment(remote).with_transaction_number("CHK-0002").build();
        let a = s.posted(first);
        let b = s.posted(second);
        let batch = s.validated_batch(vec![a, b], "SLIP-1", true);
        s.service.ledger_mut().account_mut(&account).unwrap().deactivate();

        let err = s.service.switch_batch(batch, &s.ctx).unwrap_err();

        match err {
            PaymentError::BatchPartialFailure {
                batch: failed_batch,
                payment,
                processed,
                source,
            } => {
                assert_eq!(failed_batch, batch.to_string());
                assert_eq!(payment, b.to_string());
                assert_eq!(processed, vec![a]);
                assert!(matches!(*source, PaymentError::Ledger(_)));
            }
            other => panic!("expected BatchPartialFailure, got {:?}", other),
        }

        let stored = s.service.batch(&batch).unwrap();
        assert_eq!(stored.state, BatchState::Sent);
        assert_eq!(stored.bank_side_payments.len(), 1);
        assert_eq!(stored.bank_side_payments[0].original, a);
        assert_eq!(stored.pending_members(), vec![b]);

        let in_bank = s.service.get_available_stages(&s.two_stage).unwrap()[1].id;
        assert_eq!(s.service.payment(&a).unwrap().stage_id, Some(in_bank));

        let untouched = s.service.payment(&b).unwrap();
        assert_eq!(untouched.history.len(), 1);
        assert_eq!(untouched.holding_account, Some(s.chart.to_send));
        assert_eq!(s.service.search(&PaymentQuery::in_batch(batch)).len(), 3);
        assert_money_eq(&s.service.book().ledger().balance(&s.chart.to_send).unwrap(), dec!(1000));
    }

    #[test]
    fn test_switch_resumes_with_pending_members() {
        let mut s = ScenarioBuilder::new().build();
        let (remote, account) = remote_bank_method(&mut s);
        let first = s.payment(s.two_stage).build();
        let second = s.payment(remote).with_transaction_number("CHK-0002").build();
        let a = s.posted(first);
        let b = s.posted(second);
        let batch = s.validated_batch(vec![a, b], "SLIP-1", true);
        s.service.ledger_mut().account_mut(&account).unwrap().deactivate();
        assert!(s.service.switch_batch(batch, &s.ctx).is_err());
        s.service.ledger_mut().account_mut(&account).unwrap().activate();

        let report = s.service.switch_batch(batch, &s.ctx).unwrap();

        assert_eq!(report.switched.len(), 1);
        assert_eq!(report.switched[0].original, b);
        let stored = s.service.batch(&batch).unwrap();
        assert_eq!(stored.bank_side_payments.len(), 2);
        assert!(stored.pending_members().is_empty());
        let handoffs = |id: PaymentId| {
            s.service
                .payment(&id)
                .unwrap()
                .history
                .iter()
                .filter(|m| m.reason == MoveReason::Handoff)
                .count()
        };
        assert_eq!(handoffs(a), 1);
        assert_eq!(handoffs(b), 1);
        assert_money_eq(&s.service.book().ledger().balance(&account).unwrap(), dec!(1000));

        assert_err_variant!(
            s.service.switch_batch(batch, &s.ctx),
            PaymentError::InvalidStateTransition(_)
        );
    }
}
