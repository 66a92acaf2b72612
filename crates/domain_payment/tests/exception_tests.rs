//! Integration tests for the exception branches and counterparty blocking

use rust_decimal_macros::dec;

use domain_ledger::LineSide;
use domain_payment::{
    EngineSettings, ExceptionFlag, ExceptionKind, MoveReason, PaymentError, PaymentQuery,
};
use test_utils::{assert_err_variant, assert_money_eq, MoneyFixtures, ScenarioBuilder};

// ============================================================================
// Raising exceptions
// ============================================================================

mod raising {
    use super::*;

    #[test]
    fn test_unpaid_moves_value_into_unpaid_account() {
        let mut s = ScenarioBuilder::new().build();
        let id = s.in_bank(MoneyFixtures::mad_1000());

        let outcome = s.service.set_unpaid(id, &s.ctx).unwrap();

        assert!(outcome.compensation_entry.is_none());
        let entry_id = outcome.entry.unwrap();
        let ledger = s.service.book().ledger();
        let entry = ledger.entry(&entry_id).unwrap();
        assert_eq!(entry.lines_on(s.chart.unpaid, LineSide::Debit).count(), 1);
        assert_eq!(entry.lines_on(s.chart.in_bank, LineSide::Credit).count(), 1);
        assert!(ledger.balance(&s.chart.in_bank).unwrap().is_zero());
        assert_money_eq(&ledger.balance(&s.chart.unpaid).unwrap(), dec!(1000));

        let payment = s.service.payment(&id).unwrap();
        assert_eq!(payment.exceptions.unpaid, ExceptionFlag::Active);
        assert_eq!(payment.active_exception(), Some(ExceptionKind::Unpaid));
        assert_eq!(payment.holding_account, Some(s.chart.unpaid));
        assert!(!payment.is_paid);
    }

    #[test]
    fn test_same_exception_twice_rejected() {
        let mut s = ScenarioBuilder::new().build();
        let id = s.unpaid(MoneyFixtures::mad_1000());

        assert_err_variant!(
            s.service.set_unpaid(id, &s.ctx),
            PaymentError::ExceptionAlreadyActive { .. }
        );
    }

    #[test]
    fn test_butterfly_then_prior_notice_rejected() {
        let mut s = ScenarioBuilder::new().build();
        let id = s.in_bank(MoneyFixtures::mad_1000());
        s.service.set_butterfly(id, &s.ctx).unwrap();

        assert_err_variant!(
            s.service.set_prior_notice(id, &s.ctx),
            PaymentError::InvalidStateTransition(_)
        );
        let payment = s.service.payment(&id).unwrap();
        assert_eq!(payment.exceptions.butterfly, ExceptionFlag::Active);
        assert_eq!(payment.exceptions.prior_notice, ExceptionFlag::Never);
    }

    #[test]
    fn test_unpaid_after_prior_notice_compensates_first() {
        let mut s = ScenarioBuilder::new().build();
        let id = s.in_bank(MoneyFixtures::mad_1000());
        s.service.set_prior_notice(id, &s.ctx).unwrap();

        let outcome = s.service.set_unpaid(id, &s.ctx).unwrap();

        assert!(outcome.compensation_entry.is_some());
        let payment = s.service.payment(&id).unwrap();
        assert_eq!(payment.exceptions.prior_notice, ExceptionFlag::Fixed);
        assert_eq!(payment.exceptions.unpaid, ExceptionFlag::Active);
        let reasons: Vec<MoveReason> = payment.history.iter().map(|m| m.reason).collect();
        assert!(reasons.contains(&MoveReason::Compensation(ExceptionKind::PriorNotice)));

        let ledger = s.service.book().ledger();
        assert!(ledger.balance(&s.chart.prior_notice).unwrap().is_zero());
        assert!(ledger.balance(&s.chart.in_bank).unwrap().is_zero());
        assert_money_eq(&ledger.balance(&s.chart.unpaid).unwrap(), dec!(1000));
    }

    #[test]
    fn test_missing_exception_stage() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);

        assert_err_variant!(
            s.service.set_unpaid(id, &s.ctx),
            PaymentError::StageNotConfigured { .. }
        );
    }

    #[test]
    fn test_search_active_exceptions() {
        let mut s = ScenarioBuilder::new().build();
        let unpaid = s.unpaid(MoneyFixtures::mad(dec!(500)));
        s.in_bank(MoneyFixtures::mad(dec!(300)));

        let found = s.service.search(&PaymentQuery::for_partner(s.partner).blocking());

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, unpaid);
    }
}

// ============================================================================
// Regularization
// ============================================================================

mod regularization {
    use super::*;

    #[test]
    fn test_set_paid_returns_value_to_bank() {
        let mut s = ScenarioBuilder::new().build();
        let id = s.unpaid(MoneyFixtures::mad_1000());

        let entry = s.service.set_paid(id, &s.ctx).unwrap();

        assert!(entry.is_some());
        let payment = s.service.payment(&id).unwrap();
        assert_eq!(payment.exceptions.unpaid, ExceptionFlag::Fixed);
        assert!(payment.active_exception().is_none());
        assert!(payment.is_paid);
        assert_eq!(payment.holding_account, Some(s.chart.in_bank));
        assert_eq!(
            payment.history.last().unwrap().reason,
            MoveReason::Regularized(ExceptionKind::Unpaid)
        );
        assert!(s.service.book().ledger().balance(&s.chart.unpaid).unwrap().is_zero());
    }

    #[test]
    fn test_set_paid_without_exception() {
        let mut s = ScenarioBuilder::new().build();
        let id = s.in_bank(MoneyFixtures::mad_1000());

        assert_err_variant!(
            s.service.set_paid(id, &s.ctx),
            PaymentError::NotInExceptionState { .. }
        );
    }

    #[test]
    fn test_fixed_flag_can_be_raised_again() {
        let mut s = ScenarioBuilder::new().build();
        let id = s.unpaid(MoneyFixtures::mad_1000());
        s.service.set_paid(id, &s.ctx).unwrap();

        s.service.set_unpaid(id, &s.ctx).unwrap();

        assert_eq!(s.service.payment(&id).unwrap().exceptions.unpaid, ExceptionFlag::Active);
    }
}

// ============================================================================
// Bank-side copies
// ============================================================================

mod bank_side {
    use super::*;

    fn switched_clone(s: &mut test_utils::Scenario) -> (core_kernel::PaymentId, core_kernel::PaymentId) {
        let input = s.payment(s.batched).build();
        let id = s.posted(input);
        let batch = s.validated_batch(vec![id], "SLIP-1", true);
        let report = s.service.switch_batch(batch, &s.ctx).unwrap();
        (id, report.switched[0].bank_side)
    }

    #[test]
    fn test_exception_on_bank_side_copy_rejected() {
        let mut s = ScenarioBuilder::new().build();
        let (_, clone) = switched_clone(&mut s);
        let entries = s.service.book().ledger().entries().count();

        assert_err_variant!(
            s.service.set_unpaid(clone, &s.ctx),
            PaymentError::InvalidStateTransition(_)
        );
        assert_err_variant!(
            s.service.set_butterfly(clone, &s.ctx),
            PaymentError::InvalidStateTransition(_)
        );

        assert!(!s.registry.is_blocked(&s.partner));
        assert!(s.registry.audit_trail(&s.partner).is_empty());
        assert_eq!(s.service.book().ledger().entries().count(), entries);
        assert!(s.service.book().ledger().balance(&s.chart.unpaid).unwrap().is_zero());
        assert_eq!(s.service.payment(&clone).unwrap().active_exception(), None);
    }

    #[test]
    fn test_set_paid_on_bank_side_copy_rejected() {
        let mut s = ScenarioBuilder::new().build();
        let (_, clone) = switched_clone(&mut s);

        assert_err_variant!(
            s.service.set_paid(clone, &s.ctx),
            PaymentError::InvalidStateTransition(_)
        );
    }

    #[test]
    fn test_original_still_takes_exceptions_after_switch() {
        let mut s = ScenarioBuilder::new().build();
        let (id, _) = switched_clone(&mut s);

        s.service.set_unpaid(id, &s.ctx).unwrap();

        assert!(s.registry.is_blocked(&s.partner));
        assert_money_eq(&s.service.book().ledger().balance(&s.chart.unpaid).unwrap(), dec!(1000));
    }
}

// ============================================================================
// Counterparty blocking
// ============================================================================

mod blocking {
    use super::*;

    #[test]
    fn test_unpaid_blocks_and_regularization_unblocks() {
        let mut s = ScenarioBuilder::new().build();
        let id = s.unpaid(MoneyFixtures::mad_1000());
        assert!(s.registry.is_blocked(&s.partner));

        s.service.set_paid(id, &s.ctx).unwrap();

        assert!(!s.registry.is_blocked(&s.partner));
        let trail = s.registry.audit_trail(&s.partner);
        assert_eq!(trail.len(), 2);
        assert!(trail[0].blocked);
        assert!(!trail[1].blocked);
        assert_eq!(trail[1].user, s.ctx.user_id);
    }

    #[test]
    fn test_butterfly_does_not_block() {
        let mut s = ScenarioBuilder::new().build();
        let id = s.in_bank(MoneyFixtures::mad_1000());

        s.service.set_butterfly(id, &s.ctx).unwrap();

        assert!(!s.registry.is_blocked(&s.partner));
    }

    #[test]
    fn test_partner_stays_blocked_while_another_payment_is_unpaid() {
        let mut s = ScenarioBuilder::new().build();
        let first = s.unpaid(MoneyFixtures::mad(dec!(500)));
        s.unpaid(MoneyFixtures::mad(dec!(300)));

        s.service.set_paid(first, &s.ctx).unwrap();

        assert!(s.registry.is_blocked(&s.partner));
    }

    #[test]
    fn test_engine_runs_without_blocking_capability() {
        let mut s = ScenarioBuilder::new().without_blocking().build();

        let id = s.unpaid(MoneyFixtures::mad_1000());

        assert_eq!(s.service.payment(&id).unwrap().exceptions.unpaid, ExceptionFlag::Active);
        assert!(!s.registry.is_blocked(&s.partner));
    }

    #[test]
    fn test_blocking_disabled_by_settings() {
        let settings = EngineSettings {
            counterparty_blocking: false,
            ..EngineSettings::default()
        };
        let mut s = ScenarioBuilder::new().with_settings(settings).build();

        s.unpaid(MoneyFixtures::mad_1000());

        assert!(!s.registry.is_blocked(&s.partner));
    }

    #[test]
    fn test_failed_action_applies_no_directive() {
        let mut s = ScenarioBuilder::new().build();
        let input = s.payment(s.two_stage).build();
        let id = s.posted(input);

        assert!(s.service.set_unpaid(id, &s.ctx).is_err());

        assert!(s.registry.audit_trail(&s.partner).is_empty());
    }
}
