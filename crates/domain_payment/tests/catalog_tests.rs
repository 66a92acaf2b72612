//! Property tests for stage catalogs

use proptest::prelude::*;

use core_kernel::AccountId;
use domain_payment::{BanknoteType, PaymentMethod, PaymentMethodKind, StageCatalog, StageType};
use test_utils::{stage_sequences_strategy, CatalogFixtures};

proptest! {
    #[test]
    fn prop_catalog_walks_stages_in_sequence_order(
        sequences in stage_sequences_strategy(8),
        seed in any::<u64>(),
    ) {
        let method = PaymentMethod::new("GEN", "Generic", PaymentMethodKind::Transfer);
        let mut stages: Vec<_> = sequences
            .iter()
            .map(|seq| CatalogFixtures::stage(&method, &format!("S{}", seq), *seq, StageType::Generic, AccountId::new()))
            .collect();
        // Hand the stages over in a scrambled order
        let len = stages.len();
        stages.rotate_left((seed as usize) % len);

        let catalog = StageCatalog::new(method, stages).unwrap();

        let mut current = catalog.first_stage(BanknoteType::None).unwrap();
        let mut walked = vec![current.sequence];
        while let Some(next) = catalog.get_next_stage(&current.id, BanknoteType::None).unwrap() {
            prop_assert!(next.sequence > current.sequence);
            walked.push(next.sequence);
            current = next;
        }
        prop_assert_eq!(walked, sequences);
        prop_assert!(catalog.is_last_regular_stage(&current.id, BanknoteType::None).unwrap());
    }

    #[test]
    fn prop_repeated_sequence_always_rejected(
        sequences in stage_sequences_strategy(6),
        pick in any::<prop::sample::Index>(),
    ) {
        let method = PaymentMethod::new("GEN", "Generic", PaymentMethodKind::Transfer);
        let duplicate = sequences[pick.index(sequences.len())];
        let mut stages: Vec<_> = sequences
            .iter()
            .map(|seq| CatalogFixtures::stage(&method, "S", *seq, StageType::Generic, AccountId::new()))
            .collect();
        stages.push(CatalogFixtures::stage(&method, "Dup", duplicate, StageType::Generic, AccountId::new()));

        prop_assert!(StageCatalog::new(method, stages).is_err());
    }
}
