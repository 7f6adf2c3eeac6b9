use engine::tasks::nback::scoring::is_match;
use engine::tasks::nback::sequence::{generate, match_indices, POSITION_COUNT};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

proptest! {
    #[test]
    fn generated_sequences_stay_on_the_grid(
        seed in any::<u64>(),
        length in 0usize..60,
        n_back in 1usize..6,
        p in 0.0f64..=1.0,
    ) {
        let sequence = generate(&mut StdRng::seed_from_u64(seed), length, n_back, p);
        prop_assert_eq!(sequence.len(), length);
        prop_assert!(sequence.iter().all(|&position| position < POSITION_COUNT));

        // The first N trials can never be matches.
        for index in 0..n_back.min(length) {
            prop_assert!(!is_match(&sequence, index, n_back));
        }
        for index in match_indices(&sequence, n_back) {
            prop_assert!(is_match(&sequence, index, n_back));
        }
    }
}
