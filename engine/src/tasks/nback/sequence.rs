//! Stimulus sequence generation for spatial N-back blocks.
//!
//! Positions index a 3×3 grid (0–8, row-major). A sequence is built left to
//! right: at every index that has an N-back predecessor the source may force
//! a repeat of that predecessor; every other index draws a fresh position and
//! resamples until it differs from the predecessor, so matches only appear
//! where they were forced. The realised match rate is therefore a binomial
//! draw around `repeat_probability`, not an exact count.

use rand::Rng;

/// Number of cells in the stimulus grid.
pub const POSITION_COUNT: u8 = 9;

/// Randomness consumed by [`generate`].
///
/// Implemented for every [`rand::Rng`]; tests can script it directly.
pub trait StimulusSource {
    /// Whether the current index should repeat its N-back predecessor.
    fn force_repeat(&mut self, probability: f64) -> bool;

    /// A uniformly random grid position in `0..POSITION_COUNT`.
    fn draw_position(&mut self) -> u8;
}

impl<R: Rng + ?Sized> StimulusSource for R {
    fn force_repeat(&mut self, probability: f64) -> bool {
        self.gen_bool(probability.clamp(0.0, 1.0))
    }

    fn draw_position(&mut self) -> u8 {
        self.gen_range(0..POSITION_COUNT)
    }
}

/// Generate `length` positions for an `n_back` block.
pub fn generate<S>(source: &mut S, length: usize, n_back: usize, repeat_probability: f64) -> Vec<u8>
where
    S: StimulusSource + ?Sized,
{
    let mut sequence: Vec<u8> = Vec::with_capacity(length);

    for index in 0..length {
        let predecessor = index
            .checked_sub(n_back)
            .filter(|_| n_back > 0)
            .map(|earlier| sequence[earlier]);

        let position = match predecessor {
            Some(previous) if source.force_repeat(repeat_probability) => previous,
            Some(previous) => loop {
                let candidate = source.draw_position();
                if candidate != previous {
                    break candidate;
                }
            },
            None => source.draw_position(),
        };

        sequence.push(position);
    }

    sequence
}

/// Indices whose position equals the one `n_back` steps earlier.
pub fn match_indices(sequence: &[u8], n_back: usize) -> Vec<usize> {
    if n_back == 0 {
        return Vec::new();
    }
    (n_back..sequence.len())
        .filter(|&index| sequence[index] == sequence[index - n_back])
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    /// Replays fixed repeat decisions and positions.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedSource {
        repeats: VecDeque<bool>,
        positions: VecDeque<u8>,
    }

    impl ScriptedSource {
        pub(crate) fn new(repeats: &[bool], positions: &[u8]) -> Self {
            Self {
                repeats: repeats.iter().copied().collect(),
                positions: positions.iter().copied().collect(),
            }
        }
    }

    impl StimulusSource for ScriptedSource {
        fn force_repeat(&mut self, _probability: f64) -> bool {
            self.repeats.pop_front().unwrap_or(false)
        }

        fn draw_position(&mut self) -> u8 {
            self.positions
                .pop_front()
                .expect("scripted source ran out of positions")
        }
    }

    /// Never forces a repeat and walks the grid in order, so blocks contain no
    /// matches for any N that isn't a multiple of the grid size.
    #[derive(Debug, Default)]
    pub(crate) struct CyclingSource {
        next: u8,
    }

    impl StimulusSource for CyclingSource {
        fn force_repeat(&mut self, _probability: f64) -> bool {
            false
        }

        fn draw_position(&mut self) -> u8 {
            let position = self.next;
            self.next = (self.next + 1) % POSITION_COUNT;
            position
        }
    }

    #[test]
    fn scripted_source_yields_exact_sequence() {
        // index 0,1: free draws; index 2: forced repeat of index 0;
        // index 3: draw 4 collides with index 1 and is resampled to 6.
        let mut source = ScriptedSource::new(&[true, false], &[2, 4, 4, 6]);
        let sequence = generate(&mut source, 4, 2, 0.3);
        assert_eq!(sequence, vec![2, 4, 2, 6]);
        assert_eq!(match_indices(&sequence, 2), vec![2]);
    }

    #[test]
    fn same_seed_same_sequence() {
        let first = generate(&mut StdRng::seed_from_u64(42), 40, 2, 0.3);
        let second = generate(&mut StdRng::seed_from_u64(42), 40, 2, 0.3);
        assert_eq!(first, second);
        assert!(first.iter().all(|&position| position < POSITION_COUNT));
    }

    #[test]
    fn zero_probability_never_matches() {
        let mut rng = StdRng::seed_from_u64(7);
        for n_back in 1..=3 {
            let sequence = generate(&mut rng, 60, n_back, 0.0);
            assert!(match_indices(&sequence, n_back).is_empty());
        }
    }

    #[test]
    fn certain_probability_repeats_the_prefix() {
        let mut rng = StdRng::seed_from_u64(9);
        let sequence = generate(&mut rng, 12, 3, 1.0);
        assert_eq!(match_indices(&sequence, 3), (3..12).collect::<Vec<_>>());
        assert_eq!(&sequence[0..3], &sequence[3..6]);
    }

    #[test]
    fn match_rate_converges_on_probability() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut matches = 0usize;
        let mut eligible = 0usize;
        for _ in 0..400 {
            let sequence = generate(&mut rng, 15, 2, 0.3);
            matches += match_indices(&sequence, 2).len();
            eligible += 13;
        }
        let rate = matches as f64 / eligible as f64;
        assert!((rate - 0.3).abs() < 0.03, "empirical match rate {rate}");
    }

    #[test]
    fn short_sequences_have_no_matches() {
        assert!(match_indices(&[3, 3], 2).is_empty());
        assert!(match_indices(&[], 1).is_empty());
    }
}
