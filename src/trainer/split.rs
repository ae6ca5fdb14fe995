//! Seeded train/eval partition.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Shuffle `0..n` with `seed` and hold out `ceil(n * eval_fraction)` indices,
/// always leaving at least one for training. Both halves come back sorted.
pub(crate) fn partition(n: usize, eval_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    idx.shuffle(&mut rng);

    let n_eval = ((n as f64) * eval_fraction).ceil() as usize;
    let n_eval = n_eval.min(n.saturating_sub(1));
    let mut eval = idx.split_off(n - n_eval);

    idx.sort_unstable();
    eval.sort_unstable();
    (idx, eval)
}
