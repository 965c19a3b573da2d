//! Uniform sampling of discovered files

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Number of items kept for a fraction: `max(1, floor(len * fraction))`, capped at `len`.
pub fn selection_count(len: usize, fraction: f64) -> usize {
    if len == 0 {
        return 0;
    }
    let n = (len as f64 * fraction).floor() as usize;
    n.clamp(1, len)
}

/// Pick `selection_count(items.len(), fraction)` items without replacement.
pub fn sample_items<T: Clone, R: Rng + ?Sized>(items: &[T], fraction: f64, rng: &mut R) -> Vec<T> {
    let n = selection_count(items.len(), fraction);

    let mut indices: Vec<usize> = (0..items.len()).collect();
    indices.shuffle(rng);

    indices
        .into_iter()
        .take(n)
        .map(|i| items[i].clone())
        .collect()
}

/// Random source for the agent: seeded when `seed` is set, from entropy otherwise.
pub fn agent_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}
