use rayon::prelude::*;

use super::Descriptor;

/// A descriptor match accepted by the ratio test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorMatch {
    /// Index into the query descriptors.
    pub query_idx: usize,
    /// Index of the nearest train descriptor.
    pub train_idx: usize,
    /// Hamming distance to the nearest train descriptor.
    pub distance: u32,
    /// Hamming distance to the second nearest train descriptor.
    pub second_distance: u32,
}

/// Hamming distance between two packed descriptors.
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x ^ y).count_ones())
        .sum()
}

/// Match binary descriptors using brute-force Hamming distance and Lowe's ratio test.
///
/// For each query descriptor the two nearest train descriptors are found; the match is kept
/// only if `distance < ratio * second_distance`. With fewer than two train descriptors no
/// match can be qualified and the result is empty.
///
/// # Arguments
///
/// * `query` - Descriptors of the current frame.
/// * `train` - Descriptors of the previous frame.
/// * `ratio` - Nearest to second nearest distance ratio.
///
/// # Returns
///
/// The accepted matches in query order.
pub fn match_descriptors_ratio(
    query: &[Descriptor],
    train: &[Descriptor],
    ratio: f32,
) -> Vec<DescriptorMatch> {
    if query.is_empty() || train.len() < 2 {
        return Vec::new();
    }

    query
        .par_iter()
        .enumerate()
        .filter_map(|(query_idx, q)| {
            let mut best = u32::MAX;
            let mut second = u32::MAX;
            let mut train_idx = 0usize;

            for (j, t) in train.iter().enumerate() {
                let d = hamming_distance(q, t);
                if d < best {
                    second = best;
                    best = d;
                    train_idx = j;
                } else if d < second {
                    second = d;
                }
            }

            ((best as f32) < ratio * second as f32).then_some(DescriptorMatch {
                query_idx,
                train_idx,
                distance: best,
                second_distance: second,
            })
        })
        .collect()
}
