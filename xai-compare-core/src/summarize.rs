//! Background set summarization for sampling-based attribution.

use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use tracing::debug;

const MAX_ITERATIONS: usize = 100;

/// Summarize `data` into at most `k` representative rows with k-means.
///
/// Data with `k` rows or fewer is returned as is. Centroids start from `k`
/// distinct rows drawn with the seeded generator and follow Lloyd iterations
/// until assignments stop changing. A cluster that loses all its points keeps
/// its previous centroid.
pub fn kmeans(data: &Array2<f64>, k: usize, seed: u64) -> Array2<f64> {
    let n = data.nrows();
    if k == 0 || n <= k {
        return data.clone();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = data.select(Axis(0), &index::sample(&mut rng, n, k).into_vec());
    let mut assignment = vec![usize::MAX; n];

    for iteration in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, row) in data.rows().into_iter().enumerate() {
            let nearest = nearest_centroid(&centroids, &row.to_owned());
            if assignment[i] != nearest {
                assignment[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            debug!(iterations = iteration, k, "k-means converged");
            break;
        }

        let mut sums = Array2::<f64>::zeros(centroids.dim());
        let mut counts = vec![0usize; k];
        for (i, row) in data.rows().into_iter().enumerate() {
            let c = assignment[i];
            let mut sum = sums.row_mut(c);
            sum += &row;
            counts[c] += 1;
        }
        for (c, &count) in counts.iter().enumerate() {
            if count > 0 {
                let mean = &sums.row(c) / count as f64;
                centroids.row_mut(c).assign(&mean);
            }
        }
    }

    centroids
}

fn nearest_centroid(centroids: &Array2<f64>, point: &Array1<f64>) -> usize {
    centroids
        .rows()
        .into_iter()
        .map(|c| (&c - point).mapv(|d| d * d).sum())
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(i, _)| i)
}
