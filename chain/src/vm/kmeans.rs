//! Deterministic K-Means clustering.
//!
//! Everything here is seeded with a fixed constant so that every node
//! executing the same transaction commits the same centroids. The
//! empty-cluster reinitialization draws from the same seeded stream as
//! the initial centroid selection, which makes the output sensitive to
//! the number of empty clusters encountered; that behavior is part of
//! the committed semantics and must not change silently.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed PRNG seed; shared by every node.
const SEED: u64 = 42;

/// Runs `max_iter` passes of K-Means over `data` and returns the final
/// centroids.
///
/// `data` must be a non-empty list of equi-dimensional points. Initial
/// centroids are `k` samples drawn by index from the seeded stream
/// (duplicates allowed). There is no convergence short-circuit: the
/// loop always runs exactly `max_iter` passes.
pub fn cluster(data: &[Vec<f64>], k: usize, max_iter: usize) -> Vec<Vec<f64>> {
    if data.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(SEED);
    let mut centroids = initialize_centroids(data, k, &mut rng);

    for _ in 0..max_iter {
        let assignments = assign_clusters(data, &centroids);
        centroids = recalculate_centroids(data, &assignments, k, &mut rng);
    }

    centroids
}

fn initialize_centroids(data: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    (0..k)
        .map(|_| data[rng.gen_range(0..data.len())].clone())
        .collect()
}

/// Assigns every point to the centroid minimizing squared Euclidean
/// distance; ties go to the lowest centroid index.
fn assign_clusters(data: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    data.iter()
        .map(|point| closest_centroid(point, centroids))
        .collect()
}

fn closest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut min_dist = f64::MAX;
    let mut closest = 0;

    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < min_dist {
            min_dist = dist;
            closest = i;
        }
    }
    closest
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Recomputes each centroid as the component-wise mean of its members.
/// Empty clusters are reinitialized by drawing another input point.
fn recalculate_centroids(
    data: &[Vec<f64>],
    assignments: &[usize],
    k: usize,
    rng: &mut StdRng,
) -> Vec<Vec<f64>> {
    let dim = data[0].len();
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];

    for (point, &cluster) in data.iter().zip(assignments.iter()) {
        for (j, value) in point.iter().enumerate() {
            sums[cluster][j] += value;
        }
        counts[cluster] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            if count == 0 {
                data[rng.gen_range(0..data.len())].clone()
            } else {
                sum.into_iter().map(|v| v / count as f64).collect()
            }
        })
        .collect()
}
