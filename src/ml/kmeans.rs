// ============================================================
// Layer 5 — K-Means Clustering
// ============================================================
// Groups sentence vectors so similar titles land together.
//
// Algorithm:
//   1. k-means++ seeding: first centroid uniform, every next
//      one drawn with probability ∝ squared distance to the
//      nearest centroid chosen so far
//   2. assign each vector to its nearest centroid (Euclidean)
//   3. move each centroid to the mean of its members
//   4. repeat 2-3 until no centroid moves more than the
//      threshold, or max_iterations is hit
//
// Ranking: clusters are ordered by the mean distance of their
// members to the centroid, tightest first. Tight clusters are
// the ones whose titles really share a topic.
//
// Validation fails fast: bad k, zero iterations or a
// non-positive threshold are errors, never silently patched.

use rand::{distributions::WeightedIndex, prelude::Distribution, rngs::StdRng, Rng, SeedableRng};

use crate::domain::error::LmError;

#[derive(Clone, Debug)]
pub struct KMeansConfig {
    /// Number of clusters. Must be in `1..=n`.
    pub k: usize,
    pub max_iterations: usize,
    /// Stop once the largest centroid movement is below this.
    pub convergence_threshold: f32,
    /// Fixed seed for reproducible seeding; entropy otherwise.
    pub seed: Option<u64>,
}

impl KMeansConfig {
    pub fn new(k: usize, max_iterations: usize, convergence_threshold: f32) -> Result<Self, LmError> {
        if k == 0 {
            return Err(LmError::InvalidHyperparameter("k must be > 0".into()));
        }
        if max_iterations == 0 {
            return Err(LmError::InvalidHyperparameter("max_iterations must be > 0".into()));
        }
        if !convergence_threshold.is_finite() || convergence_threshold <= 0.0 {
            return Err(LmError::InvalidHyperparameter(format!(
                "convergence_threshold must be a positive number, got {convergence_threshold}"
            )));
        }
        Ok(Self { k, max_iterations, convergence_threshold, seed: None })
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// `round(sqrt(n))`, kept inside `[1, n]`.
pub fn cluster_count(n: usize) -> usize {
    let k = (n as f64).sqrt().round() as usize;
    k.clamp(1, n.max(1))
}

#[derive(Clone, Debug)]
pub struct KMeansResult {
    pub centroids:   Vec<Vec<f32>>,
    /// Cluster index of every input vector.
    pub assignments: Vec<usize>,
    pub iterations:  usize,
    pub converged:   bool,
}

impl KMeansResult {
    /// Euclidean distance of every vector to its assigned centroid.
    pub fn distances(&self, vectors: &[Vec<f32>]) -> Vec<f32> {
        vectors
            .iter()
            .zip(&self.assignments)
            .map(|(v, &c)| euclidean_distance(v, &self.centroids[c]))
            .collect()
    }

    /// Within-cluster sum of squares.
    pub fn wcss(&self, vectors: &[Vec<f32>]) -> f32 {
        vectors
            .iter()
            .zip(&self.assignments)
            .map(|(v, &c)| squared_distance(v, &self.centroids[c]))
            .sum()
    }
}

pub fn kmeans(vectors: &[Vec<f32>], config: &KMeansConfig) -> Result<KMeansResult, LmError> {
    if vectors.is_empty() {
        return Err(LmError::NoSentences);
    }
    if config.k > vectors.len() {
        return Err(LmError::InvalidHyperparameter(format!(
            "k ({}) must be <= number of vectors ({})",
            config.k,
            vectors.len()
        )));
    }
    let dim = vectors[0].len();
    if vectors.iter().any(|v| v.len() != dim) {
        return Err(LmError::InvalidHyperparameter("vectors differ in dimension".into()));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut centroids   = kmeans_plus_plus_init(vectors, config.k, &mut rng);
    let mut assignments = vec![0usize; vectors.len()];
    let mut iterations  = 0;
    let mut converged   = false;

    tracing::debug!("k-means: k={}, n={}, dim={}", config.k, vectors.len(), dim);

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        for (slot, v) in assignments.iter_mut().zip(vectors) {
            *slot = nearest(v, &centroids);
        }

        let next = compute_centroids(vectors, &assignments, &centroids);
        let max_movement = centroids
            .iter()
            .zip(&next)
            .map(|(old, new)| euclidean_distance(old, new))
            .fold(0.0f32, f32::max);
        centroids = next;

        if max_movement < config.convergence_threshold {
            converged = true;
            break;
        }
    }

    // Final assignment against the settled centroids.
    for (slot, v) in assignments.iter_mut().zip(vectors) {
        *slot = nearest(v, &centroids);
    }

    if converged {
        tracing::info!("k-means converged after {iterations} iterations");
    } else {
        tracing::warn!("k-means stopped at max_iterations ({iterations}) without converging");
    }

    Ok(KMeansResult { centroids, assignments, iterations, converged })
}

/// `(cluster, mean distance)` for every non-empty cluster,
/// ascending by mean distance; ties keep cluster order.
pub fn rank_by_mean_distance(assignments: &[usize], distances: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut sums   = vec![0.0f32; k];
    let mut counts = vec![0usize; k];
    for (&c, &d) in assignments.iter().zip(distances) {
        sums[c]   += d;
        counts[c] += 1;
    }

    let mut ranked: Vec<(usize, f32)> = sums
        .into_iter()
        .zip(counts)
        .enumerate()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(c, (sum, count))| (c, sum / count as f32))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_distance(a, b).sqrt()
}

fn nearest(v: &[f32], centroids: &[Vec<f32>]) -> usize {
    centroids
        .iter()
        .map(|c| squared_distance(v, c))
        .enumerate()
        .fold((0, f32::MAX), |best, (j, d)| if d < best.1 { (j, d) } else { best })
        .0
}

fn kmeans_plus_plus_init<R: Rng + ?Sized>(vectors: &[Vec<f32>], k: usize, rng: &mut R) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(vectors[rng.gen_range(0..vectors.len())].clone());

    let mut min_distances = vec![f32::MAX; vectors.len()];
    while centroids.len() < k {
        if let Some(last) = centroids.last() {
            for (d, v) in min_distances.iter_mut().zip(vectors) {
                *d = d.min(squared_distance(v, last));
            }
        }

        // All-zero weights mean every point already sits on a
        // centroid; WeightedIndex rejects that, so take the next
        // point in order instead.
        let idx = match WeightedIndex::new(&min_distances) {
            Ok(dist) => dist.sample(rng),
            Err(_)   => centroids.len() % vectors.len(),
        };
        centroids.push(vectors[idx].clone());
    }
    centroids
}

/// Mean of each cluster's members. A cluster that lost all its
/// members keeps its previous centroid.
fn compute_centroids(vectors: &[Vec<f32>], assignments: &[usize], previous: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let dim = previous.first().map_or(0, Vec::len);
    let mut sums   = vec![vec![0.0f32; dim]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (v, &c) in vectors.iter().zip(assignments) {
        counts[c] += 1;
        for (acc, x) in sums[c].iter_mut().zip(v) {
            *acc += x;
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, count), prev)| {
            if count == 0 {
                prev.clone()
            } else {
                sum.into_iter().map(|x| x / count as f32).collect()
            }
        })
        .collect()
}
