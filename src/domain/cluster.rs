// ============================================================
// Layer 3 — Cluster Domain Types
// ============================================================
// The output of the embedding clusterer: one entry per k-means
// cluster, carrying how tight the cluster is and which
// sentences landed in it.
//
// "Tight" is measured as the mean Euclidean distance from each
// member vector to the cluster centroid — lower is tighter.
// Reports list clusters tightest-first.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCluster {
    /// Label assigned by k-means (0..k)
    pub cluster_id: usize,

    /// Mean distance of members to the centroid
    pub mean_distance: f32,

    /// Segmented sentences (space-joined words) in this cluster
    pub sentences: Vec<String>,
}

impl RankedCluster {
    pub fn new(cluster_id: usize, mean_distance: f32, sentences: Vec<String>) -> Self {
        Self { cluster_id, mean_distance, sentences }
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Up to `limit` member sentences with segmentation spaces removed,
    /// i.e. as they read in the input file.
    pub fn preview(&self, limit: usize) -> Vec<String> {
        self.sentences
            .iter()
            .take(limit)
            .map(|s| s.replace(' ', ""))
            .collect()
    }
}
