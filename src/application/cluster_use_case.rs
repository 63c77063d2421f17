// ============================================================
// Layer 2 — ClusterUseCase
// ============================================================
// Groups similar sentences (news titles, say) by meaning:
//
//   Step 1: Load the word-embedding table  (Layer 4 - data)
//   Step 2: Load sentences, one per line   (Layer 4 - data)
//   Step 3: Segment + deduplicate          (Layer 4 - data)
//   Step 4: Sentence vectors (mean words)  (Layer 4 - data)
//   Step 5: k-means, k = round(sqrt(n))    (Layer 5 - ml)
//   Step 6: Rank clusters, tightest first  (Layer 5 - ml)
//
// Segmentation uses jieba unless the config asks for longest
// match against the embedding vocabulary.
//
// Sentences that segment to no words at all have no vector and
// are dropped (with a log line) before n is counted.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    embeddings::WordEmbeddings,
    loader::{load_sentences, LineFileLoader},
    segmenter::{segment_unique, DictionarySegmenter, JiebaSegmenter, SegmenterKind},
};
use crate::domain::{cluster::RankedCluster, error::LmError, traits::Segmenter};
use crate::ml::kmeans::{cluster_count, kmeans, rank_by_mean_distance, KMeansConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub sentences_path:        String,
    pub embeddings_path:       String,
    pub segmenter:             SegmenterKind,
    /// Extra jieba dictionary
    pub user_dict:             Option<String>,
    pub max_iterations:        usize,
    pub convergence_threshold: f32,
    pub seed:                  Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            sentences_path:        "titles.txt".to_string(),
            embeddings_path:       "model.w2v".to_string(),
            segmenter:             SegmenterKind::Jieba,
            user_dict:             None,
            max_iterations:        300,
            convergence_threshold: 1e-4,
            seed:                  None,
        }
    }
}

pub struct ClusterUseCase {
    config: ClusterConfig,
}

impl ClusterUseCase {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<RankedCluster>> {
        let cfg = &self.config;

        let embeddings = WordEmbeddings::load_word2vec_text(&cfg.embeddings_path)?;
        let sentences  = load_sentences(&LineFileLoader::new(&cfg.sentences_path))?;

        match cfg.segmenter {
            SegmenterKind::Jieba => {
                let mut segmenter = JiebaSegmenter::new();
                if let Some(path) = &cfg.user_dict {
                    segmenter = segmenter.with_user_dict(path)?;
                }
                cluster_sentences(&sentences, &segmenter, &embeddings, cfg)
            }
            SegmenterKind::Dictionary => {
                let segmenter = DictionarySegmenter::new(&embeddings);
                cluster_sentences(&sentences, &segmenter, &embeddings, cfg)
            }
        }
    }
}

/// The whole clustering pipeline on in-memory inputs.
pub fn cluster_sentences<S: AsRef<str>>(
    sentences:  &[S],
    segmenter:  &dyn Segmenter,
    embeddings: &WordEmbeddings,
    cfg:        &ClusterConfig,
) -> Result<Vec<RankedCluster>> {
    let unique = segment_unique(sentences, segmenter);
    tracing::info!("{} sentences, {} after deduplication", sentences.len(), unique.len());

    let mut kept    = Vec::with_capacity(unique.len());
    let mut vectors = Vec::with_capacity(unique.len());
    for sentence in unique {
        let words: Vec<&str> = sentence.split(' ').filter(|w| !w.is_empty()).collect();
        match embeddings.sentence_vector(&words) {
            Some(v) => {
                vectors.push(v);
                kept.push(sentence);
            }
            None => tracing::debug!("skipping sentence with no words"),
        }
    }
    if vectors.is_empty() {
        return Err(LmError::NoSentences.into());
    }

    let k = cluster_count(vectors.len());
    tracing::info!("Clustering {} sentence vectors into {} clusters", vectors.len(), k);

    let km = KMeansConfig::new(k, cfg.max_iterations, cfg.convergence_threshold)?
        .with_seed(cfg.seed);
    let result    = kmeans(&vectors, &km)?;
    let distances = result.distances(&vectors);
    tracing::info!(
        "k-means finished after {} iterations, WCSS={:.4}",
        result.iterations,
        result.wcss(&vectors)
    );

    let mut members: Vec<Vec<String>> = vec![Vec::new(); k];
    for (sentence, &c) in kept.into_iter().zip(&result.assignments) {
        members[c].push(sentence);
    }

    Ok(rank_by_mean_distance(&result.assignments, &distances, k)
        .into_iter()
        .map(|(c, mean)| RankedCluster::new(c, mean, std::mem::take(&mut members[c])))
        .collect())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn embeddings() -> WordEmbeddings {
        WordEmbeddings::parse_word2vec_text(
            "6 2\n\
             股市 10 10\n\
             大涨 10 11\n\
             基金 11 10\n\
             球队 0 0\n\
             夺冠 0 1\n\
             比赛 1 0\n",
        )
        .unwrap()
    }

    fn cfg() -> ClusterConfig {
        ClusterConfig { seed: Some(9), ..ClusterConfig::default() }
    }

    fn titles() -> Vec<&'static str> {
        vec![
            "股市大涨", "基金大涨", "股市基金", "股市大涨",
            "球队夺冠", "比赛夺冠", "球队比赛", "球队夺冠",
            "   ",
        ]
    }

    #[test]
    fn test_clusters_are_ranked_and_complete() {
        let emb = embeddings();
        let seg = DictionarySegmenter::new(&emb);
        let clusters = cluster_sentences(&titles(), &seg, &emb, &cfg()).unwrap();

        // 6 unique non-empty sentences → k = round(sqrt(6)) = 2
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters.iter().map(RankedCluster::len).sum::<usize>(), 6);
        assert!(clusters.windows(2).all(|w| w[0].mean_distance <= w[1].mean_distance));

        // Each topic ends up in its own cluster.
        for c in &clusters {
            let finance = c.sentences.iter().filter(|s| s.contains("股市") || s.contains("基金")).count();
            assert!(finance == 0 || finance == c.len());
        }
    }

    #[test]
    fn test_duplicates_are_counted_once() {
        let emb = embeddings();
        let seg = DictionarySegmenter::new(&emb);
        let clusters = cluster_sentences(&["股市大涨", "股市大涨", "股市 大涨"], &seg, &emb, &cfg()).unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].sentences, vec!["股市 大涨"]);
    }

    #[test]
    fn test_nothing_to_cluster() {
        let emb = embeddings();
        let seg = DictionarySegmenter::new(&emb);
        let err = cluster_sentences::<&str>(&["  ", ""], &seg, &emb, &cfg()).unwrap_err();
        assert!(matches!(err.downcast_ref::<LmError>(), Some(LmError::NoSentences)));
    }

    #[test]
    fn test_execute_reads_files() {
        let dir = tempdir().unwrap();
        let sentences  = dir.path().join("titles.txt");
        let embeddings = dir.path().join("model.w2v");
        fs::write(&sentences, titles().join("\n")).unwrap();
        fs::write(&embeddings, "3 2\n股市 1 1\n大涨 1 2\n球队 5 5\n").unwrap();

        let clusters = ClusterUseCase::new(ClusterConfig {
            sentences_path:  sentences.to_string_lossy().into_owned(),
            embeddings_path: embeddings.to_string_lossy().into_owned(),
            ..cfg()
        })
        .execute()
        .unwrap();

        assert!(!clusters.is_empty());
    }

    #[test]
    fn test_execute_with_jieba() {
        let dir = tempdir().unwrap();
        let sentences  = dir.path().join("titles.txt");
        let embeddings = dir.path().join("model.w2v");
        fs::write(&sentences, "北京清华大学\n北京 清华大学\n我来到北京\n").unwrap();
        fs::write(&embeddings, "4 2\n北京 1 1\n清华大学 1 2\n我 5 5\n来到 5 6\n").unwrap();

        let clusters = ClusterUseCase::new(ClusterConfig {
            sentences_path:  sentences.to_string_lossy().into_owned(),
            embeddings_path: embeddings.to_string_lossy().into_owned(),
            ..cfg()
        })
        .execute()
        .unwrap();

        // Two distinct segmentations: "北京 清华大学" and "我 来到 北京".
        let mut all: Vec<String> = clusters.into_iter().flat_map(|c| c.sentences).collect();
        all.sort();
        assert_eq!(all, vec!["北京 清华大学", "我 来到 北京"]);
    }
}
