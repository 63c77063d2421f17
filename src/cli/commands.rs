// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// The six subcommands and all their flags. Defaults are the
// hyperparameters the model was designed around.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::cluster_use_case::ClusterConfig;
use crate::data::segmenter::SegmenterKind;
use crate::application::train_use_case::{TrainConfig, DEFAULT_PROMPTS};
use crate::ml::model::AttentionMode;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a vocabulary file from the characters of a corpus
    BuildVocab(BuildVocabArgs),

    /// Train the character language model on a corpus
    Train(TrainArgs),

    /// Continue prompts with a trained model
    Generate(GenerateArgs),

    /// Score sentences with a trained model (lower = more fluent)
    Perplexity(PerplexityArgs),

    /// Write the encoder of a trained model as a standalone record
    ExportEncoder(ExportEncoderArgs),

    /// Cluster sentences by their mean word vectors
    Cluster(ClusterArgs),
}

#[derive(Args, Debug)]
pub struct BuildVocabArgs {
    #[arg(long, default_value = "corpus.txt")]
    pub corpus: String,

    /// Where to write the vocabulary (one token per line)
    #[arg(long, default_value = "vocab.txt")]
    pub vocab: String,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// UTF-8 training text; lines are trimmed and joined
    #[arg(long, default_value = "corpus.txt")]
    pub corpus: String,

    /// Vocabulary file, one token per line; must contain [UNK] or <UNK>
    #[arg(long, default_value = "vocab.txt")]
    pub vocab: String,

    /// Output directory for checkpoint, tokenizer and metrics
    #[arg(long, default_value = "model")]
    pub model_dir: String,

    /// Encoder to start from: a BERT `.safetensors` checkpoint
    /// (vocab.txt must be that model's vocabulary) or a record
    /// written by `export-encoder`
    #[arg(long)]
    pub pretrained_encoder: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 500)]
    pub batch_size: usize,

    /// Random windows drawn per epoch
    #[arg(long, default_value_t = 50_000)]
    pub samples_per_epoch: usize,

    /// Hidden size of the encoder; must be divisible by num_heads
    #[arg(long, default_value_t = 768)]
    pub char_dim: usize,

    /// Characters of context per sample
    #[arg(long, default_value_t = 10)]
    pub window_size: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    #[arg(long, default_value_t = 12)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 12)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 3072)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Stop generating once the text (prompt included) is longer than this
    #[arg(long, default_value_t = 30)]
    pub max_text_chars: usize,

    /// Prompt to continue after every epoch (repeatable)
    #[arg(long = "prompt")]
    pub prompts: Vec<String>,

    /// Decode without the causal mask
    #[arg(long)]
    pub full_attention_decoding: bool,

    /// Train without writing checkpoint, tokenizer or metrics
    #[arg(long)]
    pub no_save: bool,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let prompts = if a.prompts.is_empty() {
            DEFAULT_PROMPTS.iter().map(|p| p.to_string()).collect()
        } else {
            a.prompts
        };
        TrainConfig {
            corpus_path:        a.corpus,
            vocab_path:         a.vocab,
            model_dir:          a.model_dir,
            pretrained_encoder: a.pretrained_encoder,
            epochs:             a.epochs,
            batch_size:         a.batch_size,
            samples_per_epoch:  a.samples_per_epoch,
            char_dim:           a.char_dim,
            window_size:        a.window_size,
            lr:                 a.lr,
            num_heads:          a.num_heads,
            num_layers:         a.num_layers,
            d_ff:               a.d_ff,
            dropout:            a.dropout,
            max_text_chars: a.max_text_chars,
            prompts,
            attention:          attention_mode(a.full_attention_decoding),
            save:               !a.no_save,
            seed:               a.seed,
        }
    }
}

pub fn attention_mode(full: bool) -> AttentionMode {
    if full { AttentionMode::Full } else { AttentionMode::Causal }
}

/// Which saved run to load.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long, default_value = "model")]
    pub model_dir: String,

    /// Checkpoint name: the training corpus file name without extension
    #[arg(long, default_value = "corpus")]
    pub name: String,

    /// Decode without the causal mask, whatever the run used
    #[arg(long)]
    pub full_attention_decoding: bool,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Prompts to continue
    #[arg(required = true)]
    pub prompts: Vec<String>,

    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct PerplexityArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Sentences to score
    #[arg(required = true)]
    pub sentences: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ExportEncoderArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Output path; the recorder adds `.mpk`
    #[arg(long, default_value = "model/encoder")]
    pub out: String,
}

#[derive(Args, Debug)]
pub struct ClusterArgs {
    /// Sentences to cluster, one per line
    #[arg(long, default_value = "titles.txt")]
    pub sentences: String,

    /// Word2vec text-format embedding table
    #[arg(long, default_value = "model.w2v")]
    pub embeddings: String,

    /// Sentences printed per cluster
    #[arg(long, default_value_t = 10)]
    pub preview: usize,

    /// Segment by longest match against the embedding vocabulary instead of jieba
    #[arg(long)]
    pub dictionary_segmenter: bool,

    /// Extra jieba dictionary (`word [freq] [tag]` per line)
    #[arg(long, conflicts_with = "dictionary_segmenter")]
    pub user_dict: Option<String>,

    #[arg(long, default_value_t = 300)]
    pub max_iterations: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub convergence_threshold: f32,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl From<&ClusterArgs> for ClusterConfig {
    fn from(a: &ClusterArgs) -> Self {
        ClusterConfig {
            sentences_path:        a.sentences.clone(),
            embeddings_path:       a.embeddings.clone(),
            segmenter:             if a.dictionary_segmenter {
                SegmenterKind::Dictionary
            } else {
                SegmenterKind::Jieba
            },
            user_dict:             a.user_dict.clone(),
            max_iterations:        a.max_iterations,
            convergence_threshold: a.convergence_threshold,
            seed:                  a.seed,
        }
    }
}
