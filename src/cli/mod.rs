// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2. This is
// the only layer that prints results for the user to read.
//
//   build-vocab — corpus → vocab.txt
//   train       — train the char LM, print samples per epoch
//   generate    — continue prompts with a saved run
//   perplexity  — score sentences with a saved run
//   export-encoder — save a run's encoder for a later run
//   cluster     — group sentences by meaning, tightest first
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{
    attention_mode, BuildVocabArgs, ClusterArgs, Commands, ExportEncoderArgs, GenerateArgs,
    PerplexityArgs, RunArgs, TrainArgs,
};

use crate::application::inference_use_case::InferenceUseCase;
use crate::domain::cluster::RankedCluster;
use crate::ml::trainer::InferBackend;

#[derive(Parser, Debug)]
#[command(
    name = "charlm",
    version = "0.1.0",
    about = "Train a character language model, and cluster sentences by word vectors."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::BuildVocab(args)    => run_build_vocab(args),
            Commands::Train(args)         => run_train(args),
            Commands::Generate(args)      => run_generate(args),
            Commands::Perplexity(args)    => run_perplexity(args),
            Commands::ExportEncoder(args) => run_export_encoder(args),
            Commands::Cluster(args)       => run_cluster(args),
        }
    }
}

fn run_build_vocab(args: BuildVocabArgs) -> Result<()> {
    use crate::application::vocab_use_case::BuildVocabUseCase;

    let vocab = BuildVocabUseCase::new(args.corpus, args.vocab.clone()).execute()?;
    println!("Wrote {} tokens to {}", vocab.len(), args.vocab);
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on corpus: {}", args.corpus);
    let save = !args.no_save;
    TrainUseCase::new(args.into()).execute()?;

    if save {
        println!("Training complete. Checkpoint saved.");
    } else {
        println!("Training complete.");
    }
    Ok(())
}

fn load_run(run: &RunArgs) -> Result<InferenceUseCase<InferBackend>> {
    let device  = burn::backend::wgpu::WgpuDevice::default();
    let session = InferenceUseCase::<InferBackend>::load(&run.model_dir, &run.name, device)?;
    Ok(if run.full_attention_decoding {
        session.with_attention(attention_mode(true))
    } else {
        session
    })
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let session = load_run(&args.run)?;
    for text in session.generate(&args.prompts, args.seed)? {
        println!("{text}");
    }
    Ok(())
}

fn run_perplexity(args: PerplexityArgs) -> Result<()> {
    let session = load_run(&args.run)?;
    for sentence in &args.sentences {
        match session.perplexity(sentence) {
            Ok(score) => println!("{score:.4}\t{sentence}"),
            Err(e)    => println!("-\t{sentence}\t({e})"),
        }
    }
    Ok(())
}

fn run_export_encoder(args: ExportEncoderArgs) -> Result<()> {
    let session = load_run(&args.run)?;
    let file    = session.export_encoder(&args.out)?;
    println!("Encoder written to {}", file.display());
    Ok(())
}

fn run_cluster(args: ClusterArgs) -> Result<()> {
    use crate::application::cluster_use_case::ClusterUseCase;

    let clusters = ClusterUseCase::new((&args).into()).execute()?;
    print!("{}", render_clusters(&clusters, args.preview));
    Ok(())
}

/// Cluster report, tightest cluster first.
fn render_clusters(clusters: &[RankedCluster], preview: usize) -> String {
    let mut out = String::new();
    for cluster in clusters {
        out.push_str(&format!(
            "cluster {} (mean distance: {:.4}, {} sentences):\n",
            cluster.cluster_id,
            cluster.mean_distance,
            cluster.len()
        ));
        for sentence in cluster.preview(preview) {
            out.push_str(&sentence);
            out.push('\n');
        }
        out.push_str("---------\n");
    }
    out
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::ml::model::AttentionMode;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from(["charlm", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };

        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.batch_size, 500);
        assert_eq!(cfg.window_size, 10);
        assert_eq!(cfg.prompts.len(), 2);
        assert_eq!(cfg.attention, AttentionMode::Causal);
        assert!(cfg.save);
    }

    #[test]
    fn test_train_flags() {
        let cli = Cli::try_parse_from([
            "charlm", "train", "--no-save", "--full-attention-decoding",
            "--prompt", "李慕", "--window-size", "6",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };

        let cfg: TrainConfig = args.into();
        assert!(!cfg.save);
        assert_eq!(cfg.attention, AttentionMode::Full);
        assert_eq!(cfg.prompts, vec!["李慕".to_string()]);
        assert_eq!(cfg.window_size, 6);
    }

    #[test]
    fn test_generate_requires_a_prompt() {
        assert!(Cli::try_parse_from(["charlm", "generate"]).is_err());
        assert!(Cli::try_parse_from(["charlm", "generate", "--name", "novel", "李慕"]).is_ok());
    }

    #[test]
    fn test_cluster_segmenter_flags() {
        use crate::application::cluster_use_case::ClusterConfig;
        use crate::data::segmenter::SegmenterKind;

        let cli = Cli::try_parse_from(["charlm", "cluster"]).unwrap();
        let Commands::Cluster(args) = cli.command else { panic!("expected cluster") };
        assert_eq!(ClusterConfig::from(&args).segmenter, SegmenterKind::Jieba);

        let cli = Cli::try_parse_from(["charlm", "cluster", "--dictionary-segmenter"]).unwrap();
        let Commands::Cluster(args) = cli.command else { panic!("expected cluster") };
        assert_eq!(ClusterConfig::from(&args).segmenter, SegmenterKind::Dictionary);

        assert!(Cli::try_parse_from([
            "charlm", "cluster", "--dictionary-segmenter", "--user-dict", "u.txt",
        ])
        .is_err());
    }

    #[test]
    fn test_export_encoder_defaults() {
        let cli = Cli::try_parse_from(["charlm", "export-encoder", "--name", "novel"]).unwrap();
        let Commands::ExportEncoder(args) = cli.command else { panic!("expected export-encoder") };
        assert_eq!(args.run.name, "novel");
        assert_eq!(args.out, "model/encoder");
    }

    #[test]
    fn test_cluster_report_layout() {
        let clusters = vec![
            RankedCluster::new(3, 0.25, vec!["股市 大涨".into(), "基金 大涨".into()]),
            RankedCluster::new(0, 1.5, vec!["球队 夺冠".into()]),
        ];
        let report = render_clusters(&clusters, 1);
        assert_eq!(
            report,
            "cluster 3 (mean distance: 0.2500, 2 sentences):\n股市大涨\n---------\n\
             cluster 0 (mean distance: 1.5000, 1 sentences):\n球队夺冠\n---------\n"
        );
    }
}
