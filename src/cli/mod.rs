// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and hands a plain config
// to the matching use case in Layer 2.
//
//   ranker-train cross-encoder --train_set train.tsv ...
//   ranker-train dual-encoder  --train_set_file triplets.tsv ...
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::Commands;

use crate::application::{
    train_cross_encoder::CrossEncoderUseCase,
    train_dual_encoder::DualEncoderUseCase,
    TrainReport,
};

#[derive(Parser, Debug)]
#[command(
    name = "ranker-train",
    version,
    about = "Fine-tune cross-encoder rankers and dual-encoder retrievers on a pretrained transformer."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let report = match self.command {
            Commands::CrossEncoder(args) => {
                tracing::info!("Training cross-encoder on '{}'", args.train_set.display());
                CrossEncoderUseCase::new(args.into()).execute()?
            }
            Commands::DualEncoder(args) => {
                tracing::info!("Training dual-encoder on '{}'", args.train_set_file.display());
                DualEncoderUseCase::new(args.into()).execute()?
            }
        };
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &TrainReport) {
    println!(
        "Training complete: {} steps, avg_loss={:.5}, accuracy={:.2}%",
        report.global_step,
        report.avg_loss,
        report.accuracy * 100.0
    );
    if let Some(dir) = &report.final_checkpoint {
        println!("Final checkpoint: {}", dir.display());
    }
}
