// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `cross-encoder` and
// `dual-encoder`, and all their flags. Flag names keep the
// snake_case spelling of the existing training scripts
// (--train_set, --max_seq_length, ...), so every flag spells
// out its `long` name.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{builder::BoolishValueParser, ArgAction, Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::{
    train_cross_encoder::CrossEncoderTrainConfig,
    train_dual_encoder::DualEncoderTrainConfig,
    DeviceKind,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune a pairwise relevance classifier on text_a \t text_b \t label
    #[command(name = "cross-encoder")]
    CrossEncoder(CrossEncoderArgs),

    /// Fine-tune a two-tower retriever on query \t pos_title \t neg_title
    #[command(name = "dual-encoder")]
    DualEncoder(DualEncoderArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceArg {
    Cpu,
    Gpu,
}

/// Convert the clap value into the application-layer type, so the
/// application layer never sees clap types.
impl From<DeviceArg> for DeviceKind {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cpu => DeviceKind::Cpu,
            DeviceArg::Gpu => DeviceKind::Gpu,
        }
    }
}

/// Flags both subcommands accept.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Directory where checkpoints (model_<step>/) and metrics.csv are written
    #[arg(long = "save_dir", default_value = "./checkpoint")]
    pub save_dir: PathBuf,

    /// Directory with tokenizer.json, config.json and optionally model_state.mpk
    #[arg(long = "pretrained_dir", default_value = "./pretrained")]
    pub pretrained_dir: PathBuf,

    /// Examples per batch on each worker
    #[arg(long = "batch_size", default_value_t = 32)]
    pub batch_size: usize,

    /// AdamW weight decay, not applied to biases and norm parameters
    #[arg(long = "weight_decay", default_value_t = 0.0)]
    pub weight_decay: f64,

    /// Fraction of all steps used for linear warmup
    #[arg(long = "warmup_proportion", default_value_t = 0.0)]
    pub warmup_proportion: f64,

    /// Log every this many steps
    #[arg(long = "logging_steps", default_value_t = 10)]
    pub logging_steps: usize,

    /// Parameters to start from instead of the pretrained weights
    #[arg(long = "init_from_ckpt")]
    pub init_from_ckpt: Option<PathBuf>,

    /// Random seed for initialisation and shuffling
    #[arg(long = "seed", default_value_t = 1000)]
    pub seed: u64,

    #[arg(long = "device", value_enum, default_value = "gpu")]
    pub device: DeviceArg,

    /// Request mixed-precision training; accepts a bare flag or a value
    /// such as `--use_amp True`
    #[arg(
        long = "use_amp",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub use_amp: bool,

    /// Initial loss scale for mixed precision
    #[arg(long = "scale_loss", default_value_t = 32768.0)]
    pub scale_loss: f64,
}

#[derive(Args, Debug)]
pub struct CrossEncoderArgs {
    /// Tab-separated training file: text_a, text_b, label (0 or 1)
    #[arg(long = "train_set")]
    pub train_set: PathBuf,

    /// Maximum tokens of [CLS] text_a [SEP] text_b [SEP]
    #[arg(long = "max_seq_length", default_value_t = 128)]
    pub max_seq_length: usize,

    #[arg(long = "learning_rate", default_value_t = 5e-5)]
    pub learning_rate: f64,

    #[arg(long = "epochs", default_value_t = 3)]
    pub epochs: usize,

    /// Save a checkpoint every this many steps
    #[arg(long = "save_steps", default_value_t = 100)]
    pub save_steps: usize,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl From<CrossEncoderArgs> for CrossEncoderTrainConfig {
    fn from(a: CrossEncoderArgs) -> Self {
        let c = a.common;
        CrossEncoderTrainConfig {
            train_set:         a.train_set,
            save_dir:          c.save_dir,
            pretrained_dir:    c.pretrained_dir,
            max_seq_length:    a.max_seq_length,
            batch_size:        c.batch_size,
            learning_rate:     a.learning_rate,
            weight_decay:      c.weight_decay,
            epochs:            a.epochs,
            warmup_proportion: c.warmup_proportion,
            save_steps:        a.save_steps,
            logging_steps:     c.logging_steps,
            init_from_ckpt:    c.init_from_ckpt,
            seed:              c.seed,
            device:            c.device.into(),
            use_amp:           c.use_amp,
            scale_loss:        c.scale_loss,
        }
    }
}

#[derive(Args, Debug)]
pub struct DualEncoderArgs {
    /// Tab-separated training file: query, positive title, negative title
    #[arg(long = "train_set_file")]
    pub train_set_file: PathBuf,

    #[arg(long = "query_max_seq_length", default_value_t = 32)]
    pub query_max_seq_length: usize,

    #[arg(long = "title_max_seq_length", default_value_t = 128)]
    pub title_max_seq_length: usize,

    /// Project pooled embeddings to this size
    #[arg(long = "output_emb_size")]
    pub output_emb_size: Option<usize>,

    /// Separate pretrained directory for the title tower; shares the
    /// query tower when omitted
    #[arg(long = "title_pretrained_dir")]
    pub title_pretrained_dir: Option<PathBuf>,

    #[arg(long = "learning_rate", default_value_t = 3e-5)]
    pub learning_rate: f64,

    #[arg(long = "epochs", default_value_t = 10)]
    pub epochs: usize,

    #[arg(long = "save_steps", default_value_t = 10000)]
    pub save_steps: usize,

    /// Score each query against the titles of every worker
    #[arg(long = "use_cross_batch")]
    pub use_cross_batch: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl From<DualEncoderArgs> for DualEncoderTrainConfig {
    fn from(a: DualEncoderArgs) -> Self {
        let c = a.common;
        DualEncoderTrainConfig {
            train_set_file:       a.train_set_file,
            save_dir:             c.save_dir,
            pretrained_dir:       c.pretrained_dir,
            title_pretrained_dir: a.title_pretrained_dir,
            query_max_seq_length: a.query_max_seq_length,
            title_max_seq_length: a.title_max_seq_length,
            output_emb_size:      a.output_emb_size,
            batch_size:           c.batch_size,
            learning_rate:        a.learning_rate,
            weight_decay:         c.weight_decay,
            epochs:               a.epochs,
            warmup_proportion:    c.warmup_proportion,
            save_steps:           a.save_steps,
            logging_steps:        c.logging_steps,
            init_from_ckpt:       c.init_from_ckpt,
            seed:                 c.seed,
            device:               c.device.into(),
            use_amp:              c.use_amp,
            scale_loss:           c.scale_loss,
            use_cross_batch:      a.use_cross_batch,
        }
    }
}
