use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::prelude::*;

use ferrite_stylegan::checkpoint::CheckpointManager;
use ferrite_stylegan::config::{load_config, ConfigOverrides, ResumeTarget, StyleGanConfig};
use ferrite_stylegan::data::{ImageSource, InMemoryDataset};
use ferrite_stylegan::eval::{ensure_reference_stats, FrechetEvaluator};
use ferrite_stylegan::loss::LossType;
use ferrite_stylegan::train::{train_loop, TrainConfig, Trainer};

#[derive(Parser, Debug)]
#[command(name = "ferrite-stylegan")]
#[command(about = "Progressive-growing StyleGAN trainer", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train, or resume training from a checkpoint
    Train(TrainArgs),
    /// List the checkpoints saved for a dataset
    Checkpoints(CommonArgs),
    /// Compute reference statistics for every level of a dataset
    Stats(CommonArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    dataset: Option<String>,

    /// Image folder (default: data/<dataset>)
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Root for checkpoints, sample grids and statistics
    #[arg(long = "output-dir")]
    output_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[arg(long = "latent-dim")]
    latent_dim: Option<usize>,

    /// Discriminator learning rate
    #[arg(long)]
    dlr: Option<f64>,

    /// Synthesis network learning rate
    #[arg(long)]
    glr: Option<f64>,

    /// Mapping network learning rate
    #[arg(long)]
    mlr: Option<f64>,

    /// wgan-gp or wgan
    #[arg(long)]
    loss: Option<LossType>,

    /// Batch size for every level
    #[arg(long = "batch-size")]
    batch_size: Option<usize>,

    #[arg(long = "save-interval")]
    save_interval: Option<usize>,

    /// Batches between sample grids
    #[arg(long = "image-interval")]
    image_interval: Option<usize>,

    #[arg(long = "num-epochs")]
    num_epochs: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Skip the per-epoch Fréchet evaluation
    #[arg(long = "no-eval")]
    no_eval: bool,

    /// Hide the per-epoch progress bar
    #[arg(long = "no-progress")]
    no_progress: bool,

    /// Resume from this checkpoint file
    #[arg(long, conflicts_with_all = ["resume_epoch", "resume_latest"])]
    resume: Option<PathBuf>,

    /// Resume from the checkpoint saved for this epoch
    #[arg(long = "resume-epoch", conflicts_with = "resume_latest")]
    resume_epoch: Option<usize>,

    /// Resume from the newest checkpoint, if any
    #[arg(long = "resume-latest")]
    resume_latest: bool,
}

impl CommonArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            dataset: self.dataset.clone(),
            data_dir: self.data_dir.clone(),
            output_dir: self.output_dir.clone(),
            ..ConfigOverrides::default()
        }
    }
}

impl TrainArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            latent_dim: self.latent_dim,
            dlr: self.dlr,
            glr: self.glr,
            mlr: self.mlr,
            loss: self.loss,
            batch_size: self.batch_size,
            save_interval: self.save_interval,
            image_interval: self.image_interval,
            num_epochs: self.num_epochs,
            seed: self.seed,
            evaluate: self.no_eval.then_some(false),
            resume: self.resume.clone(),
            resume_epoch: self.resume_epoch,
            ..self.common.overrides()
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Train(args) => run_train(args),
        Command::Checkpoints(args) => run_checkpoints(args),
        Command::Stats(args) => run_stats(args),
    }
}

/// `RUST_LOG` wins; `info` otherwise.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn resolve_config(config: &Option<PathBuf>, overrides: &ConfigOverrides) -> Result<StyleGanConfig> {
    let mut cfg = match config {
        Some(path) => load_config(path)?,
        None => StyleGanConfig::default(),
    };
    overrides.apply(&mut cfg);
    Ok(cfg)
}

fn run_train(args: TrainArgs) -> Result<()> {
    let overrides = args.overrides();
    let config = resolve_config(&args.common.config, &overrides)?;
    let table = config.validate().context("invalid configuration")?;
    let manager = CheckpointManager::new(config.checkpoint_dir());

    let resume_path = match overrides.resume_target(args.resume_latest) {
        ResumeTarget::Fresh => None,
        ResumeTarget::Path(path) => Some(path),
        ResumeTarget::Epoch(epoch) => Some(manager.find(epoch)?),
        ResumeTarget::Latest => {
            let latest = manager.latest()?;
            if latest.is_none() {
                tracing::info!(dir = %manager.dir().display(), "no checkpoint to resume, starting fresh");
            }
            latest
        }
    };

    let mut train_cfg = TrainConfig::from_config(&config, &table);
    train_cfg.show_progress = !args.no_progress;

    let mut trainer = match resume_path {
        Some(path) => {
            let snapshot = CheckpointManager::load(&path)?;
            tracing::info!(path = %path.display(), epoch = snapshot.epoch, "resuming");
            Trainer::from_snapshot(&config, table, snapshot)?
        }
        None => Trainer::new(&config, table),
    };

    let arch = trainer.metadata().architecture.clone();
    let data_dir = config.data_dir();
    let dataset = InMemoryDataset::from_folder(&data_dir, arch.max_resolution())
        .with_context(|| format!("failed to load dataset from {}", data_dir.display()))?;
    if dataset.channels() != arch.channels {
        bail!(
            "dataset has {} channels but the model expects {}",
            dataset.channels(),
            arch.channels
        );
    }

    let mut evaluator = FrechetEvaluator::new(train_cfg.fid_samples);
    let records = train_loop(&mut trainer, &dataset, Some(&mut evaluator), &manager, &train_cfg)?;
    tracing::info!(
        epochs = records.len(),
        final_epoch = trainer.schedule().global_epoch,
        "training finished"
    );
    Ok(())
}

fn run_checkpoints(args: CommonArgs) -> Result<()> {
    let config = resolve_config(&args.config, &args.overrides())?;
    let manager = CheckpointManager::new(config.checkpoint_dir());
    let entries = manager.list()?;
    if entries.is_empty() {
        println!("No checkpoints in {}", manager.dir().display());
        return Ok(());
    }
    println!("Available checkpoints in {}:", manager.dir().display());
    for entry in entries {
        println!("- Epoch {} (level {}): {}", entry.epoch, entry.level, entry.path.display());
    }
    Ok(())
}

fn run_stats(args: CommonArgs) -> Result<()> {
    let config = resolve_config(&args.config, &args.overrides())?;
    let table = config.validate().context("invalid configuration")?;
    let data_dir = config.data_dir();
    let max_res = table.resolution(table.num_levels() - 1);
    let dataset = InMemoryDataset::from_folder(&data_dir, max_res)
        .with_context(|| format!("failed to load dataset from {}", data_dir.display()))?;
    for level in 0..table.num_levels() {
        let path = ensure_reference_stats(&dataset, &config.dataset, table.resolution(level), &config.stats_dir())?;
        println!("level {} ({}x{}): {}", level, table.resolution(level), table.resolution(level), path.display());
    }
    Ok(())
}
