use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use crate::checkpoint::manager::CheckpointManager;
use crate::data::source::{Batches, ImageSource};
use crate::error::{DataError, EvalError, TrainError};
use crate::eval::frechet::Evaluator;
use crate::eval::stats::ensure_reference_stats;
use crate::samples::{sample_file_name, save_grid};
use crate::train::epoch_stats::LossRecord;
use crate::train::train_config::TrainConfig;
use crate::train::trainer::{StepOutcome, Trainer};

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Runs epochs from the trainer's current schedule position up to
/// `config.num_epochs` and returns the records of the epochs it ran.
///
/// Per epoch: read the active level config, run one shuffled pass over
/// `source` at the level's resolution and batch size (alpha recomputed per
/// batch), evaluate, append a [`LossRecord`], advance the schedule, then
/// checkpoint if due.
///
/// # Errors
/// Data errors and checkpoint write failures abort the run. Evaluation
/// failures and non-finite losses are logged and do not.
pub fn train_loop<S: ImageSource + ?Sized>(
    trainer: &mut Trainer,
    source: &S,
    mut evaluator: Option<&mut dyn Evaluator>,
    checkpoints: &CheckpointManager,
    config: &TrainConfig,
) -> Result<Vec<LossRecord>, TrainError> {
    if source.is_empty() {
        return Err(DataError::NoImages.into());
    }

    let mut records = Vec::new();
    tracing::info!(
        start_epoch = trainer.schedule().global_epoch,
        num_epochs = config.num_epochs,
        images = source.len(),
        "starting training"
    );

    while trainer.schedule().global_epoch < config.num_epochs {
        let epoch = trainer.schedule().global_epoch;
        let state = trainer.schedule().clone();
        let active = trainer.begin_epoch();
        let t_start = Instant::now();

        // ── One full pass over the data ────────────────────────────────────
        let batches = Batches::shuffled(source, active.resolution, active.batch_size, trainer.rng_mut());
        let num_batches = batches.num_batches();
        let bar = epoch_bar(config, num_batches, epoch);

        let mut losses = EpochLosses::default();

        for (batch_idx, batch) in batches.enumerate() {
            let real = batch?;
            let alpha = state.batch_alpha(trainer.table(), batch_idx, num_batches);
            let outcome = trainer.train_step(&real, active.level, alpha);

            losses.add(&outcome);
            if outcome.skipped() {
                tracing::warn!(epoch, batch = batch_idx, "optimizer step skipped for non-finite loss");
            }

            if trainer.iteration() % config.image_interval as u64 == 0 {
                write_samples(trainer, config, active.level, epoch, alpha);
            }

            bar.inc(1);
            bar.set_message(format!(
                "d {:.4} g {:.4} W {:.4} α {:.3}",
                outcome.discriminator_loss, outcome.generator_loss, outcome.diagnostics.wasserstein, alpha
            ));
        }
        bar.finish_and_clear();

        let (train_loss, generator_loss) = losses.means();

        // ── Evaluation ────────────────────────────────────────────────────
        let eval_metric = match evaluator.as_deref_mut() {
            Some(ev) if config.evaluate => {
                match evaluate(trainer, source, ev, config, active.level, state.alpha) {
                    Ok(score) => Some(score),
                    Err(e) => {
                        tracing::warn!(epoch, error = %e, "evaluation unavailable");
                        None
                    }
                }
            }
            _ => None,
        };

        let record = LossRecord {
            epoch,
            train_loss,
            generator_loss,
            eval_metric,
            level: active.level,
            phase: active.phase,
            alpha: state.alpha,
            skipped_batches: losses.skipped_batches,
        };
        tracing::info!(
            epoch,
            level = active.level,
            phase = ?active.phase,
            alpha = state.alpha,
            d_loss = train_loss,
            g_loss = generator_loss,
            eval = ?eval_metric,
            elapsed_ms = t_start.elapsed().as_millis() as u64,
            "epoch complete"
        );

        // ── Record, advance, persist ──────────────────────────────────────
        trainer.finish_epoch(record.clone());
        if config.should_save(epoch) {
            checkpoints.save(&trainer.snapshot())?;
        }

        if let Some(ref tx) = config.progress_tx {
            let _ = tx.send(record.clone());
        }
        records.push(record);
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Running loss sums for one epoch. Each network's mean covers only the
/// batches where that network actually stepped.
#[derive(Debug, Default)]
struct EpochLosses {
    d_total: f64,
    d_count: usize,
    g_total: f64,
    g_count: usize,
    skipped_batches: usize,
}

impl EpochLosses {
    fn add(&mut self, outcome: &StepOutcome) {
        if !outcome.discriminator_skipped {
            self.d_total += outcome.discriminator_loss;
            self.d_count += 1;
        }
        if !outcome.generator_skipped {
            self.g_total += outcome.generator_loss;
            self.g_count += 1;
        }
        if outcome.skipped() {
            self.skipped_batches += 1;
        }
    }

    /// `(discriminator, generator)`; NaN for a network that never stepped.
    fn means(&self) -> (f64, f64) {
        let mean = |total: f64, count: usize| if count > 0 { total / count as f64 } else { f64::NAN };
        (mean(self.d_total, self.d_count), mean(self.g_total, self.g_count))
    }
}

fn epoch_bar(config: &TrainConfig, num_batches: usize, epoch: usize) -> ProgressBar {
    if !config.show_progress {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(num_batches as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.set_prefix(format!("epoch {}", epoch));
    bar
}

/// Sample grids are monitoring output; a failed write is only logged.
fn write_samples(trainer: &Trainer, config: &TrainConfig, level: usize, epoch: usize, alpha: f64) {
    let arch = &trainer.metadata().architecture;
    let images = trainer.sample_grid(level, alpha);
    let name = sample_file_name(trainer.iteration() as usize, level, epoch, alpha);
    let path = config.image_dir.join(name);
    match save_grid(&images, arch.channels, arch.resolution(level), &path) {
        Ok(()) => tracing::debug!(path = %path.display(), "wrote sample grid"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to write sample grid"),
    }
}

fn evaluate<S: ImageSource + ?Sized>(
    trainer: &mut Trainer,
    source: &S,
    evaluator: &mut dyn Evaluator,
    config: &TrainConfig,
    level: usize,
    alpha: f64,
) -> Result<f64, EvalError> {
    let resolution = trainer.table().resolution(level);
    let stats = ensure_reference_stats(source, &config.dataset, resolution, &config.stats_dir)?;
    let samples = trainer.generate(config.fid_samples, level, alpha);
    evaluator.score(&samples, &stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::wgan::CriticDiagnostics;

    fn outcome(d: f64, g: f64, d_skipped: bool, g_skipped: bool) -> StepOutcome {
        StepOutcome {
            discriminator_loss: d,
            generator_loss: g,
            diagnostics: CriticDiagnostics {
                real_score: 0.0,
                fake_score: 0.0,
                wasserstein: 0.0,
                gradient_penalty: None,
            },
            discriminator_skipped: d_skipped,
            generator_skipped: g_skipped,
        }
    }

    #[test]
    fn generator_skip_keeps_the_discriminator_loss() {
        let mut losses = EpochLosses::default();
        losses.add(&outcome(1.0, 2.0, false, false));
        losses.add(&outcome(3.0, f64::NAN, false, true));
        let (d, g) = losses.means();
        assert_eq!(d, 2.0);
        assert_eq!(g, 2.0);
        assert_eq!(losses.skipped_batches, 1);
    }

    #[test]
    fn network_that_never_stepped_has_nan_mean() {
        let mut losses = EpochLosses::default();
        losses.add(&outcome(f64::NAN, -1.0, true, false));
        let (d, g) = losses.means();
        assert!(d.is_nan());
        assert_eq!(g, -1.0);
        assert_eq!(losses.skipped_batches, 1);
    }
}
