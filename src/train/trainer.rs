use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::autograd::{Tape, Var};
use crate::checkpoint::snapshot::{CheckpointSnapshot, OptimizerStates, RunMetadata};
use crate::config::settings::StyleGanConfig;
use crate::error::CheckpointError;
use crate::loss::wgan::{CriticDiagnostics, LossEngine};
use crate::math::matrix::Matrix;
use crate::network::discriminator::Discriminator;
use crate::network::generator::StyleGenerator;
use crate::network::network::Module;
use crate::network::spec::ArchitectureSpec;
use crate::optim::adam::Adam;
use crate::schedule::level_config::ScheduleTable;
use crate::schedule::scheduler::{advance, ActiveConfig, ScheduleState};
use crate::train::epoch_stats::LossRecord;

/// Losses from one discriminator step followed by one generator step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub discriminator_loss: f64,
    pub generator_loss: f64,
    pub diagnostics: CriticDiagnostics,
    pub discriminator_skipped: bool,
    pub generator_skipped: bool,
}

impl StepOutcome {
    pub fn skipped(&self) -> bool {
        self.discriminator_skipped || self.generator_skipped
    }
}

/// Networks, optimizers and schedule of one training run.
///
/// Parameters change only inside [`Trainer::train_step`] and
/// [`Trainer::restore`]; the schedule only inside [`Trainer::finish_epoch`]
/// and [`Trainer::restore`].
pub struct Trainer {
    generator: StyleGenerator,
    discriminator: Discriminator,
    synthesis_opt: Adam,
    mapping_opt: Adam,
    discriminator_opt: Adam,
    engine: LossEngine,
    table: ScheduleTable,
    schedule: ScheduleState,
    history: Vec<LossRecord>,
    metadata: RunMetadata,
    iteration: u64,
    rng: StdRng,
    fixed_latents: Matrix,
}

impl Trainer {
    /// Fresh networks at epoch 0.
    pub fn new(config: &StyleGanConfig, table: ScheduleTable) -> Trainer {
        Trainer::build(config, table, config.architecture(), config.seed)
    }

    /// Networks shaped by the snapshot's architecture, then restored from it.
    pub fn from_snapshot(
        config: &StyleGanConfig,
        table: ScheduleTable,
        snapshot: CheckpointSnapshot,
    ) -> Result<Trainer, CheckpointError> {
        let arch = snapshot.metadata.architecture.clone();
        if arch.num_levels != table.num_levels() {
            return Err(CheckpointError::Incompatible(format!(
                "checkpoint has {} levels, level table has {}",
                arch.num_levels,
                table.num_levels()
            )));
        }
        let mut trainer = Trainer::build(config, table, arch, snapshot.metadata.seed);
        trainer.restore(snapshot)?;
        Ok(trainer)
    }

    fn build(config: &StyleGanConfig, table: ScheduleTable, arch: ArchitectureSpec, seed: u64) -> Trainer {
        let mut init_rng = StdRng::seed_from_u64(seed);
        let generator = StyleGenerator::new(&arch, &mut init_rng);
        let discriminator = Discriminator::new(&arch, &mut init_rng);
        let fixed_latents = Matrix::standard_normal(config.grid_samples, arch.latent_dim, &mut init_rng);

        let synthesis_opt = Adam::new(config.glr, generator.synthesis.params());
        let mapping_opt = Adam::new(config.mlr, generator.mapping.params());
        let discriminator_opt = Adam::new(config.dlr, discriminator.params());
        let schedule = ScheduleState::initial(&table);

        Trainer {
            generator,
            discriminator,
            synthesis_opt,
            mapping_opt,
            discriminator_opt,
            engine: LossEngine::new(config.loss, config.gp_coefficient),
            table,
            schedule,
            history: Vec::new(),
            metadata: RunMetadata {
                dataset_name: config.dataset.clone(),
                architecture: arch,
                loss: config.loss,
                seed,
            },
            iteration: 0,
            rng: StdRng::seed_from_u64(seed),
            fixed_latents,
        }
    }

    pub fn schedule(&self) -> &ScheduleState {
        &self.schedule
    }

    pub fn table(&self) -> &ScheduleTable {
        &self.table
    }

    pub fn history(&self) -> &[LossRecord] {
        &self.history
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn generator(&self) -> &StyleGenerator {
        &self.generator
    }

    pub fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Applies the epoch's learning-rate scale and reseeds the run's rng
    /// from `(seed, epoch)`, so a resumed epoch draws the same numbers as
    /// an uninterrupted one.
    pub fn begin_epoch(&mut self) -> ActiveConfig {
        let active = self.schedule.active(&self.table);
        self.synthesis_opt.set_lr_scale(active.lr_scale);
        self.mapping_opt.set_lr_scale(active.lr_scale);
        self.discriminator_opt.set_lr_scale(active.lr_scale);
        let epoch = self.schedule.global_epoch as u64;
        self.rng = StdRng::seed_from_u64(self.metadata.seed ^ epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        active
    }

    /// One critic update on `real` against detached fakes, then one
    /// generator update through the critic. A non-finite loss or gradient
    /// skips that network's optimizer step.
    pub fn train_step(&mut self, real: &Matrix, level: usize, alpha: f64) -> StepOutcome {
        let n = real.rows;
        let latent_dim = self.metadata.architecture.latent_dim;

        // Critic.
        let z = Matrix::standard_normal(n, latent_dim, &mut self.rng);
        let fake = self.generator.sample(&z, level, alpha);
        let mut tape = Tape::new();
        let dvars = self.discriminator.params().bind(&mut tape);
        let real_v = tape.leaf(real.clone());
        let fake_v = tape.leaf(fake);
        let (d_loss, diagnostics) = self.engine.discriminator_loss(
            &mut tape,
            &self.discriminator,
            &dvars,
            real_v,
            fake_v,
            level,
            alpha,
            &mut self.rng,
        );
        let discriminator_loss = tape.scalar(d_loss);
        let discriminator_skipped = match finite_grads(&mut tape, d_loss, &dvars) {
            Some(grads) => {
                self.discriminator_opt.step(self.discriminator.params_mut(), &grads);
                false
            }
            None => {
                tracing::warn!(loss = discriminator_loss, level, alpha, "non-finite discriminator loss, skipping step");
                true
            }
        };

        // Generator.
        let z = Matrix::standard_normal(n, latent_dim, &mut self.rng);
        let mut tape = Tape::new();
        let mvars = self.generator.mapping.params().bind(&mut tape);
        let svars = self.generator.synthesis.params().bind(&mut tape);
        let dvars = self.discriminator.params().bind(&mut tape);
        let z = tape.leaf(z);
        let fake = self.generator.generate(&mut tape, &mvars, &svars, z, level, alpha);
        let g_loss = self.engine.generator_loss(&mut tape, &self.discriminator, &dvars, fake, level, alpha);
        let generator_loss = tape.scalar(g_loss);
        let wrt: Vec<Var> = mvars.iter().chain(svars.iter()).copied().collect();
        let generator_skipped = match finite_grads(&mut tape, g_loss, &wrt) {
            Some(mut grads) => {
                let synthesis_grads = grads.split_off(mvars.len());
                self.mapping_opt.step(self.generator.mapping.params_mut(), &grads);
                self.synthesis_opt.step(self.generator.synthesis.params_mut(), &synthesis_grads);
                false
            }
            None => {
                tracing::warn!(loss = generator_loss, level, alpha, "non-finite generator loss, skipping step");
                true
            }
        };

        self.iteration += 1;
        StepOutcome {
            discriminator_loss,
            generator_loss,
            diagnostics,
            discriminator_skipped,
            generator_skipped,
        }
    }

    /// Records the finished epoch and moves the schedule on.
    pub fn finish_epoch(&mut self, record: LossRecord) {
        self.history.push(record);
        self.schedule = advance(&self.schedule, &self.table);
    }

    /// Images from the fixed latents, for sample grids.
    pub fn sample_grid(&self, level: usize, alpha: f64) -> Matrix {
        self.generator.sample(&self.fixed_latents, level, alpha)
    }

    /// `count` images from fresh latents, generated in chunks.
    pub fn generate(&mut self, count: usize, level: usize, alpha: f64) -> Matrix {
        const CHUNK: usize = 64;
        let latent_dim = self.metadata.architecture.latent_dim;
        let mut parts = Vec::with_capacity(count.div_ceil(CHUNK));
        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(CHUNK);
            let z = Matrix::standard_normal(n, latent_dim, &mut self.rng);
            parts.push(self.generator.sample(&z, level, alpha));
            remaining -= n;
        }
        if parts.is_empty() {
            let cols = self.metadata.architecture.image_size(level);
            return Matrix::zeros(0, cols);
        }
        Matrix::vstack(&parts)
    }

    pub fn snapshot(&self) -> CheckpointSnapshot {
        CheckpointSnapshot {
            epoch: self.schedule.global_epoch,
            iteration: self.iteration,
            mapping: self.generator.mapping.params().clone(),
            synthesis: self.generator.synthesis.params().clone(),
            discriminator: self.discriminator.params().clone(),
            optimizers: OptimizerStates {
                generator: self.synthesis_opt.state().clone(),
                mapping: self.mapping_opt.state().clone(),
                discriminator: self.discriminator_opt.state().clone(),
            },
            loss_history: self.history.clone(),
            schedule_state: self.schedule.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Replaces the whole training state with `snapshot`. Every part is
    /// checked first; on error nothing has been modified.
    pub fn restore(&mut self, snapshot: CheckpointSnapshot) -> Result<(), CheckpointError> {
        let incompatible = CheckpointError::Incompatible;
        snapshot.validate().map_err(incompatible)?;
        if snapshot.metadata.architecture != self.metadata.architecture {
            return Err(CheckpointError::Incompatible(format!(
                "architecture {:?} does not match {:?}",
                snapshot.metadata.architecture, self.metadata.architecture
            )));
        }
        self.generator
            .mapping
            .params()
            .check_compatible(&snapshot.mapping)
            .map_err(|e| incompatible(format!("mapping: {}", e)))?;
        self.generator
            .synthesis
            .params()
            .check_compatible(&snapshot.synthesis)
            .map_err(|e| incompatible(format!("synthesis: {}", e)))?;
        self.discriminator
            .params()
            .check_compatible(&snapshot.discriminator)
            .map_err(|e| incompatible(format!("discriminator: {}", e)))?;
        self.mapping_opt
            .check_state(&snapshot.optimizers.mapping)
            .map_err(|e| incompatible(format!("mapping optimizer: {}", e)))?;
        self.synthesis_opt
            .check_state(&snapshot.optimizers.generator)
            .map_err(|e| incompatible(format!("generator optimizer: {}", e)))?;
        self.discriminator_opt
            .check_state(&snapshot.optimizers.discriminator)
            .map_err(|e| incompatible(format!("discriminator optimizer: {}", e)))?;
        snapshot
            .schedule_state
            .validate(&self.table)
            .map_err(|e| incompatible(format!("schedule: {}", e)))?;

        let CheckpointSnapshot {
            iteration,
            mapping,
            synthesis,
            discriminator,
            optimizers,
            loss_history,
            schedule_state,
            metadata,
            ..
        } = snapshot;

        *self.generator.mapping.params_mut() = mapping;
        *self.generator.synthesis.params_mut() = synthesis;
        *self.discriminator.params_mut() = discriminator;
        self.mapping_opt.load_state(optimizers.mapping).map_err(incompatible)?;
        self.synthesis_opt.load_state(optimizers.generator).map_err(incompatible)?;
        self.discriminator_opt.load_state(optimizers.discriminator).map_err(incompatible)?;
        self.history = loss_history;
        self.schedule = schedule_state;
        self.iteration = iteration;
        self.metadata.dataset_name = metadata.dataset_name;
        self.metadata.seed = metadata.seed;
        Ok(())
    }
}

/// Gradients of `loss` as plain matrices, or `None` if the loss or any
/// gradient is not finite.
fn finite_grads(tape: &mut Tape, loss: Var, wrt: &[Var]) -> Option<Vec<Matrix>> {
    if !tape.scalar(loss).is_finite() {
        return None;
    }
    let grads: Vec<Matrix> = tape
        .grad(loss, wrt)
        .into_iter()
        .map(|g| tape.value(g).clone())
        .collect();
    grads.iter().all(Matrix::is_finite).then_some(grads)
}
