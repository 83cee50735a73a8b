use serde::{Serialize, Deserialize};

use crate::loss::loss_type::LossType;
use crate::network::params::ParamSet;
use crate::network::spec::ArchitectureSpec;
use crate::optim::adam::AdamState;
use crate::schedule::scheduler::ScheduleState;
use crate::train::epoch_stats::{check_history, LossRecord};

/// What a run was started with. A resumed run rebuilds its networks from
/// `architecture` and reuses `seed` for its per-epoch randomness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub dataset_name: String,
    pub architecture: ArchitectureSpec,
    pub loss: LossType,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerStates {
    /// Synthesis network.
    pub generator: AdamState,
    pub mapping: AdamState,
    pub discriminator: AdamState,
}

/// Full training state at an epoch boundary. Written once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    /// Next epoch to run.
    pub epoch: usize,
    /// Batches trained so far; numbers the sample grids.
    #[serde(default)]
    pub iteration: u64,
    pub mapping: ParamSet,
    pub synthesis: ParamSet,
    pub discriminator: ParamSet,
    pub optimizers: OptimizerStates,
    pub loss_history: Vec<LossRecord>,
    pub schedule_state: ScheduleState,
    pub metadata: RunMetadata,
}

impl CheckpointSnapshot {
    /// Internal consistency only; compatibility with live networks is
    /// checked by the trainer on restore.
    pub fn validate(&self) -> Result<(), String> {
        if self.schedule_state.global_epoch != self.epoch {
            return Err(format!(
                "schedule is at epoch {} but the snapshot resumes at {}",
                self.schedule_state.global_epoch, self.epoch
            ));
        }
        if self.schedule_state.current_level >= self.metadata.architecture.num_levels {
            return Err(format!(
                "schedule level {} exceeds the {} levels of the saved architecture",
                self.schedule_state.current_level, self.metadata.architecture.num_levels
            ));
        }
        for (name, params, state) in [
            ("mapping", &self.mapping, &self.optimizers.mapping),
            ("synthesis", &self.synthesis, &self.optimizers.generator),
            ("discriminator", &self.discriminator, &self.optimizers.discriminator),
        ] {
            params.check_consistent().map_err(|e| format!("{}: {}", name, e))?;
            if state.m.len() != params.len() || state.v.len() != params.len() {
                return Err(format!(
                    "{} optimizer has {}/{} moment buffers for {} tensors",
                    name,
                    state.m.len(),
                    state.v.len(),
                    params.len()
                ));
            }
        }
        check_history(&self.loss_history, self.epoch)
    }
}
