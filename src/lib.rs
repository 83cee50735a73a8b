pub mod math;
pub mod autograd;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod schedule;
pub mod data;
pub mod eval;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod samples;
pub mod train;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use autograd::{Tape, Var};
pub use network::{Discriminator, Module, Progressive, StyleGenerator};
pub use loss::{LossEngine, LossType};
pub use optim::Adam;
pub use schedule::{advance, alpha_for, LevelConfig, Phase, ScheduleState, ScheduleTable};
pub use data::{ImageSource, InMemoryDataset};
pub use eval::{Evaluator, FrechetEvaluator};
pub use checkpoint::{CheckpointManager, CheckpointSnapshot};
pub use config::{ConfigOverrides, StyleGanConfig};
pub use error::{CheckpointError, ConfigError, DataError, EvalError, TrainError};
pub use train::{train_loop, LossRecord, TrainConfig, Trainer};
