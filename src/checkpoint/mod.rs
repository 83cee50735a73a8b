pub mod manager;
pub mod snapshot;

pub use manager::{CheckpointEntry, CheckpointManager};
pub use snapshot::{CheckpointSnapshot, OptimizerStates, RunMetadata};
