//! Error types for configuration, checkpoints, data and evaluation.

use std::path::PathBuf;

/// Invalid or missing configuration. Always raised before the first epoch.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("level table is empty")]
    EmptyLevelTable,

    #[error("level table is not contiguous: expected level {expected}, found {found}")]
    NonContiguousLevels { expected: usize, found: usize },

    #[error("level 0 cannot have a transition phase (found {0} transition epochs)")]
    LevelZeroTransition(usize),

    #[error("invalid batch size {batch_size} for level {level} (must be > 0)")]
    InvalidBatchSize { level: usize, batch_size: usize },

    #[error("invalid learning-rate scale {value} for level {level} (must be > 0)")]
    InvalidLrScale { level: usize, value: f64 },

    #[error("invalid learning rate {name} = {value} (must be > 0)")]
    InvalidLearningRate { name: &'static str, value: f64 },

    #[error("invalid {name}: {value} (must be > 0)")]
    InvalidValue { name: &'static str, value: String },

    #[error("unsupported channel count {0} (must be 1 or 3)")]
    UnsupportedChannels(usize),

    #[error("unknown loss type '{0}' (must be one of: wgan-gp, wgan)")]
    UnknownLossType(String),

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failure to persist or restore training state.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("no checkpoint for epoch {epoch} in {}; available epochs: {available:?}", dir.display())]
    NoMatchingEpoch {
        epoch: usize,
        dir: PathBuf,
        available: Vec<usize>,
    },

    #[error("corrupt checkpoint {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("checkpoint I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint does not match the configured model: {0}")]
    Incompatible(String),
}

/// Failure to load the training images.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no images found in {}", .0.display())]
    Empty(PathBuf),

    #[error("image source is empty")]
    NoImages,

    #[error("resolution {requested} is not reachable from stored resolution {stored} by 2x pooling")]
    InvalidResolution { requested: usize, stored: usize },
}

/// Failure of a periodic evaluation. Never fatal to training.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("evaluation needs at least {required} samples, got {found}")]
    InsufficientSamples { required: usize, found: usize },

    #[error("reference statistics {} are unreadable: {reason}", path.display())]
    Stats { path: PathBuf, reason: String },

    #[error("sample dimension {found} does not match reference statistics dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("failed to write reference statistics {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Any fatal error raised by a training run.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Data(#[from] DataError),
}
