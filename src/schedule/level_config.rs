use serde::{Serialize, Deserialize};

use crate::error::ConfigError;

fn unit_scale() -> f64 {
    1.0
}

/// Per-level schedule entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub level: usize,
    /// Epochs spent blending in this level (0 for level 0).
    pub transition_epochs: usize,
    /// Epochs spent training purely at this level.
    pub stabilization_epochs: usize,
    pub batch_size: usize,
    #[serde(default = "unit_scale")]
    pub lr_scale_transition: f64,
    #[serde(default = "unit_scale")]
    pub lr_scale_stabilization: f64,
}

impl LevelConfig {
    pub fn new(level: usize, transition_epochs: usize, stabilization_epochs: usize, batch_size: usize) -> LevelConfig {
        LevelConfig {
            level,
            transition_epochs,
            stabilization_epochs,
            batch_size,
            lr_scale_transition: 1.0,
            lr_scale_stabilization: 1.0,
        }
    }
}

/// Validated, immutable level table.
///
/// Levels are contiguous `0..L`, level 0 has no transition phase, batch
/// sizes and learning-rate scales are positive.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleTable {
    levels: Vec<LevelConfig>,
    base_resolution: usize,
}

impl ScheduleTable {
    pub fn new(mut levels: Vec<LevelConfig>, base_resolution: usize) -> Result<ScheduleTable, ConfigError> {
        if levels.is_empty() {
            return Err(ConfigError::EmptyLevelTable);
        }
        if base_resolution == 0 {
            return Err(ConfigError::InvalidValue { name: "base_resolution", value: "0".into() });
        }
        levels.sort_by_key(|l| l.level);

        for (expected, cfg) in levels.iter().enumerate() {
            if cfg.level != expected {
                return Err(ConfigError::NonContiguousLevels { expected, found: cfg.level });
            }
            if cfg.batch_size == 0 {
                return Err(ConfigError::InvalidBatchSize { level: cfg.level, batch_size: 0 });
            }
            for value in [cfg.lr_scale_transition, cfg.lr_scale_stabilization] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(ConfigError::InvalidLrScale { level: cfg.level, value });
                }
            }
        }
        if levels[0].transition_epochs != 0 {
            return Err(ConfigError::LevelZeroTransition(levels[0].transition_epochs));
        }

        Ok(ScheduleTable { levels, base_resolution })
    }

    pub fn get(&self, level: usize) -> &LevelConfig {
        &self.levels[level]
    }

    pub fn levels(&self) -> &[LevelConfig] {
        &self.levels
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn is_last(&self, level: usize) -> bool {
        level + 1 >= self.levels.len()
    }

    pub fn base_resolution(&self) -> usize {
        self.base_resolution
    }

    /// `base_resolution × 2^level`.
    pub fn resolution(&self, level: usize) -> usize {
        self.base_resolution << level
    }

    /// Epochs needed to walk through every phase of every level once.
    pub fn total_epochs(&self) -> usize {
        self.levels.iter().map(|l| l.transition_epochs + l.stabilization_epochs).sum()
    }
}
