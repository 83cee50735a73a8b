use std::path::PathBuf;

use serde::{Serialize, Deserialize};

use crate::error::ConfigError;
use crate::loss::loss_type::LossType;
use crate::network::spec::ArchitectureSpec;
use crate::schedule::level_config::{LevelConfig, ScheduleTable};

/// One row of the `[[levels]]` table. Missing batch sizes fall back to the
/// global `batch_size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelEntry {
    pub level: usize,
    #[serde(alias = "transition")]
    pub transition_epochs: usize,
    #[serde(alias = "training")]
    pub stabilization_epochs: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lr_scale_transition: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lr_scale_stabilization: Option<f64>,
}

impl LevelEntry {
    pub fn new(level: usize, transition_epochs: usize, stabilization_epochs: usize) -> LevelEntry {
        LevelEntry {
            level,
            transition_epochs,
            stabilization_epochs,
            batch_size: None,
            lr_scale_transition: None,
            lr_scale_stabilization: None,
        }
    }
}

/// Everything a training run needs to know before its first epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleGanConfig {
    pub dataset: String,
    /// Image folder; `data/{dataset}` when unset.
    pub data_dir: Option<PathBuf>,
    pub output_dir: PathBuf,

    pub dlr: f64,
    pub glr: f64,
    pub mlr: f64,
    pub loss: LossType,
    pub gp_coefficient: f64,

    pub latent_dim: usize,
    pub w_dim: usize,
    pub style_layers: usize,
    pub hidden_dim: usize,
    pub channels: usize,
    pub base_resolution: usize,

    pub batch_size: usize,
    pub save_interval: usize,
    pub image_interval: usize,
    /// Total epochs; the sum of the level table when unset.
    pub num_epochs: Option<usize>,
    /// Generated images per evaluation; `2048 + batch_size` when unset.
    pub fid_samples: Option<usize>,
    pub evaluate: bool,
    /// Number of fixed latents rendered into every sample grid.
    pub grid_samples: usize,
    pub seed: u64,

    pub levels: Vec<LevelEntry>,
}

impl Default for StyleGanConfig {
    fn default() -> Self {
        StyleGanConfig {
            dataset: "ffhq_raw".to_string(),
            data_dir: None,
            output_dir: PathBuf::from("outputs"),
            dlr: 5e-4,
            glr: 1e-3,
            mlr: 1e-5,
            loss: LossType::WganGp,
            gp_coefficient: 10.0,
            latent_dim: 256,
            w_dim: 256,
            style_layers: 8,
            hidden_dim: 256,
            channels: 3,
            base_resolution: 4,
            batch_size: 16,
            save_interval: 1,
            image_interval: 100,
            num_epochs: None,
            fid_samples: None,
            evaluate: true,
            grid_samples: 16,
            seed: 0,
            levels: vec![
                LevelEntry::new(0, 0, 4),
                LevelEntry::new(1, 3, 5),
                LevelEntry::new(2, 5, 10),
                LevelEntry::new(3, 15, 15),
                LevelEntry::new(4, 30, 20),
                LevelEntry::new(5, 30, 50),
            ],
        }
    }
}

impl StyleGanConfig {
    /// Checks every global value, then builds the level table.
    pub fn validate(&self) -> Result<ScheduleTable, ConfigError> {
        for (name, value) in [("dlr", self.dlr), ("glr", self.glr), ("mlr", self.mlr)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidLearningRate { name, value });
            }
        }
        if !(self.gp_coefficient.is_finite() && self.gp_coefficient >= 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "gp_coefficient",
                value: self.gp_coefficient.to_string(),
            });
        }
        let positive = [
            ("latent_dim", self.latent_dim),
            ("w_dim", self.w_dim),
            ("hidden_dim", self.hidden_dim),
            ("channels", self.channels),
            ("base_resolution", self.base_resolution),
            ("batch_size", self.batch_size),
            ("save_interval", self.save_interval),
            ("image_interval", self.image_interval),
            ("grid_samples", self.grid_samples),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue { name, value: "0".into() });
            }
        }
        if self.channels != 1 && self.channels != 3 {
            return Err(ConfigError::UnsupportedChannels(self.channels));
        }
        if self.num_epochs == Some(0) {
            return Err(ConfigError::InvalidValue { name: "num_epochs", value: "0".into() });
        }
        if self.dataset.trim().is_empty() {
            return Err(ConfigError::InvalidValue { name: "dataset", value: "\"\"".into() });
        }
        self.schedule_table()
    }

    pub fn schedule_table(&self) -> Result<ScheduleTable, ConfigError> {
        let levels = self
            .levels
            .iter()
            .map(|e| LevelConfig {
                level: e.level,
                transition_epochs: e.transition_epochs,
                stabilization_epochs: e.stabilization_epochs,
                batch_size: e.batch_size.unwrap_or(self.batch_size),
                lr_scale_transition: e.lr_scale_transition.unwrap_or(1.0),
                lr_scale_stabilization: e.lr_scale_stabilization.unwrap_or(1.0),
            })
            .collect();
        ScheduleTable::new(levels, self.base_resolution)
    }

    pub fn architecture(&self) -> ArchitectureSpec {
        ArchitectureSpec {
            latent_dim: self.latent_dim,
            w_dim: self.w_dim,
            style_layers: self.style_layers,
            hidden_dim: self.hidden_dim,
            channels: self.channels,
            base_resolution: self.base_resolution,
            num_levels: self.levels.len(),
        }
    }

    pub fn num_epochs(&self, table: &ScheduleTable) -> usize {
        self.num_epochs.unwrap_or_else(|| table.total_epochs())
    }

    pub fn fid_samples(&self) -> usize {
        self.fid_samples.unwrap_or(2048 + self.batch_size)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("data").join(&self.dataset))
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.output_dir.join(format!("StyleGAN_checkpoints_{}", self.dataset))
    }

    pub fn image_dir(&self) -> PathBuf {
        self.output_dir.join(format!("StyleGAN_images_{}", self.dataset))
    }

    pub fn stats_dir(&self) -> PathBuf {
        self.output_dir.join("fid_statistics")
    }
}
