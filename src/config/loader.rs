use std::fs;
use std::path::{Path, PathBuf};

use crate::config::settings::StyleGanConfig;
use crate::error::ConfigError;
use crate::loss::loss_type::LossType;

/// Reads a TOML file. Keys left out keep their defaults.
pub fn load_config(path: &Path) -> Result<StyleGanConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    parse_config(&contents).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

pub fn parse_config(contents: &str) -> Result<StyleGanConfig, toml::de::Error> {
    toml::from_str(contents)
}

/// Command-line values that win over the file. `None` leaves a key alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub dataset: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub latent_dim: Option<usize>,
    pub dlr: Option<f64>,
    pub glr: Option<f64>,
    pub mlr: Option<f64>,
    pub loss: Option<LossType>,
    /// Replaces the global batch size and every per-level one.
    pub batch_size: Option<usize>,
    pub save_interval: Option<usize>,
    pub image_interval: Option<usize>,
    pub num_epochs: Option<usize>,
    pub seed: Option<u64>,
    pub evaluate: Option<bool>,
    pub resume: Option<PathBuf>,
    pub resume_epoch: Option<usize>,
}

/// Where a resumed run comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeTarget {
    Fresh,
    Path(PathBuf),
    Epoch(usize),
    Latest,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut StyleGanConfig) {
        if let Some(dataset) = &self.dataset {
            config.dataset = dataset.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(v) = self.latent_dim {
            config.latent_dim = v;
        }
        if let Some(v) = self.dlr {
            config.dlr = v;
        }
        if let Some(v) = self.glr {
            config.glr = v;
        }
        if let Some(v) = self.mlr {
            config.mlr = v;
        }
        if let Some(v) = self.loss {
            config.loss = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
            for level in &mut config.levels {
                level.batch_size = None;
            }
        }
        if let Some(v) = self.save_interval {
            config.save_interval = v;
        }
        if let Some(v) = self.image_interval {
            config.image_interval = v;
        }
        if let Some(v) = self.num_epochs {
            config.num_epochs = Some(v);
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.evaluate {
            config.evaluate = v;
        }
    }

    /// An explicit path wins over an epoch.
    pub fn resume_target(&self, latest: bool) -> ResumeTarget {
        match (&self.resume, self.resume_epoch) {
            (Some(path), _) => ResumeTarget::Path(path.clone()),
            (None, Some(epoch)) => ResumeTarget::Epoch(epoch),
            (None, None) if latest => ResumeTarget::Latest,
            (None, None) => ResumeTarget::Fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file_with_level_aliases() {
        let cfg = parse_config(
            r#"
            dataset = "celeba"
            glr = 0.002
            loss = "wgan"

            [[levels]]
            level = 0
            transition = 0
            training = 2

            [[levels]]
            level = 1
            transition = 2
            training = 3
            batch_size = 8
            lr_scale_transition = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.dataset, "celeba");
        assert_eq!(cfg.glr, 0.002);
        assert_eq!(cfg.dlr, 5e-4);
        assert_eq!(cfg.loss, LossType::Wgan);
        let table = cfg.validate().unwrap();
        assert_eq!(table.num_levels(), 2);
        assert_eq!(table.get(1).batch_size, 8);
        assert_eq!(table.get(1).lr_scale_transition, 0.5);
        assert_eq!(table.total_epochs(), 7);
    }

    #[test]
    fn non_contiguous_levels_fail_validation() {
        let cfg = parse_config(
            r#"
            [[levels]]
            level = 0
            transition_epochs = 0
            stabilization_epochs = 2

            [[levels]]
            level = 2
            transition_epochs = 1
            stabilization_epochs = 1
            "#,
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::NonContiguousLevels { .. })));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut cfg = StyleGanConfig::default();
        cfg.levels[2].batch_size = Some(4);
        let overrides = ConfigOverrides {
            dataset: Some("toy".into()),
            batch_size: Some(32),
            dlr: Some(1e-4),
            ..ConfigOverrides::default()
        };
        overrides.apply(&mut cfg);
        assert_eq!(cfg.dataset, "toy");
        assert_eq!(cfg.dlr, 1e-4);
        let table = cfg.validate().unwrap();
        assert!(table.levels().iter().all(|l| l.batch_size == 32));
    }

    #[test]
    fn resume_target_prefers_path() {
        let o = ConfigOverrides { resume: Some("a.json".into()), resume_epoch: Some(3), ..Default::default() };
        assert_eq!(o.resume_target(false), ResumeTarget::Path("a.json".into()));
        let o = ConfigOverrides { resume_epoch: Some(3), ..Default::default() };
        assert_eq!(o.resume_target(true), ResumeTarget::Epoch(3));
        assert_eq!(ConfigOverrides::default().resume_target(true), ResumeTarget::Latest);
        assert_eq!(ConfigOverrides::default().resume_target(false), ResumeTarget::Fresh);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_config(&dir.path().join("nope.toml")), Err(ConfigError::Read { .. })));
        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "dlr = \"fast\"").unwrap();
        assert!(matches!(load_config(&bad), Err(ConfigError::Parse { .. })));
    }
}
