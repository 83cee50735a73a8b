use std::path::PathBuf;
use std::sync::mpsc;

use crate::config::settings::StyleGanConfig;
use crate::schedule::level_config::ScheduleTable;
use crate::train::epoch_stats::LossRecord;

/// Run-time settings for a `train_loop` call, resolved from a
/// [`StyleGanConfig`].
///
/// # Fields
/// - `num_epochs`: the loop stops once the schedule reaches this epoch
/// - `save_interval`: checkpoint after epoch `e` when `(e + 1) % save_interval == 0`
///   (epochs 0–3 are always saved)
/// - `image_interval`: write a sample grid every this many batches
/// - `fid_samples`: generated images per evaluation
/// - `evaluate`: run the Fréchet evaluation at the end of each epoch
/// - `progress_tx`: optional channel; one `LossRecord` is sent per
///   completed epoch. A dropped receiver is ignored.
pub struct TrainConfig {
    pub num_epochs: usize,
    pub save_interval: usize,
    pub image_interval: usize,
    pub fid_samples: usize,
    pub evaluate: bool,
    pub dataset: String,
    pub image_dir: PathBuf,
    pub stats_dir: PathBuf,
    pub show_progress: bool,
    pub progress_tx: Option<mpsc::Sender<LossRecord>>,
}

impl TrainConfig {
    pub fn from_config(config: &StyleGanConfig, table: &ScheduleTable) -> Self {
        TrainConfig {
            num_epochs: config.num_epochs(table),
            save_interval: config.save_interval.max(1),
            image_interval: config.image_interval.max(1),
            fid_samples: config.fid_samples(),
            evaluate: config.evaluate,
            dataset: config.dataset.clone(),
            image_dir: config.image_dir(),
            stats_dir: config.stats_dir(),
            show_progress: true,
            progress_tx: None,
        }
    }

    pub fn should_save(&self, epoch: usize) -> bool {
        (epoch + 1) % self.save_interval == 0 || epoch <= 3
    }
}
