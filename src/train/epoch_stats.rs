use serde::{Deserialize, Deserializer, Serialize};

use crate::schedule::alpha::Phase;

/// One completed epoch. Appended once per epoch and carried in every
/// checkpoint, so the history of a resumed run continues where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    /// 0-based global epoch.
    pub epoch: usize,
    /// Mean discriminator loss over the epoch's finite batches; NaN when
    /// every batch was skipped.
    #[serde(deserialize_with = "nan_if_null")]
    pub train_loss: f64,
    /// Mean generator loss over the epoch's finite batches.
    #[serde(deserialize_with = "nan_if_null")]
    pub generator_loss: f64,
    /// Fréchet score; `None` when evaluation was disabled or failed.
    pub eval_metric: Option<f64>,
    pub level: usize,
    pub phase: Phase,
    /// Alpha reached at the end of the epoch.
    pub alpha: f64,
    /// Batches whose optimizer step was skipped because a loss was not finite.
    #[serde(default)]
    pub skipped_batches: usize,
}

// serde_json writes NaN as `null`.
fn nan_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Checks that `history` is ordered by strictly increasing epoch and ends
/// before `next_epoch`.
pub fn check_history(history: &[LossRecord], next_epoch: usize) -> Result<(), String> {
    for pair in history.windows(2) {
        if pair[1].epoch <= pair[0].epoch {
            return Err(format!(
                "loss history is not ordered: epoch {} follows epoch {}",
                pair[1].epoch, pair[0].epoch
            ));
        }
    }
    if let Some(last) = history.last() {
        if last.epoch >= next_epoch {
            return Err(format!("loss history reaches epoch {} but the run resumes at {}", last.epoch, next_epoch));
        }
    }
    Ok(())
}
