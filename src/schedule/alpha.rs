use serde::{Serialize, Deserialize};

/// Phase of a resolution level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Blending the new level in; alpha ramps from 0 to 1.
    Transition,
    /// Training purely at the current level; alpha is 1.
    Stabilization,
}

/// Blend coefficient between the previous and the current level.
///
/// `progress` is the number of transition epochs completed so far and may
/// be fractional (`epoch_in_phase + batch_idx / num_batches`). The result is
/// `progress / transition_epochs` clamped to `[0, 1]`: 0 at the start of the
/// transition, exactly 1 once epoch `transition_epochs - 1` has completed.
/// Stabilization, or a level without a transition, always yields 1.
pub fn alpha_for(phase: Phase, progress: f64, transition_epochs: usize) -> f64 {
    match phase {
        Phase::Stabilization => 1.0,
        Phase::Transition if transition_epochs == 0 => 1.0,
        Phase::Transition => (progress / transition_epochs as f64).clamp(0.0, 1.0),
    }
}
