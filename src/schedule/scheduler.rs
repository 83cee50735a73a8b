use serde::{Serialize, Deserialize};

use crate::schedule::alpha::{alpha_for, Phase};
use crate::schedule::level_config::ScheduleTable;

/// Where training is in the level table. Serialized verbatim into every
/// checkpoint; a restored state reproduces the uninterrupted trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub current_level: usize,
    pub phase: Phase,
    /// Epochs already completed in the current phase.
    pub epoch_in_phase: usize,
    pub global_epoch: usize,
    /// Alpha reached at the end of the current epoch.
    pub alpha: f64,
}

/// Hyperparameters in force for the current epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveConfig {
    pub level: usize,
    pub phase: Phase,
    pub batch_size: usize,
    pub lr_scale: f64,
    pub resolution: usize,
}

impl ScheduleState {
    /// Level 0, stabilization, epoch 0.
    pub fn initial(table: &ScheduleTable) -> ScheduleState {
        enter_level(table, 0, 0)
    }

    pub fn active(&self, table: &ScheduleTable) -> ActiveConfig {
        let cfg = table.get(self.current_level);
        let lr_scale = match self.phase {
            Phase::Transition => cfg.lr_scale_transition,
            Phase::Stabilization => cfg.lr_scale_stabilization,
        };
        ActiveConfig {
            level: self.current_level,
            phase: self.phase,
            batch_size: cfg.batch_size,
            lr_scale,
            resolution: table.resolution(self.current_level),
        }
    }

    /// Alpha for one batch inside the current epoch. Ramps continuously so
    /// that the last batch of the final transition epoch stays below 1 and
    /// the following epoch starts at the alpha reported by the state.
    pub fn batch_alpha(&self, table: &ScheduleTable, batch_idx: usize, num_batches: usize) -> f64 {
        let t = table.get(self.current_level).transition_epochs;
        let within = if num_batches == 0 { 0.0 } else { batch_idx as f64 / num_batches as f64 };
        alpha_for(self.phase, self.epoch_in_phase as f64 + within, t)
    }

    /// Checks a restored state against the table it will be driven by.
    pub fn validate(&self, table: &ScheduleTable) -> Result<(), String> {
        if self.current_level >= table.num_levels() {
            return Err(format!(
                "level {} out of range (table has {} levels)",
                self.current_level,
                table.num_levels()
            ));
        }
        if !(self.alpha.is_finite() && (0.0..=1.0).contains(&self.alpha)) {
            return Err(format!("alpha {} outside [0, 1]", self.alpha));
        }
        let cfg = table.get(self.current_level);
        match self.phase {
            Phase::Transition => {
                if self.current_level == 0 {
                    return Err("level 0 cannot be in transition".into());
                }
                if self.epoch_in_phase >= cfg.transition_epochs {
                    return Err(format!(
                        "transition epoch {} beyond the {} configured for level {}",
                        self.epoch_in_phase, cfg.transition_epochs, self.current_level
                    ));
                }
            }
            Phase::Stabilization => {
                if self.alpha != 1.0 {
                    return Err(format!("alpha {} during stabilization", self.alpha));
                }
                if !table.is_last(self.current_level) && self.epoch_in_phase >= cfg.stabilization_epochs {
                    return Err(format!(
                        "stabilization epoch {} beyond the {} configured for level {}",
                        self.epoch_in_phase, cfg.stabilization_epochs, self.current_level
                    ));
                }
            }
        }
        Ok(())
    }
}

/// State for the epoch after `state`.
///
/// Once the final level's stabilization budget is exhausted the scheduler
/// stays there, still counting epochs.
pub fn advance(state: &ScheduleState, table: &ScheduleTable) -> ScheduleState {
    let level = state.current_level;
    let cfg = table.get(level);
    let global_epoch = state.global_epoch + 1;

    match state.phase {
        Phase::Transition if state.epoch_in_phase + 1 < cfg.transition_epochs => {
            let epoch_in_phase = state.epoch_in_phase + 1;
            ScheduleState {
                current_level: level,
                phase: Phase::Transition,
                epoch_in_phase,
                global_epoch,
                alpha: alpha_for(Phase::Transition, (epoch_in_phase + 1) as f64, cfg.transition_epochs),
            }
        }
        Phase::Transition => enter_stabilization(table, level, global_epoch),
        Phase::Stabilization
            if state.epoch_in_phase + 1 < cfg.stabilization_epochs || table.is_last(level) =>
        {
            ScheduleState {
                epoch_in_phase: state.epoch_in_phase + 1,
                global_epoch,
                alpha: 1.0,
                ..state.clone()
            }
        }
        Phase::Stabilization => enter_level(table, level + 1, global_epoch),
    }
}

fn enter_level(table: &ScheduleTable, level: usize, global_epoch: usize) -> ScheduleState {
    let t = table.get(level).transition_epochs;
    if level > 0 && t > 0 {
        ScheduleState {
            current_level: level,
            phase: Phase::Transition,
            epoch_in_phase: 0,
            global_epoch,
            alpha: alpha_for(Phase::Transition, 1.0, t),
        }
    } else {
        enter_stabilization(table, level, global_epoch)
    }
}

fn enter_stabilization(table: &ScheduleTable, level: usize, global_epoch: usize) -> ScheduleState {
    if table.get(level).stabilization_epochs == 0 && !table.is_last(level) {
        return enter_level(table, level + 1, global_epoch);
    }
    ScheduleState {
        current_level: level,
        phase: Phase::Stabilization,
        epoch_in_phase: 0,
        global_epoch,
        alpha: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::level_config::LevelConfig;

    fn two_level_table() -> ScheduleTable {
        ScheduleTable::new(vec![LevelConfig::new(0, 0, 2, 8), LevelConfig::new(1, 2, 3, 4)], 4).unwrap()
    }

    fn walk(table: &ScheduleTable, epochs: usize) -> Vec<ScheduleState> {
        let mut state = ScheduleState::initial(table);
        let mut out = vec![state.clone()];
        for _ in 1..epochs {
            state = advance(&state, table);
            out.push(state.clone());
        }
        out
    }

    #[test]
    fn walks_levels_and_phases_in_order() {
        let table = two_level_table();
        let states = walk(&table, 7);
        let expected = [
            (0, Phase::Stabilization, 1.0),
            (0, Phase::Stabilization, 1.0),
            (1, Phase::Transition, 0.5),
            (1, Phase::Transition, 1.0),
            (1, Phase::Stabilization, 1.0),
            (1, Phase::Stabilization, 1.0),
            (1, Phase::Stabilization, 1.0),
        ];
        for (epoch, (state, (level, phase, alpha))) in states.iter().zip(expected).enumerate() {
            assert_eq!(state.global_epoch, epoch);
            assert_eq!(state.current_level, level, "epoch {}", epoch);
            assert_eq!(state.phase, phase, "epoch {}", epoch);
            assert!((state.alpha - alpha).abs() < 1e-12, "epoch {}", epoch);
        }
        assert_eq!(states[2].active(&table).batch_size, 4);
        assert_eq!(states[2].active(&table).resolution, 8);
    }

    #[test]
    fn level_zero_never_transitions() {
        let table = two_level_table();
        for state in walk(&table, 20) {
            if state.current_level == 0 {
                assert_eq!(state.phase, Phase::Stabilization);
            }
            assert!(state.validate(&table).is_ok());
        }
    }

    #[test]
    fn final_level_is_a_steady_state() {
        let table = two_level_table();
        let states = walk(&table, 30);
        let last = states.last().unwrap();
        assert_eq!(last.current_level, 1);
        assert_eq!(last.phase, Phase::Stabilization);
        assert_eq!(last.alpha, 1.0);
        assert_eq!(last.global_epoch, 29);
    }

    #[test]
    fn skips_empty_stabilization_of_intermediate_level() {
        let table = ScheduleTable::new(
            vec![
                LevelConfig::new(0, 0, 1, 8),
                LevelConfig::new(1, 1, 0, 8),
                LevelConfig::new(2, 0, 2, 8),
            ],
            4,
        )
        .unwrap();
        let states = walk(&table, 4);
        assert_eq!((states[1].current_level, states[1].phase), (1, Phase::Transition));
        // Level 2 has neither transition nor a stabilization skip.
        assert_eq!((states[2].current_level, states[2].phase), (2, Phase::Stabilization));
    }

    #[test]
    fn alpha_never_decreases_within_a_level() {
        let table = ScheduleTable::new(
            vec![LevelConfig::new(0, 0, 1, 8), LevelConfig::new(1, 4, 2, 8)],
            4,
        )
        .unwrap();
        let states = walk(&table, 8);
        let mut prev = 0.0;
        for s in states.iter().filter(|s| s.current_level == 1) {
            assert!(s.alpha >= prev);
            prev = s.alpha;
        }
    }

    #[test]
    fn batch_alpha_ramps_within_an_epoch() {
        let table = two_level_table();
        let states = walk(&table, 4);
        let first = &states[2];
        assert_eq!(first.batch_alpha(&table, 0, 4), 0.0);
        assert!((first.batch_alpha(&table, 2, 4) - 0.25).abs() < 1e-12);
        let second = &states[3];
        assert!((second.batch_alpha(&table, 0, 4) - 0.5).abs() < 1e-12);
        assert!(second.batch_alpha(&table, 3, 4) < 1.0);
        assert_eq!(states[0].batch_alpha(&table, 0, 4), 1.0);
    }

    #[test]
    fn restored_state_continues_identically() {
        let table = two_level_table();
        let states = walk(&table, 6);
        let json = serde_json::to_string(&states[2]).unwrap();
        let mut restored: ScheduleState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, states[2]);
        for expected in &states[3..] {
            restored = advance(&restored, &table);
            assert_eq!(&restored, expected);
        }
    }

    #[test]
    fn validate_rejects_inconsistent_states() {
        let table = two_level_table();
        let mut s = ScheduleState::initial(&table);
        s.current_level = 5;
        assert!(s.validate(&table).is_err());

        let mut s = ScheduleState::initial(&table);
        s.phase = Phase::Transition;
        assert!(s.validate(&table).is_err());

        let mut s = ScheduleState::initial(&table);
        s.alpha = 0.3;
        assert!(s.validate(&table).is_err());
    }
}
