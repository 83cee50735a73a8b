pub mod alpha;
pub mod level_config;
pub mod scheduler;

pub use alpha::{alpha_for, Phase};
pub use level_config::{LevelConfig, ScheduleTable};
pub use scheduler::{advance, ActiveConfig, ScheduleState};
