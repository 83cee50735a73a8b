pub mod loader;
pub mod settings;

pub use loader::{load_config, parse_config, ConfigOverrides, ResumeTarget};
pub use settings::{LevelEntry, StyleGanConfig};
