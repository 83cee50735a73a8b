pub mod frechet;
pub mod stats;

pub use frechet::{frechet_distance, Evaluator, FrechetEvaluator};
pub use stats::{ensure_reference_stats, stats_path, FeatureStats};
