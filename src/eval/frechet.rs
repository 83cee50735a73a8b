use std::path::Path;

use crate::error::EvalError;
use crate::eval::stats::FeatureStats;
use crate::math::matrix::Matrix;

/// Scores generated images against reference statistics. Lower is better.
pub trait Evaluator {
    fn score(&mut self, samples: &Matrix, reference_stats: &Path) -> Result<f64, EvalError>;
}

/// Fréchet distance between diagonal Gaussians fitted in pixel space:
/// `‖μ₁ − μ₂‖² + Σ (σ₁² + σ₂² − 2σ₁σ₂)`.
#[derive(Debug, Clone)]
pub struct FrechetEvaluator {
    pub min_samples: usize,
}

impl FrechetEvaluator {
    pub fn new(min_samples: usize) -> FrechetEvaluator {
        FrechetEvaluator { min_samples }
    }
}

pub fn frechet_distance(a: &FeatureStats, b: &FeatureStats) -> f64 {
    let mean_term: f64 = a.mean.iter().zip(&b.mean).map(|(x, y)| (x - y).powi(2)).sum();
    let cov_term: f64 = a
        .variance
        .iter()
        .zip(&b.variance)
        .map(|(va, vb)| va + vb - 2.0 * (va * vb).sqrt())
        .sum();
    mean_term + cov_term
}

impl Evaluator for FrechetEvaluator {
    fn score(&mut self, samples: &Matrix, reference_stats: &Path) -> Result<f64, EvalError> {
        if samples.rows < self.min_samples.max(1) {
            return Err(EvalError::InsufficientSamples { required: self.min_samples.max(1), found: samples.rows });
        }
        let reference = FeatureStats::load(reference_stats)?;
        if reference.dim() != samples.cols {
            return Err(EvalError::DimensionMismatch { expected: reference.dim(), found: samples.cols });
        }
        let generated = FeatureStats::from_samples(samples, reference.resolution);
        Ok(frechet_distance(&generated, &reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_stats(dir: &Path, samples: &Matrix) -> std::path::PathBuf {
        let path = dir.join("ref.json");
        FeatureStats::from_samples(samples, 1).save(&path).unwrap();
        path
    }

    #[test]
    fn identical_distributions_score_zero() {
        let dir = tempfile::tempdir().unwrap();
        let samples = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, -2.0], vec![2.0, 0.0]]);
        let path = write_stats(dir.path(), &samples);
        let mut eval = FrechetEvaluator::new(2);
        assert!(eval.score(&samples, &path).unwrap().abs() < 1e-12);
    }

    #[test]
    fn shifted_distribution_scores_squared_shift() {
        let dir = tempfile::tempdir().unwrap();
        let reference = Matrix::from_rows(vec![vec![0.0], vec![2.0]]);
        let path = write_stats(dir.path(), &reference);
        let shifted = Matrix::from_rows(vec![vec![3.0], vec![5.0]]);
        let mut eval = FrechetEvaluator::new(1);
        assert!((eval.score(&shifted, &path).unwrap() - 9.0).abs() < 1e-12);
    }

    #[test]
    fn too_few_samples_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let samples = Matrix::from_rows(vec![vec![1.0]]);
        let path = write_stats(dir.path(), &samples);
        let mut eval = FrechetEvaluator::new(4);
        assert!(matches!(
            eval.score(&samples, &path),
            Err(EvalError::InsufficientSamples { required: 4, found: 1 })
        ));
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stats(dir.path(), &Matrix::from_rows(vec![vec![1.0, 2.0]]));
        let mut eval = FrechetEvaluator::new(1);
        assert!(matches!(
            eval.score(&Matrix::from_rows(vec![vec![1.0]]), &path),
            Err(EvalError::DimensionMismatch { expected: 2, found: 1 })
        ));
    }
}
