use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::data::source::{Batches, ImageSource};
use crate::error::EvalError;
use crate::math::matrix::Matrix;

/// Per-dimension mean and variance of a set of images at one resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub resolution: usize,
    pub count: usize,
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
}

/// Streaming accumulator for [`FeatureStats`].
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    resolution: usize,
    count: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl StatsAccumulator {
    pub fn new(dim: usize, resolution: usize) -> StatsAccumulator {
        StatsAccumulator { resolution, count: 0, sum: vec![0.0; dim], sum_sq: vec![0.0; dim] }
    }

    pub fn push(&mut self, batch: &Matrix) {
        assert_eq!(batch.cols, self.sum.len(), "batch dimension mismatch");
        for r in 0..batch.rows {
            for (j, &x) in batch.row(r).iter().enumerate() {
                self.sum[j] += x;
                self.sum_sq[j] += x * x;
            }
        }
        self.count += batch.rows;
    }

    pub fn finish(self) -> FeatureStats {
        let n = self.count.max(1) as f64;
        let mean: Vec<f64> = self.sum.iter().map(|s| s / n).collect();
        let variance = self
            .sum_sq
            .iter()
            .zip(mean.iter())
            .map(|(sq, m)| (sq / n - m * m).max(0.0))
            .collect();
        FeatureStats { resolution: self.resolution, count: self.count, mean, variance }
    }
}

impl FeatureStats {
    pub fn from_samples(samples: &Matrix, resolution: usize) -> FeatureStats {
        let mut acc = StatsAccumulator::new(samples.cols, resolution);
        acc.push(samples);
        acc.finish()
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn load(path: &Path) -> Result<FeatureStats, EvalError> {
        let text = fs::read_to_string(path).map_err(|e| EvalError::Stats {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let stats: FeatureStats = serde_json::from_str(&text).map_err(|e| EvalError::Stats {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if stats.variance.len() != stats.mean.len() {
            return Err(EvalError::Stats {
                path: path.to_path_buf(),
                reason: format!("mean has {} entries, variance {}", stats.mean.len(), stats.variance.len()),
            });
        }
        Ok(stats)
    }

    pub fn save(&self, path: &Path) -> Result<(), EvalError> {
        let io_err = |source| EvalError::Io { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string(self).map_err(|e| EvalError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        fs::write(path, json).map_err(io_err)
    }
}

/// `{dir}/{dataset}_statistics_{resolution}.json`
pub fn stats_path(dir: &Path, dataset: &str, resolution: usize) -> PathBuf {
    dir.join(format!("{}_statistics_{}.json", dataset, resolution))
}

/// Returns the reference statistics file for `resolution`, computing it from
/// the whole dataset the first time it is requested.
pub fn ensure_reference_stats<S: ImageSource + ?Sized>(
    source: &S,
    dataset: &str,
    resolution: usize,
    dir: &Path,
) -> Result<PathBuf, EvalError> {
    let path = stats_path(dir, dataset, resolution);
    if path.exists() {
        return Ok(path);
    }

    tracing::info!(dataset, resolution, images = source.len(), "computing reference statistics");
    let dim = source.channels() * resolution * resolution;
    let mut acc = StatsAccumulator::new(dim, resolution);
    for batch in Batches::sequential(source, resolution, 256) {
        acc.push(&batch?);
    }
    acc.finish().save(&path)?;
    tracing::info!(path = %path.display(), "saved reference statistics");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::folder::InMemoryDataset;

    #[test]
    fn mean_and_variance_per_dimension() {
        let m = Matrix::from_rows(vec![vec![1.0, 0.0], vec![3.0, 0.0]]);
        let s = FeatureStats::from_samples(&m, 1);
        assert_eq!(s.count, 2);
        assert_eq!(s.mean, vec![2.0, 0.0]);
        assert_eq!(s.variance, vec![1.0, 0.0]);
    }

    #[test]
    fn reference_stats_are_computed_once() {
        let dir = tempfile::tempdir().unwrap();
        let images = Matrix::from_rows(vec![vec![0.5; 16], vec![-0.5; 16]]);
        let ds = InMemoryDataset::from_images(images, 1, 4);

        let path = ensure_reference_stats(&ds, "toy", 2, dir.path()).unwrap();
        assert!(path.ends_with("toy_statistics_2.json"));
        let stats = FeatureStats::load(&path).unwrap();
        assert_eq!(stats.dim(), 4);
        assert_eq!(stats.count, 2);

        std::fs::write(&path, "{\"resolution\":2,\"count\":9,\"mean\":[],\"variance\":[]}").unwrap();
        let again = ensure_reference_stats(&ds, "toy", 2, dir.path()).unwrap();
        assert_eq!(FeatureStats::load(&again).unwrap().count, 9);
    }

    #[test]
    fn unreadable_stats_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FeatureStats::load(&path), Err(EvalError::Stats { .. })));
        assert!(matches!(FeatureStats::load(&dir.path().join("missing.json")), Err(EvalError::Stats { .. })));
    }
}
