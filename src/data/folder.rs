use std::fs;
use std::path::Path;

use crate::data::source::ImageSource;
use crate::error::DataError;
use crate::math::matrix::Matrix;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Images decoded once at full resolution and held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    images: Matrix,
    channels: usize,
    resolution: usize,
}

impl InMemoryDataset {
    /// Wraps pre-normalized images (`n × channels·resolution²`).
    pub fn from_images(images: Matrix, channels: usize, resolution: usize) -> InMemoryDataset {
        assert_eq!(
            images.cols,
            channels * resolution * resolution,
            "image rows do not match {} channels at {}×{}",
            channels,
            resolution,
            resolution
        );
        InMemoryDataset { images, channels, resolution }
    }

    /// Decodes every image in `dir` (sorted by file name), resizes it to
    /// `resolution × resolution` and converts it to RGB in `[-1, 1]`.
    pub fn from_folder(dir: &Path, resolution: usize) -> Result<InMemoryDataset, DataError> {
        let entries = fs::read_dir(dir).map_err(|source| DataError::Io { path: dir.to_path_buf(), source })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DataError::Io { path: dir.to_path_buf(), source })?;
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(DataError::Empty(dir.to_path_buf()));
        }
        paths.sort();

        let side = resolution as u32;
        let plane = resolution * resolution;
        let mut rows = Vec::with_capacity(paths.len());
        for path in &paths {
            let img = image::open(path).map_err(|source| DataError::Decode { path: path.clone(), source })?;
            let rgb = img
                .resize_exact(side, side, image::imageops::FilterType::Lanczos3)
                .to_rgb8();
            let mut row = vec![0.0; 3 * plane];
            for (i, pixel) in rgb.pixels().enumerate() {
                for c in 0..3 {
                    row[c * plane + i] = pixel.0[c] as f64 / 127.5 - 1.0;
                }
            }
            rows.push(row);
        }
        tracing::info!(dir = %dir.display(), images = rows.len(), resolution, "loaded dataset");

        Ok(InMemoryDataset { images: Matrix::from_rows(rows), channels: 3, resolution })
    }
}

impl ImageSource for InMemoryDataset {
    fn len(&self) -> usize {
        self.images.rows
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn max_resolution(&self) -> usize {
        self.resolution
    }

    fn load(&self, indices: &[usize], resolution: usize) -> Result<Matrix, DataError> {
        let invalid = DataError::InvalidResolution { requested: resolution, stored: self.resolution };
        if resolution == 0 || resolution > self.resolution || self.resolution % resolution != 0 {
            return Err(invalid);
        }
        if !(self.resolution / resolution).is_power_of_two() {
            return Err(invalid);
        }

        let mut batch = self.images.select_rows(indices);
        let mut res = self.resolution;
        while res > resolution {
            batch = batch.avg_pool2x(self.channels, res);
            res /= 2;
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::Batches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ramp_dataset(n: usize) -> InMemoryDataset {
        let rows = (0..n).map(|i| vec![i as f64; 16]).collect();
        InMemoryDataset::from_images(Matrix::from_rows(rows), 1, 4)
    }

    #[test]
    fn loads_lower_levels_by_pooling() {
        let ds = ramp_dataset(3);
        let m = ds.load(&[2, 0], 1).unwrap();
        assert_eq!(m.shape(), (2, 1));
        assert_eq!(m.data, vec![2.0, 0.0]);
        assert!(matches!(ds.load(&[0], 3), Err(DataError::InvalidResolution { .. })));
        assert!(matches!(ds.load(&[0], 8), Err(DataError::InvalidResolution { .. })));
    }

    #[test]
    fn shuffled_pass_visits_every_image_once() {
        let ds = ramp_dataset(10);
        let mut rng = StdRng::seed_from_u64(0);
        let batches = Batches::shuffled(&ds, 2, 4, &mut rng);
        assert_eq!(batches.num_batches(), 3);
        let mut seen: Vec<f64> = Vec::new();
        let mut sizes = Vec::new();
        for b in batches {
            let b = b.unwrap();
            sizes.push(b.rows);
            seen.extend((0..b.rows).map(|r| b.get(r, 0)));
        }
        assert_eq!(sizes, vec![4, 4, 2]);
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, (0..10).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn reads_and_normalizes_a_folder() {
        let dir = tempfile::tempdir().unwrap();
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 128]));
        img.save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let ds = InMemoryDataset::from_folder(dir.path(), 4).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.channels(), 3);
        let m = ds.load(&[0], 4).unwrap();
        assert!((m.get(0, 0) - 1.0).abs() < 0.02);
        assert!((m.get(0, 16) + 1.0).abs() < 0.02);
        assert!(m.data.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn empty_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(InMemoryDataset::from_folder(dir.path(), 4), Err(DataError::Empty(_))));
    }
}
