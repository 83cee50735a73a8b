//! Sample grids written during training.

use std::fs;
use std::path::Path;

use image::error::{ImageError, ParameterError, ParameterErrorKind};

use crate::math::matrix::Matrix;

/// `fake_{iter}_{level}_{epoch}_{alpha}.png`. Downstream frame assembly
/// splits the stem on `_` and reads the four numbers back.
pub fn sample_file_name(iteration: usize, level: usize, epoch: usize, alpha: f64) -> String {
    format!("fake_{}_{}_{}_{:.4}.png", iteration, level, epoch, alpha)
}

/// Inverse of [`sample_file_name`]: `(iteration, level, epoch, alpha)`.
pub fn parse_sample_file_name(name: &str) -> Option<(usize, usize, usize, f64)> {
    let stem = name.strip_prefix("fake_")?.strip_suffix(".png")?;
    let mut parts = stem.split('_');
    let iteration = parts.next()?.parse().ok()?;
    let level = parts.next()?.parse().ok()?;
    let epoch = parts.next()?.parse().ok()?;
    let alpha = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((iteration, level, epoch, alpha))
}

/// Tiles `images` (rows of `channels × res × res` in `[-1, 1]`) into a
/// square-ish grid and writes it as PNG. One or three channels.
pub fn save_grid(images: &Matrix, channels: usize, resolution: usize, path: &Path) -> image::ImageResult<()> {
    if channels != 1 && channels != 3 {
        return Err(parameter_error(format!("sample grids need 1 or 3 channels, got {}", channels)));
    }
    if images.cols != channels * resolution * resolution {
        return Err(parameter_error(format!(
            "samples have {} values, expected {} for {} channels at {}x{}",
            images.cols,
            channels * resolution * resolution,
            channels,
            resolution,
            resolution
        )));
    }

    let n = images.rows.max(1);
    let cols = (n as f64).sqrt().ceil() as usize;
    let rows = n.div_ceil(cols);
    let width = (cols * resolution) as u32;
    let height = (rows * resolution) as u32;
    let plane = resolution * resolution;

    let mut grid = image::RgbImage::new(width, height);
    for i in 0..images.rows {
        let (gx, gy) = ((i % cols) * resolution, (i / cols) * resolution);
        let row = images.row(i);
        for y in 0..resolution {
            for x in 0..resolution {
                let px = |c: usize| to_u8(row[c.min(channels - 1) * plane + y * resolution + x]);
                grid.put_pixel((gx + x) as u32, (gy + y) as u32, image::Rgb([px(0), px(1), px(2)]));
            }
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    grid.save(path)
}

fn parameter_error(message: String) -> ImageError {
    ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::Generic(message)))
}

fn to_u8(v: f64) -> u8 {
    (((v + 1.0) * 127.5).round()).clamp(0.0, 255.0) as u8
}
