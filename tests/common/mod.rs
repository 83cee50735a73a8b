use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ferrite_stylegan::config::{LevelEntry, StyleGanConfig};
use ferrite_stylegan::data::InMemoryDataset;
use ferrite_stylegan::Matrix;

/// Two grayscale levels (2×2, 4×4) small enough to train in milliseconds.
pub fn tiny_config(output_dir: &Path) -> StyleGanConfig {
    StyleGanConfig {
        dataset: "tiny".to_string(),
        output_dir: output_dir.to_path_buf(),
        latent_dim: 4,
        w_dim: 4,
        style_layers: 2,
        hidden_dim: 8,
        channels: 1,
        base_resolution: 2,
        batch_size: 2,
        save_interval: 1,
        image_interval: 1000,
        evaluate: false,
        grid_samples: 4,
        seed: 7,
        levels: vec![LevelEntry::new(0, 0, 1), LevelEntry::new(1, 2, 1)],
        ..StyleGanConfig::default()
    }
}

/// `count` random 4×4 grayscale images in `[-1, 1]`.
pub fn tiny_dataset(count: usize) -> InMemoryDataset {
    let mut rng = StdRng::seed_from_u64(99);
    let data = (0..count * 16).map(|_| rng.gen_range(-1.0..1.0)).collect();
    InMemoryDataset::from_images(Matrix::from_vec(count, 16, data), 1, 4)
}
