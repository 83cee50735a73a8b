use serde::{Serialize, Deserialize};

/// Shape of a generator/discriminator pair.
///
/// Stored in every checkpoint so a resumed run rebuilds networks whose
/// parameter shapes match the saved state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureSpec {
    /// Dimension of the latent vector `z`.
    pub latent_dim: usize,
    /// Dimension of the style vector `w`.
    pub w_dim: usize,
    /// Number of dense layers in the mapping network.
    pub style_layers: usize,
    /// Width of the per-level feature vectors.
    pub hidden_dim: usize,
    /// Image channels (3 for RGB).
    pub channels: usize,
    /// Side length of level 0 images.
    pub base_resolution: usize,
    /// Number of resolution levels.
    pub num_levels: usize,
}

impl ArchitectureSpec {
    /// `base_resolution × 2^level`.
    pub fn resolution(&self, level: usize) -> usize {
        self.base_resolution << level
    }

    /// Flattened length of one image at `level`.
    pub fn image_size(&self, level: usize) -> usize {
        let r = self.resolution(level);
        self.channels * r * r
    }

    pub fn max_resolution(&self) -> usize {
        self.resolution(self.num_levels.saturating_sub(1))
    }
}
