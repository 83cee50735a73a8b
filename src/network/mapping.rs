use rand::Rng;

use crate::activation::ActivationFunction;
use crate::autograd::{Tape, Var};
use crate::layers::{pixel_norm, Layer};
use crate::network::network::Module;
use crate::network::params::ParamSet;
use crate::network::spec::ArchitectureSpec;

/// Maps a latent `z` to a style vector `w`: pixel norm followed by
/// `style_layers` leaky dense layers.
///
/// Trained by its own optimizer with a much smaller learning rate than the
/// synthesis network.
#[derive(Debug, Clone)]
pub struct MappingNetwork {
    params: ParamSet,
    layers: Vec<Layer>,
}

impl MappingNetwork {
    pub fn new<R: Rng + ?Sized>(spec: &ArchitectureSpec, rng: &mut R) -> MappingNetwork {
        let mut params = ParamSet::new();
        let layers = (0..spec.style_layers.max(1))
            .map(|i| {
                let input = if i == 0 { spec.latent_dim } else { spec.w_dim };
                Layer::new(&mut params, &format!("mapping.{}", i), input, spec.w_dim, ActivationFunction::LEAKY, rng)
            })
            .collect();
        MappingNetwork { params, layers }
    }

    /// `z` (`n × latent_dim`) → `w` (`n × w_dim`).
    pub fn map(&self, tape: &mut Tape, params: &[Var], z: Var) -> Var {
        let mut h = pixel_norm(tape, z);
        for layer in &self.layers {
            h = layer.forward(tape, params, h);
        }
        h
    }
}

impl Module for MappingNetwork {
    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }
}
