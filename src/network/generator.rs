use rand::Rng;

use crate::activation::ActivationFunction;
use crate::autograd::{Tape, Var};
use crate::layers::Layer;
use crate::math::matrix::Matrix;
use crate::network::mapping::MappingNetwork;
use crate::network::network::{Module, Progressive};
use crate::network::params::ParamSet;
use crate::network::spec::ArchitectureSpec;

/// One resolution level of the synthesis network.
#[derive(Debug, Clone)]
struct SynthesisBlock {
    dense: Layer,
    // Affine style transform "A": per-feature gain (bias starts at one) and shift.
    style_scale: Layer,
    style_shift: Layer,
    to_rgb: Layer,
}

impl SynthesisBlock {
    fn forward(&self, tape: &mut Tape, params: &[Var], h: Var, w: Var) -> Var {
        let h = self.dense.forward(tape, params, h);
        let gain = self.style_scale.forward(tape, params, w);
        let shift = self.style_shift.forward(tape, params, w);
        let h = tape.mul(h, gain);
        tape.add(h, shift)
    }
}

/// Style-modulated synthesis network, grown one block per level.
///
/// Starts from a learned constant; each block transforms the feature vector
/// and modulates it with the style `w`. Every block owns a `to_rgb`
/// projection so the output can be read at any level.
#[derive(Debug, Clone)]
pub struct SynthesisNetwork {
    params: ParamSet,
    constant: usize,
    blocks: Vec<SynthesisBlock>,
    spec: ArchitectureSpec,
}

impl SynthesisNetwork {
    pub fn new<R: Rng + ?Sized>(spec: &ArchitectureSpec, rng: &mut R) -> SynthesisNetwork {
        let mut params = ParamSet::new();
        let constant = params.push("synthesis.constant", Matrix::filled(1, spec.hidden_dim, 1.0));
        let blocks = (0..spec.num_levels)
            .map(|level| {
                let prefix = format!("synthesis.{}", level);
                SynthesisBlock {
                    dense: Layer::new(
                        &mut params,
                        &format!("{}.dense", prefix),
                        spec.hidden_dim,
                        spec.hidden_dim,
                        ActivationFunction::LEAKY,
                        rng,
                    ),
                    style_scale: Layer::with_bias(
                        &mut params,
                        &format!("{}.style_scale", prefix),
                        spec.w_dim,
                        spec.hidden_dim,
                        1.0,
                        ActivationFunction::Identity,
                        rng,
                    ),
                    style_shift: Layer::new(
                        &mut params,
                        &format!("{}.style_shift", prefix),
                        spec.w_dim,
                        spec.hidden_dim,
                        ActivationFunction::Identity,
                        rng,
                    ),
                    to_rgb: Layer::new(
                        &mut params,
                        &format!("{}.to_rgb", prefix),
                        spec.hidden_dim,
                        spec.image_size(level),
                        ActivationFunction::Identity,
                        rng,
                    ),
                }
            })
            .collect();
        SynthesisNetwork { params, constant, blocks, spec: spec.clone() }
    }
}

impl Module for SynthesisNetwork {
    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }
}

impl Progressive for SynthesisNetwork {
    /// `w` (`n × w_dim`) → images (`n × channels·r·r`) at `level`.
    fn forward(&self, tape: &mut Tape, params: &[Var], w: Var, level: usize, alpha: f64) -> Var {
        assert!(level < self.blocks.len(), "level {} out of range", level);
        let n = tape.value(w).rows;

        let mut h = tape.broadcast_rows(params[self.constant], n);
        for block in &self.blocks[..level] {
            h = block.forward(tape, params, h, w);
        }
        let previous = h;
        let h = self.blocks[level].forward(tape, params, previous, w);
        let rgb = self.blocks[level].to_rgb.forward(tape, params, h);

        if level == 0 || alpha >= 1.0 {
            return rgb;
        }

        let old = self.blocks[level - 1].to_rgb.forward(tape, params, previous);
        let old = tape.upsample2x(old, self.spec.channels, self.spec.resolution(level - 1));
        tape.lerp(old, rgb, alpha)
    }

    fn num_levels(&self) -> usize {
        self.blocks.len()
    }
}

/// Mapping network plus synthesis network.
#[derive(Debug, Clone)]
pub struct StyleGenerator {
    pub mapping: MappingNetwork,
    pub synthesis: SynthesisNetwork,
}

impl StyleGenerator {
    pub fn new<R: Rng + ?Sized>(spec: &ArchitectureSpec, rng: &mut R) -> StyleGenerator {
        StyleGenerator {
            mapping: MappingNetwork::new(spec, rng),
            synthesis: SynthesisNetwork::new(spec, rng),
        }
    }

    /// `z` → images at `level`, blended with `level - 1` by `alpha`.
    pub fn generate(
        &self,
        tape: &mut Tape,
        mapping_params: &[Var],
        synthesis_params: &[Var],
        z: Var,
        level: usize,
        alpha: f64,
    ) -> Var {
        let w = self.mapping.map(tape, mapping_params, z);
        self.synthesis.forward(tape, synthesis_params, w, level, alpha)
    }

    /// Generates images without keeping any graph around.
    pub fn sample(&self, z: &Matrix, level: usize, alpha: f64) -> Matrix {
        let mut tape = Tape::new();
        let m = self.mapping.params().bind(&mut tape);
        let s = self.synthesis.params().bind(&mut tape);
        let z = tape.leaf(z.clone());
        let out = self.generate(&mut tape, &m, &s, z, level, alpha);
        tape.value(out).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn spec() -> ArchitectureSpec {
        ArchitectureSpec {
            latent_dim: 6,
            w_dim: 5,
            style_layers: 2,
            hidden_dim: 7,
            channels: 3,
            base_resolution: 2,
            num_levels: 3,
        }
    }

    #[test]
    fn output_size_follows_level() {
        let mut rng = StdRng::seed_from_u64(3);
        let g = StyleGenerator::new(&spec(), &mut rng);
        let z = Matrix::standard_normal(4, 6, &mut rng);
        for level in 0..3 {
            let out = g.sample(&z, level, 0.5);
            assert_eq!(out.shape(), (4, spec().image_size(level)));
            assert!(out.is_finite());
        }
    }

    #[test]
    fn alpha_zero_is_upsampled_previous_level() {
        let mut rng = StdRng::seed_from_u64(4);
        let g = StyleGenerator::new(&spec(), &mut rng);
        let z = Matrix::standard_normal(2, 6, &mut rng);
        let low = g.sample(&z, 0, 1.0);
        let blended = g.sample(&z, 1, 0.0);
        let expected = low.upsample2x(3, 2);
        for (a, b) in blended.data.iter().zip(expected.data.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
