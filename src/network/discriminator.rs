use rand::Rng;

use crate::activation::ActivationFunction;
use crate::autograd::{Tape, Var};
use crate::layers::Layer;
use crate::network::network::{Module, Progressive};
use crate::network::params::ParamSet;
use crate::network::spec::ArchitectureSpec;

/// Progressive critic: reads an image at any level and returns one
/// unbounded score per sample (`n × 1`).
///
/// `from_rgb[l]` embeds a level-`l` image; `blocks[l - 1]` carries features
/// from level `l` down to `l - 1`. During a transition the new
/// `from_rgb[level]` path is blended with the old path fed a 2× average
/// pooled copy of the input.
#[derive(Debug, Clone)]
pub struct Discriminator {
    params: ParamSet,
    from_rgb: Vec<Layer>,
    blocks: Vec<Layer>,
    head: Layer,
    out: Layer,
    spec: ArchitectureSpec,
}

impl Discriminator {
    pub fn new<R: Rng + ?Sized>(spec: &ArchitectureSpec, rng: &mut R) -> Discriminator {
        let mut params = ParamSet::new();
        let hidden = spec.hidden_dim;
        let from_rgb = (0..spec.num_levels)
            .map(|level| {
                Layer::new(
                    &mut params,
                    &format!("discriminator.from_rgb.{}", level),
                    spec.image_size(level),
                    hidden,
                    ActivationFunction::LEAKY,
                    rng,
                )
            })
            .collect();
        let blocks = (1..spec.num_levels)
            .map(|level| {
                Layer::new(
                    &mut params,
                    &format!("discriminator.block.{}", level),
                    hidden,
                    hidden,
                    ActivationFunction::LEAKY,
                    rng,
                )
            })
            .collect();
        let head = Layer::new(&mut params, "discriminator.head", hidden, hidden, ActivationFunction::LEAKY, rng);
        let out = Layer::new(&mut params, "discriminator.out", hidden, 1, ActivationFunction::Identity, rng);
        Discriminator { params, from_rgb, blocks, head, out, spec: spec.clone() }
    }
}

impl Module for Discriminator {
    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }
}

impl Progressive for Discriminator {
    fn forward(&self, tape: &mut Tape, params: &[Var], x: Var, level: usize, alpha: f64) -> Var {
        assert!(level < self.from_rgb.len(), "level {} out of range", level);

        let mut h = self.from_rgb[level].forward(tape, params, x);
        if level > 0 {
            h = self.blocks[level - 1].forward(tape, params, h);
            if alpha < 1.0 {
                let down = tape.avg_pool2x(x, self.spec.channels, self.spec.resolution(level));
                let old = self.from_rgb[level - 1].forward(tape, params, down);
                h = tape.lerp(old, h, alpha);
            }
            for block in self.blocks[..level - 1].iter().rev() {
                h = block.forward(tape, params, h);
            }
        }
        let h = self.head.forward(tape, params, h);
        self.out.forward(tape, params, h)
    }

    fn num_levels(&self) -> usize {
        self.from_rgb.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn one_score_per_sample_at_every_level() {
        let spec = ArchitectureSpec {
            latent_dim: 4,
            w_dim: 4,
            style_layers: 1,
            hidden_dim: 6,
            channels: 3,
            base_resolution: 2,
            num_levels: 3,
        };
        let mut rng = StdRng::seed_from_u64(9);
        let d = Discriminator::new(&spec, &mut rng);
        for level in 0..3 {
            let mut tape = Tape::new();
            let vars = d.params().bind(&mut tape);
            let x = tape.leaf(Matrix::standard_normal(5, spec.image_size(level), &mut rng));
            let y = d.forward(&mut tape, &vars, x, level, 0.3);
            assert_eq!(tape.shape(y), (5, 1));
        }
    }
}
