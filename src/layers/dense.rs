use rand::Rng;

use crate::{
    activation::activation::ActivationFunction,
    autograd::{Tape, Var},
    math::matrix::Matrix,
    network::params::ParamSet,
};

/// Fully connected layer whose tensors live in a [`ParamSet`].
///
/// Weights are drawn from N(0, 1) and rescaled by `sqrt(2 / fan_in)` on
/// every forward pass (equalized learning rate), so Adam sees the same
/// dynamic range for every layer.
#[derive(Debug, Clone)]
pub struct Layer {
    pub input_size: usize,
    pub size: usize,
    weights: usize,
    biases: usize,
    gain: f64,
    pub activator: ActivationFunction,
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        params: &mut ParamSet,
        name: &str,
        input_size: usize,
        size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        Layer::with_bias(params, name, input_size, size, 0.0, activation, rng)
    }

    /// Like [`Layer::new`] but with every bias initialised to `bias_init`.
    pub fn with_bias<R: Rng + ?Sized>(
        params: &mut ParamSet,
        name: &str,
        input_size: usize,
        size: usize,
        bias_init: f64,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        let weights = params.push(format!("{}.weight", name), Matrix::standard_normal(input_size, size, rng));
        let biases = params.push(format!("{}.bias", name), Matrix::filled(1, size, bias_init));
        Layer {
            input_size,
            size,
            weights,
            biases,
            gain: (2.0 / input_size as f64).sqrt(),
            activator: activation,
        }
    }

    /// `activation(x · (gain·W) + b)` for a batch `x` of shape `n × input_size`.
    pub fn forward(&self, tape: &mut Tape, params: &[Var], x: Var) -> Var {
        let w = tape.scale(params[self.weights], self.gain);
        let z = tape.matmul(x, w);
        let z = tape.add_row(z, params[self.biases]);
        self.activator.apply(tape, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn forward_shape_and_bias_init() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut params = ParamSet::new();
        let layer = Layer::with_bias(&mut params, "fc", 4, 3, 1.0, ActivationFunction::Identity, &mut rng);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get(1).data, vec![1.0; 3]);

        let mut tape = Tape::new();
        let vars = params.bind(&mut tape);
        let x = tape.leaf(Matrix::zeros(5, 4));
        let y = layer.forward(&mut tape, &vars, x);
        assert_eq!(tape.shape(y), (5, 3));
        // Zero input leaves only the bias.
        assert!(tape.value(y).data.iter().all(|&v| v == 1.0));
    }
}
