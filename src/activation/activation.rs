use serde::{Serialize, Deserialize};

use crate::autograd::{Tape, Var};

/// Element-wise activation applied after a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Identity,
    LeakyReLU { alpha: f64 },
}

impl ActivationFunction {
    /// Slope 0.2 leaky ReLU used throughout the progressive networks.
    pub const LEAKY: ActivationFunction = ActivationFunction::LeakyReLU { alpha: 0.2 };

    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Identity => x,
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
        }
    }

    /// Records the activation on the tape.
    pub fn apply(&self, tape: &mut Tape, x: Var) -> Var {
        match self {
            ActivationFunction::Identity => x,
            ActivationFunction::LeakyReLU { alpha } => tape.leaky_relu(x, *alpha),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;

    #[test]
    fn tape_and_scalar_paths_agree() {
        let act = ActivationFunction::LEAKY;
        let mut tape = Tape::new();
        let x = tape.leaf(Matrix::from_rows(vec![vec![-1.5, 0.0, 2.0]]));
        let y = act.apply(&mut tape, x);
        let expected: Vec<f64> = [-1.5, 0.0, 2.0].iter().map(|&v| act.function(v)).collect();
        assert_eq!(tape.value(y).data, expected);
    }
}
