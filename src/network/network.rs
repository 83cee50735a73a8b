use crate::autograd::{Tape, Var};
use crate::network::params::ParamSet;

/// A trainable sub-network: owns its parameters and exposes them for binding,
/// optimisation and checkpointing.
pub trait Module {
    fn params(&self) -> &ParamSet;
    fn params_mut(&mut self) -> &mut ParamSet;
}

/// A differentiable function parameterised by resolution level and blend
/// coefficient.
///
/// `params` must be the result of `self.params().bind(tape)` on the same
/// tape. During a transition (`alpha < 1`) the output blends the path of
/// `level - 1` with the path of `level`.
pub trait Progressive: Module {
    fn forward(&self, tape: &mut Tape, params: &[Var], input: Var, level: usize, alpha: f64) -> Var;

    fn num_levels(&self) -> usize;
}
