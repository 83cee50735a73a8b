use rand::Rng;

use crate::autograd::{Tape, Var};
use crate::loss::loss_type::LossType;
use crate::math::matrix::Matrix;
use crate::network::network::Progressive;

pub const DEFAULT_GP_COEFFICIENT: f64 = 10.0;

/// Scalar readings from one critic evaluation, for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticDiagnostics {
    pub real_score: f64,
    pub fake_score: f64,
    /// `real_score - fake_score`.
    pub wasserstein: f64,
    pub gradient_penalty: Option<f64>,
}

/// Builds adversarial losses on a tape. Never touches parameters; the only
/// side effect is drawing interpolation coefficients from `rng`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossEngine {
    pub loss_type: LossType,
    pub gp_coefficient: f64,
}

impl Default for LossEngine {
    fn default() -> Self {
        LossEngine { loss_type: LossType::WganGp, gp_coefficient: DEFAULT_GP_COEFFICIENT }
    }
}

impl LossEngine {
    pub fn new(loss_type: LossType, gp_coefficient: f64) -> LossEngine {
        LossEngine { loss_type, gp_coefficient }
    }

    /// `mean(D(fake)) - mean(D(real)) + λ · GP`.
    ///
    /// `fake` should be detached from the generator graph; `real` and `fake`
    /// must have the same shape.
    #[allow(clippy::too_many_arguments)]
    pub fn discriminator_loss<D, R>(
        &self,
        tape: &mut Tape,
        critic: &D,
        params: &[Var],
        real: Var,
        fake: Var,
        level: usize,
        alpha: f64,
        rng: &mut R,
    ) -> (Var, CriticDiagnostics)
    where
        D: Progressive + ?Sized,
        R: Rng + ?Sized,
    {
        let real_scores = critic.forward(tape, params, real, level, alpha);
        let fake_scores = critic.forward(tape, params, fake, level, alpha);
        let real_mean = tape.mean(real_scores);
        let fake_mean = tape.mean(fake_scores);
        let mut loss = tape.sub(fake_mean, real_mean);

        let real_score = tape.scalar(real_mean);
        let fake_score = tape.scalar(fake_mean);

        let gradient_penalty = match self.loss_type {
            LossType::WganGp => {
                let gp = gradient_penalty(tape, critic, params, real, fake, level, alpha, rng);
                let value = tape.scalar(gp);
                let weighted = tape.scale(gp, self.gp_coefficient);
                loss = tape.add(loss, weighted);
                Some(value)
            }
            LossType::Wgan => None,
        };

        let diagnostics = CriticDiagnostics {
            real_score,
            fake_score,
            wasserstein: real_score - fake_score,
            gradient_penalty,
        };
        (loss, diagnostics)
    }

    /// `-mean(D(fake))`. `fake` must still be connected to the generator.
    pub fn generator_loss<D>(
        &self,
        tape: &mut Tape,
        critic: &D,
        params: &[Var],
        fake: Var,
        level: usize,
        alpha: f64,
    ) -> Var
    where
        D: Progressive + ?Sized,
    {
        let scores = critic.forward(tape, params, fake, level, alpha);
        let m = tape.mean(scores);
        tape.scale(m, -1.0)
    }
}

/// `mean((‖∇ₓ D(x̂)‖₂ − 1)²)` over `x̂ = ε·real + (1 − ε)·fake`, with one
/// `ε ~ U[0, 1)` per sample.
///
/// The input gradient is recorded on the tape, so the returned penalty can
/// itself be differentiated with respect to the critic parameters.
#[allow(clippy::too_many_arguments)]
pub fn gradient_penalty<D, R>(
    tape: &mut Tape,
    critic: &D,
    params: &[Var],
    real: Var,
    fake: Var,
    level: usize,
    alpha: f64,
    rng: &mut R,
) -> Var
where
    D: Progressive + ?Sized,
    R: Rng + ?Sized,
{
    let (n, cols) = tape.shape(real);
    assert_eq!(tape.shape(fake), (n, cols), "real and fake batches differ in shape");

    let eps = Matrix::uniform(n, 1, rng);
    let real_v = tape.value(real);
    let fake_v = tape.value(fake);
    let mut mixed = Matrix::zeros(n, cols);
    for r in 0..n {
        let e = eps.data[r];
        for c in 0..cols {
            mixed.set(r, c, e * real_v.get(r, c) + (1.0 - e) * fake_v.get(r, c));
        }
    }

    let interpolated = tape.leaf(mixed);
    let scores = critic.forward(tape, params, interpolated, level, alpha);
    let total = tape.sum(scores);
    let grad = tape.grad(total, &[interpolated])[0];
    let norms = tape.row_norms(grad);
    let dev = tape.offset(norms, -1.0);
    let sq = tape.square(dev);
    tape.mean(sq)
}
