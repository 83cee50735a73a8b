use serde::{Serialize, Deserialize};

use crate::math::matrix::Matrix;
use crate::network::params::ParamSet;

/// Moment buffers and step counter. Checkpointed alongside the parameters so
/// a resumed run updates exactly as an uninterrupted one would.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamState {
    pub step: u64,
    pub m: Vec<Matrix>,
    pub v: Vec<Matrix>,
}

impl AdamState {
    fn zeros_like(params: &ParamSet) -> AdamState {
        let zeros: Vec<Matrix> = params
            .tensors()
            .iter()
            .map(|t| Matrix::zeros(t.rows, t.cols))
            .collect();
        AdamState { step: 0, m: zeros.clone(), v: zeros }
    }
}

/// Adam with bias correction, one instance per sub-network.
///
/// `base_lr` is the configured rate; `lr` is what the next step uses after
/// the schedule's per-phase scale has been applied.
#[derive(Debug, Clone)]
pub struct Adam {
    pub base_lr: f64,
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    state: AdamState,
}

impl Adam {
    /// Progressive-GAN defaults: β₁ = 0, β₂ = 0.99.
    pub fn new(base_lr: f64, params: &ParamSet) -> Adam {
        Adam::with_betas(base_lr, 0.0, 0.99, params)
    }

    pub fn with_betas(base_lr: f64, beta1: f64, beta2: f64, params: &ParamSet) -> Adam {
        Adam {
            base_lr,
            lr: base_lr,
            beta1,
            beta2,
            eps: 1e-8,
            state: AdamState::zeros_like(params),
        }
    }

    pub fn set_lr_scale(&mut self, scale: f64) {
        self.lr = self.base_lr * scale;
    }

    /// Applies one update. `grads[i]` must match `params.tensors()[i]`.
    pub fn step(&mut self, params: &mut ParamSet, grads: &[Matrix]) {
        assert_eq!(grads.len(), params.len(), "gradient count does not match parameter count");

        self.state.step += 1;
        let t = self.state.step as i32;
        let bc1 = 1.0 - self.beta1.powi(t);
        let bc2 = 1.0 - self.beta2.powi(t);
        let (b1, b2, lr, eps) = (self.beta1, self.beta2, self.lr, self.eps);

        for (i, (param, grad)) in params.tensors_mut().iter_mut().zip(grads.iter()).enumerate() {
            let m = &mut self.state.m[i];
            let v = &mut self.state.v[i];
            for j in 0..param.data.len() {
                let g = grad.data[j];
                m.data[j] = b1 * m.data[j] + (1.0 - b1) * g;
                v.data[j] = b2 * v.data[j] + (1.0 - b2) * g * g;
                let m_hat = m.data[j] / bc1;
                let v_hat = v.data[j] / bc2;
                param.data[j] -= lr * m_hat / (v_hat.sqrt() + eps);
            }
        }
    }

    pub fn state(&self) -> &AdamState {
        &self.state
    }

    /// Checks that `state` has one moment pair per tensor with matching shapes.
    pub fn check_state(&self, state: &AdamState) -> Result<(), String> {
        if state.m.len() != self.state.m.len() || state.v.len() != self.state.v.len() {
            return Err(format!(
                "optimizer holds {} moment buffers, checkpoint has {}/{}",
                self.state.m.len(),
                state.m.len(),
                state.v.len()
            ));
        }
        for (i, own) in self.state.m.iter().enumerate() {
            for (kind, other) in [("m", &state.m[i]), ("v", &state.v[i])] {
                if other.shape() != own.shape() || other.data.len() != own.len() {
                    return Err(format!(
                        "moment {}[{}] has shape {:?}, expected {:?}",
                        kind,
                        i,
                        other.shape(),
                        own.shape()
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn load_state(&mut self, state: AdamState) -> Result<(), String> {
        self.check_state(&state)?;
        self.state = state;
        Ok(())
    }
}
