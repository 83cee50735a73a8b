pub mod loss_type;
pub mod wgan;

pub use loss_type::LossType;
pub use wgan::{gradient_penalty, CriticDiagnostics, LossEngine};
