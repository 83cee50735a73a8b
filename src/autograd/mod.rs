//! Tape-based reverse-mode differentiation with differentiable gradients.

mod backward;
pub mod tape;

pub use tape::{Tape, Var};
