use crate::autograd::{Tape, Var};

const EPS: f64 = 1e-8;

/// Pixelwise feature normalisation: scales each row to unit RMS.
///
/// `x / sqrt(mean(x², row) + ε)`
pub fn pixel_norm(tape: &mut Tape, x: Var) -> Var {
    let cols = tape.value(x).cols.max(1) as f64;
    let sq = tape.square(x);
    let sums = tape.row_sums(sq);
    let mean = tape.scale(sums, 1.0 / cols);
    let mean = tape.offset(mean, EPS);
    let rms = tape.sqrt(mean);
    let inv = tape.safe_recip(rms);
    tape.mul_col(x, inv)
}
