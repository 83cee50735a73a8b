use crate::autograd::tape::{Op, Tape, Var};
use crate::math::matrix::Matrix;

impl Tape {
    /// Gradients of `output` with respect to each of `wrt`.
    ///
    /// The output is seeded with ones of its own shape, so a non-scalar
    /// output is differentiated as the sum of its entries. Every returned
    /// gradient is a node on this tape; a `wrt` entry with no path to
    /// `output` gets a zero leaf.
    pub fn grad(&mut self, output: Var, wrt: &[Var]) -> Vec<Var> {
        let needed = self.requires_grad(output, wrt);

        let (rows, cols) = self.shape(output);
        let seed = self.leaf(Matrix::filled(rows, cols, 1.0));

        let mut grads: Vec<Option<Var>> = vec![None; output.0 + 1];
        grads[output.0] = Some(seed);

        for i in (0..=output.0).rev() {
            let Some(g) = grads[i] else { continue };
            if !needed[i] {
                continue;
            }
            let op = self.nodes[i].op.clone();
            self.propagate(Var(i), op, g, &needed, &mut grads);
        }

        wrt.iter()
            .map(|&v| match grads.get(v.0).copied().flatten() {
                Some(g) => g,
                None => {
                    let (r, c) = self.shape(v);
                    self.leaf(Matrix::zeros(r, c))
                }
            })
            .collect()
    }

    /// Marks nodes lying on a path from any of `wrt` to `output`.
    fn requires_grad(&self, output: Var, wrt: &[Var]) -> Vec<bool> {
        let mut needed = vec![false; output.0 + 1];
        for v in wrt {
            if v.0 <= output.0 {
                needed[v.0] = true;
            }
        }
        for i in 0..=output.0 {
            if needed[i] {
                continue;
            }
            needed[i] = parents(&self.nodes[i].op).iter().any(|p| needed[p.0]);
        }
        needed
    }

    fn propagate(&mut self, node: Var, op: Op, g: Var, needed: &[bool], grads: &mut [Option<Var>]) {
        match op {
            Op::Leaf => {}
            Op::Add(a, b) => {
                self.accumulate(grads, needed, a, g);
                self.accumulate(grads, needed, b, g);
            }
            Op::Sub(a, b) => {
                self.accumulate(grads, needed, a, g);
                if needed[b.0] {
                    let neg = self.scale(g, -1.0);
                    self.accumulate(grads, needed, b, neg);
                }
            }
            Op::Mul(a, b) => {
                if needed[a.0] {
                    let ga = self.mul(g, b);
                    self.accumulate(grads, needed, a, ga);
                }
                if needed[b.0] {
                    let gb = self.mul(g, a);
                    self.accumulate(grads, needed, b, gb);
                }
            }
            Op::MatMul(a, b) => {
                if needed[a.0] {
                    let bt = self.transpose(b);
                    let ga = self.matmul(g, bt);
                    self.accumulate(grads, needed, a, ga);
                }
                if needed[b.0] {
                    let at = self.transpose(a);
                    let gb = self.matmul(at, g);
                    self.accumulate(grads, needed, b, gb);
                }
            }
            Op::Transpose(a) => {
                let ga = self.transpose(g);
                self.accumulate(grads, needed, a, ga);
            }
            Op::Scale(a, k) => {
                let ga = self.scale(g, k);
                self.accumulate(grads, needed, a, ga);
            }
            Op::Offset(a) => self.accumulate(grads, needed, a, g),
            Op::BroadcastRows(a, _) => {
                let ga = self.column_sums(g);
                self.accumulate(grads, needed, a, ga);
            }
            Op::BroadcastCols(a, _) => {
                let ga = self.row_sums(g);
                self.accumulate(grads, needed, a, ga);
            }
            Op::BroadcastScalar(a, _, _) => {
                let ga = self.sum(g);
                self.accumulate(grads, needed, a, ga);
            }
            Op::ColumnSums(a) => {
                let rows = self.value(a).rows;
                let ga = self.broadcast_rows(g, rows);
                self.accumulate(grads, needed, a, ga);
            }
            Op::RowSums(a) => {
                let cols = self.value(a).cols;
                let ga = self.broadcast_cols(g, cols);
                self.accumulate(grads, needed, a, ga);
            }
            Op::Sum(a) => {
                let (rows, cols) = self.shape(a);
                let ga = self.broadcast_scalar(g, rows, cols);
                self.accumulate(grads, needed, a, ga);
            }
            Op::LeakyRelu(a, slope) => {
                // The mask is piecewise constant, so it enters as a leaf.
                let mask = self.value(a).map(|x| if x > 0.0 { 1.0 } else { slope });
                let mask = self.leaf(mask);
                let ga = self.mul(g, mask);
                self.accumulate(grads, needed, a, ga);
            }
            Op::Sqrt(a) => {
                // d√x = 1 / (2√x), written in terms of this node's output.
                let inv = self.safe_recip(node);
                let half = self.scale(inv, 0.5);
                let ga = self.mul(g, half);
                self.accumulate(grads, needed, a, ga);
            }
            Op::SafeRecip(a) => {
                // d(1/x) = −1/x², i.e. −y².
                let y2 = self.square(node);
                let neg = self.scale(y2, -1.0);
                let ga = self.mul(g, neg);
                self.accumulate(grads, needed, a, ga);
            }
            Op::Upsample2x(a, channels, res) => {
                // Adjoint of nearest-neighbour upsampling is 2×2 sum pooling.
                let pooled = self.avg_pool2x(g, channels, res * 2);
                let ga = self.scale(pooled, 4.0);
                self.accumulate(grads, needed, a, ga);
            }
            Op::AvgPool2x(a, channels, res) => {
                let up = self.upsample2x(g, channels, res / 2);
                let ga = self.scale(up, 0.25);
                self.accumulate(grads, needed, a, ga);
            }
        }
    }

    fn accumulate(&mut self, grads: &mut [Option<Var>], needed: &[bool], target: Var, g: Var) {
        if !needed[target.0] {
            return;
        }
        grads[target.0] = Some(match grads[target.0] {
            Some(prev) => self.add(prev, g),
            None => g,
        });
    }
}

fn parents(op: &Op) -> Vec<Var> {
    match *op {
        Op::Leaf => vec![],
        Op::Add(a, b) | Op::Sub(a, b) | Op::Mul(a, b) | Op::MatMul(a, b) => vec![a, b],
        Op::Transpose(a)
        | Op::Scale(a, _)
        | Op::Offset(a)
        | Op::BroadcastRows(a, _)
        | Op::BroadcastCols(a, _)
        | Op::BroadcastScalar(a, _, _)
        | Op::ColumnSums(a)
        | Op::RowSums(a)
        | Op::Sum(a)
        | Op::LeakyRelu(a, _)
        | Op::Sqrt(a)
        | Op::SafeRecip(a)
        | Op::Upsample2x(a, _, _)
        | Op::AvgPool2x(a, _, _) => vec![a],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Central finite difference of `f` at every entry of `x`.
    fn numeric_grad<F: Fn(&Matrix) -> f64>(x: &Matrix, f: F) -> Matrix {
        let h = 1e-6;
        let mut out = Matrix::zeros(x.rows, x.cols);
        for i in 0..x.data.len() {
            let mut plus = x.clone();
            plus.data[i] += h;
            let mut minus = x.clone();
            minus.data[i] -= h;
            out.data[i] = (f(&plus) - f(&minus)) / (2.0 * h);
        }
        out
    }

    #[test]
    fn matmul_gradient_matches_finite_difference() {
        let w = Matrix::from_rows(vec![vec![0.5, -1.0], vec![2.0, 0.3], vec![-0.7, 1.1]]);
        let x = Matrix::from_rows(vec![vec![1.0, 2.0, -1.0], vec![0.5, -0.5, 3.0]]);

        let forward = |tape: &mut Tape, xv: Var, wv: Var| {
            let h = tape.matmul(xv, wv);
            let h = tape.leaky_relu(h, 0.2);
            let sq = tape.square(h);
            tape.sum(sq)
        };

        let mut tape = Tape::new();
        let xv = tape.leaf(x.clone());
        let wv = tape.leaf(w.clone());
        let out = forward(&mut tape, xv, wv);
        let g = tape.grad(out, &[wv])[0];
        let analytic = tape.value(g).clone();

        let numeric = numeric_grad(&w, |wm| {
            let mut t = Tape::new();
            let xv = t.leaf(x.clone());
            let wv = t.leaf(wm.clone());
            let o = forward(&mut t, xv, wv);
            t.scalar(o)
        });

        for (a, n) in analytic.data.iter().zip(numeric.data.iter()) {
            assert!((a - n).abs() < 1e-5, "analytic {} vs numeric {}", a, n);
        }
    }

    #[test]
    fn second_order_gradient_of_cubic() {
        // f(x) = x³ ; f'(x) = 3x² ; d/dx of f'(x) = 6x
        let mut tape = Tape::new();
        let x = tape.leaf(Matrix::scalar(2.0));
        let x2 = tape.mul(x, x);
        let x3 = tape.mul(x2, x);
        let g = tape.grad(x3, &[x])[0];
        assert!(close(tape.scalar(g), 12.0));
        let gg = tape.grad(g, &[x])[0];
        assert!(close(tape.scalar(gg), 12.0));
    }

    #[test]
    fn gradient_of_norm_penalty_flows_to_weights() {
        // penalty(w) = (‖∂/∂x sum(x·w)‖ − 1)² = (‖w‖ − 1)²  for a 1-row x
        let mut tape = Tape::new();
        let x = tape.leaf(Matrix::from_rows(vec![vec![0.3, -0.2]]));
        let w = tape.leaf(Matrix::from_rows(vec![vec![3.0], vec![4.0]]));
        let y = tape.matmul(x, w);
        let s = tape.sum(y);
        let gx = tape.grad(s, &[x])[0];
        let norm = tape.row_norms(gx);
        let shifted = tape.offset(norm, -1.0);
        let sq = tape.square(shifted);
        let penalty = tape.mean(sq);
        assert!(close(tape.scalar(penalty), 16.0));

        // d/dw (‖w‖ − 1)² = 2(‖w‖ − 1) · w/‖w‖ = 2·4·(0.6, 0.8)
        let gw = tape.grad(penalty, &[w])[0];
        let gw = tape.value(gw);
        assert!(close(gw.data[0], 4.8));
        assert!(close(gw.data[1], 6.4));
    }

    #[test]
    fn zero_norm_has_finite_gradient() {
        let mut tape = Tape::new();
        let x = tape.leaf(Matrix::zeros(2, 3));
        let n = tape.row_norms(x);
        let s = tape.sum(n);
        let g = tape.grad(s, &[x])[0];
        assert!(tape.value(g).is_finite());
    }

    #[test]
    fn pooling_gradients_are_adjoint() {
        let mut tape = Tape::new();
        let x = tape.leaf(Matrix::filled(1, 16, 1.0));
        let p = tape.avg_pool2x(x, 1, 4);
        let s = tape.sum(p);
        let g = tape.grad(s, &[x])[0];
        assert!(tape.value(g).data.iter().all(|&v| close(v, 0.25)));

        let y = tape.leaf(Matrix::filled(1, 4, 1.0));
        let u = tape.upsample2x(y, 1, 2);
        let s = tape.sum(u);
        let g = tape.grad(s, &[y])[0];
        assert!(tape.value(g).data.iter().all(|&v| close(v, 4.0)));
    }
}
