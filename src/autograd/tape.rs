use crate::math::matrix::Matrix;

/// Handle to a node recorded on a [`Tape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var(pub(crate) usize);

impl Var {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Operation that produced a node. Parents always have smaller indices than
/// the node itself, so creation order is a topological order.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    Leaf,
    Add(Var, Var),
    Sub(Var, Var),
    Mul(Var, Var),
    MatMul(Var, Var),
    Transpose(Var),
    Scale(Var, f64),
    Offset(Var),
    BroadcastRows(Var, usize),
    BroadcastCols(Var, usize),
    BroadcastScalar(Var, usize, usize),
    ColumnSums(Var),
    RowSums(Var),
    Sum(Var),
    LeakyRelu(Var, f64),
    Sqrt(Var),
    SafeRecip(Var),
    Upsample2x(Var, usize, usize),
    AvgPool2x(Var, usize, usize),
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) value: Matrix,
    pub(crate) op: Op,
}

/// Append-only record of a computation.
///
/// Every operation evaluates eagerly and records how its value was produced.
/// [`Tape::grad`] walks the record backwards and expresses each
/// vector-Jacobian product with the same operations, appending new nodes.
/// Gradients are therefore ordinary tape values and can be differentiated
/// again, which is what a gradient-norm penalty needs.
#[derive(Debug, Default)]
pub struct Tape {
    pub(crate) nodes: Vec<Node>,
}

impl Tape {
    pub fn new() -> Tape {
        Tape { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, value: Matrix, op: Op) -> Var {
        self.nodes.push(Node { value, op });
        Var(self.nodes.len() - 1)
    }

    /// Records an input, constant or parameter.
    pub fn leaf(&mut self, value: Matrix) -> Var {
        self.push(value, Op::Leaf)
    }

    /// Records a copy of `v` with no history; gradients stop here.
    pub fn detach(&mut self, v: Var) -> Var {
        let value = self.value(v).clone();
        self.leaf(value)
    }

    pub fn value(&self, v: Var) -> &Matrix {
        &self.nodes[v.0].value
    }

    /// Value of a 1×1 node.
    pub fn scalar(&self, v: Var) -> f64 {
        let m = self.value(v);
        debug_assert_eq!(m.shape(), (1, 1));
        m.data[0]
    }

    pub fn shape(&self, v: Var) -> (usize, usize) {
        self.value(v).shape()
    }

    pub fn add(&mut self, a: Var, b: Var) -> Var {
        let value = self.value(a) + self.value(b);
        self.push(value, Op::Add(a, b))
    }

    pub fn sub(&mut self, a: Var, b: Var) -> Var {
        let value = self.value(a) - self.value(b);
        self.push(value, Op::Sub(a, b))
    }

    /// Element-wise product.
    pub fn mul(&mut self, a: Var, b: Var) -> Var {
        let value = self.value(a).hadamard(self.value(b));
        self.push(value, Op::Mul(a, b))
    }

    pub fn matmul(&mut self, a: Var, b: Var) -> Var {
        let value = self.value(a) * self.value(b);
        self.push(value, Op::MatMul(a, b))
    }

    pub fn transpose(&mut self, a: Var) -> Var {
        let value = self.value(a).transpose();
        self.push(value, Op::Transpose(a))
    }

    pub fn scale(&mut self, a: Var, k: f64) -> Var {
        let value = self.value(a).scale(k);
        self.push(value, Op::Scale(a, k))
    }

    /// Adds the constant `c` to every entry.
    pub fn offset(&mut self, a: Var, c: f64) -> Var {
        let value = self.value(a).map(|x| x + c);
        self.push(value, Op::Offset(a))
    }

    /// `1×c → rows×c`.
    pub fn broadcast_rows(&mut self, a: Var, rows: usize) -> Var {
        let value = self.value(a).broadcast_rows(rows);
        self.push(value, Op::BroadcastRows(a, rows))
    }

    /// `r×1 → r×cols`.
    pub fn broadcast_cols(&mut self, a: Var, cols: usize) -> Var {
        let value = self.value(a).broadcast_cols(cols);
        self.push(value, Op::BroadcastCols(a, cols))
    }

    /// `1×1 → rows×cols`.
    pub fn broadcast_scalar(&mut self, a: Var, rows: usize, cols: usize) -> Var {
        let value = Matrix::filled(rows, cols, self.scalar(a));
        self.push(value, Op::BroadcastScalar(a, rows, cols))
    }

    pub fn column_sums(&mut self, a: Var) -> Var {
        let value = self.value(a).column_sums();
        self.push(value, Op::ColumnSums(a))
    }

    pub fn row_sums(&mut self, a: Var) -> Var {
        let value = self.value(a).row_sums();
        self.push(value, Op::RowSums(a))
    }

    pub fn sum(&mut self, a: Var) -> Var {
        let value = Matrix::scalar(self.value(a).sum());
        self.push(value, Op::Sum(a))
    }

    pub fn leaky_relu(&mut self, a: Var, slope: f64) -> Var {
        let value = self.value(a).map(|x| if x > 0.0 { x } else { slope * x });
        self.push(value, Op::LeakyRelu(a, slope))
    }

    pub fn sqrt(&mut self, a: Var) -> Var {
        let value = self.value(a).map(f64::sqrt);
        self.push(value, Op::Sqrt(a))
    }

    /// `1/x`, defined as 0 where `x == 0` so that the norm of a zero
    /// gradient has a zero (sub)gradient instead of a NaN.
    pub fn safe_recip(&mut self, a: Var) -> Var {
        let value = self.value(a).map(|x| if x == 0.0 { 0.0 } else { 1.0 / x });
        self.push(value, Op::SafeRecip(a))
    }

    pub fn upsample2x(&mut self, a: Var, channels: usize, res: usize) -> Var {
        let value = self.value(a).upsample2x(channels, res);
        self.push(value, Op::Upsample2x(a, channels, res))
    }

    pub fn avg_pool2x(&mut self, a: Var, channels: usize, res: usize) -> Var {
        let value = self.value(a).avg_pool2x(channels, res);
        self.push(value, Op::AvgPool2x(a, channels, res))
    }

    // ── Composites ────────────────────────────────────────────────────────

    /// Adds a `1×c` row to every row of `a`.
    pub fn add_row(&mut self, a: Var, row: Var) -> Var {
        let rows = self.value(a).rows;
        let b = self.broadcast_rows(row, rows);
        self.add(a, b)
    }

    /// Multiplies every row of `a` by the matching entry of an `r×1` column.
    pub fn mul_col(&mut self, a: Var, col: Var) -> Var {
        let cols = self.value(a).cols;
        let b = self.broadcast_cols(col, cols);
        self.mul(a, b)
    }

    pub fn mean(&mut self, a: Var) -> Var {
        let n = self.value(a).len().max(1) as f64;
        let s = self.sum(a);
        self.scale(s, 1.0 / n)
    }

    pub fn square(&mut self, a: Var) -> Var {
        self.mul(a, a)
    }

    /// Euclidean norm of every row: `r×c → r×1`.
    pub fn row_norms(&mut self, a: Var) -> Var {
        let sq = self.square(a);
        let s = self.row_sums(sq);
        self.sqrt(s)
    }

    /// `alpha · new + (1 − alpha) · old`.
    pub fn lerp(&mut self, old: Var, new: Var, alpha: f64) -> Var {
        let a = self.scale(new, alpha);
        let b = self.scale(old, 1.0 - alpha);
        self.add(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_values_are_eager() {
        let mut tape = Tape::new();
        let a = tape.leaf(Matrix::from_rows(vec![vec![1.0, -2.0]]));
        let b = tape.leaky_relu(a, 0.1);
        assert_eq!(tape.value(b).data, vec![1.0, -0.2]);
        let s = tape.sum(b);
        assert!((tape.scalar(s) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn safe_recip_maps_zero_to_zero() {
        let mut tape = Tape::new();
        let a = tape.leaf(Matrix::from_rows(vec![vec![0.0, 4.0]]));
        let r = tape.safe_recip(a);
        assert_eq!(tape.value(r).data, vec![0.0, 0.25]);
    }

    #[test]
    fn detach_copies_value_without_history() {
        let mut tape = Tape::new();
        let a = tape.leaf(Matrix::scalar(3.0));
        let b = tape.scale(a, 2.0);
        let d = tape.detach(b);
        assert_eq!(tape.scalar(d), 6.0);
        let grads = tape.grad(d, &[a]);
        assert_eq!(tape.scalar(grads[0]), 0.0);
    }
}
