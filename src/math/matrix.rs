use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;
use std::ops::{Add, Sub, Mul};

/// Dense row-major matrix of `f64`.
///
/// Batches are stored one sample per row. Image samples are flattened
/// channel-major (`[c][y][x]`), so a batch of `n` RGB images at resolution
/// `r` is an `n × 3·r·r` matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Matrix {
        Matrix { rows, cols, data: vec![value; rows * cols] }
    }

    /// 1×1 matrix holding `value`.
    pub fn scalar(value: f64) -> Matrix {
        Matrix::filled(1, 1, value)
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Matrix {
        assert_eq!(data.len(), rows * cols, "data length does not match {}x{}", rows, cols);
        Matrix { rows, cols, data }
    }

    /// Builds a matrix from nested rows; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Matrix {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let n = rows.len();
        let mut data = Vec::with_capacity(n * cols);
        for row in rows {
            assert_eq!(row.len(), cols, "ragged rows");
            data.extend(row);
        }
        Matrix { rows: n, cols, data }
    }

    /// Samples every entry uniformly from [0, 1).
    pub fn uniform<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let data = (0..rows * cols).map(|_| rng.gen::<f64>()).collect();
        Matrix { rows, cols, data }
    }

    /// Samples every entry from N(0, 1).
    pub fn standard_normal<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let data = (0..rows * cols).map(|_| Matrix::sample_standard_normal(rng)).collect();
        Matrix { rows, cols, data }
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Both uniforms live in (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Copies the listed rows, in order, into a new matrix.
    pub fn select_rows(&self, indices: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Matrix { rows: indices.len(), cols: self.cols, data }
    }

    /// Stacks matrices with the same column count on top of each other.
    pub fn vstack(parts: &[Matrix]) -> Matrix {
        let cols = parts.first().map(|m| m.cols).unwrap_or(0);
        let mut data = Vec::new();
        let mut rows = 0;
        for part in parts {
            assert_eq!(part.cols, cols, "vstack column mismatch");
            data.extend_from_slice(&part.data);
            rows += part.rows;
        }
        Matrix { rows, cols, data }
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Element-wise combination of two same-shape matrices.
    pub fn zip_map<F>(&self, other: &Matrix, functor: F) -> Matrix
    where
        F: Fn(f64, f64) -> f64,
    {
        assert_eq!(self.shape(), other.shape(), "Matrices are of incorrect sizes");
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(other.data.iter()).map(|(&a, &b)| functor(a, b)).collect(),
        }
    }

    /// Element-wise (Hadamard) product.
    pub fn hadamard(&self, other: &Matrix) -> Matrix {
        self.zip_map(other, |a, b| a * b)
    }

    pub fn scale(&self, k: f64) -> Matrix {
        self.map(|x| x * k)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.sum() / self.data.len() as f64
    }

    /// Sums each column over all rows: `r×c → 1×c`.
    pub fn column_sums(&self) -> Matrix {
        let mut res = Matrix::zeros(1, self.cols);
        for i in 0..self.rows {
            for (acc, &x) in res.data.iter_mut().zip(self.row(i)) {
                *acc += x;
            }
        }
        res
    }

    /// Sums each row over all columns: `r×c → r×1`.
    pub fn row_sums(&self) -> Matrix {
        let data = (0..self.rows).map(|i| self.row(i).iter().sum()).collect();
        Matrix { rows: self.rows, cols: 1, data }
    }

    /// Repeats a `1×c` row `rows` times.
    pub fn broadcast_rows(&self, rows: usize) -> Matrix {
        assert_eq!(self.rows, 1, "broadcast_rows expects a single row");
        let mut data = Vec::with_capacity(rows * self.cols);
        for _ in 0..rows {
            data.extend_from_slice(&self.data);
        }
        Matrix { rows, cols: self.cols, data }
    }

    /// Repeats an `r×1` column `cols` times.
    pub fn broadcast_cols(&self, cols: usize) -> Matrix {
        assert_eq!(self.cols, 1, "broadcast_cols expects a single column");
        let mut data = Vec::with_capacity(self.rows * cols);
        for &x in &self.data {
            data.extend(std::iter::repeat(x).take(cols));
        }
        Matrix { rows: self.rows, cols, data }
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// Nearest-neighbour 2× upsampling of each row, interpreted as
    /// `channels` planes of `res × res` pixels.
    pub fn upsample2x(&self, channels: usize, res: usize) -> Matrix {
        assert_eq!(self.cols, channels * res * res, "upsample2x shape mismatch");
        let out_res = res * 2;
        let out_cols = channels * out_res * out_res;
        let mut res_m = Matrix::zeros(self.rows, out_cols);
        for r in 0..self.rows {
            let src = self.row(r);
            let dst = &mut res_m.data[r * out_cols..(r + 1) * out_cols];
            for c in 0..channels {
                for y in 0..out_res {
                    for x in 0..out_res {
                        dst[c * out_res * out_res + y * out_res + x] =
                            src[c * res * res + (y / 2) * res + x / 2];
                    }
                }
            }
        }
        res_m
    }

    /// 2×2 average pooling of each row, interpreted as `channels` planes of
    /// `res × res` pixels (`res` must be even).
    pub fn avg_pool2x(&self, channels: usize, res: usize) -> Matrix {
        assert_eq!(self.cols, channels * res * res, "avg_pool2x shape mismatch");
        assert!(res % 2 == 0, "avg_pool2x needs an even resolution");
        let out_res = res / 2;
        let out_cols = channels * out_res * out_res;
        let mut res_m = Matrix::zeros(self.rows, out_cols);
        for r in 0..self.rows {
            let src = self.row(r);
            let dst = &mut res_m.data[r * out_cols..(r + 1) * out_cols];
            for c in 0..channels {
                for y in 0..res {
                    for x in 0..res {
                        dst[c * out_res * out_res + (y / 2) * out_res + x / 2] +=
                            0.25 * src[c * res * res + y * res + x];
                    }
                }
            }
        }
        res_m
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Add for &Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        self.zip_map(rhs, |a, b| a + b)
    }
}

impl Add for Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        &self + &rhs
    }
}

impl Sub for &Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Self::Output {
        self.zip_map(rhs, |a, b| a - b)
    }
}

impl Sub for Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Self::Output {
        &self - &rhs
    }
}

/// Matrix product.
impl Mul for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        if self.cols != rhs.rows {
            panic!("Matrices are of incorrect sizes: {}x{} * {}x{}", self.rows, self.cols, rhs.rows, rhs.cols)
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            let out = &mut res.data[i * rhs.cols..(i + 1) * rhs.cols];
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                if a == 0.0 {
                    continue;
                }
                let rhs_row = &rhs.data[k * rhs.cols..(k + 1) * rhs.cols];
                for (o, &b) in out.iter_mut().zip(rhs_row) {
                    *o += a * b;
                }
            }
        }
        res
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        &self * &rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn matmul_matches_hand_computation() {
        let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = Matrix::from_rows(vec![vec![5.0], vec![6.0]]);
        let c = &a * &b;
        assert_eq!(c, Matrix::from_rows(vec![vec![17.0], vec![39.0]]));
    }

    #[test]
    fn transpose_swaps_indices() {
        let a = Matrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let t = a.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.get(2, 1), 6.0);
        assert_eq!(t.get(0, 1), 4.0);
    }

    #[test]
    fn avg_pool_inverts_upsample() {
        let mut rng = StdRng::seed_from_u64(7);
        let img = Matrix::uniform(2, 3 * 4 * 4, &mut rng);
        let up = img.upsample2x(3, 4);
        assert_eq!(up.cols, 3 * 8 * 8);
        let down = up.avg_pool2x(3, 8);
        for (a, b) in down.data.iter().zip(img.data.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn reductions_and_broadcasts() {
        let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(a.column_sums(), Matrix::from_rows(vec![vec![4.0, 6.0]]));
        assert_eq!(a.row_sums(), Matrix::from_rows(vec![vec![3.0], vec![7.0]]));
        assert_eq!(a.column_sums().broadcast_rows(2).rows, 2);
        assert_eq!(a.row_sums().broadcast_cols(3).get(1, 2), 7.0);
        assert_eq!(a.sum(), 10.0);
    }
}
