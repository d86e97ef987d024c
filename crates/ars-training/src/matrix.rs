//! Dense row-major matrix used for policy weights and perturbation directions.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
#[display("expected a {expected_rows}x{expected_cols} matrix, got {rows}x{cols}")]
pub struct ShapeError {
    pub expected_rows: usize,
    pub expected_cols: usize,
    pub rows: usize,
    pub cols: usize,
}

/// Real matrix with `rows × cols` entries stored row by row.
///
/// Serializes as a list of rows so that checkpoints stay readable by any JSON
/// tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Builds a matrix by evaluating `f(row, col)` for every entry.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    /// Samples every entry independently from the standard normal distribution.
    pub fn standard_normal<R>(rows: usize, cols: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self::from_fn(rows, cols, |_, _| rng.sample(StandardNormal))
    }

    /// Builds a matrix from a list of equally long rows.
    ///
    /// An empty list yields a `0 × 0` matrix.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ShapeError> {
        let cols = rows.first().map_or(0, Vec::len);
        let row_count = rows.len();
        let mut data = Vec::with_capacity(row_count * cols);
        for row in rows {
            if row.len() != cols {
                return Err(ShapeError {
                    expected_rows: row_count,
                    expected_cols: cols,
                    rows: row_count,
                    cols: row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Self {
            rows: row_count,
            cols,
            data,
        })
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Fails unless the matrix is `rows × cols`.
    pub fn check_shape(&self, rows: usize, cols: usize) -> Result<(), ShapeError> {
        if self.shape() == (rows, cols) {
            Ok(())
        } else {
            Err(ShapeError {
                expected_rows: rows,
                expected_cols: cols,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl ExactSizeIterator<Item = &[f64]> {
        (0..self.rows).map(|r| self.row(r))
    }

    /// Entries in row-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Computes `(self + scale·offset) · v`.
    ///
    /// With `offset == None` this is the plain product `self · v`.
    ///
    /// # Panics
    ///
    /// Panics if `v.len() != self.cols()` or `offset` has a different shape.
    #[must_use]
    pub fn mul_vec_offset(&self, v: &[f64], offset: Option<(&Matrix, f64)>) -> Vec<f64> {
        assert_eq!(v.len(), self.cols, "vector length mismatch");
        if let Some((offset, _)) = offset {
            assert_eq!(offset.shape(), self.shape(), "offset shape mismatch");
        }
        (0..self.rows)
            .map(|r| {
                let row = self.row(r);
                match offset {
                    None => row.iter().zip(v).map(|(w, x)| w * x).sum(),
                    Some((offset, scale)) => row
                        .iter()
                        .zip(offset.row(r))
                        .zip(v)
                        .map(|((w, d), x)| (w + scale * d) * x)
                        .sum(),
                }
            })
            .collect()
    }

    /// Computes `self · v`.
    #[must_use]
    pub fn mul_vec(&self, v: &[f64]) -> Vec<f64> {
        self.mul_vec_offset(v, None)
    }

    /// In-place `self += scale·other`.
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ.
    pub fn add_scaled(&mut self, scale: f64, other: &Matrix) {
        assert_eq!(self.shape(), other.shape(), "matrix shape mismatch");
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += scale * b;
        }
    }
}

impl Serialize for Matrix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.iter_rows())
    }
}

impl<'de> Deserialize<'de> for Matrix {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let rows = Vec::<Vec<f64>>::deserialize(deserializer)?;
        Matrix::from_rows(rows).map_err(|e| serde::de::Error::custom(format!("ragged matrix: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    use super::*;

    #[test]
    fn test_mul_vec() {
        let m = Matrix::from_rows(vec![vec![1.0, 2.0], vec![-1.0, 0.5], vec![0.0, 3.0]]).unwrap();
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.mul_vec(&[2.0, 4.0]), vec![10.0, 0.0, 12.0]);
    }

    #[test]
    fn test_mul_vec_offset_matches_explicit_sum() {
        let m = Matrix::from_fn(2, 3, |r, c| (r * 3 + c) as f64);
        let d = Matrix::from_fn(2, 3, |r, c| if r == c { 1.0 } else { -0.5 });
        let v = [0.3, -1.0, 2.0];

        let mut explicit = m.clone();
        explicit.add_scaled(-0.1, &d);
        let expected = explicit.mul_vec(&v);
        let actual = m.mul_vec_offset(&v, Some((&d, -0.1)));
        for (a, e) in actual.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_standard_normal_is_seeded() {
        let a = Matrix::standard_normal(3, 4, &mut Pcg64::seed_from_u64(5));
        let b = Matrix::standard_normal(3, 4, &mut Pcg64::seed_from_u64(5));
        assert_eq!(a, b);
        assert!(a.as_slice().iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(err.cols, 1);
        assert_eq!(err.expected_cols, 2);
    }

    #[test]
    fn test_serializes_as_rows() {
        let m = Matrix::from_rows(vec![vec![1.0, 2.5], vec![-3.0, 0.0]]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "[[1.0,2.5],[-3.0,0.0]]");
        let back: Matrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);

        let ragged: Result<Matrix, _> = serde_json::from_str("[[1.0],[2.0,3.0]]");
        assert!(ragged.unwrap_err().to_string().contains("ragged matrix"));
    }

    #[test]
    fn test_check_shape() {
        let m = Matrix::zeros(2, 5);
        assert!(m.check_shape(2, 5).is_ok());
        assert!(m.check_shape(5, 2).is_err());
    }
}
