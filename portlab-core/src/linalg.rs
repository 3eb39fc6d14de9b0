//! Dense linear algebra for covariance work, on `ndarray`.
//!
//! Universes here are tens of instruments, so a textbook Cholesky
//! factorisation over `Array2<f64>` is all the engines need.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Relative pivot floor below which a matrix is treated as not positive-definite.
const PIVOT_FLOOR: f64 = 1e-12;

/// Square symmetric covariance matrix.
pub type CovMatrix = Array2<f64>;

/// Build from rows. Returns `None` if the rows are not square or not symmetric.
pub fn symmetric_from_rows(rows: &[Vec<f64>]) -> Option<CovMatrix> {
    let n = rows.len();
    if rows.iter().any(|r| r.len() != n) {
        return None;
    }
    let m = Array2::from_shape_fn((n, n), |(i, j)| rows[i][j]);
    is_symmetric(m.view()).then_some(m)
}

pub fn is_symmetric(m: ArrayView2<'_, f64>) -> bool {
    if m.nrows() != m.ncols() {
        return false;
    }
    m.indexed_iter().all(|((i, j), &a)| {
        let b = m[[j, i]];
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
    })
}

pub fn all_finite(m: ArrayView2<'_, f64>) -> bool {
    m.iter().all(|v| v.is_finite())
}

/// Principal submatrix on the given indices.
pub fn submatrix(m: ArrayView2<'_, f64>, idx: &[usize]) -> CovMatrix {
    m.select(Axis(0), idx).select(Axis(1), idx)
}

/// `w·prior + (1 − w)·sample`
pub fn blend(prior: &CovMatrix, sample: &CovMatrix, w: f64) -> CovMatrix {
    prior * w + sample * (1.0 - w)
}

/// Squared Frobenius distance.
pub fn frobenius_dist_sq(a: &CovMatrix, b: &CovMatrix) -> f64 {
    (a - b).mapv(|v| v * v).sum()
}

/// `xᵀ M x`
pub fn quad_form(m: ArrayView2<'_, f64>, x: ArrayView1<'_, f64>) -> f64 {
    x.dot(&m.dot(&x))
}

/// Cholesky factorisation `M = L Lᵀ`. `None` if not positive-definite.
pub fn cholesky(m: ArrayView2<'_, f64>) -> Option<Cholesky> {
    let n = m.nrows();
    if n == 0 || m.ncols() != n || !all_finite(m) {
        return None;
    }
    let max_diag = m.diag().fold(0.0_f64, |acc, &v| acc.max(v));
    if max_diag <= 0.0 {
        return None;
    }
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let pivot = m[[j, j]] - l.slice(s![j, ..j]).dot(&l.slice(s![j, ..j]));
        if pivot <= PIVOT_FLOOR * max_diag {
            return None;
        }
        let ljj = pivot.sqrt();
        l[[j, j]] = ljj;
        for i in (j + 1)..n {
            let off = m[[i, j]] - l.slice(s![i, ..j]).dot(&l.slice(s![j, ..j]));
            l[[i, j]] = off / ljj;
        }
    }
    Some(Cholesky { l })
}

/// Lower-triangular Cholesky factor.
#[derive(Debug, Clone)]
pub struct Cholesky {
    l: Array2<f64>,
}

impl Cholesky {
    /// Solve `M x = b` by forward then backward substitution.
    pub fn solve(&self, b: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = self.l.nrows();
        let mut z = Array1::<f64>::zeros(n);
        for i in 0..n {
            let acc = self.l.slice(s![i, ..i]).dot(&z.slice(s![..i]));
            z[i] = (b[i] - acc) / self.l[[i, i]];
        }
        let mut x = Array1::<f64>::zeros(n);
        for i in (0..n).rev() {
            let acc = self.l.slice(s![i + 1.., i]).dot(&x.slice(s![i + 1..]));
            x[i] = (z[i] - acc) / self.l[[i, i]];
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn cholesky_solves_spd_system() {
        let m = array![[4.0, 2.0, 0.4], [2.0, 5.0, 1.0], [0.4, 1.0, 3.0]];
        let b = array![1.0, 2.0, 3.0];
        let x = cholesky(m.view()).unwrap().solve(b.view());
        let back = m.dot(&x);
        for (got, want) in back.iter().zip(b.iter()) {
            assert!((got - want).abs() < 1e-10);
        }
    }

    #[test]
    fn singular_matrix_has_no_cholesky() {
        let m = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(cholesky(m.view()).is_none());
        assert!(cholesky(CovMatrix::zeros((0, 0)).view()).is_none());
    }

    #[test]
    fn non_finite_matrix_has_no_cholesky() {
        let m = array![[1.0, f64::NAN], [f64::NAN, 1.0]];
        assert!(cholesky(m.view()).is_none());
    }

    #[test]
    fn asymmetric_rows_rejected() {
        assert!(symmetric_from_rows(&[vec![1.0, 0.5], vec![0.2, 1.0]]).is_none());
        assert!(symmetric_from_rows(&[vec![1.0, 0.5], vec![0.5]]).is_none());
        let m = symmetric_from_rows(&[vec![1.0, 0.5], vec![0.5, 2.0]]).unwrap();
        assert_eq!(m[[1, 0]], 0.5);
    }

    #[test]
    fn submatrix_and_quad_form() {
        let m = array![[1.0, 0.1, 0.2], [0.1, 2.0, 0.3], [0.2, 0.3, 3.0]];
        let sub = submatrix(m.view(), &[0, 2]);
        assert_eq!(sub, array![[1.0, 0.2], [0.2, 3.0]]);
        assert!((quad_form(sub.view(), array![1.0, 1.0].view()) - 4.4).abs() < 1e-12);
    }

    #[test]
    fn blend_and_distance() {
        let prior = CovMatrix::eye(2);
        let sample = array![[3.0, 1.0], [1.0, 3.0]];
        let mixed = blend(&prior, &sample, 0.5);
        assert_eq!(mixed, array![[2.0, 0.5], [0.5, 2.0]]);
        assert!((frobenius_dist_sq(&prior, &sample) - 10.0).abs() < 1e-12);
    }
}
