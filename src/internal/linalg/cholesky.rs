//! Cholesky factorization and solve for symmetric positive-definite matrices.

use nalgebra::DMatrix;

use crate::{Error, Result};

/// Triangular Cholesky factor of a symmetric positive-definite matrix.
///
/// `lower == true` means `factor` is `L` with `A = L * L^T`; otherwise it is
/// `U` with `A = U^T * U`. The unused triangle is exactly zero.
#[derive(Clone, Debug, PartialEq)]
pub struct CholeskyFactor {
    pub factor: DMatrix<f64>,
    pub lower: bool,
}

impl CholeskyFactor {
    /// Order of the factored matrix.
    pub fn order(&self) -> usize {
        self.factor.nrows()
    }

    /// Rebuild the original matrix (`L * L^T` or `U^T * U`).
    pub fn reconstruct(&self) -> DMatrix<f64> {
        if self.lower {
            &self.factor * self.factor.transpose()
        } else {
            self.factor.transpose() * &self.factor
        }
    }
}

/// Factor a symmetric positive-definite matrix.
///
/// Only the triangle selected by `lower` is read. Fails with
/// `Error::NotPositiveDefinite` as soon as a diagonal pivot is `<= 0`, checked
/// leading minor by leading minor.
pub fn cholesky_factor(a: &DMatrix<f64>, lower: bool) -> Result<CholeskyFactor> {
    let (rows, cols) = a.shape();
    if rows != cols {
        return Err(Error::shape(
            "square matrix",
            format!("({}, {})", rows, cols),
        ));
    }

    let n = rows;
    let mut l = DMatrix::<f64>::zeros(n, n);

    // Build L column by column. For the upper variant, U = L^T is read from
    // the upper triangle of `a` and written transposed at the end.
    for j in 0..n {
        let a_jj = a[(j, j)];
        let mut sum = 0.0;
        for k in 0..j {
            sum += l[(j, k)] * l[(j, k)];
        }
        let pivot = a_jj - sum;
        if pivot <= 0.0 || pivot.is_nan() {
            return Err(Error::NotPositiveDefinite { index: j, pivot });
        }
        let d = pivot.sqrt();
        l[(j, j)] = d;

        for i in (j + 1)..n {
            let a_ij = if lower { a[(i, j)] } else { a[(j, i)] };
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[(i, k)] * l[(j, k)];
            }
            l[(i, j)] = (a_ij - sum) / d;
        }
    }

    let factor = if lower { l } else { l.transpose() };
    Ok(CholeskyFactor { factor, lower })
}

/// Solve `A * X = B` given the Cholesky factor of `A`.
///
/// `b` may hold one or many right-hand-side columns. Forward elimination is
/// followed by back substitution, dividing by the diagonal pivot each time.
pub fn cholesky_solve(chol: &CholeskyFactor, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = chol.order();
    if b.nrows() != n {
        return Err(Error::shape(
            format!("right-hand side with {} rows", n),
            format!("({}, {})", b.nrows(), b.ncols()),
        ));
    }

    let t = &chol.factor;
    let mut x = b.clone();

    for c in 0..b.ncols() {
        // Forward: L * y = b (lower) or U^T * y = b (upper)
        for i in 0..n {
            let mut sum = x[(i, c)];
            for k in 0..i {
                let t_ik = if chol.lower { t[(i, k)] } else { t[(k, i)] };
                sum -= t_ik * x[(k, c)];
            }
            x[(i, c)] = sum / t[(i, i)];
        }

        // Backward: L^T * x = y (lower) or U * x = y (upper)
        for i in (0..n).rev() {
            let mut sum = x[(i, c)];
            for k in (i + 1)..n {
                let t_ik = if chol.lower { t[(k, i)] } else { t[(i, k)] };
                sum -= t_ik * x[(k, c)];
            }
            x[(i, c)] = sum / t[(i, i)];
        }
    }

    Ok(x)
}
