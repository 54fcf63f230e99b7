//! General matrix inversion by Gauss-Jordan elimination with partial pivoting.

use nalgebra::DMatrix;

use crate::{Error, Result};

/// Pivots with absolute value below this are treated as zero.
const SINGULAR_EPS: f64 = 1e-12;

/// Invert a square matrix.
///
/// Used where a matrix is expected to be positive definite but the Cholesky
/// factorization rejected it.
pub fn invert(a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let (rows, cols) = a.shape();
    if rows != cols {
        return Err(Error::shape(
            "square matrix",
            format!("({}, {})", rows, cols),
        ));
    }

    let n = rows;
    let mut m = a.clone();
    let mut inv = DMatrix::<f64>::identity(n, n);

    for col in 0..n {
        // Partial pivoting: largest magnitude at or below the diagonal
        let mut pivot_row = col;
        let mut pivot_abs = m[(col, col)].abs();
        for r in (col + 1)..n {
            let v = m[(r, col)].abs();
            if v > pivot_abs {
                pivot_abs = v;
                pivot_row = r;
            }
        }
        if pivot_abs < SINGULAR_EPS || pivot_abs.is_nan() {
            return Err(Error::Singular);
        }
        if pivot_row != col {
            m.swap_rows(pivot_row, col);
            inv.swap_rows(pivot_row, col);
        }

        let pivot = m[(col, col)];
        for j in 0..n {
            m[(col, j)] /= pivot;
            inv[(col, j)] /= pivot;
        }

        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = m[(r, col)];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                m[(r, j)] -= factor * m[(col, j)];
                inv[(r, j)] -= factor * inv[(col, j)];
            }
        }
    }

    Ok(inv)
}
