//! Small dense linear algebra on `ndarray` types.
//!
//! Latent dimensionality is tiny in practice, so plain Gaussian elimination
//! with partial pivoting is used throughout.

use ndarray::{Array1, Array2};

const PIVOT_TOL: f64 = 1e-12;

/// Solves `a x = b`. Returns `None` if `a` is not square, the sizes disagree,
/// or `a` is numerically singular.
pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut aug = Array2::<f64>::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for i in 0..n {
        let max_row = pivot_row(&aug, i, n);
        swap_rows(&mut aug, i, max_row);

        if aug[[i, i]].abs() < PIVOT_TOL {
            return None;
        }

        for k in (i + 1)..n {
            let factor = aug[[k, i]] / aug[[i, i]];
            for j in i..=n {
                aug[[k, j]] -= factor * aug[[i, j]];
            }
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = aug[[i, n]];
        for j in (i + 1)..n {
            sum -= aug[[i, j]] * x[j];
        }
        x[i] = sum / aug[[i, i]];
    }

    Some(x)
}

/// Inverts a square matrix by Gauss-Jordan elimination.
pub fn invert(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }

    let mut work = Array2::<f64>::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            work[[i, j]] = a[[i, j]];
        }
        work[[i, n + i]] = 1.0;
    }

    for i in 0..n {
        let max_row = pivot_row(&work, i, n);
        swap_rows(&mut work, i, max_row);

        let pivot = work[[i, i]];
        if pivot.abs() < PIVOT_TOL {
            return None;
        }
        for j in 0..2 * n {
            work[[i, j]] /= pivot;
        }

        for k in 0..n {
            if k == i {
                continue;
            }
            let factor = work[[k, i]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..2 * n {
                work[[k, j]] -= factor * work[[i, j]];
            }
        }
    }

    let mut inv = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = work[[i, n + j]];
        }
    }
    Some(inv)
}

/// Determinant via LU elimination with partial pivoting.
pub fn determinant(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    if n != a.ncols() {
        return f64::NAN;
    }
    let mut work = a.clone();
    let mut det = 1.0;

    for i in 0..n {
        let max_row = pivot_row(&work, i, n);
        if max_row != i {
            swap_rows(&mut work, i, max_row);
            det = -det;
        }
        let pivot = work[[i, i]];
        if pivot == 0.0 {
            return 0.0;
        }
        det *= pivot;

        for j in (i + 1)..n {
            let factor = work[[j, i]] / pivot;
            for k in i..n {
                work[[j, k]] -= factor * work[[i, k]];
            }
        }
    }

    det
}

/// Lower-triangular Cholesky factor `L` with `a = L Lᵀ`.
/// Returns `None` unless `a` is symmetric positive definite.
pub fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

#[inline]
fn pivot_row(m: &Array2<f64>, col: usize, n: usize) -> usize {
    let mut max_row = col;
    for k in (col + 1)..n {
        if m[[k, col]].abs() > m[[max_row, col]].abs() {
            max_row = k;
        }
    }
    max_row
}

#[inline]
fn swap_rows(m: &mut Array2<f64>, a: usize, b: usize) {
    if a == b {
        return;
    }
    for j in 0..m.ncols() {
        m.swap([a, j], [b, j]);
    }
}
