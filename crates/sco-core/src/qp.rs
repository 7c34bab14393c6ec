//! The canonical QP representation produced by the assembler and consumed by
//! the QP solver gateway.

use faer::Mat;

use crate::error::{ScoError, ScoResult};

/// A quadratic program in canonical box-constrained form:
///
/// ```text
/// minimize    0.5 * z^T P z + q^T z
/// subject to  lb <= A z <= ub
/// ```
///
/// `P` is `N x N` and symmetric (only assembled up to the upper-left `n x n`
/// block; the slack rows/columns of `P` are zero). `A` is `C x N`. `lb` and
/// `ub` each have length `C`, with `lb <= ub` component-wise.
#[derive(Debug, Clone)]
pub struct QpInputs {
    pub p: Mat<f64>,
    pub q: Vec<f64>,
    pub a: Mat<f64>,
    pub lb: Vec<f64>,
    pub ub: Vec<f64>,
}

impl QpInputs {
    /// Number of decision variables N (columns of A, length of q).
    pub fn num_vars(&self) -> usize {
        self.q.len()
    }

    /// Number of constraint rows C (rows of A, length of lb/ub).
    pub fn num_constraints(&self) -> usize {
        self.lb.len()
    }

    /// Validate the internal shape invariants: P is N x N, A is C x N, lb/ub
    /// have length C, and lb <= ub component-wise. Does not check finiteness
    /// — see [`QpInputs::validate_finite`].
    pub fn validate_shapes(&self) -> ScoResult<()> {
        let n = self.num_vars();
        let c = self.num_constraints();

        if self.p.nrows() != n || self.p.ncols() != n {
            return Err(ScoError::Configuration(format!(
                "P has shape {}x{}, expected {n}x{n}",
                self.p.nrows(),
                self.p.ncols()
            )));
        }
        if self.a.nrows() != c || self.a.ncols() != n {
            return Err(ScoError::Configuration(format!(
                "A has shape {}x{}, expected {c}x{n}",
                self.a.nrows(),
                self.a.ncols()
            )));
        }
        if self.ub.len() != c {
            return Err(ScoError::Configuration(format!(
                "ub has length {}, expected {c}",
                self.ub.len()
            )));
        }
        for i in 0..c {
            if self.lb[i] > self.ub[i] {
                return Err(ScoError::Configuration(format!(
                    "row {i}: lb ({}) > ub ({})",
                    self.lb[i], self.ub[i]
                )));
            }
        }
        Ok(())
    }

    /// Fatal-numerical-error check: every entry of P, q, A, lb, ub must be
    /// finite (infinities are meaningful only as constraint bounds, never as
    /// matrix/cost entries).
    pub fn validate_finite(&self) -> ScoResult<()> {
        for j in 0..self.p.ncols() {
            for i in 0..self.p.nrows() {
                if !self.p.read(i, j).is_finite() {
                    return Err(ScoError::Numerical(format!(
                        "P[{i},{j}] = {} is not finite",
                        self.p.read(i, j)
                    )));
                }
            }
        }
        for (i, v) in self.q.iter().enumerate() {
            if !v.is_finite() {
                return Err(ScoError::Numerical(format!("q[{i}] = {v} is not finite")));
            }
        }
        for j in 0..self.a.ncols() {
            for i in 0..self.a.nrows() {
                if !self.a.read(i, j).is_finite() {
                    return Err(ScoError::Numerical(format!(
                        "A[{i},{j}] = {} is not finite",
                        self.a.read(i, j)
                    )));
                }
            }
        }
        for (i, v) in self.lb.iter().enumerate() {
            if v.is_nan() {
                return Err(ScoError::Numerical(format!("lb[{i}] is NaN")));
            }
        }
        for (i, v) in self.ub.iter().enumerate() {
            if v.is_nan() {
                return Err(ScoError::Numerical(format!("ub[{i}] is NaN")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_qp(n: usize) -> QpInputs {
        let mut p = Mat::zeros(n, n);
        for i in 0..n {
            p.write(i, i, 1.0);
        }
        QpInputs {
            p,
            q: vec![0.0; n],
            a: Mat::zeros(0, n),
            lb: vec![],
            ub: vec![],
        }
    }

    #[test]
    fn test_validate_shapes_accepts_well_formed_qp() {
        assert!(identity_qp(3).validate_shapes().is_ok());
    }

    #[test]
    fn test_validate_shapes_rejects_bound_crossing() {
        let mut qp = identity_qp(2);
        qp.a = Mat::zeros(1, 2);
        qp.lb = vec![5.0];
        qp.ub = vec![1.0];
        assert!(qp.validate_shapes().is_err());
    }

    #[test]
    fn test_validate_finite_rejects_nan_in_p() {
        let mut qp = identity_qp(2);
        qp.p.write(0, 1, f64::NAN);
        assert!(qp.validate_finite().is_err());
    }

    #[test]
    fn test_validate_finite_accepts_infinite_bounds() {
        let mut qp = identity_qp(2);
        qp.a = Mat::zeros(1, 2);
        qp.lb = vec![f64::NEG_INFINITY];
        qp.ub = vec![f64::INFINITY];
        assert!(qp.validate_finite().is_ok());
    }
}
