//! The QP Solver Gateway: translates a canonical `lb <= Az <= ub` program
//! into Clarabel's conic form `Ax + s = b, s in K` and invokes the solver.
//!
//! Clarabel wants one cone per row, not a box per row, so every canonical
//! row is rewritten as one or two conic rows depending on which of `lb`/`ub`
//! are finite:
//!
//! - `lb == ub`: a single `ZeroConeT` row, `Az = lb`.
//! - only `ub` finite: a single `NonnegativeConeT` row, `Az <= ub`.
//! - only `lb` finite: a single `NonnegativeConeT` row on `-Az <= -lb`.
//! - both finite (and distinct): two `NonnegativeConeT` rows, one per bound.
//!
//! Consecutive rows of the same cone type are merged into one run-length
//! cone, following the same accumulation idiom used for the power-flow
//! conic backend this gateway is modeled on.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use sco_core::{QpInputs, ScoError, ScoResult};

/// Solve a canonical QP and return the primal solution `z`.
///
/// Any non-terminal Clarabel status (`Solved`, `AlmostSolved`) is accepted;
/// infeasible/unbounded/numerical-error statuses are reported as
/// [`ScoError::Solver`].
pub fn solve_qp(qp: &QpInputs) -> ScoResult<Vec<f64>> {
    qp.validate_shapes()?;
    qp.validate_finite()?;

    let n = qp.num_vars();

    // P must be supplied upper-triangular; the assembler only ever writes
    // into the upper-left n_x x n_x block, so transposing is unnecessary,
    // but we still only take entries with row <= col to satisfy Clarabel.
    let mut p_cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for j in 0..n {
        for i in 0..=j {
            let v = qp.p.read(i, j);
            if v != 0.0 {
                p_cols[j].push((i, v));
            }
        }
    }
    let p_mat = cols_to_csc(n, n, &p_cols);

    let mut a_cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut rhs: Vec<f64> = Vec::new();
    let mut cones: Vec<SupportedConeT<f64>> = Vec::new();

    let push_row = |coeffs: &[(usize, f64)],
                    b: f64,
                    cone_is_zero: bool,
                    a_cols: &mut Vec<Vec<(usize, f64)>>,
                    rhs: &mut Vec<f64>,
                    cones: &mut Vec<SupportedConeT<f64>>| {
        let row_idx = rhs.len();
        for &(col, val) in coeffs {
            a_cols[col].push((row_idx, val));
        }
        rhs.push(b);
        match (cone_is_zero, cones.last_mut()) {
            (true, Some(SupportedConeT::ZeroConeT(k))) => *k += 1,
            (true, _) => cones.push(SupportedConeT::ZeroConeT(1)),
            (false, Some(SupportedConeT::NonnegativeConeT(k))) => *k += 1,
            (false, _) => cones.push(SupportedConeT::NonnegativeConeT(1)),
        }
    };

    for r in 0..qp.num_constraints() {
        let coeffs: Vec<(usize, f64)> = (0..n)
            .filter_map(|j| {
                let v = qp.a.read(r, j);
                if v != 0.0 {
                    Some((j, v))
                } else {
                    None
                }
            })
            .collect();
        let lb = qp.lb[r];
        let ub = qp.ub[r];

        if lb == ub {
            push_row(&coeffs, lb, true, &mut a_cols, &mut rhs, &mut cones);
            continue;
        }
        if ub.is_finite() {
            push_row(&coeffs, ub, false, &mut a_cols, &mut rhs, &mut cones);
        }
        if lb.is_finite() {
            let negated: Vec<(usize, f64)> = coeffs.iter().map(|&(c, v)| (c, -v)).collect();
            push_row(&negated, -lb, false, &mut a_cols, &mut rhs, &mut cones);
        }
    }

    let a_mat = cols_to_csc(rhs.len(), n, &a_cols);

    let settings = DefaultSettingsBuilder::default()
        .verbose(false)
        .build()
        .map_err(|e| ScoError::Solver(format!("clarabel settings error: {e:?}")))?;

    let mut solver = DefaultSolver::new(&p_mat, &qp.q, &a_mat, &rhs, &cones, settings)
        .map_err(|e| ScoError::Solver(format!("clarabel initialization failed: {e:?}")))?;

    solver.solve();

    let sol = &solver.solution;
    match sol.status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => Ok(sol.x.clone()),
        other => Err(ScoError::Solver(format!(
            "clarabel returned status {other:?}, expected Solved or AlmostSolved"
        ))),
    }
}

fn cols_to_csc(nrows: usize, ncols: usize, cols: &[Vec<(usize, f64)>]) -> CscMatrix<f64> {
    let mut col_ptr = Vec::with_capacity(ncols + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    let mut nnz = 0;
    for col in cols {
        col_ptr.push(nnz);
        let mut sorted = col.clone();
        sorted.sort_by_key(|(r, _)| *r);
        for (r, v) in sorted {
            row_idx.push(r);
            values.push(v);
            nnz += 1;
        }
    }
    col_ptr.push(nnz);
    CscMatrix::new(nrows, ncols, col_ptr, row_idx, values)
}
