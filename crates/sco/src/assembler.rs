//! The QP-Input Assembler: `convexify_problem`.
//!
//! Builds the l1-penalized quadratic approximation of the original problem
//! around a linearization point `x`, following the assembly order fixed by
//! the spec: linear inequalities, linear equalities, nonlinear inequalities
//! (padding in `t_g`), nonlinear equalities (padding in `t_h`, `s_h`), slack
//! non-negativity, then the quadratic cost. The order matters — each step
//! pads the columns already accumulated in `A` before appending rows that
//! reference the new slack columns, which is what keeps the column layout of
//! `A` consistent with `q` and with the extended variable `z`.

use faer::Mat;
use sco_core::{ConstraintFn, CostFn, QpInputs, ScoError, ScoResult, VariableLayout};

/// The four optional constraint families a problem may supply. Each is
/// `None` when that family is absent — the assembler treats an absent
/// family as contributing zero rows and zero slack columns, never as an
/// error.
#[derive(Default)]
pub struct ConstraintSet<'a> {
    pub linear_ineq: Option<&'a dyn ConstraintFn>,
    pub linear_eq: Option<&'a dyn ConstraintFn>,
    pub nonlinear_ineq: Option<&'a dyn ConstraintFn>,
    pub nonlinear_eq: Option<&'a dyn ConstraintFn>,
}

/// Whether to fold the Hessian of a nonlinear constraint family into the
/// quadratic cost (valid only when every Hessian slice is PSD — a design
/// constraint the assembler does not check at runtime, see the spec's PSD
/// note) or to leave the constraint purely linearized.
#[derive(Debug, Clone, Copy)]
pub struct SecondOrderConfig {
    pub inequalities: bool,
    pub equalities: bool,
}

impl Default for SecondOrderConfig {
    fn default() -> Self {
        Self {
            inequalities: true,
            equalities: true,
        }
    }
}

/// Growable dense row store used while assembling `A`. Columns can be padded
/// on the right (for newly introduced slack variables) without disturbing
/// rows already pushed; this is what lets step 4/5 of the assembly order pad
/// `A` before appending rows that reference the padding.
struct DenseRows {
    ncols: usize,
    rows: Vec<Vec<f64>>,
}

impl DenseRows {
    fn new(ncols: usize) -> Self {
        Self {
            ncols,
            rows: Vec::new(),
        }
    }

    fn pad_cols(&mut self, extra: usize) {
        if extra == 0 {
            return;
        }
        for row in &mut self.rows {
            row.extend(std::iter::repeat(0.0).take(extra));
        }
        self.ncols += extra;
    }

    fn push_row(&mut self, row: Vec<f64>) {
        assert_eq!(row.len(), self.ncols, "row width must match current ncols");
        self.rows.push(row);
    }

    fn into_mat(self) -> Mat<f64> {
        let mut m = Mat::zeros(self.rows.len(), self.ncols);
        for (i, row) in self.rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                m.write(i, j, v);
            }
        }
        m
    }
}

fn dot(row: &[f64], x: &[f64]) -> f64 {
    row.iter().zip(x).map(|(a, b)| a * b).sum()
}

/// Validate that a constraint handle's `value`/`grad`/`hess` outputs at this
/// call agree in shape with `n` and with the handle's declared `dim()`.
/// Any mismatch is a fatal configuration error, never silently tolerated.
fn validate_constraint_shapes(
    name: &str,
    n: usize,
    k: usize,
    value: &[f64],
    grad: &Mat<f64>,
    hess: &[Mat<f64>],
) -> ScoResult<()> {
    if value.len() != k {
        return Err(ScoError::Configuration(format!(
            "{name}: value() returned length {}, expected dim() = {k}",
            value.len()
        )));
    }
    if grad.nrows() != k || grad.ncols() != n {
        return Err(ScoError::Configuration(format!(
            "{name}: grad() returned {}x{}, expected {k}x{n}",
            grad.nrows(),
            grad.ncols()
        )));
    }
    if hess.len() != k {
        return Err(ScoError::Configuration(format!(
            "{name}: hess() returned {} slices, expected {k}",
            hess.len()
        )));
    }
    for (i, slice) in hess.iter().enumerate() {
        if slice.nrows() != n || slice.ncols() != n {
            return Err(ScoError::Configuration(format!(
                "{name}: hess() slice {i} has shape {}x{}, expected {n}x{n}",
                slice.nrows(),
                slice.ncols()
            )));
        }
    }
    Ok(())
}

fn grad_row(grad: &Mat<f64>, i: usize, n: usize) -> Vec<f64> {
    (0..n).map(|j| grad.read(i, j)).collect()
}

/// Add `mu * Omega` to `W` and subtract `0.5 * mu * (Omega + Omega^T) @ x`
/// from `q`, for one Hessian slice `Omega`. This is the second-order
/// constraint-to-cost fold used identically for nonlinear inequalities and
/// nonlinear equalities (step 4/5 of the assembly order).
fn fold_hessian_into_cost(w: &mut Mat<f64>, q: &mut [f64], omega: &Mat<f64>, x: &[f64], mu: f64) {
    let n = x.len();
    for i in 0..n {
        for j in 0..n {
            let v = w.read(i, j) + mu * omega.read(i, j);
            w.write(i, j, v);
        }
    }
    for i in 0..n {
        let mut sym_row_dot_x = 0.0;
        for j in 0..n {
            sym_row_dot_x += (omega.read(i, j) + omega.read(j, i)) * x[j];
        }
        q[i] -= 0.5 * mu * sym_row_dot_x;
    }
}

/// Build the QP-Input for the l1-penalized quadratic approximation of the
/// problem around `x`, with trust size `s` (only required to be positive at
/// entry — the trust-region rows themselves are spliced in separately, see
/// [`crate::trust_region::incorporate_trust_region_and_penalties`]) and
/// penalty `mu`.
pub fn convexify_problem(
    cost: &dyn CostFn,
    constraints: &ConstraintSet,
    x: &[f64],
    s: f64,
    mu: f64,
    second_order: SecondOrderConfig,
) -> ScoResult<(QpInputs, VariableLayout)> {
    if s <= 0.0 {
        return Err(ScoError::Configuration(format!(
            "trust region size {s} is not > 0"
        )));
    }
    let n = x.len();
    if n == 0 {
        return Err(ScoError::Configuration("x has length 0".to_string()));
    }

    let mut w = Mat::<f64>::zeros(n, n);
    let mut q = vec![0.0_f64; n];
    let mut rows = DenseRows::new(n);
    let mut lb: Vec<f64> = Vec::new();
    let mut ub: Vec<f64> = Vec::new();

    // Step 2: linear inequalities Lg(x) <= 0.
    if let Some(lg) = constraints.linear_ineq {
        let k = lg.dim();
        let value = lg.value(x);
        let grad = lg.grad(x);
        validate_constraint_shapes("linear inequality", n, k, &value, &grad, &lg.hess(x))?;
        for i in 0..k {
            let row = grad_row(&grad, i, n);
            let ub_row = dot(&row, x) - value[i];
            rows.push_row(row);
            lb.push(f64::NEG_INFINITY);
            ub.push(ub_row);
        }
    }

    // Step 3: linear equalities Lh(x) = 0.
    if let Some(lh) = constraints.linear_eq {
        let k = lh.dim();
        let value = lh.value(x);
        let grad = lh.grad(x);
        validate_constraint_shapes("linear equality", n, k, &value, &grad, &lh.hess(x))?;
        for i in 0..k {
            let row = grad_row(&grad, i, n);
            let b_row = dot(&row, x) - value[i];
            rows.push_row(row);
            lb.push(b_row);
            ub.push(b_row);
        }
    }

    // Step 4: nonlinear inequalities g(x) <= 0, linearized as g_lin(x) <= t_g.
    let m_g = constraints.nonlinear_ineq.map(|c| c.dim()).unwrap_or(0);
    rows.pad_cols(m_g);
    if let Some(g) = constraints.nonlinear_ineq {
        let value = g.value(x);
        let grad = g.grad(x);
        let hess = g.hess(x);
        validate_constraint_shapes("nonlinear inequality", n, m_g, &value, &grad, &hess)?;
        for i in 0..m_g {
            let mut row = grad_row(&grad, i, n);
            row.resize(n + m_g, 0.0);
            row[n + i] = -1.0;
            let ub_row = dot(&row[..n], x) - value[i];
            rows.push_row(row);
            lb.push(f64::NEG_INFINITY);
            ub.push(ub_row);
        }
        if second_order.inequalities {
            for omega in &hess {
                fold_hessian_into_cost(&mut w, &mut q, omega, x, mu);
            }
        }
    }

    // Step 5: nonlinear equalities h(x) = 0, linearized as h_lin(x) = t_h - s_h.
    let m_h = constraints.nonlinear_eq.map(|c| c.dim()).unwrap_or(0);
    rows.pad_cols(2 * m_h);
    if let Some(h) = constraints.nonlinear_eq {
        let value = h.value(x);
        let grad = h.grad(x);
        let hess = h.hess(x);
        validate_constraint_shapes("nonlinear equality", n, m_h, &value, &grad, &hess)?;
        for i in 0..m_h {
            let mut row = grad_row(&grad, i, n);
            row.resize(n + m_g + 2 * m_h, 0.0);
            row[n + m_g + i] = -1.0;
            row[n + m_g + m_h + i] = 1.0;
            let b_row = dot(&row[..n], x) - value[i];
            rows.push_row(row);
            lb.push(b_row);
            ub.push(b_row);
        }
        if second_order.equalities {
            for omega in &hess {
                fold_hessian_into_cost(&mut w, &mut q, omega, x, mu);
            }
        }
    }

    let layout = VariableLayout::new(n, m_g, m_h);
    let total = layout.total();
    debug_assert_eq!(rows.ncols, total);

    // Step 6: slack non-negativity t_g, t_h, s_h >= 0.
    for col in layout.slack_range() {
        let mut row = vec![0.0; total];
        row[col] = 1.0;
        rows.push_row(row);
        lb.push(0.0);
        ub.push(f64::INFINITY);
    }

    // Step 7: the quadratic cost.
    let grad_f = cost.grad(x);
    let hess_f = cost.hess(x);
    if grad_f.len() != n || hess_f.nrows() != n || hess_f.ncols() != n {
        return Err(ScoError::Configuration(format!(
            "cost function: grad() length {} / hess() shape {}x{}, expected n = {n}",
            grad_f.len(),
            hess_f.nrows(),
            hess_f.ncols()
        )));
    }

    let mut p = Mat::<f64>::zeros(total, total);
    for i in 0..n {
        for j in 0..n {
            p.write(i, j, w.read(i, j) + hess_f.read(i, j));
        }
    }

    let mut q_final = vec![0.0; total];
    for i in 0..n {
        let mut sym_row_dot_x = 0.0;
        for j in 0..n {
            sym_row_dot_x += (hess_f.read(i, j) + hess_f.read(j, i)) * x[j];
        }
        q_final[i] = q[i] + grad_f[i] - 0.5 * sym_row_dot_x;
    }
    for col in layout.slack_range() {
        q_final[col] = mu;
    }

    let qp = QpInputs {
        p,
        q: q_final,
        a: rows.into_mat(),
        lb,
        ub,
    };
    qp.validate_shapes()?;
    qp.validate_finite()?;

    Ok((qp, layout))
}
