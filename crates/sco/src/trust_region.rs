//! The Trust-Region Adapter: `incorporate_trust_region_and_penalties`.
//!
//! Splices trust-region box rows `-s <= x_i - x_center_i <= s` onto an
//! already-assembled [`QpInputs`]. The original TrajOpt implementation this
//! is modeled on built these rows but never returned them — a bug fixed
//! here: this function always returns the spliced-in program, and never
//! mutates its input.

use faer::Mat;
use sco_core::{QpInputs, ScoResult, VariableLayout};

/// Return a new [`QpInputs`] equal to `qp` with `layout.n()` additional rows
/// appended, one per component of `x`, constraining `x_i` to
/// `[x_center_i - s, x_center_i + s]`. `P`, `q`, and the existing rows of `A`
/// are left untouched; only new rows are appended and `lb`/`ub` extended to
/// match.
pub fn incorporate_trust_region_and_penalties(
    qp: &QpInputs,
    layout: &VariableLayout,
    x_center: &[f64],
    s: f64,
) -> ScoResult<QpInputs> {
    let n = layout.n();
    debug_assert_eq!(x_center.len(), n);
    let total = qp.num_vars();
    let old_rows = qp.num_constraints();

    let mut a = Mat::<f64>::zeros(old_rows + n, total);
    for i in 0..old_rows {
        for j in 0..total {
            a.write(i, j, qp.a.read(i, j));
        }
    }
    let mut lb = qp.lb.clone();
    let mut ub = qp.ub.clone();

    for i in 0..n {
        a.write(old_rows + i, i, 1.0);
        lb.push(x_center[i] - s);
        ub.push(x_center[i] + s);
    }

    let out = QpInputs {
        p: qp.p.clone(),
        q: qp.q.clone(),
        a,
        lb,
        ub,
    };
    out.validate_shapes()?;
    out.validate_finite()?;
    Ok(out)
}
