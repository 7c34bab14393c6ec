//! Property-style tests for invariants the driver and its collaborators
//! must hold regardless of the specific problem being solved.

use faer::Mat;
use sco::{ConstraintFn, ConstraintSet, CostFn, ScoDriver, ScoParams, SolveOutcome};

struct SumOfSquares;
impl CostFn for SumOfSquares {
    fn value(&self, x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum()
    }
    fn grad(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|v| 2.0 * v).collect()
    }
    fn hess(&self, x: &[f64]) -> Mat<f64> {
        let n = x.len();
        let mut h = Mat::zeros(n, n);
        for i in 0..n {
            h.write(i, i, 2.0);
        }
        h
    }
}

/// h(x) = x^2 + 1, always violated.
struct NeverZero;
impl ConstraintFn for NeverZero {
    fn dim(&self) -> usize {
        1
    }
    fn value(&self, x: &[f64]) -> Vec<f64> {
        vec![x[0] * x[0] + 1.0]
    }
    fn grad(&self, x: &[f64]) -> Mat<f64> {
        let mut g = Mat::zeros(1, 1);
        g.write(0, 0, 2.0 * x[0]);
        g
    }
    fn hess(&self, _x: &[f64]) -> Vec<Mat<f64>> {
        let mut h = Mat::zeros(1, 1);
        h.write(0, 0, 2.0);
        vec![h]
    }
}

fn default_params() -> ScoParams {
    ScoParams {
        mu_0: 1.0,
        s_0: 5.0,
        c: 0.1,
        tau_plus: 2.0,
        tau_minus: 0.5,
        k: 10.0,
        f_tol: 1e-9,
        x_tol: 1e-6,
        c_tol: 1e-6,
        max_iter: 6,
        second_order_inequalities: true,
        second_order_equalities: true,
    }
}

/// Across a run that never satisfies its constraints, the recorded penalty
/// factor is non-decreasing penalty-iteration over penalty-iteration, and
/// each escalation multiplies by exactly `k`.
#[test]
fn penalty_factor_escalates_monotonically_by_k() {
    let cost = SumOfSquares;
    let h = NeverZero;
    let cs = ConstraintSet {
        nonlinear_eq: Some(&h),
        ..ConstraintSet::default()
    };
    let params = default_params();
    let driver = ScoDriver::new(&cost, cs, params).unwrap();
    let outcome = driver.solve(&[0.5]);
    let result = match outcome {
        SolveOutcome::MaxIterationsExhausted(r) => r,
        other => panic!("expected MaxIterationsExhausted, got {other:?}"),
    };

    let mut seen_mu = Vec::new();
    for entry in &result.trace {
        if let Some(updated) = entry.updated_penalty_factor {
            seen_mu.push(updated);
        }
    }
    assert!(!seen_mu.is_empty());
    for pair in seen_mu.windows(2) {
        assert!(pair[1] > pair[0], "mu must escalate: {seen_mu:?}");
    }
    for (i, mu) in seen_mu.iter().enumerate() {
        let expected = params.mu_0 * params.k.powi(i as i32 + 1);
        assert!(
            (mu - expected).abs() < 1e-6 * expected.abs().max(1.0),
            "mu[{i}] = {mu}, expected {expected}"
        );
    }
}

/// `trust_region_size` recorded at each accepted step never exceeds the
/// `updated_trust_region_size` computed for the prior accepted step — the
/// trust region adapter only ever works with the size the driver handed it.
#[test]
fn trust_region_size_in_trace_matches_prior_update() {
    let cost = SumOfSquares;
    let driver = ScoDriver::new(&cost, ConstraintSet::default(), default_params()).unwrap();
    let outcome = driver.solve(&[3.0, -4.0]);
    let result = match outcome {
        SolveOutcome::Converged(r) => r,
        other => panic!("expected Converged, got {other:?}"),
    };
    for pair in result.trace.windows(2) {
        let prior_updated = pair[0].updated_trust_region_size;
        let next_size = pair[1].trust_region_size;
        assert!(
            (next_size - prior_updated).abs() < 1e-9 || next_size <= prior_updated,
            "trust region size must derive from the prior update: {next_size} vs {prior_updated}"
        );
    }
}
