//! The SCO Driver: penalty / convexify / trust-region nested-loop `solve`.

use serde::{Deserialize, Serialize};

use sco_core::{ConstraintFn, CostFn, ScoError, ScoResult};

use crate::assembler::{convexify_problem, ConstraintSet, SecondOrderConfig};
use crate::qp_gateway::solve_qp;
use crate::trust_region::incorporate_trust_region_and_penalties;

/// Below this magnitude a model-improvement denominator is treated as zero
/// rather than divided by, guarding against the ratio test blowing up near a
/// stationary point of the convexified cost.
const MODEL_IMPROVEMENT_EPS: f64 = 1e-12;

/// Tuning parameters for [`ScoDriver`]. Validated eagerly in
/// [`ScoDriver::new`] — an invalid parameter set is rejected before any
/// cost/constraint evaluation happens, rather than failing partway through
/// a solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoParams {
    /// Initial penalty coefficient.
    pub mu_0: f64,
    /// Initial trust region size.
    pub s_0: f64,
    /// Step acceptance parameter for the improvement ratio test.
    pub c: f64,
    /// Trust region expansion factor (applied on an accepted step).
    pub tau_plus: f64,
    /// Trust region shrinkage factor (applied on a rejected step).
    pub tau_minus: f64,
    /// Penalty escalation factor, applied when constraints remain violated
    /// at the end of a penalty iteration.
    pub k: f64,
    /// Cost-change convergence threshold.
    pub f_tol: f64,
    /// Step-size convergence threshold, also the trust-region collapse
    /// threshold.
    pub x_tol: f64,
    /// Constraint satisfaction threshold.
    pub c_tol: f64,
    /// Maximum number of penalty iterations.
    pub max_iter: usize,
    /// Whether to fold nonlinear inequality Hessians into the QP cost.
    pub second_order_inequalities: bool,
    /// Whether to fold nonlinear equality Hessians into the QP cost.
    pub second_order_equalities: bool,
}

impl ScoParams {
    fn validate(&self) -> ScoResult<()> {
        let checks: &[(bool, &str)] = &[
            (self.s_0 > 0.0, "s_0 must be > 0"),
            (self.c > 0.0, "c must be > 0"),
            (self.tau_plus > 1.0, "tau_plus must be > 1"),
            (
                self.tau_minus > 0.0 && self.tau_minus < 1.0,
                "tau_minus must be in (0, 1)",
            ),
            (self.k > 1.0, "k must be > 1"),
            (self.f_tol > 0.0, "f_tol must be > 0"),
            (self.x_tol > 0.0, "x_tol must be > 0"),
            (self.c_tol >= 0.0, "c_tol must be >= 0"),
            (self.max_iter > 0, "max_iter must be > 0"),
        ];
        for (ok, msg) in checks {
            if !ok {
                return Err(ScoError::Configuration(msg.to_string()));
            }
        }
        Ok(())
    }
}

/// One recorded step of the solve, mirroring the penalty/convexify/trust-
/// region iteration it was produced at. Serializable for trace persistence;
/// the engine itself performs no file I/O.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub penalty_iter: usize,
    pub convexify_iter: usize,
    pub trust_region_iter: usize,
    pub x: Vec<f64>,
    pub cost: f64,
    pub trust_region_size: f64,
    pub updated_trust_region_size: f64,
    pub improvement: bool,
    pub trust_region_size_below_threshold: bool,
    pub penalty_factor: f64,
    pub updated_penalty_factor: Option<f64>,
}

/// The accumulated trace of a solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub trace: Vec<TraceEntry>,
}

impl SolveResult {
    /// The minimizing `x` recorded in the final trace entry.
    ///
    /// # Panics
    /// Never, in practice: [`ScoDriver::solve`] always records at least the
    /// initial-guess entry before returning any [`SolveOutcome`].
    pub fn solution_x(&self) -> &[f64] {
        &self
            .trace
            .last()
            .expect("a SolveResult always has at least one trace entry")
            .x
    }
}

/// Terminal state of a solve. `solve` itself never returns an `Err` — a
/// recoverable numerical or solver failure partway through is reported as
/// [`SolveOutcome::Failed`] carrying whatever trace had accumulated, so the
/// caller always gets the trace back regardless of outcome. Only a
/// misconfigured parameter bundle, rejected eagerly in [`ScoDriver::new`],
/// ever surfaces as an [`sco_core::ScoError`].
#[derive(Debug)]
pub enum SolveOutcome {
    /// `is_converged` was satisfied (or all constraints were found
    /// satisfied at the end of a penalty iteration).
    Converged(SolveResult),
    /// `max_iter` penalty iterations ran without convergence or constraint
    /// satisfaction.
    MaxIterationsExhausted(SolveResult),
    /// The caller-supplied cancellation callback returned `true`.
    Cancelled(SolveResult),
    /// Assembly, trust-region splicing, or the QP solve itself failed
    /// (non-finite value, shape mismatch, or an unsolved QP status).
    Failed { trace: Vec<TraceEntry>, error: ScoError },
}

/// The SCO engine: penalty escalation around a convexify loop around a
/// trust-region loop, each inner iteration re-assembling and re-solving a
/// QP approximation of the original problem.
pub struct ScoDriver<'a> {
    cost: &'a dyn CostFn,
    constraints: ConstraintSet<'a>,
    params: ScoParams,
}

impl<'a> ScoDriver<'a> {
    /// Construct a driver, validating `params` eagerly.
    pub fn new(
        cost: &'a dyn CostFn,
        constraints: ConstraintSet<'a>,
        params: ScoParams,
    ) -> ScoResult<Self> {
        params.validate()?;
        Ok(Self {
            cost,
            constraints,
            params,
        })
    }

    fn second_order_config(&self) -> SecondOrderConfig {
        SecondOrderConfig {
            inequalities: self.params.second_order_inequalities,
            equalities: self.params.second_order_equalities,
        }
    }

    /// Cost of the quadratic model of `self.cost` linearized/quadratized
    /// around `x`, evaluated at `new_x`.
    fn convexified_cost(&self, x: &[f64], new_x: &[f64]) -> f64 {
        let f0 = self.cost.value(x);
        let omega = self.cost.grad(x);
        let w = self.cost.hess(x);
        let n = x.len();
        let delta: Vec<f64> = (0..n).map(|i| new_x[i] - x[i]).collect();
        let linear: f64 = omega.iter().zip(&delta).map(|(a, b)| a * b).sum();
        let mut quad = 0.0;
        for i in 0..n {
            for j in 0..n {
                quad += delta[i] * w.read(i, j) * delta[j];
            }
        }
        f0 + linear + 0.5 * quad
    }

    /// The true/model improvement ratio test that accepts or rejects a
    /// trust-region step. A model-improvement denominator smaller than
    /// [`MODEL_IMPROVEMENT_EPS`] makes the ratio undefined rather than
    /// unstable; that case is treated as converged and the step is accepted
    /// outright, rather than computing a blown-up or NaN ratio.
    fn is_improvement(&self, x: &[f64], new_x: &[f64]) -> bool {
        let true_improve = self.cost.value(x) - self.cost.value(new_x);
        let model_improve = self.cost.value(x) - self.convexified_cost(x, new_x);
        if model_improve.abs() < MODEL_IMPROVEMENT_EPS {
            return true;
        }
        true_improve / model_improve > self.params.c
    }

    fn is_converged(&self, x: &[f64], new_x: &[f64]) -> bool {
        let dx = x
            .iter()
            .zip(new_x)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        let df = (self.cost.value(new_x) - self.cost.value(x)).abs();
        dx < self.params.x_tol || df < self.params.f_tol
    }

    fn are_constraints_satisfied(&self, x: &[f64]) -> bool {
        let c_tol = self.params.c_tol;
        let satisfies_ineq = |c: &dyn ConstraintFn| c.value(x).iter().all(|&v| v <= c_tol);
        let satisfies_eq = |c: &dyn ConstraintFn| c.value(x).iter().all(|&v| v.abs() <= c_tol);

        self.constraints
            .linear_ineq
            .map(satisfies_ineq)
            .unwrap_or(true)
            && self
                .constraints
                .linear_eq
                .map(satisfies_eq)
                .unwrap_or(true)
            && self
                .constraints
                .nonlinear_ineq
                .map(satisfies_ineq)
                .unwrap_or(true)
            && self
                .constraints
                .nonlinear_eq
                .map(satisfies_eq)
                .unwrap_or(true)
    }

    /// Solve with no cancellation support; equivalent to calling
    /// [`ScoDriver::solve_with_cancellation`] with `cancel = None`.
    pub fn solve(&self, initial_guess_x: &[f64]) -> SolveOutcome {
        self.solve_with_cancellation(initial_guess_x, None)
    }

    /// Run the penalty/convexify/trust-region solve starting from
    /// `initial_guess_x`. `cancel`, if supplied, is checked once per
    /// trust-region iteration; returning `true` stops the solve and reports
    /// [`SolveOutcome::Cancelled`] with whatever trace has accumulated so
    /// far. Never panics and never returns an error directly — a failure
    /// partway through is reported as [`SolveOutcome::Failed`].
    pub fn solve_with_cancellation(
        &self,
        initial_guess_x: &[f64],
        cancel: Option<&dyn Fn() -> bool>,
    ) -> SolveOutcome {
        let mut x = initial_guess_x.to_vec();
        let mut s = self.params.s_0;
        let mut mu = self.params.mu_0;
        let mut new_x = x.clone();
        let mut updated_s = s;
        let mut improvement = true;

        let mut trace = vec![TraceEntry {
            penalty_iter: 0,
            convexify_iter: 0,
            trust_region_iter: 0,
            x: initial_guess_x.to_vec(),
            cost: self.cost.value(initial_guess_x),
            trust_region_size: s,
            updated_trust_region_size: s,
            improvement,
            trust_region_size_below_threshold: false,
            penalty_factor: mu,
            updated_penalty_factor: None,
        }];

        let mut converged = false;

        for penalty_iter in 0..self.params.max_iter {
            for convexify_iter in 0.. {
                let mut trust_region_size_below_threshold = false;

                for trust_region_iter in 0.. {
                    if let Some(cancel_fn) = cancel {
                        if cancel_fn() {
                            return SolveOutcome::Cancelled(SolveResult { trace });
                        }
                    }

                    if improvement {
                        x = new_x.clone();
                    }
                    s = updated_s;

                    let (qp, layout) = match convexify_problem(
                        self.cost,
                        &self.constraints,
                        &x,
                        s,
                        mu,
                        self.second_order_config(),
                    ) {
                        Ok(assembled) => assembled,
                        Err(error) => return SolveOutcome::Failed { trace, error },
                    };
                    let qp_trust =
                        match incorporate_trust_region_and_penalties(&qp, &layout, &x, s) {
                            Ok(spliced) => spliced,
                            Err(error) => return SolveOutcome::Failed { trace, error },
                        };
                    let z = match solve_qp(&qp_trust) {
                        Ok(z) => z,
                        Err(error) => return SolveOutcome::Failed { trace, error },
                    };
                    new_x = z[layout.x_range()].to_vec();

                    let cost = self.cost.value(&new_x);
                    improvement = self.is_improvement(&x, &new_x);

                    if improvement {
                        updated_s = (self.params.tau_plus * s).max(1.0);
                    } else {
                        updated_s = self.params.tau_minus * s;
                        if updated_s < self.params.x_tol {
                            trust_region_size_below_threshold = true;
                        }
                    }

                    trace.push(TraceEntry {
                        penalty_iter,
                        convexify_iter,
                        trust_region_iter,
                        x: new_x.clone(),
                        cost,
                        trust_region_size: s,
                        updated_trust_region_size: updated_s,
                        improvement,
                        trust_region_size_below_threshold,
                        penalty_factor: mu,
                        updated_penalty_factor: None,
                    });

                    if improvement || trust_region_size_below_threshold {
                        break;
                    }
                }

                if trust_region_size_below_threshold || self.is_converged(&x, &new_x) {
                    break;
                }
            }

            if self.are_constraints_satisfied(&new_x) {
                converged = true;
                break;
            }

            mu = self.params.k * mu;
            improvement = false;
            if let Some(last) = trace.last_mut() {
                last.updated_penalty_factor = Some(mu);
            }
        }

        if converged {
            SolveOutcome::Converged(SolveResult { trace })
        } else {
            SolveOutcome::MaxIterationsExhausted(SolveResult { trace })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    /// f(x) = x^4, whose quadratic expansion at `x` does not track the true
    /// cost once the step is large — used to pin both branches of
    /// `is_improvement` on either side of `c`.
    struct Quartic;
    impl CostFn for Quartic {
        fn value(&self, x: &[f64]) -> f64 {
            x[0].powi(4)
        }
        fn grad(&self, x: &[f64]) -> Vec<f64> {
            vec![4.0 * x[0].powi(3)]
        }
        fn hess(&self, x: &[f64]) -> Mat<f64> {
            let mut h = Mat::zeros(1, 1);
            h.write(0, 0, 12.0 * x[0] * x[0]);
            h
        }
    }

    /// f(x, y) = (x - 1)^2 + (y - 2)^2, unconstrained, minimized at (1, 2).
    struct Quadratic;
    impl CostFn for Quadratic {
        fn value(&self, x: &[f64]) -> f64 {
            (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2)
        }
        fn grad(&self, x: &[f64]) -> Vec<f64> {
            vec![2.0 * (x[0] - 1.0), 2.0 * (x[1] - 2.0)]
        }
        fn hess(&self, _x: &[f64]) -> Mat<f64> {
            let mut h = Mat::zeros(2, 2);
            h.write(0, 0, 2.0);
            h.write(1, 1, 2.0);
            h
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
            f_tol: 1e-8,
            x_tol: 1e-6,
            c_tol: 1e-6,
            max_iter: 30,
            second_order_inequalities: true,
            second_order_equalities: true,
        }
    }

    #[test]
    fn test_rejects_invalid_params() {
        let cost = Quadratic;
        let mut params = default_params();
        params.s_0 = -1.0;
        let err = ScoDriver::new(&cost, ConstraintSet::default(), params);
        assert!(err.is_err());
    }

    #[test]
    fn test_unconstrained_quadratic_converges() {
        let cost = Quadratic;
        let driver = ScoDriver::new(&cost, ConstraintSet::default(), default_params()).unwrap();
        let outcome = driver.solve(&[5.0, 5.0]);
        let result = match outcome {
            SolveOutcome::Converged(r) => r,
            other => panic!("expected Converged, got {other:?}"),
        };
        let x = result.solution_x();
        assert!((x[0] - 1.0).abs() < 1e-3);
        assert!((x[1] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_cancellation_stops_the_solve() {
        let cost = Quadratic;
        let driver = ScoDriver::new(&cost, ConstraintSet::default(), default_params()).unwrap();
        let cancel = || true;
        let outcome = driver.solve_with_cancellation(&[5.0, 5.0], Some(&cancel));
        assert!(matches!(outcome, SolveOutcome::Cancelled(_)));
    }

    #[test]
    fn test_is_improvement_true_above_and_false_at_or_below_c() {
        let cost = Quartic;
        let driver = ScoDriver::new(&cost, ConstraintSet::default(), default_params()).unwrap();
        // x = 2: f = 16, grad = 32, hess = 48.
        // Modest step to 1.5: true_improve = 16 - 5.0625 = 10.9375;
        // model_improve = 16 - (16 - 16 + 6) = 10; ratio ~= 1.094 > c (0.1).
        assert!(driver.is_improvement(&[2.0], &[1.5]));
        // Step across the origin to 0.0: true_improve = 16 - 0 = 16 (the
        // cost really did drop), but the quadratic model at x = 2
        // extrapolates an increase: model_improve = 16 - 48 = -32, giving
        // ratio = 16 / -32 = -0.5 <= c. The model disagreeing with reality
        // this badly must be rejected even though the true cost improved.
        assert!(!driver.is_improvement(&[2.0], &[0.0]));
    }

    #[test]
    fn test_is_improvement_accepts_when_model_improvement_is_near_zero() {
        let cost = Quartic;
        let driver = ScoDriver::new(&cost, ConstraintSet::default(), default_params()).unwrap();
        // x == new_x: both true and model improvement are exactly zero,
        // under MODEL_IMPROVEMENT_EPS, so the ratio test is skipped and the
        // step is accepted outright rather than computing 0.0 / 0.0.
        assert!(driver.is_improvement(&[2.0], &[2.0]));
    }
}
