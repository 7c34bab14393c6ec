//! Derivative-spliced function handles.
//!
//! The assembler never differentiates a user's cost or constraints itself —
//! it consumes value/gradient/Hessian triples supplied by the caller. This
//! module gives that triple an explicit, object-safe shape instead of the
//! duck-typed callable-with-attributes the reference implementation used.
//!
//! Both traits are pure: repeated calls with an equal `x` must yield equal
//! output, with no side effects and no internal ordering requirement. That
//! purity is what lets a single [`CostFn`]/[`ConstraintFn`] be shared (via
//! `Send + Sync`) across Driver instances solving on different threads.

use faer::Mat;

/// A scalar-valued cost function with first and second derivatives.
///
/// `grad` must return a vector of length `n`; `hess` must return a symmetric
/// `n x n` matrix. Implementations are responsible for keeping `value`,
/// `grad`, and `hess` consistent with one another up to floating-point noise
/// — the assembler treats any shape mismatch as a fatal configuration error,
/// but it has no way to check mathematical consistency.
pub trait CostFn: Send + Sync {
    /// f(x).
    fn value(&self, x: &[f64]) -> f64;

    /// ∇f(x), length n.
    fn grad(&self, x: &[f64]) -> Vec<f64>;

    /// ∇²f(x), symmetric n x n.
    fn hess(&self, x: &[f64]) -> Mat<f64>;
}

/// A vector-valued constraint set of fixed dimension `k = dim()`.
///
/// Used for all four constraint families (linear/nonlinear x
/// inequality/equality). `grad` returns a `k x n` Jacobian whose row `i` is
/// `∇gᵢ`. `hess` returns `k` Hessian slices, each `n x n` and symmetric,
/// slice-major on the constraint index (slice `i` is the Hessian of
/// component `i`). Unlike the numpy-backed reference implementation, there
/// is no dimensional collapse for `k == 1`: a single constraint is still a
/// length-1 value vector, a 1-row Jacobian, and a 1-element Hessian slice
/// vector — Rust's static shapes make that uniformity free.
pub trait ConstraintFn: Send + Sync {
    /// Number of scalar constraints in this set. Must be constant across the
    /// life of the handle.
    fn dim(&self) -> usize;

    /// g(x), length k.
    fn value(&self, x: &[f64]) -> Vec<f64>;

    /// Jacobian of g at x, k x n, row i = ∇gᵢ(x).
    fn grad(&self, x: &[f64]) -> Mat<f64>;

    /// Hessian slices of g at x: k matrices, each n x n, symmetric.
    fn hess(&self, x: &[f64]) -> Vec<Mat<f64>>;
}
