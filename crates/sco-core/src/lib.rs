//! # sco-core: data model for the sequential convex optimization engine
//!
//! This crate holds the pieces of the SCO engine that have no opinion about
//! *how* a QP gets solved:
//!
//! - [`CostFn`] / [`ConstraintFn`]: the derivative-spliced function handles
//!   a caller supplies for the cost and for each of the four constraint
//!   families.
//! - [`VariableLayout`]: the offset bookkeeping for the extended variable
//!   `z = (x, t_g, t_h, s_h)`.
//! - [`QpInputs`]: the canonical `lb <= Az <= ub` quadratic program that the
//!   assembler produces and the solver gateway consumes.
//! - [`ScoError`] / [`ScoResult`]: the unified error type for the engine.
//!
//! The actual assembler, trust-region adapter, QP solver gateway, and driver
//! live in the `sco` crate, which depends on this one.

mod error;
mod function;
mod qp;
mod variable;

pub use error::{ScoError, ScoResult};
pub use function::{ConstraintFn, CostFn};
pub use qp::QpInputs;
pub use variable::VariableLayout;
