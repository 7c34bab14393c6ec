//! # sco: the sequential convex optimization (SCO) engine
//!
//! Minimizes a nonlinear cost subject to mixed linear/nonlinear
//! equality/inequality constraints by repeatedly convexifying the problem
//! into a quadratic program inside a shrinking/growing trust region, with
//! nonlinear constraints reformulated as an l1 penalty on non-negative
//! slack variables. See the TrajOpt algorithm
//! (<https://rll.berkeley.edu/~sachin/papers/Schulman-IJRR2014.pdf>) this
//! engine implements.
//!
//! Three collaborating pieces, each in its own module:
//!
//! - [`assembler::convexify_problem`]: builds the penalized QP
//!   approximation around a linearization point.
//! - [`trust_region::incorporate_trust_region_and_penalties`]: splices
//!   trust-region box rows onto an assembled QP.
//! - [`qp_gateway::solve_qp`]: translates the canonical QP into Clarabel's
//!   conic form and solves it.
//!
//! [`driver::ScoDriver`] drives the three nested loops (penalty escalation,
//! convexification, trust-region acceptance) that tie them together.

pub mod assembler;
pub mod driver;
pub mod qp_gateway;
pub mod trust_region;

pub use assembler::{convexify_problem, ConstraintSet, SecondOrderConfig};
pub use driver::{ScoDriver, ScoParams, SolveOutcome, SolveResult, TraceEntry};
pub use qp_gateway::solve_qp;
pub use trust_region::incorporate_trust_region_and_penalties;

pub use sco_core::{ConstraintFn, CostFn, QpInputs, ScoError, ScoResult, VariableLayout};
