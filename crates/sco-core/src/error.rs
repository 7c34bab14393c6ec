//! Unified error type for the SCO engine.
//!
//! [`ScoError`] covers the error taxonomy of the engine: malformed problem
//! configuration, numerical breakdown during QP assembly, and recoverable
//! failures reported by the external QP solver. Convergence exhaustion and
//! user-requested cancellation are deliberately *not* represented here — both
//! are facts about a solve, recorded on its trace, not failures.
//!
//! # Example
//!
//! ```
//! use sco_core::{ScoError, ScoResult};
//!
//! fn check_trust_region(s: f64) -> ScoResult<()> {
//!     if s <= 0.0 {
//!         return Err(ScoError::Configuration(format!("trust region size {s} is not > 0")));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all SCO engine operations.
#[derive(Error, Debug)]
pub enum ScoError {
    /// Malformed problem setup: bad parameter, shape mismatch from a function
    /// handle, or any other condition that makes the problem unsolvable as
    /// posed. Fatal at construction or at the first call that exposes it.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Non-finite value produced while assembling a QP (P, q, A, lb, or ub).
    /// Fatal for the in-progress solve.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// The external QP solver returned an unsolved status. Recoverable: the
    /// Driver converts this into a failed solve and still returns the trace
    /// accumulated so far.
    #[error("solver error: {0}")]
    Solver(String),
}

/// Convenience alias for `Result<T, ScoError>`.
pub type ScoResult<T> = Result<T, ScoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScoError::Solver("clarabel returned PrimalInfeasible".into());
        assert!(err.to_string().contains("solver error"));
        assert!(err.to_string().contains("PrimalInfeasible"));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> ScoResult<()> {
            Err(ScoError::Configuration("n must be > 0".into()))
        }
        fn outer() -> ScoResult<()> {
            inner()?;
            Ok(())
        }
        assert!(outer().is_err());
    }
}
