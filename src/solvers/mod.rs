//! The seam between a distribution model and an external LP solver.
//!
//! A solver is a function turning an [UnsolvedProblem](crate::variable::UnsolvedProblem)
//! into a [SolverModel], to which constraints are added before calling
//! [SolverModel::solve].

#[cfg(feature = "microlp")]
pub mod microlp;

#[cfg(feature = "highs")]
pub mod highs;

use crate::constraint::ConstraintReference;
use crate::{Constraint, Variable};
use std::time::Duration;
use thiserror::Error;

/// Represents an error that occurred when solving a problem
#[derive(Debug, PartialEq, Clone, Error)]
pub enum ResolutionError {
    /// The problem is unbounded.
    /// The objective can be made infinitely small without violating any constraints.
    #[error("the problem is unbounded")]
    Unbounded,
    /// There exists no solution that satisfies all of the constraints
    #[error("the problem is infeasible")]
    Infeasible,
    /// The solver did not finish within its time limit
    #[error("the solver did not finish within {0:?}")]
    TimedOut(Duration),
    /// Another error occurred
    #[error("solver error: {0}")]
    Other(String),
}

/// A solver's own representation of a model, to which constraints can be added.
pub trait SolverModel {
    /// The type of the solution to the problem
    type Solution: Solution;
    /// The error that can occur while solving the problem
    type Error: std::error::Error;

    /// Adds all the constraints of an iterator to the model
    fn with_all<I: IntoIterator<Item = Constraint>>(mut self, constraints: I) -> Self
    where
        Self: Sized,
    {
        for constraint in constraints {
            self.add_constraint(constraint);
        }
        self
    }

    /// Find the solution for the problem being modeled
    fn solve(self) -> Result<Self::Solution, Self::Error>;

    /// Adds a constraint to the Model and returns a reference to the index
    fn add_constraint(&mut self, c: Constraint) -> ConstraintReference;

    /// Name of the backend, used in logs
    fn name() -> &'static str;
}

/// Solvers that can be told to give up after a while
pub trait WithTimeLimit {
    /// Returns the time limit set, if any
    fn time_limit(&self) -> Option<Duration>;

    /// Sets the time limit. Reaching it makes `solve` return [ResolutionError::TimedOut].
    fn with_time_limit(self, limit: Duration) -> Self;
}

/// A problem solution
pub trait Solution {
    /// Get the optimal value of a variable of the problem
    fn value(&self, variable: Variable) -> f64;
}
