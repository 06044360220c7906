//! A solver that uses [microlp](https://docs.rs/microlp), a pure rust solver.
//!
//! microlp has no notion of a deadline, so when a time limit is set the solve
//! runs on a worker thread and the caller stops waiting once the limit passes.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::variable::{UnsolvedProblem, VariableDefinition};
use crate::{
    constraint::ConstraintReference,
    solvers::{ResolutionError, Solution, SolverModel, WithTimeLimit},
};
use crate::{Constraint, Variable};

/// The [microlp](https://docs.rs/microlp) solver,
/// to be used with [UnsolvedProblem::using].
pub fn microlp(to_solve: UnsolvedProblem) -> MicroLpProblem {
    let UnsolvedProblem { objective, variables } = to_solve;
    let mut problem = microlp::Problem::new(microlp::OptimizationDirection::Minimize);
    let variables: Vec<microlp::Variable> = variables
        .iter_variables_with_def()
        .map(|(var, &VariableDefinition { min, .. })| {
            let coeff = objective.coefficient(var);
            problem.add_var(coeff, (min, f64::INFINITY))
        })
        .collect();
    MicroLpProblem {
        problem,
        variables,
        n_constraints: 0,
        time_limit: None,
    }
}

/// A microlp model
pub struct MicroLpProblem {
    problem: microlp::Problem,
    variables: Vec<microlp::Variable>,
    n_constraints: usize,
    time_limit: Option<Duration>,
}

impl SolverModel for MicroLpProblem {
    type Solution = MicroLpSolution;
    type Error = ResolutionError;

    fn solve(self) -> Result<Self::Solution, Self::Error> {
        let MicroLpProblem {
            problem,
            variables,
            time_limit,
            ..
        } = self;
        let run = move || -> Result<Vec<f64>, ResolutionError> {
            let solution = problem.solve()?;
            Ok(variables.iter().map(|&var| solution[var]).collect())
        };
        let values = match time_limit {
            None => run()?,
            // nothing finishes in no time, and a worker racing the receiver
            // would make the outcome depend on scheduling
            Some(limit) if limit.is_zero() => return Err(ResolutionError::TimedOut(limit)),
            Some(limit) => {
                let (sender, receiver) = mpsc::channel();
                thread::Builder::new()
                    .name("microlp".into())
                    .spawn(move || {
                        // the receiver is gone once the caller timed out
                        let _ = sender.send(run());
                    })
                    .map_err(|e| ResolutionError::Other(e.to_string()))?;
                match receiver.recv_timeout(limit) {
                    Ok(result) => result?,
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(ResolutionError::TimedOut(limit))
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(ResolutionError::Other(
                            "microlp worker stopped without a result".into(),
                        ))
                    }
                }
            }
        };
        Ok(MicroLpSolution { values })
    }

    fn add_constraint(&mut self, constraint: Constraint) -> ConstraintReference {
        let index = self.n_constraints;
        let op = match constraint.is_equality {
            true => microlp::ComparisonOp::Eq,
            false => microlp::ComparisonOp::Le,
        };
        let constant = -constraint.expression.constant;
        let mut linear_expr = microlp::LinearExpr::empty();
        for (var, coefficient) in constraint.expression.linear.coefficients {
            linear_expr.add(self.variables[var.index()], coefficient);
        }
        self.problem.add_constraint(linear_expr, op, constant);
        self.n_constraints += 1;
        ConstraintReference { index }
    }

    fn name() -> &'static str {
        "Microlp"
    }
}

impl WithTimeLimit for MicroLpProblem {
    fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

impl From<microlp::Error> for ResolutionError {
    fn from(microlp_error: microlp::Error) -> Self {
        match microlp_error {
            microlp::Error::Unbounded => Self::Unbounded,
            microlp::Error::Infeasible => Self::Infeasible,
            microlp::Error::InternalError(s) => Self::Other(s),
        }
    }
}

/// The solution to a microlp problem
#[derive(Debug, Clone)]
pub struct MicroLpSolution {
    values: Vec<f64>,
}

impl Solution for MicroLpSolution {
    fn value(&self, variable: Variable) -> f64 {
        self.values[variable.index()]
    }
}
