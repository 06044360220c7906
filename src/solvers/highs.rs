//! A solver that uses [highs](https://docs.rs/highs), a parallel C++ solver.
//!
//! HiGHS enforces its own time limit, reported back as a model status.

use std::time::Duration;

use highs::HighsModelStatus;

use crate::solvers::{ResolutionError, Solution, SolverModel, WithTimeLimit};
use crate::{
    constraint::ConstraintReference,
    variable::{UnsolvedProblem, VariableDefinition},
};
use crate::{Constraint, IntoAffineExpression, Variable};

/// The [highs](https://docs.rs/highs) solver,
/// to be used with [UnsolvedProblem::using].
pub fn highs(to_solve: UnsolvedProblem) -> HighsProblem {
    let mut highs_problem = highs::RowProblem::default();
    let mut columns = Vec::with_capacity(to_solve.variables.len());
    for (var, &VariableDefinition { min, .. }) in to_solve.variables.iter_variables_with_def() {
        let col_factor = to_solve.objective.coefficient(var);
        let col = highs_problem.add_column(col_factor, min..);
        columns.push(col);
    }
    HighsProblem {
        highs_problem,
        columns,
        time_limit: None,
    }
}

/// A HiGHS model
#[derive(Debug)]
pub struct HighsProblem {
    highs_problem: highs::RowProblem,
    columns: Vec<highs::Col>,
    time_limit: Option<Duration>,
}

impl SolverModel for HighsProblem {
    type Solution = HighsSolution;
    type Error = ResolutionError;

    fn solve(self) -> Result<Self::Solution, Self::Error> {
        let time_limit = self.time_limit;
        let mut model = self.highs_problem.optimise(highs::Sense::Minimise);
        // progress is reported through tracing, not the HiGHS console log
        model.set_option(&b"output_flag"[..], false);
        model.set_option(&b"log_to_console"[..], false);
        if let Some(limit) = time_limit {
            model.set_option(&b"time_limit"[..], limit.as_secs_f64());
        }

        let solved = model.solve();
        match solved.status() {
            HighsModelStatus::NotSet => Err(ResolutionError::Other("NotSet".into())),
            HighsModelStatus::LoadError => Err(ResolutionError::Other("LoadError".into())),
            HighsModelStatus::ModelError => Err(ResolutionError::Other("ModelError".into())),
            HighsModelStatus::PresolveError => Err(ResolutionError::Other("PresolveError".into())),
            HighsModelStatus::SolveError => Err(ResolutionError::Other("SolveError".into())),
            HighsModelStatus::PostsolveError => {
                Err(ResolutionError::Other("PostsolveError".into()))
            }
            HighsModelStatus::Infeasible => Err(ResolutionError::Infeasible),
            HighsModelStatus::Unbounded => Err(ResolutionError::Unbounded),
            HighsModelStatus::UnboundedOrInfeasible => Err(ResolutionError::Infeasible),
            HighsModelStatus::ReachedTimeLimit => Err(ResolutionError::TimedOut(
                time_limit.unwrap_or_default(),
            )),
            _ok_status => Ok(HighsSolution {
                solution: solved.get_solution(),
            }),
        }
    }

    fn add_constraint(&mut self, constraint: Constraint) -> ConstraintReference {
        let index = self.highs_problem.num_rows();
        let upper_bound = -constraint.expression.constant();
        let columns = &self.columns;
        let factors = constraint
            .expression
            .linear_coefficients()
            .map(|(variable, factor)| (columns[variable.index()], factor));
        if constraint.is_equality {
            self.highs_problem
                .add_row(upper_bound..=upper_bound, factors);
        } else {
            self.highs_problem.add_row(..=upper_bound, factors);
        }
        ConstraintReference { index }
    }

    fn name() -> &'static str {
        "Highs"
    }
}

impl WithTimeLimit for HighsProblem {
    fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

/// The solution to a highs problem
#[derive(Debug)]
pub struct HighsSolution {
    solution: highs::Solution,
}

impl Solution for HighsSolution {
    fn value(&self, variable: Variable) -> f64 {
        self.solution.columns()[variable.index()]
    }
}
