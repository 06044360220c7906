//! Flow variables. A [Variable] is a handle into the [ProblemVariables] of one
//! model; in a distribution model every variable carries the tons shipped
//! along one route.
use std::fmt::{Debug, Formatter};

use crate::affine_expression_trait::IntoAffineExpression;
use crate::expression::Expression;

/// A variable of one problem.
///
/// Two handles are equal only when they point at the same slot of the same
/// [ProblemVariables], not when their definitions match.
///
/// ```
/// # use hubflow::variable::{variable, ProblemVariables};
/// let mut vars = ProblemVariables::new();
/// let v1 = vars.add(variable().min(0));
/// let v2 = vars.add(variable().min(0));
/// assert_ne!(v1, v2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    index: usize,
}

impl Variable {
    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

/// Something that can be printed once told how to print a variable
pub trait FormatWithVars {
    fn format_with<FUN>(&self, f: &mut Formatter<'_>, variable_format: FUN) -> std::fmt::Result
    where
        FUN: FnMut(&mut Formatter<'_>, Variable) -> std::fmt::Result;

    /// Prints variables as `v0`, `v1`, ...
    fn format_debug(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format_with(f, |f, var| write!(f, "v{}", var.index()))
    }
}

/// Lower bound and name of a variable. Flow variables have no upper bound
/// of their own, only the capacity constraints limit them.
#[derive(Clone, PartialEq, Debug)]
pub struct VariableDefinition {
    pub(crate) min: f64,
    pub(crate) name: String,
}

impl VariableDefinition {
    /// Set the lower bound of the variable
    pub fn min<N: Into<f64>>(mut self, min: N) -> Self {
        self.min = min.into();
        self
    }

    /// Name the variable. Names show up when a model is printed.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }
}

/// An anonymous variable without bounds
pub fn variable() -> VariableDefinition {
    VariableDefinition {
        min: f64::NEG_INFINITY,
        name: String::new(),
    }
}

/// The variables of one problem
#[derive(Default, Debug, Clone)]
pub struct ProblemVariables {
    variables: Vec<VariableDefinition>,
}

impl ProblemVariables {
    pub fn new() -> Self {
        ProblemVariables::default()
    }

    pub fn add(&mut self, definition: VariableDefinition) -> Variable {
        self.variables.push(definition);
        Variable {
            index: self.variables.len() - 1,
        }
    }

    /// Pairs the variables with the objective to minimise. Nothing is solved yet.
    pub fn minimise<E: IntoAffineExpression>(self, objective: E) -> UnsolvedProblem {
        UnsolvedProblem {
            objective: objective.into_expression(),
            variables: self,
        }
    }

    pub fn iter_variables_with_def(&self) -> impl Iterator<Item = (Variable, &VariableDefinition)> {
        self.variables
            .iter()
            .enumerate()
            .map(|(index, def)| (Variable { index }, def))
    }

    /// The name given to a variable, or `v{index}` for anonymous variables
    pub fn display_name(&self, variable: Variable) -> String {
        match self.variables.get(variable.index) {
            Some(def) if !def.name.is_empty() => def.name.clone(),
            _ => format!("v{}", variable.index),
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// A minimisation problem waiting for a solver and its constraints
pub struct UnsolvedProblem {
    pub(crate) objective: Expression,
    pub(crate) variables: ProblemVariables,
}

impl UnsolvedProblem {
    /// Hands the problem to a solver, see [crate::solvers]
    pub fn using<S, G>(self, solver: S) -> G
    where
        S: FnOnce(UnsolvedProblem) -> G,
    {
        solver(self)
    }
}

impl Debug for UnsolvedProblem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsolvedProblem")
            .field("num_vars", &self.variables.len())
            .finish()
    }
}
