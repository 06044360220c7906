//! Constraints define the inequalities that must hold in the solution.
use crate::affine_expression_trait::IntoAffineExpression;
use crate::expression::Expression;
use crate::variable::{FormatWithVars, Variable};
use core::fmt::{Debug, Formatter};

/// Below this magnitude a constant-only constraint is considered satisfied
pub(crate) const TRIVIAL_TOLERANCE: f64 = 1e-9;

/// A constraint represents a single (in)equality that must hold in the solution.
#[derive(Clone)]
pub struct Constraint {
    /// The expression that is constrained to be null or negative
    pub(crate) expression: Expression,
    /// if is_equality, represents expression == 0, otherwise, expression <= 0
    pub(crate) is_equality: bool,
    /// Optional constraint name
    pub(crate) name: Option<String>,
}

impl Constraint {
    fn new(expression: Expression, is_equality: bool) -> Constraint {
        Constraint {
            expression,
            is_equality,
            name: None,
        }
    }

    /// set the constraint name
    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// The constraint name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether this is an equality constraint
    pub fn is_equality(&self) -> bool {
        self.is_equality
    }

    /// The constrained expression, normalized to `expression <= 0` or `expression == 0`
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// The right hand side once every variable term is on the left
    pub fn rhs(&self) -> f64 {
        // never a negative zero, it would print as "-0"
        0. - self.expression.constant
    }

    /// A constraint without any variable can be decided right away.
    /// Returns `None` when the constraint involves variables.
    pub fn trivially_satisfied(&self) -> Option<bool> {
        if !self.expression.is_constant() {
            return None;
        }
        let value = self.expression.constant;
        Some(if self.is_equality {
            value.abs() <= TRIVIAL_TOLERANCE
        } else {
            value <= TRIVIAL_TOLERANCE
        })
    }
}

impl FormatWithVars for Constraint {
    fn format_with<FUN>(&self, f: &mut Formatter<'_>, variable_format: FUN) -> std::fmt::Result
    where
        FUN: FnMut(&mut Formatter<'_>, Variable) -> std::fmt::Result,
    {
        self.expression.linear.format_with(f, variable_format)?;
        write!(f, " {} ", if self.is_equality { "=" } else { "<=" })?;
        write!(f, "{}", self.rhs())
    }
}

impl Debug for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format_debug(f)
    }
}

/// equals
pub fn eq<A: IntoAffineExpression, B: IntoAffineExpression>(a: A, b: B) -> Constraint {
    let mut expression = Expression::from_other_affine(a);
    expression.subtract(b);
    Constraint::new(expression, true)
}

/// less than or equal
pub fn leq<A: IntoAffineExpression, B: IntoAffineExpression>(a: A, b: B) -> Constraint {
    let mut expression = Expression::from_other_affine(a);
    expression.subtract(b);
    Constraint::new(expression, false)
}

#[derive(Clone, PartialEq, Debug)]
/// A constraint reference contains the sequence id of the constraint within the problem
pub struct ConstraintReference {
    pub(crate) index: usize,
}

impl ConstraintReference {
    /// Position of the constraint in the order it was handed to the solver
    pub fn index(&self) -> usize {
        self.index
    }
}
