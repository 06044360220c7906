use std::fmt::{Debug, Formatter};

use fnv::FnvHashMap as HashMap;

use crate::affine_expression_trait::IntoAffineExpression;
use crate::constraint;
use crate::variable::{FormatWithVars, Variable};
use crate::{Constraint, Solution};

/// The variable part of an expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpression {
    pub(crate) coefficients: HashMap<Variable, f64>,
}

impl LinearExpression {
    /// Terms ordered by variable, so that printed models are stable
    pub(crate) fn sorted_terms(&self) -> Vec<(Variable, f64)> {
        let mut terms: Vec<(Variable, f64)> =
            self.coefficients.iter().map(|(&v, &c)| (v, c)).collect();
        terms.sort_unstable_by_key(|&(var, _)| var);
        terms
    }
}

impl IntoAffineExpression for LinearExpression {
    type Iter = std::collections::hash_map::IntoIter<Variable, f64>;

    #[inline]
    fn linear_coefficients(self) -> Self::Iter {
        self.coefficients.into_iter()
    }
}

/// Return type for `&'a LinearExpression::linear_coefficients`
#[doc(hidden)]
pub struct CopiedCoefficients<'a>(std::collections::hash_map::Iter<'a, Variable, f64>);

impl Iterator for CopiedCoefficients<'_> {
    type Item = (Variable, f64);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(&var, &c)| (var, c))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a> IntoAffineExpression for &'a LinearExpression {
    type Iter = CopiedCoefficients<'a>;

    #[inline]
    fn linear_coefficients(self) -> Self::Iter {
        CopiedCoefficients(self.coefficients.iter())
    }
}

impl FormatWithVars for LinearExpression {
    fn format_with<FUN>(&self, f: &mut Formatter<'_>, mut variable_format: FUN) -> std::fmt::Result
    where
        FUN: FnMut(&mut Formatter<'_>, Variable) -> std::fmt::Result,
    {
        let mut first = true;
        for (var, coeff) in self.sorted_terms() {
            if coeff != 0f64 {
                if first {
                    first = false;
                } else {
                    write!(f, " + ")?;
                }
                if (coeff - 1.).abs() > f64::EPSILON {
                    write!(f, "{} ", coeff)?;
                }
                variable_format(f, var)?;
            }
        }
        if first {
            write!(f, "0")?;
        }
        Ok(())
    }
}

/// A weighted sum of flows plus a constant, such as the total cost of a
/// network or the tons entering a site
#[derive(Clone, Default, PartialEq)]
pub struct Expression {
    pub(crate) linear: LinearExpression,
    pub(crate) constant: f64,
}

impl IntoAffineExpression for Expression {
    type Iter = <LinearExpression as IntoAffineExpression>::Iter;

    #[inline]
    fn linear_coefficients(self) -> Self::Iter {
        self.linear.linear_coefficients()
    }

    #[inline]
    fn constant(&self) -> f64 {
        self.constant
    }
}

/// This implementation copies all the variables and coefficients from the referenced
/// Expression into the created iterator
impl<'a> IntoAffineExpression for &'a Expression {
    type Iter = <&'a LinearExpression as IntoAffineExpression>::Iter;

    #[inline]
    fn linear_coefficients(self) -> Self::Iter {
        (&self.linear).linear_coefficients()
    }

    #[inline]
    fn constant(&self) -> f64 {
        self.constant
    }
}

impl Debug for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format_debug(f)
    }
}

impl Expression {
    /// Create a concrete expression struct from anything that has linear coefficients and a constant
    pub fn from_other_affine<E: IntoAffineExpression>(source: E) -> Self {
        source.into_expression()
    }

    /// Creates a constraint indicating that this expression
    /// is lesser than or equal to the right hand side
    pub fn leq<RHS: IntoAffineExpression>(self, rhs: RHS) -> Constraint {
        constraint::leq(self, rhs)
    }

    /// Creates a constraint indicating that this expression
    /// is equal to the right hand side
    pub fn eq<RHS: IntoAffineExpression>(self, rhs: RHS) -> Constraint {
        constraint::eq(self, rhs)
    }

    /// self = self - other
    pub(crate) fn subtract<E: IntoAffineExpression>(&mut self, other: E) {
        self.constant -= other.constant();
        for (var, value) in other.linear_coefficients() {
            *self.linear.coefficients.entry(var).or_default() -= value;
        }
    }

    /// See [IntoAffineExpression::eval_with]
    pub fn eval_with<S: Solution>(&self, values: &S) -> f64 {
        IntoAffineExpression::eval_with(self, values)
    }

    /// Add a linear term to this expression
    pub fn add_linear_term(&mut self, var: Variable, coefficient: f64) {
        *self.linear.coefficients.entry(var).or_default() += coefficient;
    }

    /// The coefficient of a variable, zero when it does not appear
    pub fn coefficient(&self, var: Variable) -> f64 {
        self.linear.coefficients.get(&var).copied().unwrap_or(0.)
    }

    /// Number of variables with a non-zero coefficient
    pub fn num_terms(&self) -> usize {
        self.linear
            .coefficients
            .values()
            .filter(|&&c| c != 0.)
            .count()
    }

    /// True when no variable has a non-zero coefficient
    pub fn is_constant(&self) -> bool {
        self.num_terms() == 0
    }
}

impl FormatWithVars for Expression {
    fn format_with<FUN>(&self, f: &mut Formatter<'_>, variable_format: FUN) -> std::fmt::Result
    where
        FUN: FnMut(&mut Formatter<'_>, Variable) -> std::fmt::Result,
    {
        self.linear.format_with(f, variable_format)?;
        if self.constant.abs() >= f64::EPSILON {
            write!(f, " + {}", self.constant)?;
        }
        Ok(())
    }
}
