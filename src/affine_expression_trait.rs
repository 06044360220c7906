//! Anything that reads as `sum(coefficient * variable) + constant`:
//! plain numbers, expressions, and borrowed expressions.
use fnv::FnvHashMap;

use crate::expression::LinearExpression;
use crate::{Expression, Solution, Variable};

pub trait IntoAffineExpression {
    type Iter: IntoIterator<Item = (Variable, f64)>;

    /// Variables and their coefficients. A variable may show up more than
    /// once, its coefficients then add up.
    fn linear_coefficients(self) -> Self::Iter;

    #[inline]
    fn constant(&self) -> f64 {
        0.
    }

    fn into_expression(self) -> Expression
    where
        Self: Sized,
    {
        let constant = self.constant();
        let mut coefficients = FnvHashMap::default();
        for (var, value) in self.linear_coefficients() {
            *coefficients.entry(var).or_insert(0.) += value;
        }
        Expression {
            linear: LinearExpression { coefficients },
            constant,
        }
    }

    /// Value of the expression with the variable values of a solution
    fn eval_with<S: Solution>(self, values: &S) -> f64
    where
        Self: Sized,
    {
        let constant = self.constant();
        self.linear_coefficients()
            .into_iter()
            .fold(constant, |total, (var, coefficient)| {
                total + coefficient * values.value(var)
            })
    }
}

impl IntoAffineExpression for f64 {
    type Iter = std::iter::Empty<(Variable, f64)>;

    #[inline]
    fn linear_coefficients(self) -> Self::Iter {
        std::iter::empty()
    }

    #[inline]
    fn constant(&self) -> f64 {
        *self
    }
}
