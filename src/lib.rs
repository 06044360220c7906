//! Cargo distribution planning over a three-tier network:
//! hubs ship to focus cities and centers, focus cities forward to centers.
//!
//! Raw site and rate tables are turned into a linear program whose optimal
//! solution is the cheapest way to meet every center's demand within the
//! hub and focus-city capacities.
//!
//! ```rust
//! use hubflow::cost::{CostMatrix, Route};
//! use hubflow::network::{build_model, SolveStatus};
//! use hubflow::site::SiteTables;
//!
//! let mut sites = SiteTables::default();
//! sites.hubs.insert("CVG".into(), 1000.);
//! sites.centers.insert("A".into(), 500.);
//! let costs: CostMatrix = [(Route::new("CVG", "A"), 2.)].into_iter().collect();
//!
//! let solution = build_model(&sites, &costs).solve(hubflow::default_solver, None);
//! assert_eq!(solution.status, SolveStatus::Optimal);
//! assert!((solution.objective_value.unwrap() - 1000.).abs() < 1e-6);
//! ```

pub use affine_expression_trait::IntoAffineExpression;
pub use constraint::Constraint;
pub use error::{Error, InputError};
pub use expression::Expression;
pub use plan::{DistributionPlan, Network};
pub use solvers::{ResolutionError, Solution, SolverModel, WithTimeLimit};
pub use variable::{variable, Variable};

#[cfg(feature = "microlp")]
pub use solvers::microlp::microlp as default_solver;
#[cfg(all(feature = "highs", not(feature = "microlp")))]
pub use solvers::highs::highs as default_solver;

mod affine_expression_trait;
pub mod config;
pub mod consistency;
pub mod constraint;
pub mod cost;
pub mod error;
mod expression;
pub mod input;
pub mod network;
pub mod plan;
pub mod report;
pub mod site;
pub mod solvers;
pub mod variable;
