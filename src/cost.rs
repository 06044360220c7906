//! Per-ton shipping costs over ordered (origin, destination) pairs.
//!
//! The matrix is seeded with contractually fixed override routes, filled from
//! the tabular rate sheet (one row per center, one column per origin), then
//! adjusted by discount rules.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::site::normalize_name;

/// A directed shipping lane between two canonical site ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl Route {
    pub fn new(origin: &str, destination: &str) -> Self {
        Route {
            origin: origin.to_string(),
            destination: destination.to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.origin, self.destination)
    }
}

/// One row of the rate sheet: a center and the rate from each origin column.
///
/// Cells are kept as raw JSON so that text columns next to the rates, such
/// as a region label, do not break the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRow {
    #[serde(rename = "Center")]
    pub center: String,
    #[serde(flatten)]
    pub cells: BTreeMap<String, Value>,
}

impl CostRow {
    pub fn new(center: &str, rates: &[(&str, Option<f64>)]) -> Self {
        CostRow {
            center: center.to_string(),
            cells: rates
                .iter()
                .map(|&(column, rate)| {
                    (column.to_string(), rate.map_or(Value::Null, Value::from))
                })
                .collect(),
        }
    }

    /// The rate in a column, `None` when the cell is missing, empty or not a number
    pub fn rate(&self, column: &str) -> Option<f64> {
        self.cells.get(column).and_then(Value::as_f64)
    }
}

/// A rate-sheet column and the hub or focus city it ships from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginColumn {
    pub column: String,
    pub origin: String,
}

impl OriginColumn {
    pub fn new(column: &str, origin: &str) -> Self {
        OriginColumn {
            column: column.to_string(),
            origin: origin.to_string(),
        }
    }
}

/// A fixed rate that is not part of the rate sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOverride {
    pub origin: String,
    pub destination: String,
    pub cost: f64,
}

impl RouteOverride {
    pub fn new(origin: &str, destination: &str, cost: f64) -> Self {
        RouteOverride {
            origin: origin.to_string(),
            destination: destination.to_string(),
            cost,
        }
    }
}

/// Selects the routes a discount applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSelector {
    OriginContains(String),
    DestinationContains(String),
    /// Either end of the route contains the token
    EndpointContains(String),
}

impl RouteSelector {
    pub fn matches(&self, route: &Route) -> bool {
        match self {
            RouteSelector::OriginContains(token) => route.origin.contains(token.as_str()),
            RouteSelector::DestinationContains(token) => {
                route.destination.contains(token.as_str())
            }
            RouteSelector::EndpointContains(token) => {
                route.origin.contains(token.as_str()) || route.destination.contains(token.as_str())
            }
        }
    }
}

/// How much a discount takes off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    /// Costs are multiplied by this factor
    Factor(f64),
    /// Successive percentage reductions, `[10., 5.]` gives `0.9 * 0.95`
    PercentOff(Vec<f64>),
}

impl Reduction {
    pub fn factor(&self) -> f64 {
        match self {
            Reduction::Factor(factor) => *factor,
            Reduction::PercentOff(steps) => steps.iter().map(|p| 1. - p / 100.).product(),
        }
    }
}

/// A negotiated rate adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountRule {
    pub name: String,
    pub selector: RouteSelector,
    pub reduction: Reduction,
}

impl DiscountRule {
    pub fn new(name: &str, selector: RouteSelector, reduction: Reduction) -> Self {
        DiscountRule {
            name: name.to_string(),
            selector,
            reduction,
        }
    }

    /// The negotiated Leipzig rate: 10% off every route touching Leipzig
    pub fn leipzig() -> Self {
        DiscountRule::new(
            "leipzig",
            RouteSelector::EndpointContains("Leipzig".into()),
            Reduction::PercentOff(vec![10.]),
        )
    }

    fn validate(&self) -> Result<f64, CostError> {
        let factor = self.reduction.factor();
        if factor.is_finite() && factor >= 0. {
            Ok(factor)
        } else {
            Err(CostError::InvalidFactor {
                rule: self.name.clone(),
                factor,
            })
        }
    }
}

/// How many routes a discount rule touched
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountOutcome {
    pub rule: String,
    pub factor: f64,
    pub routes: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum CostError {
    #[error("invalid rate {cost} for route {route}")]
    InvalidRate { route: Route, cost: f64 },
    #[error("route {route} is priced both {first} and {second}")]
    ConflictingRate {
        route: Route,
        first: f64,
        second: f64,
    },
    #[error("discount {rule:?} has an invalid factor {factor}")]
    InvalidFactor { rule: String, factor: f64 },
}

/// Cost per ton for every priced route
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostMatrix {
    costs: BTreeMap<Route, f64>,
}

impl CostMatrix {
    pub fn new() -> Self {
        CostMatrix::default()
    }

    pub fn get(&self, origin: &str, destination: &str) -> Option<f64> {
        // BTreeMap lookups need an owned key
        self.costs.get(&Route::new(origin, destination)).copied()
    }

    pub fn contains(&self, origin: &str, destination: &str) -> bool {
        self.get(origin, destination).is_some()
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    /// Routes in (origin, destination) order
    pub fn iter(&self) -> impl Iterator<Item = (&Route, f64)> {
        self.costs.iter().map(|(route, &cost)| (route, cost))
    }

    /// Every id that some route delivers to
    pub fn destinations(&self) -> BTreeSet<&str> {
        self.costs
            .keys()
            .map(|route| route.destination.as_str())
            .collect()
    }

    fn insert_new(&mut self, route: Route, cost: f64) -> Result<(), CostError> {
        if !cost.is_finite() || cost < 0. {
            return Err(CostError::InvalidRate { route, cost });
        }
        match self.costs.entry(route) {
            Entry::Vacant(slot) => {
                slot.insert(cost);
                Ok(())
            }
            Entry::Occupied(slot) if *slot.get() == cost => Ok(()),
            Entry::Occupied(slot) => Err(CostError::ConflictingRate {
                route: slot.key().clone(),
                first: *slot.get(),
                second: cost,
            }),
        }
    }
}

impl FromIterator<(Route, f64)> for CostMatrix {
    fn from_iter<I: IntoIterator<Item = (Route, f64)>>(iter: I) -> Self {
        CostMatrix {
            costs: iter.into_iter().collect(),
        }
    }
}

/// The cost matrix together with what happened while building it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostSheet {
    pub matrix: CostMatrix,
    /// One entry per discount rule, in application order
    pub discounts: Vec<DiscountOutcome>,
    /// Rate-sheet entries dropped because an override prices the same route
    pub shadowed: Vec<Route>,
}

/// Builds the discounted cost matrix.
///
/// Overrides take precedence over rate-sheet cells for the same route. Two
/// rate-sheet cells pricing one route differently are an error.
pub fn build_costs(
    rows: &[CostRow],
    origins: &[OriginColumn],
    overrides: &[RouteOverride],
    rules: &[DiscountRule],
) -> Result<CostSheet, CostError> {
    let mut matrix = CostMatrix::new();
    for route_override in overrides {
        let route = Route::new(&route_override.origin, &route_override.destination);
        matrix.insert_new(route, route_override.cost)?;
    }
    let fixed: BTreeSet<Route> = matrix.costs.keys().cloned().collect();

    let mut shadowed = Vec::new();
    for row in rows {
        let center = normalize_name(&row.center);
        for origin in origins {
            let Some(cost) = row.rate(&origin.column) else {
                if let Some(cell) = row.cells.get(&origin.column).filter(|c| !c.is_null()) {
                    warn!(
                        center = %row.center,
                        column = %origin.column,
                        %cell,
                        "rate is not a number"
                    );
                }
                continue;
            };
            let route = Route::new(&origin.origin, &center);
            if fixed.contains(&route) {
                warn!(%route, cost, "rate sheet entry shadowed by an override");
                shadowed.push(route);
                continue;
            }
            matrix.insert_new(route, cost)?;
        }
    }
    debug!(routes = matrix.len(), "cost matrix created");

    let (matrix, discounts) = apply_discounts(&matrix, rules)?;
    Ok(CostSheet {
        matrix,
        discounts,
        shadowed,
    })
}

/// Applies the rules in order and returns a new matrix.
///
/// Each rule scans the whole matrix as left by the previous rules, so a
/// route matched by two rules gets both factors.
pub fn apply_discounts(
    matrix: &CostMatrix,
    rules: &[DiscountRule],
) -> Result<(CostMatrix, Vec<DiscountOutcome>), CostError> {
    let mut costs = matrix.costs.clone();
    let mut outcomes = Vec::with_capacity(rules.len());
    for rule in rules {
        let factor = rule.validate()?;
        let mut routes = 0;
        for (route, cost) in costs.iter_mut() {
            if rule.selector.matches(route) {
                *cost *= factor;
                routes += 1;
            }
        }
        debug!(rule = %rule.name, factor, routes, "applied discount");
        outcomes.push(DiscountOutcome {
            rule: rule.name.clone(),
            factor,
            routes,
        });
    }
    Ok((CostMatrix { costs }, outcomes))
}

#[cfg(test)]
mod tests {
    use float_eq::assert_float_eq;

    use super::*;

    fn origins() -> Vec<OriginColumn> {
        vec![
            OriginColumn::new("CVG", "CVG"),
            OriginColumn::new("Leipzig", "Leipzig"),
            OriginColumn::new("San Bernadino", "San"),
        ]
    }

    #[test]
    fn reads_every_non_null_cell() {
        let rows = vec![
            CostRow::new(
                "Atlanta, GA",
                &[("CVG", Some(1.2)), ("Leipzig", None), ("San Bernadino", Some(0.8))],
            ),
            CostRow::new("New York/Newark", &[("Leipzig", Some(2.5))]),
        ];
        let sheet = build_costs(&rows, &origins(), &[], &[]).unwrap();
        assert_eq!(sheet.matrix.len(), 3);
        assert_eq!(sheet.matrix.get("CVG", "Atlanta_GA"), Some(1.2));
        assert_eq!(sheet.matrix.get("San", "Atlanta_GA"), Some(0.8));
        assert_eq!(sheet.matrix.get("Leipzig", "New_York_Newark"), Some(2.5));
        assert!(!sheet.matrix.contains("Leipzig", "Atlanta_GA"));
    }

    #[test]
    fn unknown_columns_are_ignored() {
        let rows = vec![CostRow::new("Boston", &[("Memphis", Some(3.))])];
        let sheet = build_costs(&rows, &origins(), &[], &[]).unwrap();
        assert!(sheet.matrix.is_empty());
    }

    #[test]
    fn overrides_take_precedence() {
        let rows = vec![CostRow::new("Leipzig", &[("CVG", Some(9.))])];
        let overrides = vec![RouteOverride::new("CVG", "Leipzig", 1.5)];
        let sheet = build_costs(&rows, &origins(), &overrides, &[]).unwrap();
        assert_eq!(sheet.matrix.get("CVG", "Leipzig"), Some(1.5));
        assert_eq!(sheet.shadowed, vec![Route::new("CVG", "Leipzig")]);
    }

    #[test]
    fn conflicting_rows_are_rejected() {
        let rows = vec![
            CostRow::new("Boston", &[("CVG", Some(1.))]),
            CostRow::new("Boston", &[("CVG", Some(2.))]),
        ];
        assert_eq!(
            build_costs(&rows, &origins(), &[], &[]),
            Err(CostError::ConflictingRate {
                route: Route::new("CVG", "Boston"),
                first: 1.,
                second: 2.
            })
        );
    }

    #[test]
    fn repeated_identical_rows_are_fine() {
        let rows = vec![
            CostRow::new("Boston", &[("CVG", Some(1.))]),
            CostRow::new("Boston", &[("CVG", Some(1.))]),
        ];
        assert!(build_costs(&rows, &origins(), &[], &[]).is_ok());
    }

    #[test]
    fn negative_rates_are_rejected() {
        let rows = vec![CostRow::new("Boston", &[("CVG", Some(-1.))])];
        assert!(matches!(
            build_costs(&rows, &origins(), &[], &[]),
            Err(CostError::InvalidRate { .. })
        ));
    }

    #[test]
    fn single_leipzig_discount() {
        let matrix: CostMatrix = vec![(Route::new("CVG", "Leipzig"), 1.5)]
            .into_iter()
            .collect();
        let rule = DiscountRule::new(
            "leipzig",
            RouteSelector::DestinationContains("Leipzig".into()),
            Reduction::Factor(0.9),
        );
        let (discounted, outcomes) = apply_discounts(&matrix, &[rule.clone()]).unwrap();
        assert_float_eq!(discounted.get("CVG", "Leipzig").unwrap(), 1.35, abs <= 1e-12);
        assert_eq!(outcomes[0].routes, 1);

        let (twice, _) = apply_discounts(&matrix, &[rule.clone(), rule]).unwrap();
        assert_float_eq!(twice.get("CVG", "Leipzig").unwrap(), 1.215, abs <= 1e-12);
        // the input matrix is left untouched
        assert_eq!(matrix.get("CVG", "Leipzig"), Some(1.5));
    }

    #[test]
    fn unit_factor_is_idempotent() {
        let matrix: CostMatrix = vec![(Route::new("CVG", "Leipzig"), 1.5)]
            .into_iter()
            .collect();
        let rule = DiscountRule::new(
            "noop",
            RouteSelector::EndpointContains("Leipzig".into()),
            Reduction::Factor(1.),
        );
        let (once, _) = apply_discounts(&matrix, &[rule.clone()]).unwrap();
        let (twice, _) = apply_discounts(&once, &[rule]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn stacked_rules_compose_multiplicatively() {
        let matrix: CostMatrix = vec![
            (Route::new("CVG", "Leipzig"), 1.5),
            (Route::new("Leipzig", "Berlin"), 2.),
            (Route::new("AFW", "Berlin"), 1.),
        ]
        .into_iter()
        .collect();
        let rules = vec![
            DiscountRule::leipzig(),
            DiscountRule::new(
                "cvg",
                RouteSelector::OriginContains("CVG".into()),
                Reduction::PercentOff(vec![20.]),
            ),
        ];
        let (discounted, outcomes) = apply_discounts(&matrix, &rules).unwrap();
        assert_float_eq!(discounted.get("CVG", "Leipzig").unwrap(), 1.5 * 0.9 * 0.8, abs <= 1e-12);
        assert_float_eq!(discounted.get("Leipzig", "Berlin").unwrap(), 1.8, abs <= 1e-12);
        assert_eq!(discounted.get("AFW", "Berlin"), Some(1.));
        assert_eq!(
            outcomes.iter().map(|o| o.routes).collect::<Vec<_>>(),
            vec![2, 1]
        );
    }

    #[test]
    fn percent_steps_compound() {
        let reduction = Reduction::PercentOff(vec![10., 17.]);
        assert_float_eq!(reduction.factor(), 0.9 * 0.83, abs <= 1e-12);
    }

    #[test]
    fn discounts_reach_overrides() {
        let overrides = vec![RouteOverride::new("CVG", "Leipzig", 1.5)];
        let sheet = build_costs(&[], &origins(), &overrides, &[DiscountRule::leipzig()]).unwrap();
        assert_float_eq!(sheet.matrix.get("CVG", "Leipzig").unwrap(), 1.35, abs <= 1e-12);
        assert_eq!(sheet.discounts[0].routes, 1);
    }

    #[test]
    fn negative_factor_is_rejected() {
        let rule = DiscountRule::new(
            "bad",
            RouteSelector::EndpointContains("x".into()),
            Reduction::Factor(-0.5),
        );
        assert!(matches!(
            apply_discounts(&CostMatrix::new(), &[rule]),
            Err(CostError::InvalidFactor { .. })
        ));
    }

    #[test]
    fn rows_deserialize_with_null_cells() {
        let rows: Vec<CostRow> = serde_json::from_str(
            r#"[{"Center": "Atlanta, GA", "CVG": 1.25, "AFW": null}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].center, "Atlanta, GA");
        assert_eq!(rows[0].rate("CVG"), Some(1.25));
        assert_eq!(rows[0].rate("AFW"), None);
        assert_eq!(rows[0].rate("Hyderabad"), None);
    }

    #[test]
    fn text_columns_do_not_break_the_sheet() {
        let rows: Vec<CostRow> = serde_json::from_str(
            r#"[
                {"Center": "Atlanta, GA", "Region": "Southeast", "CVG": 1.25, "AFW": "n/a"},
                {"Center": "Berlin, Germany", "Region": "EU", "CVG": 3.0, "AFW": 2.5}
            ]"#,
        )
        .unwrap();
        assert_eq!(rows[0].rate("Region"), None);
        assert_eq!(rows[0].rate("AFW"), None);

        let origins = vec![OriginColumn::new("CVG", "CVG"), OriginColumn::new("AFW", "AFW")];
        let sheet = build_costs(&rows, &origins, &[], &[]).unwrap();
        assert_eq!(sheet.matrix.get("CVG", "Atlanta_GA"), Some(1.25));
        assert_eq!(sheet.matrix.get("AFW", "Atlanta_GA"), None);
        assert_eq!(sheet.matrix.get("AFW", "Berlin_Germany"), Some(2.5));
        assert_eq!(sheet.matrix.len(), 3);
    }
}
