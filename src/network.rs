//! The three-tier flow model: one variable per priced lane, the cost objective,
//! and the capacity, conservation and demand constraints.
//!
//! Variables exist only for routes the cost matrix prices. A lane with no
//! cost is not merely expensive, it is not part of the model.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cost::{CostMatrix, Route};
use crate::site::SiteTables;
use crate::solvers::{ResolutionError, Solution, SolverModel, WithTimeLimit};
use crate::variable::{variable, FormatWithVars, ProblemVariables, UnsolvedProblem};
use crate::{constraint, Constraint, Expression, Variable};

/// The kind of lane a flow variable ships along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lane {
    HubToFocusCity,
    HubToCenter,
    FocusCityToCenter,
}

impl Lane {
    fn prefix(self) -> &'static str {
        match self {
            Lane::HubToFocusCity => "x",
            Lane::HubToCenter => "y",
            Lane::FocusCityToCenter => "z",
        }
    }
}

impl Display for Lane {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lane::HubToFocusCity => "hub to focus city",
            Lane::HubToCenter => "hub to center",
            Lane::FocusCityToCenter => "focus city to center",
        })
    }
}

/// A priced route and the variable carrying its tons
#[derive(Debug, Clone, PartialEq)]
pub struct Arc {
    pub lane: Lane,
    pub route: Route,
    pub cost: f64,
    pub variable: Variable,
}

/// The four groups of constraints of the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintFamily {
    /// Everything leaving a hub fits its capacity
    HubCapacity,
    /// Everything reaching a focus city fits its capacity
    FocusCityCapacity,
    /// A focus city forwards exactly what it receives
    FocusCityConservation,
    /// A center receives exactly its demand
    CenterDemand,
}

impl ConstraintFamily {
    fn label(self) -> &'static str {
        match self {
            ConstraintFamily::HubCapacity => "hub_capacity",
            ConstraintFamily::FocusCityCapacity => "focus_capacity",
            ConstraintFamily::FocusCityConservation => "focus_conservation",
            ConstraintFamily::CenterDemand => "center_demand",
        }
    }
}

/// A constraint and the site it was written for
#[derive(Debug, Clone)]
pub struct SiteConstraint {
    pub family: ConstraintFamily,
    pub site: String,
    pub constraint: Constraint,
}

/// Outcome of handing the model to a solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    TimedOut,
    Undefined,
}

impl Display for SolveStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolveStatus::Optimal => "Optimal",
            SolveStatus::Infeasible => "Infeasible",
            SolveStatus::Unbounded => "Unbounded",
            SolveStatus::TimedOut => "TimedOut",
            SolveStatus::Undefined => "Undefined",
        })
    }
}

impl From<&ResolutionError> for SolveStatus {
    fn from(error: &ResolutionError) -> Self {
        match error {
            ResolutionError::Infeasible => SolveStatus::Infeasible,
            ResolutionError::Unbounded => SolveStatus::Unbounded,
            ResolutionError::TimedOut(_) => SolveStatus::TimedOut,
            ResolutionError::Other(_) => SolveStatus::Undefined,
        }
    }
}

/// Tons shipped along one route in a solved model
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub lane: Lane,
    pub route: Route,
    pub cost: f64,
    pub tons: f64,
}

/// What the solver made of the model. Flows are only filled in for an optimal status.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSolution {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    pub flows: Vec<Flow>,
    /// The solver's explanation when it failed for another reason than infeasibility
    pub message: Option<String>,
}

impl FlowSolution {
    fn failed(error: &ResolutionError) -> Self {
        let message = match error {
            ResolutionError::Other(message) => Some(message.clone()),
            _ => None,
        };
        FlowSolution {
            status: error.into(),
            objective_value: None,
            flows: vec![],
            message,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    /// Tons on a route, `None` when the route has no variable or there is no solution
    pub fn tons(&self, origin: &str, destination: &str) -> Option<f64> {
        self.flows
            .iter()
            .find(|flow| flow.route.origin == origin && flow.route.destination == destination)
            .map(|flow| flow.tons)
    }

    /// Flows of one lane
    pub fn lane(&self, lane: Lane) -> impl Iterator<Item = &Flow> {
        self.flows.iter().filter(move |flow| flow.lane == lane)
    }

    /// Total tons received by a site
    pub fn inbound(&self, site: &str) -> f64 {
        self.flows
            .iter()
            .filter(|flow| flow.route.destination == site)
            .map(|flow| flow.tons)
            .sum()
    }

    /// Total tons leaving a site
    pub fn outbound(&self, site: &str) -> f64 {
        self.flows
            .iter()
            .filter(|flow| flow.route.origin == site)
            .map(|flow| flow.tons)
            .sum()
    }
}

/// The linear program of a distribution network
#[derive(Debug, Clone)]
pub struct FlowModel {
    variables: ProblemVariables,
    arcs: Vec<Arc>,
    objective: Expression,
    constraints: Vec<SiteConstraint>,
}

#[derive(Default)]
struct Sums {
    hub_out: BTreeMap<String, Expression>,
    focus_in: BTreeMap<String, Expression>,
    focus_out: BTreeMap<String, Expression>,
    center_in: BTreeMap<String, Expression>,
}

fn add_to(sums: &mut BTreeMap<String, Expression>, site: &str, var: Variable) {
    sums.entry(site.to_string()).or_default().add_linear_term(var, 1.);
}

fn take(sums: &mut BTreeMap<String, Expression>, site: &str) -> Expression {
    sums.remove(site).unwrap_or_default()
}

/// Builds the flow model of a network.
///
/// Every hub, focus city and center gets its constraints, even when no
/// variable touches it. An unreachable center with a positive demand then
/// shows up as an infeasible model.
pub fn build_model(sites: &SiteTables, costs: &CostMatrix) -> FlowModel {
    let mut variables = ProblemVariables::new();
    let mut arcs = Vec::new();
    let mut objective = Expression::default();
    let mut sums = Sums::default();

    let lanes = [
        (Lane::HubToFocusCity, &sites.hubs, &sites.focus_cities),
        (Lane::HubToCenter, &sites.hubs, &sites.centers),
        (Lane::FocusCityToCenter, &sites.focus_cities, &sites.centers),
    ];
    for (lane, origins, destinations) in lanes {
        for origin in origins.keys() {
            for destination in destinations.keys() {
                let Some(cost) = costs.get(origin, destination) else {
                    continue;
                };
                let name = format!("{}_{}_{}", lane.prefix(), origin, destination);
                let var = variables.add(variable().min(0).name(name));
                objective.add_linear_term(var, cost);
                match lane {
                    Lane::HubToFocusCity => {
                        add_to(&mut sums.hub_out, origin, var);
                        add_to(&mut sums.focus_in, destination, var);
                    }
                    Lane::HubToCenter => {
                        add_to(&mut sums.hub_out, origin, var);
                        add_to(&mut sums.center_in, destination, var);
                    }
                    Lane::FocusCityToCenter => {
                        add_to(&mut sums.focus_out, origin, var);
                        add_to(&mut sums.center_in, destination, var);
                    }
                }
                arcs.push(Arc {
                    lane,
                    route: Route::new(origin, destination),
                    cost,
                    variable: var,
                });
            }
        }
    }

    let mut constraints = Vec::with_capacity(
        sites.hubs.len() + 2 * sites.focus_cities.len() + sites.centers.len(),
    );
    let mut push = |family: ConstraintFamily, site: &str, constraint: Constraint| {
        let name = format!("{}[{}]", family.label(), site);
        constraints.push(SiteConstraint {
            family,
            site: site.to_string(),
            constraint: constraint.set_name(name),
        });
    };
    for (hub, &capacity) in &sites.hubs {
        let outflow = take(&mut sums.hub_out, hub);
        push(ConstraintFamily::HubCapacity, hub, outflow.leq(capacity));
    }
    for (focus, &capacity) in &sites.focus_cities {
        let inflow = take(&mut sums.focus_in, focus);
        let outflow = take(&mut sums.focus_out, focus);
        push(
            ConstraintFamily::FocusCityCapacity,
            focus,
            inflow.clone().leq(capacity),
        );
        push(
            ConstraintFamily::FocusCityConservation,
            focus,
            constraint::eq(outflow, inflow),
        );
    }
    for (center, &demand) in &sites.centers {
        let supply = take(&mut sums.center_in, center);
        push(ConstraintFamily::CenterDemand, center, supply.eq(demand));
    }

    let model = FlowModel {
        variables,
        arcs,
        objective,
        constraints,
    };
    info!(
        hub_to_focus = model.lane_size(Lane::HubToFocusCity),
        hub_to_center = model.lane_size(Lane::HubToCenter),
        focus_to_center = model.lane_size(Lane::FocusCityToCenter),
        constraints = model.constraints.len(),
        "flow model built"
    );
    model
}

impl FlowModel {
    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn constraints(&self) -> &[SiteConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &Expression {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Number of variables on one lane
    pub fn lane_size(&self, lane: Lane) -> usize {
        self.arcs.iter().filter(|arc| arc.lane == lane).count()
    }

    /// The arc of a route, if the route has a variable
    pub fn arc(&self, origin: &str, destination: &str) -> Option<&Arc> {
        self.arcs
            .iter()
            .find(|arc| arc.route.origin == origin && arc.route.destination == destination)
    }

    /// Constraints of one family
    pub fn family(&self, family: ConstraintFamily) -> impl Iterator<Item = &SiteConstraint> {
        self.constraints
            .iter()
            .filter(move |constraint| constraint.family == family)
    }

    /// The minimization problem, ready to be handed to a solver
    pub fn to_problem(&self) -> UnsolvedProblem {
        self.variables.clone().minimise(&self.objective)
    }

    /// Solves the model with the given solver.
    ///
    /// Constraints without variables are decided here: one that cannot hold
    /// makes the model infeasible before the solver is even called.
    pub fn solve<S, P>(&self, solver: S, time_limit: Option<Duration>) -> FlowSolution
    where
        S: FnOnce(UnsolvedProblem) -> P,
        P: SolverModel<Error = ResolutionError> + WithTimeLimit,
    {
        let mut solvable = Vec::with_capacity(self.constraints.len());
        for site_constraint in &self.constraints {
            match site_constraint.constraint.trivially_satisfied() {
                Some(true) => {}
                Some(false) => {
                    warn!(
                        constraint = site_constraint.constraint.name().unwrap_or_default(),
                        "constraint without variables cannot hold"
                    );
                    return FlowSolution::failed(&ResolutionError::Infeasible);
                }
                None => solvable.push(site_constraint.constraint.clone()),
            }
        }

        if self.variables.is_empty() {
            return FlowSolution {
                status: SolveStatus::Optimal,
                objective_value: Some(0.),
                flows: vec![],
                message: None,
            };
        }

        let mut model = self.to_problem().using(solver);
        if let Some(limit) = time_limit {
            model = model.with_time_limit(limit);
        }
        debug!(
            solver = P::name(),
            variables = self.num_variables(),
            constraints = solvable.len(),
            "solving"
        );
        match model.with_all(solvable).solve() {
            Ok(solution) => self.read_solution(&solution),
            Err(error) => {
                warn!(%error, "no optimal solution");
                FlowSolution::failed(&error)
            }
        }
    }

    fn read_solution<S: Solution>(&self, solution: &S) -> FlowSolution {
        let flows = self
            .arcs
            .iter()
            .map(|arc| Flow {
                lane: arc.lane,
                route: arc.route.clone(),
                cost: arc.cost,
                tons: solution.value(arc.variable),
            })
            .collect();
        FlowSolution {
            status: SolveStatus::Optimal,
            objective_value: Some(self.objective.eval_with(solution)),
            flows,
            message: None,
        }
    }
}

struct Named<'a, T> {
    item: &'a T,
    variables: &'a ProblemVariables,
}

impl<T: FormatWithVars> Display for Named<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.item
            .format_with(f, |f, var| f.write_str(&self.variables.display_name(var)))
    }
}

/// Writes the model as readable LP text
impl Display for FlowModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let objective = Named {
            item: &self.objective,
            variables: &self.variables,
        };
        writeln!(f, "minimize")?;
        writeln!(f, "  {}", objective)?;
        writeln!(f, "subject to")?;
        for site_constraint in &self.constraints {
            let constraint = Named {
                item: &site_constraint.constraint,
                variables: &self.variables,
            };
            let name = site_constraint.constraint.name().unwrap_or_default();
            writeln!(f, "  {}: {}", name, constraint)?;
        }
        writeln!(f, "bounds")?;
        writeln!(f, "  all flows >= 0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::Route;

    fn sites(
        hubs: &[(&str, f64)],
        focus_cities: &[(&str, f64)],
        centers: &[(&str, f64)],
    ) -> SiteTables {
        let table = |entries: &[(&str, f64)]| {
            entries
                .iter()
                .map(|&(id, q)| (id.to_string(), q))
                .collect::<BTreeMap<_, _>>()
        };
        SiteTables {
            hubs: table(hubs),
            focus_cities: table(focus_cities),
            centers: table(centers),
            ..SiteTables::default()
        }
    }

    fn costs(routes: &[(&str, &str, f64)]) -> CostMatrix {
        routes
            .iter()
            .map(|&(o, d, c)| (Route::new(o, d), c))
            .collect()
    }

    #[test]
    fn one_variable_per_priced_lane() {
        let sites = sites(
            &[("CVG", 1000.), ("AFW", 500.)],
            &[("Leipzig", 300.)],
            &[("A", 100.), ("B", 50.)],
        );
        let costs = costs(&[
            ("CVG", "Leipzig", 1.5),
            ("CVG", "A", 2.),
            ("AFW", "B", 1.),
            ("Leipzig", "A", 0.5),
            ("Leipzig", "CVG", 0.1),
            ("Hyderabad", "A", 0.2),
        ]);
        let model = build_model(&sites, &costs);
        assert_eq!(model.num_variables(), 4);
        assert_eq!(model.lane_size(Lane::HubToFocusCity), 1);
        assert_eq!(model.lane_size(Lane::HubToCenter), 2);
        assert_eq!(model.lane_size(Lane::FocusCityToCenter), 1);
        assert!(model.arc("Leipzig", "CVG").is_none());
        assert!(model.arc("AFW", "A").is_none());
        for arc in model.arcs() {
            assert_eq!(
                costs.get(&arc.route.origin, &arc.route.destination),
                Some(arc.cost)
            );
            assert_eq!(model.objective().coefficient(arc.variable), arc.cost);
        }
    }

    #[test]
    fn every_site_gets_its_constraints() {
        let sites = sites(&[("CVG", 1000.)], &[("San", 0.)], &[("A", 0.), ("B", 10.)]);
        let model = build_model(&sites, &costs(&[("CVG", "A", 2.)]));
        assert_eq!(model.family(ConstraintFamily::HubCapacity).count(), 1);
        assert_eq!(model.family(ConstraintFamily::FocusCityCapacity).count(), 1);
        assert_eq!(model.family(ConstraintFamily::FocusCityConservation).count(), 1);
        assert_eq!(model.family(ConstraintFamily::CenterDemand).count(), 2);
        let demand_b = model
            .family(ConstraintFamily::CenterDemand)
            .find(|c| c.site == "B")
            .unwrap();
        assert!(demand_b.constraint.is_equality());
        assert_eq!(demand_b.constraint.trivially_satisfied(), Some(false));
    }

    #[test]
    fn conservation_balances_inbound_and_outbound() {
        let sites = sites(&[("CVG", 1000.)], &[("San", 400.)], &[("A", 100.)]);
        let model = build_model(&sites, &costs(&[("CVG", "San", 0.5), ("San", "A", 0.3)]));
        let conservation = model
            .family(ConstraintFamily::FocusCityConservation)
            .next()
            .unwrap();
        let inbound = model.arc("CVG", "San").unwrap().variable;
        let outbound = model.arc("San", "A").unwrap().variable;
        let expression = conservation.constraint.expression();
        assert_eq!(expression.coefficient(outbound), 1.);
        assert_eq!(expression.coefficient(inbound), -1.);
        assert_eq!(conservation.constraint.rhs(), 0.);
    }

    #[test]
    fn prints_readable_lp() {
        let sites = sites(&[("CVG", 1000.)], &[], &[("A", 500.)]);
        let model = build_model(&sites, &costs(&[("CVG", "A", 2.)]));
        let text = model.to_string();
        assert!(text.contains("2 y_CVG_A"), "{}", text);
        assert!(text.contains("hub_capacity[CVG]: y_CVG_A <= 1000"), "{}", text);
        assert!(text.contains("center_demand[A]: y_CVG_A = 500"), "{}", text);
    }

    #[cfg(feature = "microlp")]
    mod solved {
        use super::*;
        use crate::solvers::microlp::microlp;
        use float_eq::assert_float_eq;

        #[test]
        fn single_lane_meets_demand() {
            let sites = sites(&[("CVG", 1000.)], &[], &[("A", 500.)]);
            let model = build_model(&sites, &costs(&[("CVG", "A", 2.)]));
            let solution = model.solve(microlp, None);
            assert_eq!(solution.status, SolveStatus::Optimal);
            assert_float_eq!(solution.objective_value.unwrap(), 1000., abs <= 1e-6);
            assert_float_eq!(solution.tons("CVG", "A").unwrap(), 500., abs <= 1e-6);
        }

        #[test]
        fn demand_beyond_capacity_is_infeasible() {
            let sites = sites(&[("CVG", 1000.)], &[], &[("A", 1500.)]);
            let model = build_model(&sites, &costs(&[("CVG", "A", 2.)]));
            let solution = model.solve(microlp, None);
            assert_eq!(solution.status, SolveStatus::Infeasible);
            assert_eq!(solution.objective_value, None);
            assert!(solution.flows.is_empty());
        }

        #[test]
        fn cheaper_path_through_focus_city() {
            let sites = sites(
                &[("CVG", 1000.)],
                &[("Leipzig", 300.)],
                &[("A", 400.), ("B", 100.)],
            );
            let costs = costs(&[
                ("CVG", "A", 2.),
                ("CVG", "B", 2.),
                ("CVG", "Leipzig", 0.5),
                ("Leipzig", "A", 0.5),
            ]);
            let model = build_model(&sites, &costs);
            let solution = model.solve(microlp, None);
            assert!(solution.is_optimal());
            assert_float_eq!(solution.tons("CVG", "Leipzig").unwrap(), 300., abs <= 1e-6);
            assert_float_eq!(solution.tons("Leipzig", "A").unwrap(), 300., abs <= 1e-6);
            assert_float_eq!(solution.tons("CVG", "A").unwrap(), 100., abs <= 1e-6);
            assert_float_eq!(
                solution.inbound("Leipzig"),
                solution.outbound("Leipzig"),
                abs <= 1e-6
            );
            for (center, demand) in &sites.centers {
                assert_float_eq!(solution.inbound(center), *demand, abs <= 1e-6);
            }
            // 300 * (0.5 + 0.5) + 100 * 2 + 100 * 2
            assert_float_eq!(solution.objective_value.unwrap(), 700., abs <= 1e-6);
        }

        #[test]
        fn unreachable_center_is_infeasible_before_solving() {
            let sites = sites(&[("CVG", 1000.)], &[], &[("A", 10.), ("B", 5.)]);
            let model = build_model(&sites, &costs(&[("CVG", "A", 1.)]));
            let solution = model.solve(microlp, None);
            assert_eq!(solution.status, SolveStatus::Infeasible);
        }

        #[test]
        fn empty_network_is_trivially_optimal() {
            let sites = sites(&[("CVG", 1000.)], &[], &[("A", 0.)]);
            let model = build_model(&sites, &CostMatrix::new());
            assert_eq!(model.num_variables(), 0);
            let solution = model.solve(microlp, None);
            assert_eq!(solution.status, SolveStatus::Optimal);
            assert_eq!(solution.objective_value, Some(0.));
        }

        #[test]
        fn zero_time_limit_times_out() {
            let sites = sites(&[("CVG", 1000.)], &[], &[("A", 500.)]);
            let model = build_model(&sites, &costs(&[("CVG", "A", 2.)]));
            let solution = model.solve(microlp, Some(Duration::ZERO));
            assert_eq!(solution.status, SolveStatus::TimedOut);
            assert!(solution.flows.is_empty());
            assert_eq!(solution.objective_value, None);
            assert_eq!(solution.message, None);
        }
    }

    #[test]
    fn maps_resolution_errors_to_statuses() {
        assert_eq!(
            SolveStatus::from(&ResolutionError::Infeasible),
            SolveStatus::Infeasible
        );
        assert_eq!(
            SolveStatus::from(&ResolutionError::TimedOut(Duration::from_secs(1))),
            SolveStatus::TimedOut
        );
        let failed = FlowSolution::failed(&ResolutionError::Other("boom".into()));
        assert_eq!(failed.status, SolveStatus::Undefined);
        assert_eq!(failed.message.as_deref(), Some("boom"));
        assert!(failed.flows.is_empty());
    }
}
