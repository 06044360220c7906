//! End to end: raw tables in, solved distribution plan out.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::consistency::{unreachable_centers, unused_routes};
use crate::cost::{build_costs, CostRow, CostSheet, Route};
use crate::error::Error;
use crate::network::{build_model, FlowModel, FlowSolution};
use crate::report::{ReportSettings, Summary};
use crate::site::{classify, SiteRecord, SiteTables};
use crate::solvers::{ResolutionError, SolverModel, WithTimeLimit};
use crate::variable::UnsolvedProblem;

/// A validated network and its flow model, ready to be solved
#[derive(Debug, Clone)]
pub struct Network {
    pub sites: SiteTables,
    pub costs: CostSheet,
    /// Centers no route delivers to
    pub unreachable: BTreeSet<String>,
    /// Priced routes that are not part of the model
    pub unused_routes: Vec<Route>,
    pub model: FlowModel,
}

impl Network {
    /// Classifies the sites, prices the routes and builds the flow model.
    /// Data gaps are logged and kept on the network, only malformed data fails.
    pub fn prepare(
        records: &[SiteRecord],
        rows: &[CostRow],
        config: &NetworkConfig,
    ) -> Result<Network, Error> {
        let sites = classify(records, &config.naming, config.on_duplicate_id)?;
        info!(
            hubs = sites.hubs.len(),
            focus_cities = sites.focus_cities.len(),
            centers = sites.centers.len(),
            "sites classified"
        );
        for warning in &sites.warnings {
            warn!(%warning, "sites table");
        }

        let costs = build_costs(rows, &config.origins, &config.overrides, &config.discounts)?;
        info!(routes = costs.matrix.len(), "cost matrix created");
        for outcome in &costs.discounts {
            info!(
                rule = %outcome.rule,
                factor = outcome.factor,
                routes = outcome.routes,
                "discount applied"
            );
        }

        let unreachable = unreachable_centers(&sites.centers, &costs.matrix);
        if !unreachable.is_empty() {
            warn!(
                count = unreachable.len(),
                centers = ?unreachable,
                "centers without any route"
            );
        }
        let unused_routes = unused_routes(&sites, &costs.matrix);
        for route in &unused_routes {
            debug!(%route, "route left out of the model");
        }

        let model = build_model(&sites, &costs.matrix);
        Ok(Network {
            sites,
            costs,
            unreachable,
            unused_routes,
            model,
        })
    }

    /// Solves the flow model with the given solver
    pub fn solve<S, P>(self, solver: S, time_limit: Option<Duration>) -> DistributionPlan
    where
        S: FnOnce(UnsolvedProblem) -> P,
        P: SolverModel<Error = ResolutionError> + WithTimeLimit,
    {
        let solution = self.model.solve(solver, time_limit);
        match solution.objective_value {
            Some(cost) => info!(status = %solution.status, cost, "solved"),
            None => warn!(status = %solution.status, "optimization failed"),
        }
        DistributionPlan {
            network: self,
            solution,
        }
    }
}

/// A network and what the solver made of it
#[derive(Debug, Clone)]
pub struct DistributionPlan {
    pub network: Network,
    pub solution: FlowSolution,
}

impl DistributionPlan {
    /// Prepares and solves a network with the default solver and the
    /// configured time limit
    #[cfg(any(feature = "microlp", feature = "highs"))]
    pub fn optimize(
        records: &[SiteRecord],
        rows: &[CostRow],
        config: &NetworkConfig,
    ) -> Result<DistributionPlan, Error> {
        let network = Network::prepare(records, rows, config)?;
        Ok(network.solve(crate::default_solver, config.solver.time_limit()))
    }

    pub fn is_optimal(&self) -> bool {
        self.solution.is_optimal()
    }

    pub fn summary(&self, settings: &ReportSettings) -> Summary {
        Summary::new(&self.network.sites, &self.solution, settings)
    }
}
