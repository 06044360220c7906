//! Human readable summary of a solved distribution plan.

use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::network::{Flow, FlowSolution, Lane, SolveStatus};
use crate::site::SiteTables;

/// What the report lists and where it goes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Largest flows listed per lane
    pub top_n: usize,
    /// Flows at or below this many tons are not listed
    pub min_tons: f64,
    /// Where the text report is written, if anywhere
    pub path: Option<PathBuf>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            top_n: 10,
            min_tons: 1000.,
            path: None,
        }
    }
}

/// Outflow of a hub against its capacity
#[derive(Debug, Clone, PartialEq)]
pub struct HubUsage {
    pub hub: String,
    pub outflow: f64,
    pub capacity: f64,
}

impl HubUsage {
    /// Percentage of the capacity used, `None` for a hub without capacity
    pub fn utilization(&self) -> Option<f64> {
        (self.capacity > 0.).then(|| self.outflow / self.capacity * 100.)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    /// Tons shipped straight from hubs to centers
    pub direct_tons: f64,
    /// Tons delivered to centers by focus cities
    pub via_focus_tons: f64,
    pub hub_usage: Vec<HubUsage>,
    pub top_direct: Vec<Flow>,
    pub top_via_focus: Vec<Flow>,
    pub min_tons: f64,
}

fn largest<'a>(flows: impl Iterator<Item = &'a Flow>, settings: &ReportSettings) -> Vec<Flow> {
    let mut flows: Vec<Flow> = flows
        .filter(|flow| flow.tons > settings.min_tons)
        .cloned()
        .collect();
    flows.sort_by(|a, b| b.tons.total_cmp(&a.tons).then_with(|| a.route.cmp(&b.route)));
    flows.truncate(settings.top_n);
    flows
}

impl Summary {
    pub fn new(sites: &SiteTables, solution: &FlowSolution, settings: &ReportSettings) -> Self {
        let lane_total = |lane| solution.lane(lane).map(|flow| flow.tons).sum::<f64>();
        let hub_usage = if solution.is_optimal() {
            sites
                .hubs
                .iter()
                .map(|(hub, &capacity)| HubUsage {
                    hub: hub.clone(),
                    outflow: solution.outbound(hub),
                    capacity,
                })
                .collect()
        } else {
            vec![]
        };
        Summary {
            status: solution.status,
            objective_value: solution.objective_value,
            direct_tons: lane_total(Lane::HubToCenter),
            via_focus_tons: lane_total(Lane::FocusCityToCenter),
            hub_usage,
            top_direct: largest(solution.lane(Lane::HubToCenter), settings),
            top_via_focus: largest(solution.lane(Lane::FocusCityToCenter), settings),
            min_tons: settings.min_tons,
        }
    }

    /// Tons delivered to centers
    pub fn total_cargo(&self) -> f64 {
        self.direct_tons + self.via_focus_tons
    }

    pub fn cost_per_ton(&self) -> Option<f64> {
        let cargo = self.total_cargo();
        self.objective_value
            .filter(|_| cargo > 0.)
            .map(|cost| cost / cargo)
    }

    /// Percentage of the cargo shipped directly, and through focus cities
    pub fn strategy_split(&self) -> Option<(f64, f64)> {
        let cargo = self.total_cargo();
        (cargo > 0.).then(|| {
            (
                self.direct_tons / cargo * 100.,
                self.via_focus_tons / cargo * 100.,
            )
        })
    }
}

fn write_flows(f: &mut Formatter<'_>, title: &str, min_tons: f64, flows: &[Flow]) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "Major {} flows (>{:.0} tons):", title, min_tons)?;
    for flow in flows {
        writeln!(
            f,
            "  {} to {}: {:.0} tons",
            flow.route.origin, flow.route.destination, flow.tons
        )?;
    }
    Ok(())
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Distribution optimization results")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f)?;
        writeln!(f, "Status: {}", self.status)?;
        let Some(cost) = self.objective_value else {
            return writeln!(f, "No optimal plan found.");
        };
        writeln!(f, "Optimal cost: ${:.2}", cost)?;
        writeln!(f, "Total cargo: {:.0} tons", self.total_cargo())?;
        if let Some(per_ton) = self.cost_per_ton() {
            writeln!(f, "Cost per ton: ${:.2}", per_ton)?;
        }

        if let Some((direct, via_focus)) = self.strategy_split() {
            writeln!(f)?;
            writeln!(f, "Distribution strategy:")?;
            writeln!(f, "  Direct hub to center: {:.0} tons ({:.1}%)", self.direct_tons, direct)?;
            writeln!(f, "  Via focus cities: {:.0} tons ({:.1}%)", self.via_focus_tons, via_focus)?;
        }

        writeln!(f)?;
        writeln!(f, "Hub utilization:")?;
        for usage in &self.hub_usage {
            write!(f, "  {}: {:.0} / {:.0} tons", usage.hub, usage.outflow, usage.capacity)?;
            match usage.utilization() {
                Some(percent) => writeln!(f, " ({:.1}% utilized)", percent)?,
                None => writeln!(f)?,
            }
        }

        write_flows(f, "hub to center", self.min_tons, &self.top_direct)?;
        write_flows(f, "focus city to center", self.min_tons, &self.top_via_focus)
    }
}

/// Writes the summary to a text file, creating missing parent directories
pub fn write_report(summary: &Summary, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, summary.to_string())
}
