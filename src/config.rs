//! Network configuration: naming rules, rate-sheet columns, fixed routes,
//! discounts and solver settings.
//!
//! Every key is optional in the JSON file. Missing keys take the values of
//! [NetworkConfig::default].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cost::{DiscountRule, OriginColumn, RouteOverride};
use crate::error::InputError;
use crate::input::read_json;
use crate::report::ReportSettings;
use crate::site::{DuplicatePolicy, NamingRules};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Seconds the solver may run before the plan is reported as timed out
    pub time_limit_secs: Option<f64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            time_limit_secs: Some(60.),
        }
    }
}

impl SolverSettings {
    /// The time limit, if it is set to a valid number of seconds.
    /// A negative, NaN or overflowing value leaves the solver unlimited.
    pub fn time_limit(&self) -> Option<Duration> {
        let secs = self.time_limit_secs?;
        match Duration::try_from_secs_f64(secs) {
            Ok(limit) => Some(limit),
            Err(error) => {
                warn!(
                    time_limit_secs = secs,
                    %error,
                    "ignoring invalid time limit, solving without one"
                );
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub naming: NamingRules,
    /// Rate-sheet columns read as origins
    pub origins: Vec<OriginColumn>,
    /// Contract rates, they win over the rate sheet
    pub overrides: Vec<RouteOverride>,
    /// Applied in order
    pub discounts: Vec<DiscountRule>,
    pub on_duplicate_id: DuplicatePolicy,
    pub solver: SolverSettings,
    pub report: ReportSettings,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            naming: NamingRules::default(),
            origins: vec![
                OriginColumn::new("CVG", "CVG"),
                OriginColumn::new("AFW", "AFW"),
                OriginColumn::new("Leipzig", "Leipzig"),
                OriginColumn::new("Hyderabad", "Hyderabad"),
                OriginColumn::new("San Bernadino", "San"),
            ],
            overrides: vec![
                RouteOverride::new("CVG", "Leipzig", 1.5),
                RouteOverride::new("CVG", "San", 0.5),
                RouteOverride::new("AFW", "San", 0.5),
            ],
            discounts: vec![DiscountRule::leipzig()],
            on_duplicate_id: DuplicatePolicy::default(),
            solver: SolverSettings::default(),
            report: ReportSettings::default(),
        }
    }
}

impl NetworkConfig {
    pub fn from_file(path: &Path) -> Result<Self, InputError> {
        read_json(path)
    }
}
