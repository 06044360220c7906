//! Turns raw site rows into the three tiers of the distribution network.
//!
//! Free-text city names become canonical identifiers:
//! hubs collapse onto a known marker code when their name carries one,
//! focus cities keep their first word, and centers keep their whole
//! normalized name.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Character that replaces spaces and slashes in normalized names
pub const SEPARATOR: char = '_';

/// The tier a site belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SiteKind {
    Hub,
    #[serde(rename = "Focus City")]
    FocusCity,
    Center,
}

impl SiteKind {
    /// Parses the `Type` column of the sites table. Unknown tags give `None`.
    pub fn from_tag(tag: &str) -> Option<SiteKind> {
        match tag.trim() {
            "Hub" => Some(SiteKind::Hub),
            "Focus City" => Some(SiteKind::FocusCity),
            "Center" => Some(SiteKind::Center),
            _ => None,
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SiteKind::Hub => "hub",
            SiteKind::FocusCity => "focus city",
            SiteKind::Center => "center",
        })
    }
}

/// One row of the sites table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    #[serde(rename = "Type")]
    pub site_type: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Demand/Current tons", default)]
    pub demand: Option<f64>,
    #[serde(rename = "Capacity", default)]
    pub capacity: Option<f64>,
}

impl SiteRecord {
    pub fn new(site_type: &str, city: &str, demand: Option<f64>, capacity: Option<f64>) -> Self {
        SiteRecord {
            site_type: site_type.to_string(),
            city: city.to_string(),
            demand,
            capacity,
        }
    }
}

/// A raw substring that identifies a hub, and the id the hub gets when it matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubMarker {
    pub pattern: String,
    pub id: String,
}

impl HubMarker {
    pub fn new(pattern: &str, id: &str) -> Self {
        HubMarker {
            pattern: pattern.to_string(),
            id: id.to_string(),
        }
    }
}

/// How free-text names map onto canonical ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingRules {
    /// Checked in order, the first marker found in a hub name wins
    pub hub_markers: Vec<HubMarker>,
}

impl Default for NamingRules {
    fn default() -> Self {
        NamingRules {
            hub_markers: vec![HubMarker::new("CVG", "CVG"), HubMarker::new("AFW", "AFW")],
        }
    }
}

impl NamingRules {
    /// The canonical id of a site of the given kind
    pub fn canonical_id(&self, kind: SiteKind, raw_name: &str) -> String {
        let name = normalize_name(raw_name);
        match kind {
            SiteKind::Hub => self
                .hub_markers
                .iter()
                .find(|marker| name.contains(marker.pattern.as_str()))
                .map(|marker| marker.id.clone())
                .unwrap_or(name),
            SiteKind::FocusCity => match name.split_once(SEPARATOR) {
                Some((first, _)) => first.to_string(),
                None => name,
            },
            SiteKind::Center => name,
        }
    }
}

/// Replaces spaces and slashes with [SEPARATOR] and drops commas.
///
/// ```
/// assert_eq!(hubflow::site::normalize_name("Atlanta, GA"), "Atlanta_GA");
/// assert_eq!(hubflow::site::normalize_name("Dallas/Fort Worth"), "Dallas_Fort_Worth");
/// ```
pub fn normalize_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|&c| c != ',')
        .map(|c| match c {
            ' ' | '/' => SEPARATOR,
            c => c,
        })
        .collect()
}

/// What to do when two rows of one tier normalize to the same id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The last row wins
    #[default]
    Overwrite,
    /// Capacities or demands are added up
    Sum,
    /// Classification fails
    Error,
}

/// Problems found in the sites table that do not stop the run
#[derive(Debug, Clone, PartialEq)]
pub enum SiteWarning {
    /// Several rows of a tier share an id
    DuplicateId {
        kind: SiteKind,
        id: String,
        policy: DuplicatePolicy,
    },
    /// A row whose city normalizes to an empty id, such as a focus city
    /// whose name starts with a separator
    MissingName { kind: SiteKind, city: String },
    /// A hub or focus city row without a capacity
    MissingCapacity { kind: SiteKind, id: String },
    /// A negative or non-finite capacity or demand
    InvalidQuantity {
        kind: SiteKind,
        id: String,
        value: f64,
    },
}

impl fmt::Display for SiteWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteWarning::DuplicateId { kind, id, policy } => {
                write!(f, "duplicate {} id {:?} ({:?})", kind, id, policy)
            }
            SiteWarning::MissingName { kind, city } => {
                write!(f, "{} {:?} has no usable name and was skipped", kind, city)
            }
            SiteWarning::MissingCapacity { kind, id } => {
                write!(f, "{} {:?} has no capacity and was skipped", kind, id)
            }
            SiteWarning::InvalidQuantity { kind, id, value } => {
                write!(f, "{} {:?} has an invalid quantity {} and was skipped", kind, id, value)
            }
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SiteError {
    #[error("duplicate {kind} id {id:?}")]
    DuplicateId { kind: SiteKind, id: String },
}

/// The classified sites: capacities for hubs and focus cities, demands for centers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteTables {
    pub hubs: BTreeMap<String, f64>,
    pub focus_cities: BTreeMap<String, f64>,
    pub centers: BTreeMap<String, f64>,
    pub warnings: Vec<SiteWarning>,
    /// Rows whose type tag was not recognized
    pub ignored_rows: usize,
}

impl SiteTables {
    /// The classified sites as canonical rows, ready to be classified again
    pub fn to_records(&self) -> Vec<SiteRecord> {
        let hubs = self
            .hubs
            .iter()
            .map(|(id, &capacity)| SiteRecord::new("Hub", id, None, Some(capacity)));
        let focus_cities = self
            .focus_cities
            .iter()
            .map(|(id, &capacity)| SiteRecord::new("Focus City", id, None, Some(capacity)));
        let centers = self
            .centers
            .iter()
            .map(|(id, &demand)| SiteRecord::new("Center", id, Some(demand), None));
        hubs.chain(focus_cities).chain(centers).collect()
    }

    fn table_mut(&mut self, kind: SiteKind) -> &mut BTreeMap<String, f64> {
        match kind {
            SiteKind::Hub => &mut self.hubs,
            SiteKind::FocusCity => &mut self.focus_cities,
            SiteKind::Center => &mut self.centers,
        }
    }

    fn insert(
        &mut self,
        kind: SiteKind,
        id: String,
        quantity: f64,
        policy: DuplicatePolicy,
    ) -> Result<(), SiteError> {
        let id = match self.table_mut(kind).entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(quantity);
                return Ok(());
            }
            Entry::Occupied(mut slot) => {
                match policy {
                    DuplicatePolicy::Overwrite => {
                        slot.insert(quantity);
                    }
                    DuplicatePolicy::Sum => *slot.get_mut() += quantity,
                    DuplicatePolicy::Error => {
                        return Err(SiteError::DuplicateId {
                            kind,
                            id: slot.key().clone(),
                        })
                    }
                }
                slot.key().clone()
            }
        };
        warn!(%kind, %id, ?policy, "duplicate site id");
        self.warnings
            .push(SiteWarning::DuplicateId { kind, id, policy });
        Ok(())
    }
}

/// Splits raw site rows into hubs, focus cities and centers.
///
/// Centers without a demand are left out of the network, and rows with an
/// unknown type tag are ignored.
pub fn classify<'a, I>(
    records: I,
    naming: &NamingRules,
    policy: DuplicatePolicy,
) -> Result<SiteTables, SiteError>
where
    I: IntoIterator<Item = &'a SiteRecord>,
{
    let mut tables = SiteTables::default();
    for record in records {
        let Some(kind) = SiteKind::from_tag(&record.site_type) else {
            debug!(site_type = %record.site_type, city = %record.city, "ignoring site row");
            tables.ignored_rows += 1;
            continue;
        };
        let id = naming.canonical_id(kind, &record.city);
        if id.is_empty() {
            warn!(%kind, city = %record.city, "site without a usable name");
            tables.warnings.push(SiteWarning::MissingName {
                kind,
                city: record.city.clone(),
            });
            continue;
        }
        let quantity = match kind {
            SiteKind::Hub | SiteKind::FocusCity => match record.capacity {
                Some(capacity) => capacity,
                None => {
                    warn!(%kind, %id, "site without capacity");
                    tables
                        .warnings
                        .push(SiteWarning::MissingCapacity { kind, id });
                    continue;
                }
            },
            SiteKind::Center => match record.demand {
                Some(demand) => demand,
                None => continue,
            },
        };
        if !quantity.is_finite() || quantity < 0. {
            warn!(%kind, %id, quantity, "invalid site quantity");
            tables.warnings.push(SiteWarning::InvalidQuantity {
                kind,
                id,
                value: quantity,
            });
            continue;
        }
        tables.insert(kind, id, quantity, policy)?;
    }
    debug!(
        hubs = tables.hubs.len(),
        focus_cities = tables.focus_cities.len(),
        centers = tables.centers.len(),
        "classified sites"
    );
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<SiteRecord> {
        vec![
            SiteRecord::new("Hub", "Cincinnati/Northern Kentucky (CVG)", None, Some(95_650.)),
            SiteRecord::new("Hub", "Alliance Fort Worth (AFW)", None, Some(44_350.)),
            SiteRecord::new("Focus City", "Leipzig, Germany", None, Some(85_000.)),
            SiteRecord::new("Focus City", "San Bernardino, CA", None, Some(36_000.)),
            SiteRecord::new("Center", "Atlanta, GA", Some(5_100.), None),
            SiteRecord::new("Center", "Paris, France", None, None),
            SiteRecord::new("Warehouse", "Nowhere", Some(1.), Some(1.)),
        ]
    }

    #[test]
    fn classifies_the_three_tiers() {
        let tables = classify(&sample_rows(), &NamingRules::default(), DuplicatePolicy::Overwrite)
            .unwrap();
        assert_eq!(tables.hubs.keys().collect::<Vec<_>>(), ["AFW", "CVG"]);
        assert_eq!(tables.hubs["CVG"], 95_650.);
        assert_eq!(
            tables.focus_cities.keys().collect::<Vec<_>>(),
            ["Leipzig", "San"]
        );
        assert_eq!(tables.centers.len(), 1);
        assert_eq!(tables.centers["Atlanta_GA"], 5_100.);
        assert_eq!(tables.ignored_rows, 1);
        assert!(tables.warnings.is_empty());
    }

    #[test]
    fn unknown_hub_keeps_its_normalized_name() {
        let naming = NamingRules::default();
        assert_eq!(
            naming.canonical_id(SiteKind::Hub, "Memphis / TN"),
            "Memphis___TN"
        );
    }

    #[test]
    fn first_matching_marker_wins() {
        let naming = NamingRules {
            hub_markers: vec![HubMarker::new("CVG", "CVG"), HubMarker::new("AFW", "AFW")],
        };
        assert_eq!(naming.canonical_id(SiteKind::Hub, "AFW near CVG"), "CVG");
    }

    #[test]
    fn duplicates_follow_the_policy() {
        let rows = vec![
            SiteRecord::new("Focus City", "Leipzig Germany", None, Some(10.)),
            SiteRecord::new("Focus City", "Leipzig Halle", None, Some(5.)),
        ];
        let naming = NamingRules::default();

        let overwrite = classify(&rows, &naming, DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(overwrite.focus_cities["Leipzig"], 5.);
        assert_eq!(overwrite.warnings.len(), 1);

        let sum = classify(&rows, &naming, DuplicatePolicy::Sum).unwrap();
        assert_eq!(sum.focus_cities["Leipzig"], 15.);

        assert_eq!(
            classify(&rows, &naming, DuplicatePolicy::Error),
            Err(SiteError::DuplicateId {
                kind: SiteKind::FocusCity,
                id: "Leipzig".into()
            })
        );
    }

    #[test]
    fn zero_quantities_are_kept() {
        let rows = vec![
            SiteRecord::new("Hub", "CVG", None, Some(0.)),
            SiteRecord::new("Center", "Boston", Some(0.), None),
        ];
        let tables = classify(&rows, &NamingRules::default(), DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(tables.hubs["CVG"], 0.);
        assert_eq!(tables.centers["Boston"], 0.);
    }

    #[test]
    fn malformed_quantities_are_skipped_with_a_warning() {
        let rows = vec![
            SiteRecord::new("Hub", "CVG", None, None),
            SiteRecord::new("Center", "Boston", Some(-4.), None),
        ];
        let tables = classify(&rows, &NamingRules::default(), DuplicatePolicy::Overwrite).unwrap();
        assert!(tables.hubs.is_empty());
        assert!(tables.centers.is_empty());
        assert_eq!(tables.warnings.len(), 2);
    }

    #[test]
    fn names_without_a_first_word_are_skipped() {
        let rows = vec![
            SiteRecord::new("Focus City", "/Leipzig Germany", None, Some(8_000.)),
            SiteRecord::new("Center", " , ", Some(10.), None),
            SiteRecord::new("Focus City", "San Bernardino, CA", None, Some(36_000.)),
        ];
        let tables = classify(&rows, &NamingRules::default(), DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(tables.focus_cities.keys().collect::<Vec<_>>(), ["San"]);
        assert!(!tables.focus_cities.contains_key(""));
        assert!(tables.centers.is_empty());
        assert_eq!(
            tables.warnings[0],
            SiteWarning::MissingName {
                kind: SiteKind::FocusCity,
                city: "/Leipzig Germany".into()
            }
        );
        assert_eq!(tables.warnings.len(), 2);
        assert_eq!(
            tables.warnings[0].to_string(),
            "focus city \"/Leipzig Germany\" has no usable name and was skipped"
        );
    }

    #[test]
    fn classification_is_idempotent() {
        let naming = NamingRules::default();
        let first = classify(&sample_rows(), &naming, DuplicatePolicy::Overwrite).unwrap();
        let second = classify(&first.to_records(), &naming, DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(first.hubs, second.hubs);
        assert_eq!(first.focus_cities, second.focus_cities);
        assert_eq!(first.centers, second.centers);
    }

    #[test]
    fn normalization_is_stable() {
        for raw in ["Atlanta, GA", "Dallas/Fort Worth", "  Leipzig ", "CVG"] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once);
        }
    }
}
