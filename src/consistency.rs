//! Cross-checks between the classified sites and the cost matrix.
//!
//! Nothing here stops a run. Gaps are reported, and the solver status says
//! whether the data was good enough.

use std::collections::{BTreeMap, BTreeSet};

use crate::cost::{CostMatrix, Route};
use crate::site::{SiteKind, SiteTables};

/// Centers with a demand that no route delivers to
pub fn unreachable_centers(centers: &BTreeMap<String, f64>, costs: &CostMatrix) -> BTreeSet<String> {
    let destinations = costs.destinations();
    centers
        .keys()
        .filter(|center| !destinations.contains(center.as_str()))
        .cloned()
        .collect()
}

/// Whether a route runs along one of the three lanes of the network
pub fn is_valid_transition(origin: SiteKind, destination: SiteKind) -> bool {
    matches!(
        (origin, destination),
        (SiteKind::Hub, SiteKind::FocusCity)
            | (SiteKind::Hub, SiteKind::Center)
            | (SiteKind::FocusCity, SiteKind::Center)
    )
}

/// Priced routes that will not become flow variables, because an end is not
/// a known site or the pair is not a valid lane
pub fn unused_routes(sites: &SiteTables, costs: &CostMatrix) -> Vec<Route> {
    costs
        .iter()
        .filter(|(route, _)| !is_usable(sites, route))
        .map(|(route, _)| route.clone())
        .collect()
}

fn is_usable(sites: &SiteTables, route: &Route) -> bool {
    let origin = if sites.hubs.contains_key(&route.origin) {
        SiteKind::Hub
    } else if sites.focus_cities.contains_key(&route.origin) {
        SiteKind::FocusCity
    } else {
        return false;
    };
    let destination = if sites.centers.contains_key(&route.destination) {
        SiteKind::Center
    } else if sites.focus_cities.contains_key(&route.destination) {
        SiteKind::FocusCity
    } else {
        return false;
    };
    is_valid_transition(origin, destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(routes: &[(&str, &str, f64)]) -> CostMatrix {
        routes
            .iter()
            .map(|&(o, d, c)| (Route::new(o, d), c))
            .collect()
    }

    #[test]
    fn finds_centers_without_routes() {
        let centers: BTreeMap<String, f64> =
            [("A".to_string(), 10.), ("B".to_string(), 0.)].into_iter().collect();
        let costs = matrix(&[("CVG", "A", 1.)]);
        assert_eq!(
            unreachable_centers(&centers, &costs),
            BTreeSet::from(["B".to_string()])
        );
    }

    #[test]
    fn every_center_reachable() {
        let centers: BTreeMap<String, f64> = [("A".to_string(), 10.)].into_iter().collect();
        let costs = matrix(&[("Leipzig", "A", 1.)]);
        assert!(unreachable_centers(&centers, &costs).is_empty());
    }

    #[test]
    fn flags_routes_outside_the_network() {
        let mut sites = SiteTables::default();
        sites.hubs.insert("CVG".into(), 100.);
        sites.focus_cities.insert("San".into(), 50.);
        sites.centers.insert("A".into(), 10.);
        let costs = matrix(&[
            ("CVG", "A", 1.),
            ("CVG", "San", 0.5),
            ("San", "A", 0.3),
            ("San", "CVG", 0.3),
            ("Hyderabad", "A", 2.),
        ]);
        assert_eq!(
            unused_routes(&sites, &costs),
            vec![Route::new("Hyderabad", "A"), Route::new("San", "CVG")]
        );
    }

    #[test]
    fn lanes() {
        assert!(is_valid_transition(SiteKind::Hub, SiteKind::Center));
        assert!(!is_valid_transition(SiteKind::Center, SiteKind::Hub));
        assert!(!is_valid_transition(SiteKind::FocusCity, SiteKind::FocusCity));
    }
}
