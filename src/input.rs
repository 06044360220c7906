//! Reading the sites and cost tables exported as JSON arrays of rows.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cost::CostRow;
use crate::error::InputError;
use crate::site::SiteRecord;

/// Deserializes a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let file = File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| InputError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the sites table: one object per row with the keys
/// `Type`, `City`, `Demand/Current tons` and `Capacity`
pub fn load_sites(path: &Path) -> Result<Vec<SiteRecord>, InputError> {
    let records: Vec<SiteRecord> = read_json(path)?;
    debug!(path = %path.display(), rows = records.len(), "sites table loaded");
    Ok(records)
}

/// Loads the cost table: one object per center, with a `Center` key and one
/// key per origin column
pub fn load_costs(path: &Path) -> Result<Vec<CostRow>, InputError> {
    let rows: Vec<CostRow> = read_json(path)?;
    debug!(path = %path.display(), rows = rows.len(), "cost table loaded");
    Ok(rows)
}
