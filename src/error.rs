use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cost::CostError;
use crate::site::SiteError;

/// A table or configuration file that could not be loaded
#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything that stops a plan from being built.
/// A model that has no optimal solution is not an error, see [crate::network::SolveStatus].
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("invalid sites table: {0}")]
    Site(#[from] SiteError),
    #[error("invalid cost table: {0}")]
    Cost(#[from] CostError),
}
