use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rustop::opts;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hubflow::config::NetworkConfig;
use hubflow::input::{load_costs, load_sites};
use hubflow::report::write_report;
use hubflow::Network;

fn run() -> Result<bool, Box<dyn Error>> {
    let (args, _) = opts! {
        synopsis "Find the cheapest hub -> focus city -> center cargo distribution.";
        param sites:String, desc:"Sites table (JSON)";
        param costs:String, desc:"Cost table (JSON)";
        opt config:Option<String>, desc:"Network configuration file (JSON)";
        opt report:Option<String>, desc:"Where to write the text report";
        opt time_limit:Option<f64>, desc:"Solver time limit in seconds";
        opt lp:Option<String>, desc:"Write the linear program to this file";
    }
    .parse_or_exit();

    let mut config = match &args.config {
        Some(path) => NetworkConfig::from_file(Path::new(path))?,
        None => NetworkConfig::default(),
    };
    if let Some(secs) = args.time_limit {
        config.solver.time_limit_secs = Some(secs);
    }
    if let Some(path) = args.report {
        config.report.path = Some(PathBuf::from(path));
    }

    let records = load_sites(Path::new(&args.sites))?;
    let rows = load_costs(Path::new(&args.costs))?;
    let network = Network::prepare(&records, &rows, &config)?;

    if let Some(path) = &args.lp {
        fs::write(path, network.model.to_string())?;
        info!(path = %path, "linear program written");
    }

    let time_limit = config.solver.time_limit();
    info!(limit = ?time_limit, "solving");
    let plan = network.solve(hubflow::default_solver, time_limit);

    let summary = plan.summary(&config.report);
    println!("{}", summary);
    if let Some(path) = &config.report.path {
        match write_report(&summary, path) {
            Ok(()) => info!(path = %path.display(), "report saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not save the report"),
        }
    }
    Ok(plan.is_optimal())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
