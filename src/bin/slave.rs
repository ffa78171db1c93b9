//! Slave entry point
//!
//! Usage: `slave -file <paramfile> [args…]`. Arguments the entry point
//! does not recognize are forwarded to the parameter database as
//! `key=value` overrides.

use std::process::ExitCode;

use tracing::error;

use evolink::eval::{Slave, SphereProblem};
use evolink::params::Parameters;

fn install_subscriber(params: &Parameters) -> Result<(), String> {
    let verbosity = params.get_int("verbosity", 0).map_err(|e| e.to_string())?;
    if verbosity < 0 {
        return Err("Verbosity should be an integer >= 0".to_string());
    }
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_parameters(args: &[String]) -> Result<Parameters, String> {
    let mut file = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-file" {
            match iter.next() {
                Some(path) => file = Some(path.clone()),
                None => return Err("-file requires a file argument".to_string()),
            }
        }
    }
    let Some(path) = file else {
        return Err("No parameter file was specified (use -file <paramfile>)".to_string());
    };
    let mut params = Parameters::from_file(&path).map_err(|e| e.to_string())?;
    // forward everything else to the parameter database
    params.apply_overrides(args.iter().map(String::as_str));
    Ok(params)
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let params = match load_parameters(&args) {
        Ok(params) => params,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(message) = install_subscriber(&params) {
        eprintln!("{message}");
        return ExitCode::FAILURE;
    }

    let mut slave = match Slave::new(params, Box::new(SphereProblem), None) {
        Ok(slave) => slave,
        Err(e) => {
            error!(error = %e, "slave setup failed");
            return ExitCode::FAILURE;
        }
    };
    match slave.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "slave terminated with a fatal error");
            ExitCode::FAILURE
        }
    }
}
