//! Command line options

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;

use crate::driver::EXIT_INVALID_TYPE;

/// Options of the `submit_plan` tool
#[derive(Parser, Debug, Clone)]
#[command(name = "submit_plan")]
#[command(author, version, about = "Submit a query plan and report the rows it returns", long_about = None)]
pub struct Options {
    /// File containing the plan
    #[arg(short = 'f', value_name = "FILE")]
    pub location: PathBuf,

    /// Type of plan: sql, logical or physical
    #[arg(short = 't', value_name = "TYPE")]
    pub plan_type: String,

    /// Discovery connect string [default: localhost:2181]
    #[arg(long = "zk", visible_alias = "connect", env = "QUARRY_CONNECT")]
    pub zk: Option<String>,

    /// Run the query against embedded backends
    #[arg(long)]
    pub local: bool,

    /// Number of embedded backends to run, local mode only [default: 1]
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub bits: Option<usize>,

    /// Configuration file path
    #[arg(short, long, env = "QUARRY_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Options of the standalone `quarry-backend` server
#[derive(Parser, Debug, Clone)]
#[command(name = "quarry-backend")]
#[command(author, version, about = "Run a Quarry backend node over TCP", long_about = None)]
pub struct BackendOptions {
    /// Address to listen on, overrides `server.bind_address`
    #[arg(short, long, env = "QUARRY_BIND")]
    pub bind: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "QUARRY_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Exit status for a command line clap refused to parse
pub fn usage_status(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => EXIT_INVALID_TYPE,
    }
}
