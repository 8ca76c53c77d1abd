//! `submit_plan`: run one plan file and report how many rows came back

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use clap::Parser;

use quarry::cli::usage_status;
use quarry::{config, driver, logging, Options};

#[tokio::main]
async fn main() {
    let options = match Options::try_parse() {
        Ok(options) => options,
        Err(e) => {
            if let Err(io) = e.print() {
                eprintln!("{e}");
                eprintln!("Failed to write usage: {io}");
            }
            std::process::exit(usage_status(&e));
        }
    };

    let mut config = match config::load(options.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(driver::EXIT_FAILURE);
        }
    };
    config::apply(&mut config, &options);

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e:#}");
    }

    let status = driver::submit_plan(&config, &options.location, &options.plan_type, options.local).await;
    std::process::exit(status);
}
