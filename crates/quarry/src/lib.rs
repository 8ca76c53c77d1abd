//! Quarry - submit query plans and consume streamed results
//!
//! Provides:
//! - The `submit_plan` driver: connect, submit, wait, report
//! - Bootstrap of embedded backends or a remote connection
//! - Command line, configuration and logging setup for the binaries

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod driver;
pub mod logging;

pub use bootstrap::Session;
pub use cli::{BackendOptions, Options};
pub use driver::{execute, submit_plan, Summary};
