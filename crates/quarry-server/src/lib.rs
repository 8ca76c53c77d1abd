//! Embedded Quarry backend
//!
//! Provides:
//! - JSON plan parsing and execution into result chunks
//! - Backend nodes that stream chunks to a results listener
//! - An in-process service set and connection for local mode
//! - A TCP server exposing a node to remote clients

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod executor;
pub mod local;
pub mod node;
pub mod plan;
pub mod service_set;
pub mod tcp;

pub use executor::PlanExecutor;
pub use local::LocalConnection;
pub use node::{Node, NodeId};
pub use plan::{Fragment, Plan};
pub use service_set::LocalServiceSet;
pub use tcp::TcpServer;
