//! Quarry client
//!
//! Consumes the chunk stream of a submitted query:
//! - [`BatchLoader`] decodes chunks and tracks layout changes
//! - [`QueryResultsListener`] implements the transport callbacks, counts
//!   rows and lets a driving thread block until the stream ends
//! - [`RemoteConnection`] submits queries to a backend over TCP

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod discovery;
pub mod listener;
pub mod loader;
pub mod remote;
pub mod render;
pub mod signal;

pub use discovery::{Discovery, StaticDiscovery};
pub use listener::{ListenerState, QueryResultsListener};
pub use loader::{BatchLoader, DecodedBatch, SchemaChange};
pub use remote::RemoteConnection;
pub use render::{BatchRenderer, TableRenderer};
pub use signal::{Completion, CompletionSignal};
