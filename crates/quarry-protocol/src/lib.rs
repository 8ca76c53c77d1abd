//! Quarry result-stream protocol
//!
//! Provides:
//! - Column vectors and the chunk payload codec
//! - Length-delimited wire frames between client and backend
//! - The user-facing contracts a transport drives (`ResultsListener`,
//!   `Connection`)

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod frame;
pub mod user;
pub mod vector;

pub use frame::{ClientFrame, ServerFrame};
pub use user::{Connection, QueryResultBatch, ResultsListener};
pub use vector::{decode_payload, encode_payload, ColumnVector};
