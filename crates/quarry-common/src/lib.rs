//! Quarry Common - Shared utilities and types
//!
//! This crate provides functionality used across all Quarry components:
//! - Error types and handling
//! - Configuration management
//! - Result-stream type definitions (layouts, chunk headers, query ids)

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
