//! # MES Common Library
//!
//! Shared code for the MES backend services including:
//! - Error types
//! - Configuration loading (TOML + environment)
//! - Origin identifiers and the per-origin connection registry
//! - Date-range normalization for time-bounded queries

pub mod config;
pub mod db;
pub mod error;
pub mod origin;
pub mod time;

pub use error::{Error, Result};
pub use origin::Origin;
