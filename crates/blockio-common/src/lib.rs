//! Blockio Common - Shared types and utilities
//!
//! This crate provides the value types, error definitions and
//! configuration shared by the blockio client components.

pub mod config;
pub mod error;
pub mod types;

pub use config::MetaCacheConfig;
pub use error::{Error, Result};
pub use types::*;
