//! Core types and utilities for the price feeder
//!
//! This crate provides shared types used across all components:
//! - Pair, sample and aggregated price definitions
//! - Exchange identifiers and token-ID mappings
//! - Configuration loading and validation
//! - The error taxonomy of the pipeline

pub mod types;
pub mod tokens;
pub mod config;
pub mod errors;

pub use types::*;
pub use tokens::*;
pub use self::config::*;
pub use errors::*;
