//! Common utilities module
//!
//! This module contains shared utilities used across the carving pipeline.

pub mod error;

pub use error::{CarvingError, Result};
