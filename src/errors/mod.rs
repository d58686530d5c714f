//! # Error Handling
//!
//! Centralized error types for the keyplane credential core.

pub mod types;

pub use types::{KeyplaneError, Result};
