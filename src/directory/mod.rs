//! # Directory Services
//!
//! LDAP/Active-Directory configuration and client.

pub mod client;
pub mod config;

pub use client::DirectoryClient;
pub use config::{DirectoryConfig, TlsVersion};
