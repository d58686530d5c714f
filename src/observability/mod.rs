//! # Observability
//!
//! Structured logging setup for hosts embedding the credential core.
//! All modules emit `tracing` events with structured fields; hosts that
//! already install their own subscriber can skip this entirely.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a global fmt subscriber honoring `RUST_LOG`.
///
/// Falls back to `info` when `RUST_LOG` is unset. Safe to call more than
/// once; a subscriber installed elsewhere (e.g. integration tests) wins.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_env_filter(filter).finish(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_idempotent() {
        init_logging();
        init_logging();
        tracing::debug!("subscriber installed");
    }
}
