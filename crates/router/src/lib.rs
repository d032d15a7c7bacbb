//! Jira intake orchestration.
//!
//! This crate provides [`IngestionHandler`], which sequences the domain
//! logic in [`intake`] against the injected storage, queue, launcher, and
//! metrics ports, plus the [`hello`] liveness response.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The handler decides the order of calls and maps
//! failures to results; the rules themselves live in [`intake`].

pub mod handler;
pub mod metrics;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use handler::{hello, IngestionHandler};
pub use metrics::FacadeMetrics;
