//! pgdash-core: library behind the pgdash PostgreSQL dashboard.
//!
//! Provides:
//! - `refresh`: live-refresh scheduler (one race-free feed per view)
//! - `plan`: EXPLAIN plan normalization, metrics and inspection
//! - `backend`: metrics backend boundary (PostgreSQL, mock)
//! - `servers`: persisted server inventory
//! - `analysis`: configuration and performance issue detection
//! - `fmt`: shared display formatting helpers
//!
//! With `tui` feature (default):
//! - `tui`: terminal dashboard (ratatui/crossterm)

pub mod analysis;
pub mod backend;
pub mod fmt;
pub mod plan;
pub mod refresh;
pub mod servers;

#[cfg(feature = "tui")]
pub mod tui;

/// Package version with the git commit it was built from.
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("PGDASH_GIT_SHA"), ")");
