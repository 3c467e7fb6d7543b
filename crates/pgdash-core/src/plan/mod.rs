//! Query execution-plan analyzer.
//!
//! Turns a raw `EXPLAIN (FORMAT JSON)` payload into a normalized [`Plan`] tree
//! and computes the root-relative metrics used to draw comparative bars.
//! Everything here except [`PlanInspector`] is a pure transformation.

mod inspect;
mod metrics;
mod model;
mod normalize;
pub mod raw;
mod text;

pub use inspect::{ExplainRequest, InspectorState, PlanInspector};
pub use metrics::{
    PlanMetrics, ROW_MISMATCH_HIGH, ROW_MISMATCH_LOW, cost_bar_width, cost_share, derive_metrics,
    row_mismatch, time_bar_width, time_share,
};
pub use model::{Actuals, Buffers, NodeKind, Plan, PlanNode, PlanRow, Workers};
pub use normalize::{LARGE_SEQ_SCAN_ROWS, STALE_STATISTICS_NOTICE, normalize};
pub use text::render_text;

/// Structural problem with a plan payload. No partial plan is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum MalformedPlanError {
    /// Not JSON, or a field has the wrong type.
    InvalidJson(String),
    /// The document has no `"Plan"` node.
    MissingRoot,
    /// A node lacks a required estimate field.
    MissingField { path: String, field: &'static str },
}

impl std::fmt::Display for MalformedPlanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedPlanError::InvalidJson(msg) => write!(f, "invalid plan JSON: {}", msg),
            MalformedPlanError::MissingRoot => write!(f, "plan has no root node"),
            MalformedPlanError::MissingField { path, field } => {
                write!(f, "plan node {} is missing \"{}\"", path, field)
            }
        }
    }
}

impl std::error::Error for MalformedPlanError {}
