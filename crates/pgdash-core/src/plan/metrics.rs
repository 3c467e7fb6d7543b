//! Root-relative cost/time shares and estimate checks for plan rendering.

use super::model::{Plan, PlanNode};

/// Actual/planned row ratio above which the planner underestimated.
pub const ROW_MISMATCH_HIGH: f64 = 10.0;
/// Actual/planned row ratio below which the planner overestimated.
pub const ROW_MISMATCH_LOW: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanMetrics {
    /// Root's total estimated cost; basis for cost shares.
    pub max_cost: f64,
    /// Root wall-clock time across loops, ms. `None` for estimate-only plans.
    pub max_time: Option<f64>,
}

pub fn derive_metrics(plan: &Plan) -> PlanMetrics {
    let max_time = if plan.is_measured() {
        plan.root.actual.map(|a| a.total_time_all_loops())
    } else {
        None
    };
    PlanMetrics {
        max_cost: plan.root.total_cost,
        max_time,
    }
}

/// Node's total cost as a percentage of the root's. Not clamped: values above
/// 100 point at a planner anomaly and are kept as is.
pub fn cost_share(node: &PlanNode, metrics: &PlanMetrics) -> f64 {
    if metrics.max_cost > 0.0 {
        node.total_cost / metrics.max_cost * 100.0
    } else {
        0.0
    }
}

/// [`cost_share`] clamped to `[0, 100]` for bar rendering.
pub fn cost_bar_width(node: &PlanNode, metrics: &PlanMetrics) -> f64 {
    cost_share(node, metrics).clamp(0.0, 100.0)
}

/// Node's wall-clock time (across loops) as a percentage of the root's.
/// `None` unless both the plan and the node carry actual timings.
pub fn time_share(node: &PlanNode, metrics: &PlanMetrics) -> Option<f64> {
    let max_time = metrics.max_time?;
    let actual = node.actual?;
    if max_time > 0.0 {
        Some(actual.total_time_all_loops() / max_time * 100.0)
    } else {
        Some(0.0)
    }
}

pub fn time_bar_width(node: &PlanNode, metrics: &PlanMetrics) -> Option<f64> {
    time_share(node, metrics).map(|s| s.clamp(0.0, 100.0))
}

/// True when actual rows differ from the estimate by more than 10x either way.
/// Bounds are strict: a ratio of exactly 10 or 0.1 is not a mismatch.
pub fn row_mismatch(node: &PlanNode) -> bool {
    let Some(actual) = node.actual else {
        return false;
    };
    if node.plan_rows <= 0.0 {
        return false;
    }
    let ratio = actual.rows / node.plan_rows;
    ratio > ROW_MISMATCH_HIGH || ratio < ROW_MISMATCH_LOW
}
