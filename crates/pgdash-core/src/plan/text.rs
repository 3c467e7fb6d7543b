//! Plain-text plan rendering for non-interactive output.

use std::fmt::Write;

use super::metrics::{PlanMetrics, cost_share, derive_metrics, row_mismatch, time_share};
use super::model::{Plan, PlanNode};
use crate::fmt::{format_cost, format_opt_rows, format_opt_time, format_rows, format_time};

/// Renders the summary, the warning list and the indented node tree.
pub fn render_text(plan: &Plan) -> String {
    let metrics = derive_metrics(plan);
    let mut out = String::new();

    let _ = writeln!(out, "Total cost: {}", format_cost(plan.total_cost));
    let _ = writeln!(out, "Planning:   {}", format_opt_time(plan.planning_time));
    if plan.is_measured() {
        let _ = writeln!(out, "Execution:  {}", format_opt_time(plan.execution_time));
    } else {
        let _ = writeln!(out, "Execution:  - (estimate only)");
    }

    if !plan.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings ({}):", plan.warnings.len());
        for w in &plan.warnings {
            let _ = writeln!(out, "  ! {}", w);
        }
    }

    let _ = writeln!(out);
    for row in plan.rows() {
        render_node(&mut out, row.node, row.depth, &metrics);
    }
    out
}

fn render_node(out: &mut String, node: &PlanNode, depth: usize, metrics: &PlanMetrics) {
    let indent = "   ".repeat(depth);
    let arrow = if depth == 0 { "" } else { "-> " };

    let mut line = format!(
        "{}{}{}  cost={} ({:.0}%)  rows={}",
        indent,
        arrow,
        node.label(),
        format_cost(node.total_cost),
        cost_share(node, metrics),
        format_rows(node.plan_rows),
    );
    if let Some(a) = node.actual {
        let _ = write!(line, " actual={}", format_opt_rows(Some(a.rows)));
        if row_mismatch(node) {
            line.push_str(" (!)");
        }
        let _ = write!(line, "  time={}", format_time(a.total_time));
        if a.loops > 1 {
            let _ = write!(line, " x{}", a.loops);
        }
        if let Some(share) = time_share(node, metrics) {
            let _ = write!(line, " ({:.0}%)", share);
        }
    }
    let _ = writeln!(out, "{}", line);

    let detail = format!("{}{}", indent, if depth == 0 { "  " } else { "     " });
    for (label, text) in node.conditions() {
        let _ = writeln!(out, "{}{}: {}", detail, label, text);
    }
    if let Some(keys) = &node.sort_key {
        let _ = writeln!(out, "{}Sort Key: {}", detail, keys.join(", "));
    }
    if let Some(b) = node.buffers {
        let _ = writeln!(out, "{}Buffers: hit={} read={}", detail, b.shared_hit, b.shared_read);
    }
    for w in &node.warnings {
        let _ = writeln!(out, "{}! {}", detail, w);
    }
}
