//! Raw explain document -> [`Plan`].
//!
//! Normalization is atomic: either every node validates and a complete plan
//! is returned, or the first structural problem is reported and nothing else.

use super::MalformedPlanError;
use super::metrics::row_mismatch;
use super::model::{Actuals, Buffers, Plan, PlanNode, Workers};
use super::raw::{RawExplain, RawNode};
use crate::fmt::{format_rows, format_time};

/// Sequential scans at or above this many rows get a warning.
pub const LARGE_SEQ_SCAN_ROWS: f64 = 10_000.0;

/// A filter that discards more than this multiple of the rows it keeps is flagged.
pub const FILTER_DISCARD_RATIO: f64 = 10.0;

pub const STALE_STATISTICS_NOTICE: &str =
    "Row estimates diverge from actual counts; table statistics may be stale (run ANALYZE)";

/// Builds the normalized plan.
///
/// The plan counts as measured iff the document carries `"Execution Time"`.
/// Estimate-side fields (`Node Type`, costs, `Plan Rows`, `Plan Width`) are
/// required on every node; actual-execution fields never cause a failure.
pub fn normalize(raw: RawExplain, query: &str) -> Result<Plan, MalformedPlanError> {
    let root_raw = raw.plan.ok_or(MalformedPlanError::MissingRoot)?;
    let measured = raw.execution_time.is_some();

    let root = normalize_node(root_raw, "Plan".to_string(), measured)?;

    let mut warnings = Vec::new();
    let mut any_mismatch = false;
    collect_warnings(&root, &mut warnings, &mut any_mismatch);
    warnings.extend(raw.warnings);
    if any_mismatch {
        warnings.push(STALE_STATISTICS_NOTICE.to_string());
    }

    Ok(Plan {
        query: query.to_string(),
        total_cost: root.total_cost,
        root,
        planning_time: raw.planning_time,
        execution_time: raw.execution_time,
        warnings,
    })
}

impl Plan {
    /// Parses and normalizes an `EXPLAIN (FORMAT JSON)` document.
    pub fn from_json(text: &str, query: &str) -> Result<Plan, MalformedPlanError> {
        normalize(RawExplain::from_json(text)?, query)
    }

    pub fn from_value(value: serde_json::Value, query: &str) -> Result<Plan, MalformedPlanError> {
        normalize(RawExplain::from_value(value)?, query)
    }
}

fn required<T>(value: Option<T>, path: &str, field: &'static str) -> Result<T, MalformedPlanError> {
    value.ok_or_else(|| MalformedPlanError::MissingField {
        path: path.to_string(),
        field,
    })
}

fn normalize_node(raw: RawNode, path: String, measured: bool) -> Result<PlanNode, MalformedPlanError> {
    let node_type = required(raw.node_type, &path, "Node Type")?;
    let startup_cost = required(raw.startup_cost, &path, "Startup Cost")?;
    let total_cost = required(raw.total_cost, &path, "Total Cost")?;
    let plan_rows = required(raw.plan_rows, &path, "Plan Rows")?;
    let plan_width = required(raw.plan_width, &path, "Plan Width")?;

    // All-or-nothing, and only for measured plans.
    let actual = match (
        measured,
        raw.actual_startup_time,
        raw.actual_total_time,
        raw.actual_rows,
        raw.actual_loops,
    ) {
        (true, Some(startup_time), Some(total_time), Some(rows), Some(loops)) => Some(Actuals {
            startup_time,
            total_time,
            rows,
            loops,
        }),
        _ => None,
    };

    let buffers = if raw.shared_hit_blocks.is_some() || raw.shared_read_blocks.is_some() {
        Some(Buffers {
            shared_hit: raw.shared_hit_blocks.unwrap_or(0),
            shared_read: raw.shared_read_blocks.unwrap_or(0),
            shared_dirtied: raw.shared_dirtied_blocks.unwrap_or(0),
            shared_written: raw.shared_written_blocks.unwrap_or(0),
            temp_read: raw.temp_read_blocks.unwrap_or(0),
            temp_written: raw.temp_written_blocks.unwrap_or(0),
        })
    } else {
        None
    };

    let workers = raw.workers_planned.map(|planned| Workers {
        planned,
        launched: if measured { raw.workers_launched } else { None },
    });

    let mut children = Vec::with_capacity(raw.plans.len());
    for (i, child) in raw.plans.into_iter().enumerate() {
        children.push(normalize_node(child, format!("{}.Plans[{}]", path, i), measured)?);
    }

    let mut node = PlanNode {
        node_type,
        parent_relationship: raw.parent_relationship,
        join_type: raw.join_type,
        relation_name: raw.relation_name,
        alias: raw.alias,
        index_name: raw.index_name,
        startup_cost,
        total_cost,
        plan_rows,
        plan_width,
        actual,
        filter: raw.filter,
        rows_removed_by_filter: if measured { raw.rows_removed_by_filter } else { None },
        index_cond: raw.index_cond,
        recheck_cond: raw.recheck_cond,
        hash_cond: raw.hash_cond,
        merge_cond: raw.merge_cond,
        join_filter: raw.join_filter,
        sort_key: raw.sort_key,
        sort_method: raw.sort_method,
        sort_space_used_kb: raw.sort_space_used,
        sort_space_type: raw.sort_space_type,
        buffers,
        workers,
        children,
        warnings: raw.warnings,
    };
    let derived = derived_warnings(&node);
    node.warnings.extend(derived);
    Ok(node)
}

/// Heuristic warnings computed from this node's own fields.
fn derived_warnings(node: &PlanNode) -> Vec<String> {
    let mut out = Vec::new();

    if node.node_type == "Seq Scan" {
        let rows = match node.actual {
            Some(a) => a.rows * a.loops.max(1) as f64,
            None => node.plan_rows,
        };
        if rows >= LARGE_SEQ_SCAN_ROWS {
            let target = node.relation_name.as_deref().unwrap_or("relation");
            out.push(format!(
                "Sequential scan on {} reads {} rows; consider an index",
                target,
                format_rows(rows)
            ));
        }
    }

    if node.sort_space_type.as_deref() == Some("Disk") {
        match node.sort_space_used_kb {
            Some(kb) => out.push(format!(
                "Sort spilled to disk ({} kB); consider raising work_mem",
                kb
            )),
            None => out.push("Sort spilled to disk; consider raising work_mem".to_string()),
        }
    }

    if let Some(w) = node.workers
        && let Some(launched) = w.launched
        && launched < w.planned
    {
        out.push(format!(
            "Only {} of {} planned parallel workers launched",
            launched, w.planned
        ));
    }

    if let (Some(removed), Some(a)) = (node.rows_removed_by_filter, node.actual)
        && removed > 0.0
        && removed > FILTER_DISCARD_RATIO * a.rows
    {
        out.push(format!(
            "Filter removed {} rows to keep {}",
            format_rows(removed),
            format_rows(a.rows)
        ));
    }

    if row_mismatch(node)
        && let Some(a) = node.actual
    {
        out.push(format!(
            "Row estimate off: planned {}, actual {}",
            format_rows(node.plan_rows),
            format_rows(a.rows)
        ));
    }

    if let Some(a) = node.actual
        && a.loops == 0
    {
        out.push(format!("Never executed (startup {})", format_time(a.startup_time)));
    }

    out
}

fn collect_warnings(node: &PlanNode, out: &mut Vec<String>, any_mismatch: &mut bool) {
    out.extend(node.warnings.iter().cloned());
    if row_mismatch(node) {
        *any_mismatch = true;
    }
    for child in &node.children {
        collect_warnings(child, out, any_mismatch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate_only() -> &'static str {
        r#"[{"Plan": {
            "Node Type": "Hash Join", "Join Type": "Inner",
            "Startup Cost": 10.0, "Total Cost": 100.0, "Plan Rows": 500, "Plan Width": 16,
            "Hash Cond": "(o.user_id = u.id)",
            "Plans": [
                {"Node Type": "Seq Scan", "Relation Name": "orders", "Alias": "o",
                 "Startup Cost": 0.0, "Total Cost": 40.0, "Plan Rows": 20000, "Plan Width": 8},
                {"Node Type": "Hash",
                 "Startup Cost": 5.0, "Total Cost": 5.0, "Plan Rows": 100, "Plan Width": 8,
                 "Plans": [
                    {"Node Type": "Index Scan", "Relation Name": "users", "Alias": "u",
                     "Index Name": "users_pkey",
                     "Startup Cost": 0.0, "Total Cost": 4.0, "Plan Rows": 100, "Plan Width": 8}
                 ]}
            ]},
            "Planning Time": 0.2}]"#
    }

    fn measured() -> &'static str {
        r#"[{"Plan": {
            "Node Type": "Sort", "Sort Key": ["u.name"], "Sort Method": "external merge",
            "Sort Space Used": 2048, "Sort Space Type": "Disk",
            "Startup Cost": 50.0, "Total Cost": 60.0, "Plan Rows": 100, "Plan Width": 32,
            "Actual Startup Time": 9.0, "Actual Total Time": 10.0, "Actual Rows": 1000, "Actual Loops": 2,
            "Plans": [
                {"Node Type": "Seq Scan", "Relation Name": "users",
                 "Startup Cost": 0.0, "Total Cost": 40.0, "Plan Rows": 100, "Plan Width": 32,
                 "Actual Startup Time": 0.1, "Actual Total Time": 5.0, "Actual Rows": 9, "Actual Loops": 1,
                 "Filter": "(active)", "Rows Removed by Filter": 500,
                 "Shared Hit Blocks": 12, "Shared Read Blocks": 3,
                 "Warnings": ["backend node notice"]}
            ]},
            "Planning Time": 0.3, "Execution Time": 20.5,
            "Warnings": ["backend plan notice"]}]"#
    }

    #[test]
    fn estimate_only_plan_has_no_actuals() {
        let plan = Plan::from_json(estimate_only(), "SELECT 1").unwrap();
        assert!(!plan.is_measured());
        assert_eq!(plan.total_cost, 100.0);
        assert_eq!(plan.planning_time, Some(0.2));
        for row in plan.rows() {
            assert!(row.node.actual.is_none(), "{} has actuals", row.node.node_type);
        }
        assert_eq!(plan.query, "SELECT 1");
    }

    #[test]
    fn rows_are_depth_first_in_input_order() {
        let plan = Plan::from_json(estimate_only(), "q").unwrap();
        let rows: Vec<(usize, &str)> = plan
            .rows()
            .iter()
            .map(|r| (r.depth, r.node.node_type.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (0, "Hash Join"),
                (1, "Seq Scan"),
                (1, "Hash"),
                (2, "Index Scan"),
            ]
        );
        assert_eq!(plan.node_count(), 4);
    }

    #[test]
    fn large_estimated_seq_scan_is_flagged_on_its_own_node() {
        let plan = Plan::from_json(estimate_only(), "q").unwrap();
        let scan = &plan.root.children[0];
        assert_eq!(
            scan.warnings,
            vec!["Sequential scan on orders reads 20.0K rows; consider an index"]
        );
        assert!(plan.root.warnings.is_empty());
        assert_eq!(plan.warnings, scan.warnings);
    }

    #[test]
    fn measured_plan_derives_node_and_plan_warnings_in_order() {
        let plan = Plan::from_json(measured(), "q").unwrap();
        assert!(plan.is_measured());

        let sort = &plan.root;
        assert_eq!(
            sort.actual,
            Some(Actuals {
                startup_time: 9.0,
                total_time: 10.0,
                rows: 1000.0,
                loops: 2
            })
        );
        // 1000 / 100 = 10 exactly: not a mismatch.
        assert_eq!(
            sort.warnings,
            vec!["Sort spilled to disk (2048 kB); consider raising work_mem"]
        );

        let scan = &sort.children[0];
        assert_eq!(
            scan.warnings,
            vec![
                "backend node notice",
                "Filter removed 500 rows to keep 9",
                "Row estimate off: planned 100, actual 9",
            ]
        );
        assert_eq!(
            scan.buffers,
            Some(Buffers {
                shared_hit: 12,
                shared_read: 3,
                ..Buffers::default()
            })
        );

        assert_eq!(
            plan.warnings,
            vec![
                "Sort spilled to disk (2048 kB); consider raising work_mem".to_string(),
                "backend node notice".to_string(),
                "Filter removed 500 rows to keep 9".to_string(),
                "Row estimate off: planned 100, actual 9".to_string(),
                "backend plan notice".to_string(),
                STALE_STATISTICS_NOTICE.to_string(),
            ]
        );
    }

    #[test]
    fn partial_actuals_are_dropped_as_a_group() {
        let plan = Plan::from_json(
            r#"{"Plan": {"Node Type": "Result", "Startup Cost": 0, "Total Cost": 0.01,
                "Plan Rows": 1, "Plan Width": 4, "Actual Total Time": 0.01, "Actual Rows": 1},
                "Execution Time": 0.02}"#,
            "q",
        )
        .unwrap();
        assert!(plan.is_measured());
        assert!(plan.root.actual.is_none());
    }

    #[test]
    fn actual_fields_ignored_without_execution_time() {
        let plan = Plan::from_json(
            r#"{"Plan": {"Node Type": "Result", "Startup Cost": 0, "Total Cost": 0.01,
                "Plan Rows": 1, "Plan Width": 4, "Actual Startup Time": 0.0,
                "Actual Total Time": 0.01, "Actual Rows": 1, "Actual Loops": 1}}"#,
            "q",
        )
        .unwrap();
        assert!(plan.root.actual.is_none());
    }

    #[test]
    fn parallel_shortfall_is_flagged() {
        let plan = Plan::from_json(
            r#"{"Plan": {"Node Type": "Gather", "Startup Cost": 0, "Total Cost": 10,
                "Plan Rows": 10, "Plan Width": 4, "Workers Planned": 4, "Workers Launched": 1,
                "Actual Startup Time": 0.1, "Actual Total Time": 1.0, "Actual Rows": 10, "Actual Loops": 1},
                "Execution Time": 1.1}"#,
            "q",
        )
        .unwrap();
        assert_eq!(
            plan.root.warnings,
            vec!["Only 1 of 4 planned parallel workers launched"]
        );
        assert!(!plan.warnings.contains(&STALE_STATISTICS_NOTICE.to_string()));
    }

    #[test]
    fn missing_root_fails() {
        assert_eq!(
            Plan::from_json(r#"[{"Planning Time": 0.1}]"#, "q").unwrap_err(),
            MalformedPlanError::MissingRoot
        );
    }

    #[test]
    fn missing_estimate_field_fails_with_node_path() {
        let err = Plan::from_json(
            r#"{"Plan": {"Node Type": "Limit", "Startup Cost": 0, "Total Cost": 1,
                "Plan Rows": 1, "Plan Width": 4,
                "Plans": [{"Node Type": "Seq Scan", "Startup Cost": 0, "Plan Rows": 1, "Plan Width": 4}]}}"#,
            "q",
        )
        .unwrap_err();
        assert_eq!(
            err,
            MalformedPlanError::MissingField {
                path: "Plan.Plans[0]".to_string(),
                field: "Total Cost",
            }
        );
        assert_eq!(
            err.to_string(),
            "plan node Plan.Plans[0] is missing \"Total Cost\""
        );
    }

    #[test]
    fn labels_and_conditions() {
        let plan = Plan::from_json(estimate_only(), "q").unwrap();
        assert_eq!(plan.root.label(), "Hash Join (Inner)");
        assert_eq!(plan.root.children[0].label(), "Seq Scan on orders o");
        assert_eq!(
            plan.root.children[1].children[0].label(),
            "Index Scan using users_pkey on users u"
        );
        assert_eq!(
            plan.root.conditions(),
            vec![("Hash Cond", "(o.user_id = u.id)")]
        );
    }
}
