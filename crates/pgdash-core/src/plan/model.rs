//! Normalized execution plan. Built once per analyze response and never mutated.

use serde::Serialize;

/// Actual execution figures of one node, present only for measured plans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Actuals {
    /// Per-loop startup time, ms.
    pub startup_time: f64,
    /// Per-loop total time, ms.
    pub total_time: f64,
    /// Per-loop row count.
    pub rows: f64,
    pub loops: u64,
}

impl Actuals {
    /// Wall-clock time across all loops, ms.
    pub fn total_time_all_loops(&self) -> f64 {
        self.total_time * self.loops.max(1) as f64
    }
}

/// Buffer counters (in 8 KiB blocks) reported with `BUFFERS`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Buffers {
    pub shared_hit: u64,
    pub shared_read: u64,
    pub shared_dirtied: u64,
    pub shared_written: u64,
    pub temp_read: u64,
    pub temp_written: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Workers {
    pub planned: u32,
    /// Known only for measured plans.
    pub launched: Option<u32>,
}

/// Coarse operation family, used for coloring and icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    SeqScan,
    IndexScan,
    BitmapScan,
    Join,
    Sort,
    Aggregate,
    Materialize,
    Parallel,
    Other,
}

impl NodeKind {
    pub fn classify(node_type: &str) -> Self {
        match node_type {
            "Seq Scan" => NodeKind::SeqScan,
            "Index Scan" | "Index Only Scan" => NodeKind::IndexScan,
            "Bitmap Index Scan" | "Bitmap Heap Scan" => NodeKind::BitmapScan,
            "Nested Loop" | "Hash Join" | "Merge Join" => NodeKind::Join,
            "Sort" | "Incremental Sort" => NodeKind::Sort,
            "Aggregate" | "GroupAggregate" | "HashAggregate" | "Group" => NodeKind::Aggregate,
            "Hash" | "Materialize" | "Memoize" => NodeKind::Materialize,
            "Gather" | "Gather Merge" => NodeKind::Parallel,
            _ => NodeKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanNode {
    pub node_type: String,
    pub parent_relationship: Option<String>,
    pub join_type: Option<String>,
    pub relation_name: Option<String>,
    pub alias: Option<String>,
    pub index_name: Option<String>,

    pub startup_cost: f64,
    pub total_cost: f64,
    pub plan_rows: f64,
    pub plan_width: u32,

    pub actual: Option<Actuals>,

    pub filter: Option<String>,
    pub rows_removed_by_filter: Option<f64>,
    pub index_cond: Option<String>,
    pub recheck_cond: Option<String>,
    pub hash_cond: Option<String>,
    pub merge_cond: Option<String>,
    pub join_filter: Option<String>,

    pub sort_key: Option<Vec<String>>,
    pub sort_method: Option<String>,
    pub sort_space_used_kb: Option<u64>,
    pub sort_space_type: Option<String>,

    pub buffers: Option<Buffers>,
    pub workers: Option<Workers>,

    pub children: Vec<PlanNode>,
    /// Warnings attached to this node only; children keep their own.
    pub warnings: Vec<String>,
}

impl PlanNode {
    pub fn kind(&self) -> NodeKind {
        NodeKind::classify(&self.node_type)
    }

    /// One-line label: `Hash Join (Inner)`, `Seq Scan on users u`,
    /// `Index Scan using users_pkey on users`.
    pub fn label(&self) -> String {
        let mut s = self.node_type.clone();
        if let Some(join) = &self.join_type {
            s.push_str(&format!(" ({})", join));
        }
        if let Some(index) = &self.index_name {
            s.push_str(&format!(" using {}", index));
        }
        if let Some(rel) = &self.relation_name {
            s.push_str(&format!(" on {}", rel));
            if let Some(alias) = &self.alias
                && alias != rel
            {
                s.push_str(&format!(" {}", alias));
            }
        }
        s
    }

    /// Present predicate texts, labeled, in a fixed display order.
    pub fn conditions(&self) -> Vec<(&'static str, &str)> {
        [
            ("Index Cond", &self.index_cond),
            ("Recheck Cond", &self.recheck_cond),
            ("Hash Cond", &self.hash_cond),
            ("Merge Cond", &self.merge_cond),
            ("Join Filter", &self.join_filter),
            ("Filter", &self.filter),
        ]
        .into_iter()
        .filter_map(|(label, v)| v.as_deref().map(|text| (label, text)))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub query: String,
    pub root: PlanNode,
    /// Root's total estimated cost.
    pub total_cost: f64,
    pub planning_time: Option<f64>,
    /// Present iff the query was actually executed.
    pub execution_time: Option<f64>,
    /// Node warnings in depth-first order, then plan-level notices.
    pub warnings: Vec<String>,
}

/// A node together with its depth in the tree (root = 0).
#[derive(Debug, Clone, Copy)]
pub struct PlanRow<'a> {
    pub depth: usize,
    pub node: &'a PlanNode,
}

impl Plan {
    pub fn is_measured(&self) -> bool {
        self.execution_time.is_some()
    }

    /// Depth-first pre-order traversal preserving child order.
    pub fn rows(&self) -> Vec<PlanRow<'_>> {
        let mut out = Vec::new();
        let mut stack = vec![PlanRow {
            depth: 0,
            node: &self.root,
        }];
        while let Some(row) = stack.pop() {
            out.push(row);
            for child in row.node.children.iter().rev() {
                stack.push(PlanRow {
                    depth: row.depth + 1,
                    node: child,
                });
            }
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.rows().len()
    }
}
