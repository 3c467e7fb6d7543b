//! Serde model of PostgreSQL `EXPLAIN (FORMAT JSON)` output.
//!
//! Every field is optional here; [`super::normalize`] decides which ones are
//! required. Unknown keys are ignored so newer server versions parse fine.

use serde::Deserialize;

use super::MalformedPlanError;

/// One top-level explain document: `{"Plan": {...}, "Planning Time": .., "Execution Time": ..}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExplain {
    #[serde(rename = "Plan")]
    pub plan: Option<RawNode>,
    #[serde(rename = "Planning Time")]
    pub planning_time: Option<f64>,
    #[serde(rename = "Execution Time")]
    pub execution_time: Option<f64>,
    /// Plan-level notices supplied by the backend.
    #[serde(rename = "Warnings", default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNode {
    #[serde(rename = "Node Type")]
    pub node_type: Option<String>,
    #[serde(rename = "Parent Relationship")]
    pub parent_relationship: Option<String>,
    #[serde(rename = "Join Type")]
    pub join_type: Option<String>,
    #[serde(rename = "Relation Name")]
    pub relation_name: Option<String>,
    #[serde(rename = "Alias")]
    pub alias: Option<String>,
    #[serde(rename = "Index Name")]
    pub index_name: Option<String>,

    #[serde(rename = "Startup Cost")]
    pub startup_cost: Option<f64>,
    #[serde(rename = "Total Cost")]
    pub total_cost: Option<f64>,
    #[serde(rename = "Plan Rows")]
    pub plan_rows: Option<f64>,
    #[serde(rename = "Plan Width")]
    pub plan_width: Option<u32>,

    #[serde(rename = "Actual Startup Time")]
    pub actual_startup_time: Option<f64>,
    #[serde(rename = "Actual Total Time")]
    pub actual_total_time: Option<f64>,
    #[serde(rename = "Actual Rows")]
    pub actual_rows: Option<f64>,
    #[serde(rename = "Actual Loops")]
    pub actual_loops: Option<u64>,

    #[serde(rename = "Filter")]
    pub filter: Option<String>,
    #[serde(rename = "Rows Removed by Filter")]
    pub rows_removed_by_filter: Option<f64>,
    #[serde(rename = "Index Cond")]
    pub index_cond: Option<String>,
    #[serde(rename = "Recheck Cond")]
    pub recheck_cond: Option<String>,
    #[serde(rename = "Hash Cond")]
    pub hash_cond: Option<String>,
    #[serde(rename = "Merge Cond")]
    pub merge_cond: Option<String>,
    #[serde(rename = "Join Filter")]
    pub join_filter: Option<String>,

    #[serde(rename = "Sort Key")]
    pub sort_key: Option<Vec<String>>,
    #[serde(rename = "Sort Method")]
    pub sort_method: Option<String>,
    #[serde(rename = "Sort Space Used")]
    pub sort_space_used: Option<u64>,
    #[serde(rename = "Sort Space Type")]
    pub sort_space_type: Option<String>,

    #[serde(rename = "Shared Hit Blocks")]
    pub shared_hit_blocks: Option<u64>,
    #[serde(rename = "Shared Read Blocks")]
    pub shared_read_blocks: Option<u64>,
    #[serde(rename = "Shared Dirtied Blocks")]
    pub shared_dirtied_blocks: Option<u64>,
    #[serde(rename = "Shared Written Blocks")]
    pub shared_written_blocks: Option<u64>,
    #[serde(rename = "Temp Read Blocks")]
    pub temp_read_blocks: Option<u64>,
    #[serde(rename = "Temp Written Blocks")]
    pub temp_written_blocks: Option<u64>,

    #[serde(rename = "Workers Planned")]
    pub workers_planned: Option<u32>,
    #[serde(rename = "Workers Launched")]
    pub workers_launched: Option<u32>,

    #[serde(rename = "Plans", default)]
    pub plans: Vec<RawNode>,
    /// Node-level notices supplied by the backend.
    #[serde(rename = "Warnings", default)]
    pub warnings: Vec<String>,
}

impl RawExplain {
    /// Accepts either the array form PostgreSQL returns (`[{"Plan": ...}]`)
    /// or a bare explain object.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MalformedPlanError> {
        let doc = match value {
            serde_json::Value::Array(items) => match items.into_iter().next() {
                Some(first) => first,
                None => return Err(MalformedPlanError::MissingRoot),
            },
            obj @ serde_json::Value::Object(_) => obj,
            other => {
                return Err(MalformedPlanError::InvalidJson(format!(
                    "expected an object or array, got {}",
                    json_kind(&other)
                )));
            }
        };
        serde_json::from_value(doc).map_err(|e| MalformedPlanError::InvalidJson(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, MalformedPlanError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| MalformedPlanError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
