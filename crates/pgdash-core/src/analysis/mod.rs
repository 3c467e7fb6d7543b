//! Issue detection over one round of fetched server metrics.
//!
//! Rules are stateless: each looks at an [`IssueContext`] and reports zero or
//! more [`Issue`]s. Missing inputs (a feed that has not loaded yet) make the
//! rules that need them report nothing.

pub mod rules;

use serde::Serialize;

use crate::backend::{DatabaseStats, HardwareInfo, IndexStats, PgSetting, TableStats};

// ============================================================
// Core types
// ============================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Configuration,
    Performance,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Configuration => "config",
            Category::Performance => "perf",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Critical => "CRIT",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Issue {
    pub rule_id: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub title: String,
    pub recommendation: String,
    /// Current vs. recommended value, when the rule has one.
    pub detail: Option<String>,
}

// ============================================================
// Context passed to each rule
// ============================================================

#[derive(Default, Clone, Copy)]
pub struct IssueContext<'a> {
    pub settings: Option<&'a [PgSetting]>,
    pub hardware: Option<&'a HardwareInfo>,
    pub database_stats: Option<&'a [DatabaseStats]>,
    pub table_stats: Option<&'a [TableStats]>,
    pub index_stats: Option<&'a [IndexStats]>,
}

impl<'a> IssueContext<'a> {
    /// Raw `setting` value by name.
    pub fn setting(&self, name: &str) -> Option<&'a str> {
        self.settings?
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.setting.as_str())
    }
}

/// Runs every rule. Critical first; rule order is kept within a severity.
pub fn analyze(ctx: &IssueContext) -> Vec<Issue> {
    let mut issues: Vec<Issue> = rules::all_rules()
        .iter()
        .flat_map(|rule| rule.evaluate(ctx))
        .collect();
    issues.sort_by(|a, b| b.severity.cmp(&a.severity));
    issues
}
