//! Payloads returned by a [`super::MetricsBackend`].

use serde::{Deserialize, Serialize};

/// Row of `pg_stat_database`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub datname: String,
    pub numbackends: i32,
    pub xact_commit: i64,
    pub xact_rollback: i64,
    pub blks_read: i64,
    pub blks_hit: i64,
    pub tup_returned: i64,
    pub tup_fetched: i64,
    pub tup_inserted: i64,
    pub tup_updated: i64,
    pub tup_deleted: i64,
    pub conflicts: i64,
    pub temp_files: i64,
    pub temp_bytes: i64,
    pub deadlocks: i64,
}

impl DatabaseStats {
    /// Buffer cache hit percentage, `None` before any block was touched.
    pub fn cache_hit_ratio(&self) -> Option<f64> {
        hit_ratio(self.blks_hit, self.blks_read)
    }
}

/// Cache hit percentage across all databases.
pub fn total_cache_hit_ratio(stats: &[DatabaseStats]) -> Option<f64> {
    let hit: i64 = stats.iter().map(|s| s.blks_hit).sum();
    let read: i64 = stats.iter().map(|s| s.blks_read).sum();
    hit_ratio(hit, read)
}

fn hit_ratio(hit: i64, read: i64) -> Option<f64> {
    let total = hit + read;
    if total > 0 {
        Some(hit as f64 / total as f64 * 100.0)
    } else {
        None
    }
}

/// Row of `pg_stat_statements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStat {
    pub query: String,
    pub calls: i64,
    pub total_exec_time: f64,
    pub mean_exec_time: f64,
    pub min_exec_time: f64,
    pub max_exec_time: f64,
    pub rows: i64,
    pub shared_blks_hit: i64,
    pub shared_blks_read: i64,
}

/// Non-idle session from `pg_stat_activity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveQuery {
    pub pid: i32,
    pub datname: Option<String>,
    pub usename: Option<String>,
    pub application_name: String,
    pub client_addr: Option<String>,
    pub backend_start: Option<String>,
    pub state: String,
    pub query: String,
    pub wait_event_type: Option<String>,
    pub wait_event: Option<String>,
    /// Time since `query_start`, ms.
    pub duration_ms: Option<f64>,
}

/// Row of `pg_stat_user_tables`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub schemaname: String,
    pub relname: String,
    pub seq_scan: i64,
    pub seq_tup_read: i64,
    pub idx_scan: Option<i64>,
    pub idx_tup_fetch: Option<i64>,
    pub n_tup_ins: i64,
    pub n_tup_upd: i64,
    pub n_tup_del: i64,
    pub n_live_tup: i64,
    pub n_dead_tup: i64,
    pub last_vacuum: Option<String>,
    pub last_autovacuum: Option<String>,
}

impl TableStats {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schemaname, self.relname)
    }

    /// Dead tuples as a percentage of all tuples, `None` for empty tables.
    pub fn dead_ratio(&self) -> Option<f64> {
        let total = self.n_live_tup + self.n_dead_tup;
        if total > 0 {
            Some(self.n_dead_tup as f64 / total as f64 * 100.0)
        } else {
            None
        }
    }
}

/// Row of `pg_stat_user_indexes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub schemaname: String,
    pub tablename: String,
    pub indexname: String,
    pub idx_scan: i64,
    pub idx_tup_read: i64,
    pub idx_tup_fetch: i64,
}

/// Row of `pg_locks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    pub locktype: String,
    pub database: Option<String>,
    pub relation: Option<String>,
    pub pid: Option<i32>,
    pub mode: String,
    pub granted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BgWriterStats {
    pub checkpoints_timed: i64,
    pub checkpoints_req: i64,
    pub checkpoint_write_time: f64,
    pub checkpoint_sync_time: f64,
    pub buffers_checkpoint: i64,
    pub buffers_clean: i64,
    pub maxwritten_clean: i64,
    pub buffers_backend: i64,
    pub buffers_alloc: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSize {
    pub database_name: String,
    pub size_bytes: i64,
    pub size_pretty: String,
}

/// Row of `pg_settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgSetting {
    pub name: String,
    pub setting: String,
    pub unit: Option<String>,
    pub category: String,
    pub short_desc: Option<String>,
    pub source: String,
    pub min_val: Option<String>,
    pub max_val: Option<String>,
}

/// Host resources as estimated from inside PostgreSQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub cpu_cores: i32,
    pub total_memory_mb: i64,
    pub postgres_version: String,
    pub os_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
    pub postgres_version: Option<String>,
}
