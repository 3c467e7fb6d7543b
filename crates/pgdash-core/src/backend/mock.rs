//! In-memory backend for demo mode and tests.
//!
//! Every connected server gets its own [`MockData`] (the demo dataset unless
//! overridden). Counters drift on each `database_stats` call so live refresh
//! has something to show. Failures can be injected per method name.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::json;
use tracing::debug;

use super::types::*;
use super::{BackendError, MetricsBackend};
use crate::servers::ServerConfig;

const DEMO_VERSION: &str = "PostgreSQL 16.4 (pgdash demo) on x86_64-pc-linux-gnu";

/// Canned payloads for one server.
#[derive(Debug, Clone)]
pub struct MockData {
    pub database_stats: Vec<DatabaseStats>,
    pub top_queries: Option<Vec<QueryStat>>,
    pub active_queries: Vec<ActiveQuery>,
    pub table_stats: Vec<TableStats>,
    pub index_stats: Vec<IndexStats>,
    pub locks: Vec<LockInfo>,
    pub bgwriter: BgWriterStats,
    pub database_sizes: Vec<DatabaseSize>,
    pub settings: Vec<PgSetting>,
    pub hardware: HardwareInfo,
    pub plan_estimate: serde_json::Value,
    pub plan_measured: serde_json::Value,
}

pub struct MockBackend {
    servers: RwLock<HashMap<String, MockData>>,
    /// Method name -> error message returned as `BackendError::Query`.
    failures: RwLock<HashMap<String, String>>,
    latency: Duration,
    calls: AtomicU64,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            latency: Duration::ZERO,
            calls: AtomicU64::new(0),
        }
    }

    /// Every call sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Replaces the dataset of a connected (or not yet connected) server.
    pub fn set_data(&self, server_id: &str, data: MockData) {
        write(&self.servers).insert(server_id.to_string(), data);
    }

    /// Makes `method` fail with a query error until [`Self::recover`].
    pub fn fail(&self, method: &str, message: &str) {
        write(&self.failures).insert(method.to_string(), message.to_string());
    }

    pub fn recover(&self, method: &str) {
        write(&self.failures).remove(method);
    }

    /// Total number of data calls served or failed.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn enter(&self, method: &str, server_id: &str) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if !read(&self.servers).contains_key(server_id) {
            return Err(BackendError::NotConnected(server_id.to_string()));
        }
        if let Some(msg) = read(&self.failures).get(method) {
            return Err(BackendError::Query(msg.clone()));
        }
        Ok(())
    }

    fn with_data<T>(
        &self,
        method: &str,
        server_id: &str,
        f: impl FnOnce(&MockData) -> T,
    ) -> Result<T, BackendError> {
        self.enter(method, server_id)?;
        read(&self.servers)
            .get(server_id)
            .map(f)
            .ok_or_else(|| BackendError::NotConnected(server_id.to_string()))
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl MetricsBackend for MockBackend {
    fn connect(&self, server: &ServerConfig) -> Result<String, BackendError> {
        if server.host == "unreachable.invalid" {
            return Err(BackendError::Connection(format!(
                "could not translate host name \"{}\"",
                server.host
            )));
        }
        write(&self.servers)
            .entry(server.id.clone())
            .or_insert_with(MockData::demo);
        debug!(server = %server.id, "mock server connected");
        Ok(DEMO_VERSION.to_string())
    }

    fn disconnect(&self, server_id: &str) {
        write(&self.servers).remove(server_id);
    }

    fn is_connected(&self, server_id: &str) -> bool {
        read(&self.servers).contains_key(server_id)
    }

    fn server_version(&self, server_id: &str) -> Option<String> {
        read(&self.servers)
            .get(server_id)
            .map(|d| d.hardware.postgres_version.clone())
    }

    fn test_connection(&self, server: &ServerConfig) -> ConnectionTestResult {
        if server.host == "unreachable.invalid" {
            ConnectionTestResult {
                success: false,
                message: "Connection failed: could not translate host name".to_string(),
                postgres_version: None,
            }
        } else {
            ConnectionTestResult {
                success: true,
                message: "Connection successful".to_string(),
                postgres_version: Some(DEMO_VERSION.to_string()),
            }
        }
    }

    fn database_stats(&self, server_id: &str) -> Result<Vec<DatabaseStats>, BackendError> {
        self.enter("database_stats", server_id)?;
        let tick = self.calls.load(Ordering::Relaxed) as i64;
        let mut servers = write(&self.servers);
        let data = servers
            .get_mut(server_id)
            .ok_or_else(|| BackendError::NotConnected(server_id.to_string()))?;
        for (i, db) in data.database_stats.iter_mut().enumerate() {
            let spread = (i as i64 + 1) * 7;
            db.xact_commit += 120 + (tick * spread) % 97;
            db.xact_rollback += (tick % 5 == 0) as i64;
            db.blks_hit += 4_000 + (tick * spread) % 1_500;
            db.blks_read += 40 + (tick * spread) % 60;
            db.tup_returned += 9_000 + (tick * 13) % 2_000;
            db.tup_fetched += 2_500 + (tick * 11) % 700;
            db.numbackends = 3 + ((tick + i as i64) % 9) as i32;
        }
        for q in data.active_queries.iter_mut() {
            if let Some(d) = q.duration_ms.as_mut() {
                *d += 1_000.0;
            }
        }
        Ok(data.database_stats.clone())
    }

    fn top_queries(&self, server_id: &str, limit: u32) -> Result<Vec<QueryStat>, BackendError> {
        let queries = self.with_data("top_queries", server_id, |d| d.top_queries.clone())?;
        match queries {
            Some(q) => Ok(q.into_iter().take(limit as usize).collect()),
            None => Err(BackendError::ExtensionMissing("pg_stat_statements".to_string())),
        }
    }

    fn active_queries(&self, server_id: &str) -> Result<Vec<ActiveQuery>, BackendError> {
        self.with_data("active_queries", server_id, |d| d.active_queries.clone())
    }

    fn table_stats(&self, server_id: &str, limit: u32) -> Result<Vec<TableStats>, BackendError> {
        self.with_data("table_stats", server_id, |d| {
            let mut t = d.table_stats.clone();
            t.sort_by(|a, b| b.seq_tup_read.cmp(&a.seq_tup_read));
            t.truncate(limit as usize);
            t
        })
    }

    fn index_stats(&self, server_id: &str, limit: u32) -> Result<Vec<IndexStats>, BackendError> {
        self.with_data("index_stats", server_id, |d| {
            let mut ix = d.index_stats.clone();
            ix.sort_by(|a, b| b.idx_scan.cmp(&a.idx_scan));
            ix.truncate(limit as usize);
            ix
        })
    }

    fn locks(&self, server_id: &str) -> Result<Vec<LockInfo>, BackendError> {
        self.with_data("locks", server_id, |d| d.locks.clone())
    }

    fn bgwriter_stats(&self, server_id: &str) -> Result<BgWriterStats, BackendError> {
        self.with_data("bgwriter_stats", server_id, |d| d.bgwriter.clone())
    }

    fn database_sizes(&self, server_id: &str) -> Result<Vec<DatabaseSize>, BackendError> {
        self.with_data("database_sizes", server_id, |d| d.database_sizes.clone())
    }

    fn settings(&self, server_id: &str) -> Result<Vec<PgSetting>, BackendError> {
        self.with_data("settings", server_id, |d| d.settings.clone())
    }

    fn hardware_info(&self, server_id: &str) -> Result<HardwareInfo, BackendError> {
        self.with_data("hardware_info", server_id, |d| d.hardware.clone())
    }

    fn explain(
        &self,
        server_id: &str,
        query: &str,
        analyze: bool,
    ) -> Result<serde_json::Value, BackendError> {
        if query.trim().is_empty() {
            self.enter("explain", server_id)?;
            return Err(BackendError::Query(
                "ERROR: syntax error at end of input".to_string(),
            ));
        }
        self.with_data("explain", server_id, |d| {
            if analyze {
                d.plan_measured.clone()
            } else {
                d.plan_estimate.clone()
            }
        })
    }
}

// ============================================================
// Demo dataset
// ============================================================

impl MockData {
    pub fn demo() -> Self {
        Self {
            database_stats: vec![
                demo_db("app", 1_250_000, 3_400, 98_000_000, 2_100_000),
                demo_db("analytics", 84_000, 120, 4_500_000, 900_000),
                demo_db("postgres", 12_000, 4, 310_000, 2_000),
            ],
            top_queries: Some(vec![
                demo_stmt(
                    "SELECT o.id, o.total FROM orders o JOIN users u ON u.id = o.user_id WHERE u.email = $1",
                    182_000,
                    1.9,
                ),
                demo_stmt("UPDATE sessions SET last_seen = now() WHERE token = $1", 950_000, 0.21),
                demo_stmt(
                    "SELECT date_trunc($1, created_at), count(*) FROM events GROUP BY 1",
                    1_200,
                    840.0,
                ),
            ]),
            active_queries: vec![
                demo_session(
                    4211,
                    "app",
                    "active",
                    "SELECT o.id, o.total FROM orders o JOIN users u ON u.id = o.user_id WHERE u.email = 'a@example.com'",
                    None,
                    1_250.0,
                ),
                demo_session(
                    4387,
                    "analytics",
                    "active",
                    "SELECT date_trunc('day', created_at), count(*) FROM events GROUP BY 1",
                    Some(("IO", "DataFileRead")),
                    48_200.0,
                ),
                demo_session(
                    4402,
                    "app",
                    "idle in transaction",
                    "UPDATE accounts SET balance = balance - 10 WHERE id = 7",
                    Some(("Client", "ClientRead")),
                    96_000.0,
                ),
                demo_session(
                    4410,
                    "app",
                    "active",
                    "UPDATE accounts SET balance = balance + 10 WHERE id = 7",
                    Some(("Lock", "transactionid")),
                    31_000.0,
                ),
            ],
            table_stats: vec![
                demo_table("public", "orders", 14_500, 380_000_000, Some(52_000), 2_400_000, 31_000),
                demo_table("public", "events", 2_300, 96_000_000, Some(40), 11_000_000, 640_000),
                demo_table("public", "users", 310, 62_000, Some(1_900_000), 120_000, 800),
                demo_table("public", "accounts", 12, 4_000, Some(720_000), 9_000, 15),
            ],
            index_stats: vec![
                demo_index("public", "users", "users_pkey", 1_900_000),
                demo_index("public", "users", "users_email_idx", 540_000),
                demo_index("public", "orders", "orders_user_id_idx", 52_000),
                demo_index("public", "events", "events_legacy_type_idx", 0),
                demo_index("public", "orders", "orders_pkey", 0),
            ],
            locks: vec![
                demo_lock("transactionid", None, Some(4402), "ExclusiveLock", true),
                demo_lock("relation", Some("accounts"), Some(4402), "RowExclusiveLock", true),
                demo_lock("transactionid", None, Some(4410), "ShareLock", false),
                demo_lock("relation", Some("accounts"), Some(4410), "RowExclusiveLock", true),
            ],
            bgwriter: BgWriterStats {
                checkpoints_timed: 1_420,
                checkpoints_req: 37,
                checkpoint_write_time: 8_450_000.0,
                checkpoint_sync_time: 12_300.0,
                buffers_checkpoint: 5_600_000,
                buffers_clean: 310_000,
                maxwritten_clean: 120,
                buffers_backend: 98_000,
                buffers_alloc: 14_000_000,
            },
            database_sizes: vec![
                demo_size("app", 48_318_382_080),
                demo_size("analytics", 12_884_901_888),
                demo_size("postgres", 8_912_896),
            ],
            settings: vec![
                demo_setting("shared_buffers", "16384", Some("8kB"), "Resource Usage / Memory"),
                demo_setting("effective_cache_size", "524288", Some("8kB"), "Query Tuning / Planner Cost Constants"),
                demo_setting("work_mem", "4096", Some("kB"), "Resource Usage / Memory"),
                demo_setting("max_connections", "100", None, "Connections and Authentication / Connection Settings"),
            ],
            hardware: HardwareInfo {
                cpu_cores: 8,
                total_memory_mb: 16_384,
                postgres_version: DEMO_VERSION.to_string(),
                os_type: "Linux".to_string(),
            },
            plan_estimate: demo_plan(false),
            plan_measured: demo_plan(true),
        }
    }
}

fn demo_db(name: &str, commits: i64, rollbacks: i64, hit: i64, read: i64) -> DatabaseStats {
    DatabaseStats {
        datname: name.to_string(),
        numbackends: 4,
        xact_commit: commits,
        xact_rollback: rollbacks,
        blks_read: read,
        blks_hit: hit,
        tup_returned: hit * 3,
        tup_fetched: hit / 2,
        tup_inserted: commits / 3,
        tup_updated: commits / 5,
        tup_deleted: commits / 50,
        conflicts: 0,
        temp_files: rollbacks / 100,
        temp_bytes: rollbacks * 1_048_576,
        deadlocks: rollbacks / 1_000,
    }
}

fn demo_stmt(query: &str, calls: i64, mean_ms: f64) -> QueryStat {
    QueryStat {
        query: query.to_string(),
        calls,
        total_exec_time: calls as f64 * mean_ms,
        mean_exec_time: mean_ms,
        min_exec_time: mean_ms / 10.0,
        max_exec_time: mean_ms * 25.0,
        rows: calls * 3,
        shared_blks_hit: calls * 40,
        shared_blks_read: calls / 2,
    }
}

fn demo_session(
    pid: i32,
    db: &str,
    state: &str,
    query: &str,
    wait: Option<(&str, &str)>,
    duration_ms: f64,
) -> ActiveQuery {
    ActiveQuery {
        pid,
        datname: Some(db.to_string()),
        usename: Some("app".to_string()),
        application_name: "api".to_string(),
        client_addr: Some("10.0.3.17".to_string()),
        backend_start: Some("2026-10-19 08:12:44+00".to_string()),
        state: state.to_string(),
        query: query.to_string(),
        wait_event_type: wait.map(|(t, _)| t.to_string()),
        wait_event: wait.map(|(_, e)| e.to_string()),
        duration_ms: Some(duration_ms),
    }
}

fn demo_table(
    schema: &str,
    name: &str,
    seq_scan: i64,
    seq_tup_read: i64,
    idx_scan: Option<i64>,
    live: i64,
    dead: i64,
) -> TableStats {
    TableStats {
        schemaname: schema.to_string(),
        relname: name.to_string(),
        seq_scan,
        seq_tup_read,
        idx_scan,
        idx_tup_fetch: idx_scan.map(|s| s * 2),
        n_tup_ins: live / 2,
        n_tup_upd: live / 4,
        n_tup_del: dead / 2,
        n_live_tup: live,
        n_dead_tup: dead,
        last_vacuum: None,
        last_autovacuum: Some("2026-10-19 06:40:02+00".to_string()),
    }
}

fn demo_index(schema: &str, table: &str, index: &str, scans: i64) -> IndexStats {
    IndexStats {
        schemaname: schema.to_string(),
        tablename: table.to_string(),
        indexname: index.to_string(),
        idx_scan: scans,
        idx_tup_read: scans * 3,
        idx_tup_fetch: scans * 2,
    }
}

fn demo_lock(
    locktype: &str,
    relation: Option<&str>,
    pid: Option<i32>,
    mode: &str,
    granted: bool,
) -> LockInfo {
    LockInfo {
        locktype: locktype.to_string(),
        database: relation.map(|_| "app".to_string()),
        relation: relation.map(str::to_string),
        pid,
        mode: mode.to_string(),
        granted,
    }
}

fn demo_size(name: &str, bytes: i64) -> DatabaseSize {
    DatabaseSize {
        database_name: name.to_string(),
        size_bytes: bytes,
        size_pretty: crate::fmt::format_bytes(bytes.max(0) as u64),
    }
}

fn demo_setting(name: &str, value: &str, unit: Option<&str>, category: &str) -> PgSetting {
    PgSetting {
        name: name.to_string(),
        setting: value.to_string(),
        unit: unit.map(str::to_string),
        category: category.to_string(),
        short_desc: None,
        source: "configuration file".to_string(),
        min_val: None,
        max_val: None,
    }
}

fn demo_plan(analyze: bool) -> serde_json::Value {
    let mut plan = json!({
        "Node Type": "Hash Join", "Join Type": "Inner",
        "Startup Cost": 8.45, "Total Cost": 18_950.12, "Plan Rows": 12, "Plan Width": 16,
        "Hash Cond": "(o.user_id = u.id)",
        "Plans": [
            {"Node Type": "Seq Scan", "Parent Relationship": "Outer",
             "Relation Name": "orders", "Alias": "o",
             "Startup Cost": 0.0, "Total Cost": 16_420.0, "Plan Rows": 612_000, "Plan Width": 20},
            {"Node Type": "Hash", "Parent Relationship": "Inner",
             "Startup Cost": 8.44, "Total Cost": 8.44, "Plan Rows": 1, "Plan Width": 4,
             "Plans": [
                {"Node Type": "Index Scan", "Parent Relationship": "Outer",
                 "Relation Name": "users", "Alias": "u", "Index Name": "users_email_idx",
                 "Startup Cost": 0.42, "Total Cost": 8.44, "Plan Rows": 1, "Plan Width": 4,
                 "Index Cond": "(email = 'a@example.com'::text)"}
             ]}
        ]
    });
    if !analyze {
        return json!([{ "Plan": plan, "Planning Time": 0.412 }]);
    }

    set_actuals(&mut plan, 0.09, 212.4, 38.0, 1);
    if let Some(children) = plan.get_mut("Plans").and_then(|p| p.as_array_mut()) {
        if let Some(scan) = children.get_mut(0) {
            set_actuals(scan, 0.01, 171.8, 612_000.0, 1);
            scan["Shared Hit Blocks"] = json!(1_204);
            scan["Shared Read Blocks"] = json!(9_996);
        }
        if let Some(hash) = children.get_mut(1) {
            set_actuals(hash, 0.05, 0.05, 1.0, 1);
            if let Some(ix) = hash
                .get_mut("Plans")
                .and_then(|p| p.as_array_mut())
                .and_then(|p| p.get_mut(0))
            {
                set_actuals(ix, 0.03, 0.04, 1.0, 1);
                ix["Shared Hit Blocks"] = json!(4);
                ix["Shared Read Blocks"] = json!(0);
            }
        }
    }
    json!([{ "Plan": plan, "Planning Time": 0.412, "Execution Time": 212.9 }])
}

fn set_actuals(node: &mut serde_json::Value, startup: f64, total: f64, rows: f64, loops: u64) {
    node["Actual Startup Time"] = json!(startup);
    node["Actual Total Time"] = json!(total);
    node["Actual Rows"] = json!(rows);
    node["Actual Loops"] = json!(loops);
}
