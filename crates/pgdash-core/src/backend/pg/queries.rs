//! SQL for PostgreSQL statistics views.

pub(super) const DATABASE_STATS: &str = r#"
    SELECT
        datname,
        numbackends,
        xact_commit,
        xact_rollback,
        blks_read,
        blks_hit,
        tup_returned,
        tup_fetched,
        tup_inserted,
        tup_updated,
        tup_deleted,
        conflicts,
        temp_files,
        temp_bytes,
        deadlocks
    FROM pg_stat_database
    WHERE datname IS NOT NULL
      AND datname NOT IN ('template0', 'template1')
    ORDER BY datname
"#;

pub(super) const STATEMENTS_EXTENSION_CHECK: &str =
    "SELECT 1 FROM pg_extension WHERE extname = 'pg_stat_statements'";

/// Builds version-aware query for pg_stat_statements (`*_exec_time` since 13).
pub(super) fn build_top_queries_query(server_version_num: Option<i32>, limit: u32) -> String {
    let (total, mean, min, max) = if server_version_num.unwrap_or(0) >= 130000 {
        (
            "total_exec_time",
            "mean_exec_time",
            "min_exec_time",
            "max_exec_time",
        )
    } else {
        ("total_time", "mean_time", "min_time", "max_time")
    };

    format!(
        r#"
        SELECT
            query,
            calls,
            {total}::double precision,
            {mean}::double precision,
            {min}::double precision,
            {max}::double precision,
            rows,
            shared_blks_hit,
            shared_blks_read
        FROM pg_stat_statements
        ORDER BY {total} DESC
        LIMIT {limit}
    "#
    )
}

pub(super) const ACTIVE_QUERIES: &str = r#"
    SELECT
        pid,
        datname::text,
        usename::text,
        COALESCE(application_name, ''),
        client_addr::text,
        backend_start::text,
        COALESCE(state, ''),
        COALESCE(query, ''),
        wait_event_type,
        wait_event,
        (EXTRACT(EPOCH FROM (clock_timestamp() - query_start)) * 1000)::double precision
    FROM pg_stat_activity
    WHERE state != 'idle'
      AND pid != pg_backend_pid()
    ORDER BY query_start NULLS LAST
"#;

pub(super) fn build_table_stats_query(limit: u32) -> String {
    format!(
        r#"
        SELECT
            schemaname::text,
            relname::text,
            COALESCE(seq_scan, 0),
            COALESCE(seq_tup_read, 0),
            idx_scan,
            idx_tup_fetch,
            COALESCE(n_tup_ins, 0),
            COALESCE(n_tup_upd, 0),
            COALESCE(n_tup_del, 0),
            COALESCE(n_live_tup, 0),
            COALESCE(n_dead_tup, 0),
            last_vacuum::text,
            last_autovacuum::text
        FROM pg_stat_user_tables
        ORDER BY seq_tup_read DESC NULLS LAST
        LIMIT {limit}
    "#
    )
}

pub(super) fn build_index_stats_query(limit: u32) -> String {
    format!(
        r#"
        SELECT
            schemaname::text,
            relname::text,
            indexrelname::text,
            COALESCE(idx_scan, 0),
            COALESCE(idx_tup_read, 0),
            COALESCE(idx_tup_fetch, 0)
        FROM pg_stat_user_indexes
        ORDER BY idx_scan DESC NULLS LAST
        LIMIT {limit}
    "#
    )
}

pub(super) const LOCKS: &str = r#"
    SELECT
        l.locktype,
        d.datname::text,
        l.relation::regclass::text,
        l.pid,
        l.mode,
        l.granted
    FROM pg_locks l
    LEFT JOIN pg_database d ON d.oid = l.database
    WHERE l.pid IS DISTINCT FROM pg_backend_pid()
    ORDER BY l.granted, l.pid
"#;

/// Builds version-aware bgwriter query. Checkpoint counters moved to
/// `pg_stat_checkpointer` and `buffers_backend` was dropped in 17.
pub(super) fn build_bgwriter_query(server_version_num: Option<i32>) -> &'static str {
    if server_version_num.unwrap_or(0) >= 170000 {
        r#"
        SELECT
            c.num_timed,
            c.num_requested,
            c.write_time::double precision,
            c.sync_time::double precision,
            c.buffers_written,
            b.buffers_clean,
            b.maxwritten_clean,
            0::bigint,
            b.buffers_alloc
        FROM pg_stat_bgwriter b, pg_stat_checkpointer c
        "#
    } else {
        r#"
        SELECT
            checkpoints_timed,
            checkpoints_req,
            checkpoint_write_time::double precision,
            checkpoint_sync_time::double precision,
            buffers_checkpoint,
            buffers_clean,
            maxwritten_clean,
            buffers_backend,
            buffers_alloc
        FROM pg_stat_bgwriter
        "#
    }
}

pub(super) const DATABASE_SIZES: &str = r#"
    SELECT
        datname::text,
        pg_database_size(datname),
        pg_size_pretty(pg_database_size(datname))
    FROM pg_database
    WHERE datname NOT IN ('template0', 'template1')
      AND has_database_privilege(datname, 'CONNECT')
    ORDER BY pg_database_size(datname) DESC
"#;

pub(super) const SETTINGS: &str = r#"
    SELECT
        name,
        setting,
        unit,
        category,
        short_desc,
        source,
        min_val,
        max_val
    FROM pg_settings
    ORDER BY category, name
"#;

/// Rough core count: live backends, at least 1.
pub(super) const ESTIMATED_CORES: &str =
    "SELECT count(*) FROM pg_stat_activity WHERE state IS NOT NULL";

/// shared_buffers in MB (setting is in 8 kB blocks).
pub(super) const SHARED_BUFFERS_MB: &str =
    "SELECT setting::bigint * 8 / 1024 FROM pg_settings WHERE name = 'shared_buffers'";

pub(super) fn build_explain_query(query: &str, analyze: bool) -> String {
    let query = query.trim().trim_end_matches(';');
    if analyze {
        format!("EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON) {}", query)
    } else {
        format!("EXPLAIN (FORMAT JSON) {}", query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_query_uses_exec_time_on_13_plus() {
        let q = build_top_queries_query(Some(160004), 20);
        assert!(q.contains("total_exec_time::double precision"));
        assert!(q.contains("ORDER BY total_exec_time DESC"));
        assert!(q.contains("LIMIT 20"));

        let old = build_top_queries_query(Some(120010), 5);
        assert!(old.contains("ORDER BY total_time DESC"));
        assert!(!old.contains("exec_time"));
    }

    #[test]
    fn bgwriter_query_switches_to_checkpointer_on_17() {
        assert!(build_bgwriter_query(Some(170002)).contains("pg_stat_checkpointer"));
        assert!(!build_bgwriter_query(Some(160004)).contains("pg_stat_checkpointer"));
        assert!(!build_bgwriter_query(None).contains("pg_stat_checkpointer"));
    }

    #[test]
    fn explain_strips_trailing_semicolon() {
        assert_eq!(
            build_explain_query("  SELECT 1; ", false),
            "EXPLAIN (FORMAT JSON) SELECT 1"
        );
        assert_eq!(
            build_explain_query("SELECT 1", true),
            "EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON) SELECT 1"
        );
    }
}
