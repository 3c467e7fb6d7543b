//! PostgreSQL backend over the synchronous `postgres` client.
//!
//! One client per connected server, each behind its own mutex so calls for
//! different servers never wait on each other. A client that reports itself
//! closed is reopened on the next call.

mod queries;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use postgres::{Client, NoTls};
use tracing::{debug, info, warn};

use super::types::*;
use super::{BackendError, MetricsBackend};
use crate::servers::ServerConfig;
use queries::*;

struct Connection {
    config: ServerConfig,
    client: Mutex<Option<Client>>,
    server_version_num: Option<i32>,
    version: String,
}

impl Connection {
    fn client(&self) -> MutexGuard<'_, Option<Client>> {
        self.client.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Live PostgreSQL backend.
#[derive(Default)]
pub struct PgBackend {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
}

impl PgBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn connection(&self, server_id: &str) -> Result<Arc<Connection>, BackendError> {
        self.connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(server_id)
            .cloned()
            .ok_or_else(|| BackendError::NotConnected(server_id.to_string()))
    }

    /// Runs `f` with the server's client, reconnecting first if the previous
    /// client was closed.
    fn with_client<T>(
        &self,
        server_id: &str,
        f: impl FnOnce(&mut Client, Option<i32>) -> Result<T, postgres::Error>,
    ) -> Result<T, BackendError> {
        let conn = self.connection(server_id)?;
        let mut guard = conn.client();

        if guard.as_ref().is_none_or(|c| c.is_closed()) {
            debug!(server = %server_id, "reconnecting");
            *guard = Some(open_client(&conn.config)?);
        }
        let Some(client) = guard.as_mut() else {
            return Err(BackendError::NotConnected(server_id.to_string()));
        };

        match f(client, conn.server_version_num) {
            Ok(v) => Ok(v),
            Err(e) => {
                let msg = format_postgres_error(&e);
                if client.is_closed() {
                    warn!(server = %server_id, error = %msg, "connection lost");
                    *guard = None;
                    Err(BackendError::Connection(msg))
                } else {
                    Err(BackendError::Query(msg))
                }
            }
        }
    }
}

fn open_client(config: &ServerConfig) -> Result<Client, BackendError> {
    let conn_str = config.connection_string();
    let result = if config.use_ssl {
        let connector = native_tls::TlsConnector::new()
            .map_err(|e| BackendError::Connection(format!("TLS setup failed: {}", e)))?;
        Client::connect(&conn_str, postgres_native_tls::MakeTlsConnector::new(connector))
    } else {
        Client::connect(&conn_str, NoTls)
    };
    result.map_err(|e| BackendError::Connection(format_postgres_error(&e)))
}

fn query_version(client: &mut Client) -> Result<(String, Option<i32>), postgres::Error> {
    let version: String = client.query_one("SELECT version()", &[])?.get(0);
    let num = client
        .query_one("SHOW server_version_num", &[])
        .ok()
        .and_then(|row| row.try_get::<_, String>(0).ok())
        .and_then(|v| v.parse::<i32>().ok());
    Ok((version, num))
}

impl MetricsBackend for PgBackend {
    fn connect(&self, server: &ServerConfig) -> Result<String, BackendError> {
        let mut client = open_client(server)?;
        let (version, server_version_num) = query_version(&mut client)
            .map_err(|e| BackendError::Query(format_postgres_error(&e)))?;
        info!(server = %server.id, endpoint = %server.endpoint(), version = %version, "connected");

        let conn = Arc::new(Connection {
            config: server.clone(),
            client: Mutex::new(Some(client)),
            server_version_num,
            version: version.clone(),
        });
        self.connections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(server.id.clone(), conn);
        Ok(version)
    }

    fn disconnect(&self, server_id: &str) {
        let removed = self
            .connections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(server_id);
        if removed.is_some() {
            info!(server = %server_id, "disconnected");
        }
    }

    fn is_connected(&self, server_id: &str) -> bool {
        self.connection(server_id).is_ok()
    }

    fn server_version(&self, server_id: &str) -> Option<String> {
        self.connection(server_id).ok().map(|c| c.version.clone())
    }

    fn test_connection(&self, server: &ServerConfig) -> ConnectionTestResult {
        let outcome = open_client(server).and_then(|mut client| {
            query_version(&mut client).map_err(|e| BackendError::Query(format_postgres_error(&e)))
        });
        match outcome {
            Ok((version, _)) => ConnectionTestResult {
                success: true,
                message: "Connection successful".to_string(),
                postgres_version: Some(version),
            },
            Err(e) => ConnectionTestResult {
                success: false,
                message: format!("Connection failed: {}", e),
                postgres_version: None,
            },
        }
    }

    fn database_stats(&self, server_id: &str) -> Result<Vec<DatabaseStats>, BackendError> {
        self.with_client(server_id, |client, _| {
            let rows = client.query(DATABASE_STATS, &[])?;
            rows.iter()
                .map(|row| {
                    Ok(DatabaseStats {
                        datname: row.try_get(0)?,
                        numbackends: row.try_get(1)?,
                        xact_commit: row.try_get(2)?,
                        xact_rollback: row.try_get(3)?,
                        blks_read: row.try_get(4)?,
                        blks_hit: row.try_get(5)?,
                        tup_returned: row.try_get(6)?,
                        tup_fetched: row.try_get(7)?,
                        tup_inserted: row.try_get(8)?,
                        tup_updated: row.try_get(9)?,
                        tup_deleted: row.try_get(10)?,
                        conflicts: row.try_get(11)?,
                        temp_files: row.try_get(12)?,
                        temp_bytes: row.try_get(13)?,
                        deadlocks: row.try_get(14)?,
                    })
                })
                .collect()
        })
    }

    fn top_queries(&self, server_id: &str, limit: u32) -> Result<Vec<QueryStat>, BackendError> {
        let installed = self.with_client(server_id, |client, _| {
            Ok(!client.query(STATEMENTS_EXTENSION_CHECK, &[])?.is_empty())
        })?;
        if !installed {
            return Err(BackendError::ExtensionMissing(
                "pg_stat_statements".to_string(),
            ));
        }

        self.with_client(server_id, |client, version| {
            let rows = client.query(build_top_queries_query(version, limit).as_str(), &[])?;
            rows.iter()
                .map(|row| {
                    Ok(QueryStat {
                        query: row.try_get::<_, Option<String>>(0)?.unwrap_or_default(),
                        calls: row.try_get(1)?,
                        total_exec_time: row.try_get(2)?,
                        mean_exec_time: row.try_get(3)?,
                        min_exec_time: row.try_get(4)?,
                        max_exec_time: row.try_get(5)?,
                        rows: row.try_get(6)?,
                        shared_blks_hit: row.try_get(7)?,
                        shared_blks_read: row.try_get(8)?,
                    })
                })
                .collect()
        })
    }

    fn active_queries(&self, server_id: &str) -> Result<Vec<ActiveQuery>, BackendError> {
        self.with_client(server_id, |client, _| {
            let rows = client.query(ACTIVE_QUERIES, &[])?;
            rows.iter()
                .map(|row| {
                    Ok(ActiveQuery {
                        pid: row.try_get(0)?,
                        datname: row.try_get(1)?,
                        usename: row.try_get(2)?,
                        application_name: row.try_get(3)?,
                        client_addr: row.try_get(4)?,
                        backend_start: row.try_get(5)?,
                        state: row.try_get(6)?,
                        query: row.try_get(7)?,
                        wait_event_type: row.try_get(8)?,
                        wait_event: row.try_get(9)?,
                        duration_ms: row.try_get(10)?,
                    })
                })
                .collect()
        })
    }

    fn table_stats(&self, server_id: &str, limit: u32) -> Result<Vec<TableStats>, BackendError> {
        self.with_client(server_id, |client, _| {
            let rows = client.query(build_table_stats_query(limit).as_str(), &[])?;
            rows.iter()
                .map(|row| {
                    Ok(TableStats {
                        schemaname: row.try_get(0)?,
                        relname: row.try_get(1)?,
                        seq_scan: row.try_get(2)?,
                        seq_tup_read: row.try_get(3)?,
                        idx_scan: row.try_get(4)?,
                        idx_tup_fetch: row.try_get(5)?,
                        n_tup_ins: row.try_get(6)?,
                        n_tup_upd: row.try_get(7)?,
                        n_tup_del: row.try_get(8)?,
                        n_live_tup: row.try_get(9)?,
                        n_dead_tup: row.try_get(10)?,
                        last_vacuum: row.try_get(11)?,
                        last_autovacuum: row.try_get(12)?,
                    })
                })
                .collect()
        })
    }

    fn index_stats(&self, server_id: &str, limit: u32) -> Result<Vec<IndexStats>, BackendError> {
        self.with_client(server_id, |client, _| {
            let rows = client.query(build_index_stats_query(limit).as_str(), &[])?;
            rows.iter()
                .map(|row| {
                    Ok(IndexStats {
                        schemaname: row.try_get(0)?,
                        tablename: row.try_get(1)?,
                        indexname: row.try_get(2)?,
                        idx_scan: row.try_get(3)?,
                        idx_tup_read: row.try_get(4)?,
                        idx_tup_fetch: row.try_get(5)?,
                    })
                })
                .collect()
        })
    }

    fn locks(&self, server_id: &str) -> Result<Vec<LockInfo>, BackendError> {
        self.with_client(server_id, |client, _| {
            let rows = client.query(LOCKS, &[])?;
            rows.iter()
                .map(|row| {
                    Ok(LockInfo {
                        locktype: row.try_get(0)?,
                        database: row.try_get(1)?,
                        relation: row.try_get(2)?,
                        pid: row.try_get(3)?,
                        mode: row.try_get::<_, Option<String>>(4)?.unwrap_or_default(),
                        granted: row.try_get(5)?,
                    })
                })
                .collect()
        })
    }

    fn bgwriter_stats(&self, server_id: &str) -> Result<BgWriterStats, BackendError> {
        self.with_client(server_id, |client, version| {
            let row = client.query_one(build_bgwriter_query(version), &[])?;
            Ok(BgWriterStats {
                checkpoints_timed: row.try_get(0)?,
                checkpoints_req: row.try_get(1)?,
                checkpoint_write_time: row.try_get(2)?,
                checkpoint_sync_time: row.try_get(3)?,
                buffers_checkpoint: row.try_get(4)?,
                buffers_clean: row.try_get(5)?,
                maxwritten_clean: row.try_get(6)?,
                buffers_backend: row.try_get(7)?,
                buffers_alloc: row.try_get(8)?,
            })
        })
    }

    fn database_sizes(&self, server_id: &str) -> Result<Vec<DatabaseSize>, BackendError> {
        self.with_client(server_id, |client, _| {
            let rows = client.query(DATABASE_SIZES, &[])?;
            rows.iter()
                .map(|row| {
                    Ok(DatabaseSize {
                        database_name: row.try_get(0)?,
                        size_bytes: row.try_get(1)?,
                        size_pretty: row.try_get(2)?,
                    })
                })
                .collect()
        })
    }

    fn settings(&self, server_id: &str) -> Result<Vec<PgSetting>, BackendError> {
        self.with_client(server_id, |client, _| {
            let rows = client.query(SETTINGS, &[])?;
            rows.iter()
                .map(|row| {
                    Ok(PgSetting {
                        name: row.try_get(0)?,
                        setting: row.try_get(1)?,
                        unit: row.try_get(2)?,
                        category: row.try_get(3)?,
                        short_desc: row.try_get(4)?,
                        source: row.try_get(5)?,
                        min_val: row.try_get(6)?,
                        max_val: row.try_get(7)?,
                    })
                })
                .collect()
        })
    }

    fn hardware_info(&self, server_id: &str) -> Result<HardwareInfo, BackendError> {
        let version = self.connection(server_id)?.version.clone();
        self.with_client(server_id, |client, _| {
            let cores: i64 = client.query_one(ESTIMATED_CORES, &[])?.try_get(0)?;
            // No host access from SQL: assume shared_buffers is a quarter of RAM.
            let total_memory_mb = match client.query_one(SHARED_BUFFERS_MB, &[]) {
                Ok(row) => row.try_get::<_, i64>(0).map(|mb| mb * 4).unwrap_or(8192),
                Err(_) => 8192,
            };
            Ok(HardwareInfo {
                cpu_cores: cores.clamp(1, i32::MAX as i64) as i32,
                total_memory_mb,
                postgres_version: version,
                os_type: "Linux".to_string(),
            })
        })
    }

    fn explain(
        &self,
        server_id: &str,
        query: &str,
        analyze: bool,
    ) -> Result<serde_json::Value, BackendError> {
        let sql = build_explain_query(query, analyze);
        self.with_client(server_id, |client, _| {
            if analyze {
                // The statement really runs; never keep its side effects.
                let mut tx = client.transaction()?;
                let plan: serde_json::Value = tx.query_one(sql.as_str(), &[])?.try_get(0)?;
                tx.rollback()?;
                Ok(plan)
            } else {
                client.query_one(sql.as_str(), &[])?.try_get(0)
            }
        })
    }
}

/// Formats PostgreSQL errors for display.
pub(crate) fn format_postgres_error(e: &postgres::Error) -> String {
    if let Some(db_error) = e.as_db_error() {
        format!("{}: {}", db_error.severity(), db_error.message())
    } else {
        let msg = e.to_string();
        if msg.contains("Connection refused") {
            "connection refused".to_string()
        } else if msg.contains("password authentication failed") {
            "password authentication failed".to_string()
        } else {
            msg
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_before_connect_report_not_connected() {
        let backend = PgBackend::new();
        assert!(!backend.is_connected("prod"));
        assert_eq!(
            backend.locks("prod").unwrap_err(),
            BackendError::NotConnected("prod".to_string())
        );
        assert!(backend.server_version("prod").is_none());
        backend.disconnect("prod");
    }
}
