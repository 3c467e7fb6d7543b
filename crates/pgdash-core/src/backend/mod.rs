//! Remote metrics backend boundary.
//!
//! [`MetricsBackend`] is a blocking, object-safe interface keyed by server id.
//! Two implementations:
//! - `PgBackend`: sync `postgres` clients, one per connected server
//! - `MockBackend`: in-memory payloads for demo mode and tests
//!
//! [`fetcher`] adapts any backend call into an async fetch function for the
//! refresh scheduler, running the blocking call on tokio's blocking pool.

mod mock;
mod pg;
mod types;

pub use mock::{MockBackend, MockData};
pub use pg::PgBackend;
pub use types::*;

use std::sync::Arc;

use crate::refresh::{FetchFn, FetchFuture};
use crate::servers::ServerConfig;

/// Error type for backend calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Server id is not in the inventory.
    UnknownServer(String),
    /// Server is known but has no open connection.
    NotConnected(String),
    /// Connection could not be established or was lost.
    Connection(String),
    /// Query execution failed.
    Query(String),
    /// A required extension is not installed.
    ExtensionMissing(String),
    /// Blocking task panicked or was cancelled.
    Task(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::UnknownServer(id) => write!(f, "unknown server '{}'", id),
            BackendError::NotConnected(id) => write!(f, "server '{}' is not connected", id),
            BackendError::Connection(msg) => write!(f, "connection error: {}", msg),
            BackendError::Query(msg) => write!(f, "query error: {}", msg),
            BackendError::ExtensionMissing(ext) => write!(f, "{} extension is not installed", ext),
            BackendError::Task(msg) => write!(f, "background task failed: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Blocking metrics source for a set of servers.
///
/// Calls may block on network I/O; use [`fetcher`] or [`call`] from async code.
pub trait MetricsBackend: Send + Sync {
    /// Opens (or reopens) a connection. Returns the server version string.
    fn connect(&self, server: &ServerConfig) -> Result<String, BackendError>;

    fn disconnect(&self, server_id: &str);

    fn is_connected(&self, server_id: &str) -> bool;

    /// `version()` of a connected server.
    fn server_version(&self, server_id: &str) -> Option<String>;

    /// Connects with a throwaway client and reports the outcome.
    fn test_connection(&self, server: &ServerConfig) -> ConnectionTestResult;

    fn database_stats(&self, server_id: &str) -> Result<Vec<DatabaseStats>, BackendError>;

    /// Top statements by total execution time. Requires `pg_stat_statements`.
    fn top_queries(&self, server_id: &str, limit: u32) -> Result<Vec<QueryStat>, BackendError>;

    /// Non-idle sessions other than our own.
    fn active_queries(&self, server_id: &str) -> Result<Vec<ActiveQuery>, BackendError>;

    /// Tables ordered by rows read sequentially.
    fn table_stats(&self, server_id: &str, limit: u32) -> Result<Vec<TableStats>, BackendError>;

    /// Indexes ordered by scan count.
    fn index_stats(&self, server_id: &str, limit: u32) -> Result<Vec<IndexStats>, BackendError>;

    fn locks(&self, server_id: &str) -> Result<Vec<LockInfo>, BackendError>;

    fn bgwriter_stats(&self, server_id: &str) -> Result<BgWriterStats, BackendError>;

    fn database_sizes(&self, server_id: &str) -> Result<Vec<DatabaseSize>, BackendError>;

    fn settings(&self, server_id: &str) -> Result<Vec<PgSetting>, BackendError>;

    fn hardware_info(&self, server_id: &str) -> Result<HardwareInfo, BackendError>;

    /// Raw `EXPLAIN (FORMAT JSON)` output. With `analyze`, the query is
    /// executed and its effects rolled back.
    fn explain(
        &self,
        server_id: &str,
        query: &str,
        analyze: bool,
    ) -> Result<serde_json::Value, BackendError>;
}

/// Wraps a blocking backend call into a scheduler fetch function keyed by server id.
pub fn fetcher<T, F>(backend: Arc<dyn MetricsBackend>, call: F) -> FetchFn<String, T, BackendError>
where
    T: Send + 'static,
    F: Fn(&dyn MetricsBackend, &str) -> Result<T, BackendError> + Send + Sync + 'static,
{
    let call = Arc::new(call);
    Arc::new(move |server_id: String| {
        let backend = backend.clone();
        let call = call.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || call(backend.as_ref(), &server_id))
                .await
                .map_err(|e| BackendError::Task(e.to_string()))?
        }) as FetchFuture<T, BackendError>
    })
}

/// Runs one blocking backend call on the blocking pool.
pub async fn call<T, F>(backend: Arc<dyn MetricsBackend>, f: F) -> Result<T, BackendError>
where
    T: Send + 'static,
    F: FnOnce(&dyn MetricsBackend) -> Result<T, BackendError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(backend.as_ref()))
        .await
        .map_err(|e| BackendError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::{RefreshHandle, RefreshOptions};
    use std::time::Duration;

    fn demo_server(id: &str) -> ServerConfig {
        ServerConfig {
            id: id.to_string(),
            name: id.to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            username: "postgres".to_string(),
            use_ssl: false,
            password_env: None,
        }
    }

    #[tokio::test]
    async fn fetcher_runs_backend_call_off_the_runtime() {
        let backend = Arc::new(MockBackend::new());
        backend.connect(&demo_server("a")).unwrap();
        let fetch = fetcher(backend.clone(), |b, id| b.database_stats(id));

        let stats = fetch("a".to_string()).await.unwrap();
        assert!(!stats.is_empty());

        let err = fetch("missing".to_string()).await.unwrap_err();
        assert_eq!(err, BackendError::NotConnected("missing".to_string()));
    }

    #[tokio::test]
    async fn feed_surfaces_backend_error_and_keeps_data() {
        let backend = Arc::new(MockBackend::new());
        backend.connect(&demo_server("a")).unwrap();
        let mut handle = RefreshHandle::with_fetch_fn(
            "a".to_string(),
            fetcher(backend.clone(), |b, id| b.locks(id)),
            RefreshOptions::every(Duration::from_millis(20)),
        );

        while handle.state().data.is_none() {
            handle.changed().await;
        }

        backend.fail("locks", "canceling statement due to statement timeout");
        while handle.state().error.is_none() {
            handle.changed().await;
        }
        let state = handle.state();
        assert!(state.data.is_some());
        assert_eq!(
            state.error,
            Some(BackendError::Query(
                "canceling statement due to statement timeout".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn call_propagates_result() {
        let backend: Arc<dyn MetricsBackend> = Arc::new(MockBackend::new());
        let err = call(backend, |b| b.hardware_info("x")).await.unwrap_err();
        assert!(matches!(err, BackendError::NotConnected(_)));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            BackendError::ExtensionMissing("pg_stat_statements".to_string()).to_string(),
            "pg_stat_statements extension is not installed"
        );
        assert_eq!(
            BackendError::NotConnected("prod".to_string()).to_string(),
            "server 'prod' is not connected"
        );
    }
}
