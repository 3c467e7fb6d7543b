//! One refresh feed per dashboard tab, all bound to the active server.

use std::sync::Arc;

use tracing::info;

use super::state::Tab;
use crate::analysis::{Issue, IssueContext, analyze};
use crate::backend::{
    ActiveQuery, BackendError, BgWriterStats, DatabaseSize, DatabaseStats, IndexStats, LockInfo,
    MetricsBackend, QueryStat, TableStats, fetcher,
};
use crate::refresh::{FeedState, RefreshHandle, RefreshOptions};

const TOP_QUERIES_LIMIT: u32 = 20;
const TABLE_LIMIT: u32 = 50;
const INDEX_LIMIT: u32 = 50;
/// Unused indexes sort last by scan count; look further for the issues tab.
const ISSUES_INDEX_LIMIT: u32 = 1000;

#[derive(Debug, Clone)]
pub struct DatabasesData {
    pub stats: Vec<DatabaseStats>,
    pub sizes: Vec<DatabaseSize>,
    pub bgwriter: BgWriterStats,
}

#[derive(Debug, Clone)]
pub struct TablesData {
    pub tables: Vec<TableStats>,
    pub indexes: Vec<IndexStats>,
}

type Feed<T> = RefreshHandle<String, T, BackendError>;

/// Per-tab feed state captured for one frame.
pub struct FeedsSnapshot {
    pub databases: FeedState<DatabasesData, BackendError>,
    pub activity: FeedState<Vec<ActiveQuery>, BackendError>,
    pub queries: FeedState<Vec<QueryStat>, BackendError>,
    pub locks: FeedState<Vec<LockInfo>, BackendError>,
    pub tables: FeedState<TablesData, BackendError>,
    pub issues: FeedState<Vec<Issue>, BackendError>,
}

impl FeedsSnapshot {
    /// Loading flag and last error of the feed behind `tab`.
    pub fn status(&self, tab: Tab) -> (bool, Option<&BackendError>) {
        match tab {
            Tab::Databases => (self.databases.is_loading, self.databases.error.as_ref()),
            Tab::Activity => (self.activity.is_loading, self.activity.error.as_ref()),
            Tab::Queries => (self.queries.is_loading, self.queries.error.as_ref()),
            Tab::Locks => (self.locks.is_loading, self.locks.error.as_ref()),
            Tab::Tables => (self.tables.is_loading, self.tables.error.as_ref()),
            Tab::Issues => (self.issues.is_loading, self.issues.error.as_ref()),
        }
    }
}

pub struct Feeds {
    databases: Feed<DatabasesData>,
    activity: Feed<Vec<ActiveQuery>>,
    queries: Feed<Vec<QueryStat>>,
    locks: Feed<Vec<LockInfo>>,
    tables: Feed<TablesData>,
    issues: Feed<Vec<Issue>>,
}

impl Feeds {
    /// Starts every feed for `server_id`. Must be called within a tokio runtime.
    pub fn start(backend: Arc<dyn MetricsBackend>, server_id: &str, options: RefreshOptions) -> Self {
        let id = server_id.to_string();
        Self {
            databases: RefreshHandle::with_fetch_fn(
                id.clone(),
                fetcher(backend.clone(), |b, id| {
                    Ok(DatabasesData {
                        stats: b.database_stats(id)?,
                        sizes: b.database_sizes(id)?,
                        bgwriter: b.bgwriter_stats(id)?,
                    })
                }),
                options,
            ),
            activity: RefreshHandle::with_fetch_fn(
                id.clone(),
                fetcher(backend.clone(), |b, id| b.active_queries(id)),
                options,
            ),
            queries: RefreshHandle::with_fetch_fn(
                id.clone(),
                fetcher(backend.clone(), |b, id| b.top_queries(id, TOP_QUERIES_LIMIT)),
                options,
            ),
            locks: RefreshHandle::with_fetch_fn(
                id.clone(),
                fetcher(backend.clone(), |b, id| b.locks(id)),
                options,
            ),
            tables: RefreshHandle::with_fetch_fn(
                id.clone(),
                fetcher(backend.clone(), |b, id| {
                    Ok(TablesData {
                        tables: b.table_stats(id, TABLE_LIMIT)?,
                        indexes: b.index_stats(id, INDEX_LIMIT)?,
                    })
                }),
                options,
            ),
            issues: RefreshHandle::with_fetch_fn(
                id,
                fetcher(backend, |b, id| {
                    let settings = b.settings(id)?;
                    let hardware = b.hardware_info(id)?;
                    let database_stats = b.database_stats(id)?;
                    let table_stats = b.table_stats(id, TABLE_LIMIT)?;
                    let index_stats = b.index_stats(id, ISSUES_INDEX_LIMIT)?;
                    Ok(analyze(&IssueContext {
                        settings: Some(&settings),
                        hardware: Some(&hardware),
                        database_stats: Some(&database_stats),
                        table_stats: Some(&table_stats),
                        index_stats: Some(&index_stats),
                    }))
                }),
                options,
            ),
        }
    }

    pub fn server_id(&self) -> &str {
        self.databases.subject()
    }

    /// Re-subscribes every feed to `server_id`. Data of the previous server
    /// is dropped; nothing fetched for it is ever shown again.
    pub fn switch_server(&mut self, server_id: &str) {
        info!(server = %server_id, "switching server");
        let id = server_id.to_string();
        self.databases.switch_subject(id.clone());
        self.activity.switch_subject(id.clone());
        self.queries.switch_subject(id.clone());
        self.locks.switch_subject(id.clone());
        self.tables.switch_subject(id.clone());
        self.issues.switch_subject(id);
        if !self.is_enabled() {
            // Paused feeds would stay empty; load the new server once.
            self.refetch();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.databases.is_enabled()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.databases.set_enabled(enabled);
        self.activity.set_enabled(enabled);
        self.queries.set_enabled(enabled);
        self.locks.set_enabled(enabled);
        self.tables.set_enabled(enabled);
        self.issues.set_enabled(enabled);
    }

    /// Fetches every feed now. Returns how many fetches were issued (the
    /// rest were already in flight).
    pub fn refetch(&self) -> usize {
        [
            self.databases.refetch_now(),
            self.activity.refetch_now(),
            self.queries.refetch_now(),
            self.locks.refetch_now(),
            self.tables.refetch_now(),
            self.issues.refetch_now(),
        ]
        .into_iter()
        .filter(|issued| *issued)
        .count()
    }

    pub fn snapshot(&self) -> FeedsSnapshot {
        FeedsSnapshot {
            databases: self.databases.state(),
            activity: self.activity.state(),
            queries: self.queries.state(),
            locks: self.locks.state(),
            tables: self.tables.state(),
            issues: self.issues.state(),
        }
    }

    /// Waits until any feed publishes a new state.
    pub async fn changed(&mut self) {
        tokio::select! {
            _ = self.databases.changed() => {}
            _ = self.activity.changed() => {}
            _ = self.queries.changed() => {}
            _ = self.locks.changed() => {}
            _ = self.tables.changed() => {}
            _ = self.issues.changed() => {}
        }
    }
}
