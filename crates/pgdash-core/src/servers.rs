//! Server inventory: the list of PostgreSQL servers the dashboard can connect to.
//!
//! Persisted as pretty-printed JSON. Passwords are never stored; each entry may
//! name an environment variable holding its password, with `PGPASSWORD` as the
//! fallback.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::MetricsBackend;

const DEFAULT_PORT: u16 = 5432;

/// Connection parameters for one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub use_ssl: bool,
    /// Environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ServerConfig {
    /// Resolves the password from `password_env`, then `PGPASSWORD`.
    pub fn password(&self) -> Option<String> {
        self.password_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .or_else(|| std::env::var("PGPASSWORD").ok())
            .filter(|p| !p.is_empty())
    }

    /// libpq key/value connection string, password included when resolvable.
    pub fn connection_string(&self) -> String {
        self.connection_string_with(self.password().as_deref())
    }

    fn connection_string_with(&self, password: Option<&str>) -> String {
        let mut s = format!(
            "host={} port={} user={} dbname={} connect_timeout=10 application_name=pgdash",
            quote_value(&self.host),
            self.port,
            quote_value(&self.username),
            quote_value(&self.database)
        );
        if let Some(pw) = password {
            s.push_str(&format!(" password={}", quote_value(pw)));
        }
        s.push_str(if self.use_ssl {
            " sslmode=require"
        } else {
            " sslmode=disable"
        });
        s
    }

    /// `user@host:port/database`
    pub fn endpoint(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}

/// Quotes a connection-string value when it is empty or contains spaces,
/// quotes or backslashes.
fn quote_value(v: &str) -> String {
    if !v.is_empty() && !v.contains([' ', '\'', '\\']) {
        return v.to_string();
    }
    let mut out = String::with_capacity(v.len() + 2);
    out.push('\'');
    for ch in v.chars() {
        if ch == '\'' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Inventory entry merged with live connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub connected: bool,
    pub postgres_version: Option<String>,
}

/// Error type for inventory operations.
#[derive(Debug)]
pub enum StoreError {
    Io(String),
    Parse(String),
    Duplicate(String),
    NotFound(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "I/O error: {}", msg),
            StoreError::Parse(msg) => write!(f, "Parse error: {}", msg),
            StoreError::Duplicate(id) => write!(f, "server '{}' already exists", id),
            StoreError::NotFound(id) => write!(f, "server '{}' not found", id),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Default, Serialize, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    servers: Vec<ServerConfig>,
}

/// Loaded inventory, optionally backed by a file.
#[derive(Debug, Default)]
pub struct ServerStore {
    path: Option<PathBuf>,
    servers: Vec<ServerConfig>,
}

impl ServerStore {
    /// Loads the inventory at `path`. A missing file yields an empty inventory.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let servers = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let file: InventoryFile = serde_json::from_str(&text)
                    .map_err(|e| StoreError::Parse(format!("{}: {}", path.display(), e)))?;
                file.servers
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no server inventory, starting empty");
                Vec::new()
            }
            Err(e) => return Err(StoreError::Io(format!("{}: {}", path.display(), e))),
        };
        debug!(path = %path.display(), count = servers.len(), "server inventory loaded");
        Ok(Self {
            path: Some(path),
            servers,
        })
    }

    /// Inventory that is never written to disk.
    pub fn in_memory(servers: Vec<ServerConfig>) -> Self {
        Self {
            path: None,
            servers,
        }
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        let file = InventoryFile {
            servers: self.servers.clone(),
        };
        let json =
            serde_json::to_string_pretty(&file).map_err(|e| StoreError::Parse(e.to_string()))?;

        // Write to a sibling temp file, then rename over the target.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json + "\n")
            .map_err(|e| StoreError::Io(format!("{}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), count = self.servers.len(), "server inventory saved");
        Ok(())
    }

    pub fn add(&mut self, server: ServerConfig) -> Result<(), StoreError> {
        if self.get(&server.id).is_some() {
            return Err(StoreError::Duplicate(server.id));
        }
        self.servers.push(server);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<ServerConfig, StoreError> {
        let pos = self
            .servers
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(self.servers.remove(pos))
    }

    pub fn get(&self, id: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.id == id)
    }

    pub fn list(&self) -> &[ServerConfig] {
        &self.servers
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Inventory order, with connection state taken from `backend`.
    pub fn infos(&self, backend: &dyn MetricsBackend) -> Vec<ServerInfo> {
        self.servers
            .iter()
            .map(|s| ServerInfo {
                id: s.id.clone(),
                name: s.name.clone(),
                host: s.host.clone(),
                port: s.port,
                database: s.database.clone(),
                username: s.username.clone(),
                connected: backend.is_connected(&s.id),
                postgres_version: backend.server_version(&s.id),
            })
            .collect()
    }
}

/// `$XDG_CONFIG_HOME/pgdash/servers.json`, else `$HOME/.config/pgdash/servers.json`.
pub fn default_inventory_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("pgdash").join("servers.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn server(id: &str) -> ServerConfig {
        ServerConfig {
            id: id.to_string(),
            name: format!("{} server", id),
            host: "db.internal".to_string(),
            port: 5432,
            database: "app".to_string(),
            username: "monitor".to_string(),
            use_ssl: false,
            password_env: None,
        }
    }

    #[test]
    fn missing_file_is_empty_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ServerStore::load(dir.path().join("servers.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("servers.json");

        let mut store = ServerStore::load(&path).unwrap();
        store.add(server("prod")).unwrap();
        store.add(server("staging")).unwrap();
        store.save().unwrap();

        let reloaded = ServerStore::load(&path).unwrap();
        let ids: Vec<&str> = reloaded.list().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["prod", "staging"]);
        assert_eq!(reloaded.get("prod"), Some(&server("prod")));
        assert!(!dir.path().join("nested").join("servers.json.tmp").exists());
    }

    #[test]
    fn duplicate_and_missing_ids_are_rejected() {
        let mut store = ServerStore::in_memory(vec![server("prod")]);
        assert!(matches!(
            store.add(server("prod")),
            Err(StoreError::Duplicate(id)) if id == "prod"
        ));
        assert!(matches!(
            store.remove("nope"),
            Err(StoreError::NotFound(id)) if id == "nope"
        ));
        assert_eq!(store.remove("prod").unwrap().id, "prod");
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ServerStore::load(&path), Err(StoreError::Parse(_))));
    }

    #[test]
    fn port_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(
            &path,
            r#"{"servers": [{"id": "a", "name": "A", "host": "h", "database": "d", "username": "u"}]}"#,
        )
        .unwrap();
        let store = ServerStore::load(&path).unwrap();
        assert_eq!(store.get("a").unwrap().port, 5432);
        assert!(!store.get("a").unwrap().use_ssl);
    }

    #[test]
    fn saved_file_never_contains_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        let mut store = ServerStore::load(&path).unwrap();
        let mut s = server("prod");
        s.password_env = Some("PROD_PW".to_string());
        store.add(s).unwrap();
        store.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"password_env\": \"PROD_PW\""));
        assert!(!text.contains("\"password\""));
    }

    #[test]
    fn connection_string_quotes_and_ssl() {
        let mut s = server("prod");
        s.database = "my db".to_string();
        s.use_ssl = true;
        assert_eq!(
            s.connection_string_with(Some("it's")),
            "host=db.internal port=5432 user=monitor dbname='my db' connect_timeout=10 \
             application_name=pgdash password='it\\'s' sslmode=require"
        );
        assert_eq!(
            server("x").connection_string_with(None),
            "host=db.internal port=5432 user=monitor dbname=app connect_timeout=10 \
             application_name=pgdash sslmode=disable"
        );
    }

    #[test]
    fn infos_merge_connection_state() {
        let store = ServerStore::in_memory(vec![server("a"), server("b")]);
        let backend = MockBackend::new();
        backend.connect(&server("a")).unwrap();

        let infos = store.infos(&backend);
        assert_eq!(infos.len(), 2);
        assert!(infos[0].connected);
        assert!(infos[0].postgres_version.is_some());
        assert!(!infos[1].connected);
        assert!(infos[1].postgres_version.is_none());
    }
}
