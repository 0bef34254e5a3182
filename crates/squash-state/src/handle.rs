//! SurrealDB Handle - Connection and Schema
//!
//! Opens a connection according to a [`StoreConfig`], selects the
//! namespace/database and runs the schema migrations.
//!
//! Supports in-memory (`mem://`), embedded (`surrealkv://path`) and remote
//! (`ws://`, `wss://`) engines through `surrealdb::engine::any`.

use crate::error::StateError;
use crate::migrations;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

const DEFAULT_NAMESPACE: &str = "squash";
const DEFAULT_DATABASE: &str = "main";

/// Credentials for an authenticated remote store
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

/// Connection settings for the backing store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Engine URL, e.g. `mem://`, `surrealkv://.squash/db`, `wss://host`
    pub url: String,
    /// Namespace (default: "squash")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Sign-in credentials for remote engines
    pub credentials: Option<Credentials>,
}

impl StoreConfig {
    /// Configuration for the given engine URL with default namespace/database
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            credentials: None,
        }
    }

    /// Volatile in-memory store
    pub fn in_memory() -> Self {
        Self::new("mem://")
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Sign in with the given credentials after connecting
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        is_root: bool,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
            is_root,
        });
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SQUASH_DB_URL (optional, default: `default_url`)
    /// - SQUASH_DB_NAMESPACE (optional, default: "squash")
    /// - SQUASH_DB_DATABASE (optional, default: "main")
    /// - SQUASH_DB_USERNAME / SQUASH_DB_PASSWORD (optional, both or neither)
    /// - SQUASH_DB_ROOT (optional, default: "false")
    pub fn from_env(default_url: &str) -> Result<Self> {
        let url = std::env::var("SQUASH_DB_URL").unwrap_or_else(|_| default_url.to_string());
        let namespace =
            std::env::var("SQUASH_DB_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SQUASH_DB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());

        let credentials = match (
            std::env::var("SQUASH_DB_USERNAME"),
            std::env::var("SQUASH_DB_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(Credentials {
                username,
                password,
                is_root: std::env::var("SQUASH_DB_ROOT")
                    .map(|v| v.to_lowercase() == "true")
                    .unwrap_or(false),
            }),
            (Err(_), Err(_)) => None,
            _ => {
                return Err(StateError::Config(
                    "SQUASH_DB_USERNAME and SQUASH_DB_PASSWORD must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            url,
            namespace,
            database,
            credentials,
        })
    }
}

/// SurrealDB connection handle for Squash
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        Self::connect(StoreConfig::in_memory()).await
    }

    /// Connect according to `config` and set up schema
    #[instrument(skip(config), fields(url = %config.url, namespace = %config.namespace, database = %config.database))]
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        info!("Connecting to SurrealDB");

        if let Some(path) = config.url.strip_prefix("surrealkv://") {
            std::fs::create_dir_all(path).map_err(|e| {
                StateError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    path, e
                ))
            })?;
        }

        let db = surrealdb::engine::any::connect(&config.url)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.url, e))
            })?;

        if let Some(creds) = &config.credentials {
            if creds.is_root {
                db.signin(Root {
                    username: &creds.username,
                    password: &creds.password,
                })
                .await
                .map_err(|e| {
                    StateError::Connection(format!("Root authentication failed: {}", e))
                })?;
            } else {
                db.signin(Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username: &creds.username,
                    password: &creds.password,
                })
                .await
                .map_err(|e| {
                    StateError::Connection(format!("Database authentication failed: {}", e))
                })?;
            }
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        migrations::init_schema(&db).await?;

        info!("SurrealDB connected and schema initialized");
        Ok(SurrealHandle { db })
    }

    /// Underlying client, shared by the repositories
    pub(crate) fn db(&self) -> &Surreal<Any> {
        &self.db
    }

    /// Number of rows in `table`. Used by diagnostics and tests.
    pub async fn count_rows(&self, table: &str) -> Result<u64> {
        #[derive(serde::Deserialize)]
        struct CountRow {
            count: u64,
        }

        let mut result = self
            .db
            .query("SELECT count() FROM type::table($table) GROUP ALL")
            .bind(("table", table.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.count).unwrap_or(0))
    }
}
