//! SurrealDB-backed ResultStore implementation
//!
//! Uses `schema::PackageRow` for persistence, converting to/from
//! [`ResultRecord`] at the boundary. Record ids are derived from the
//! identifier, so inserts have upsert semantics.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::config::SurrealConfig;
use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::records::{Identifier, ResultRecord};
use crate::schema::{PackageRow, PACKAGES_TABLE};
use crate::sink::{ResultSink, ResultStore, StorageResult};

/// SurrealDB-backed implementation of [`ResultStore`].
#[derive(Clone)]
pub struct SurrealResultStore {
    db: Surreal<Any>,
}

impl SurrealResultStore {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects the default namespace/database and runs
    /// `init_schema`.
    pub async fn in_memory() -> Result<Self, StateError> {
        Self::connect(&SurrealConfig::new("mem://")).await
    }

    /// Connect, authenticate when credentials are configured, and prepare the schema.
    #[instrument(
        skip(config),
        fields(
            endpoint = %config.endpoint,
            namespace = %config.namespace,
            database = %config.database
        )
    )]
    pub async fn connect(config: &SurrealConfig) -> Result<Self, StateError> {
        config.validate()?;

        if let Some(path) = config.endpoint.strip_prefix("surrealkv://") {
            std::fs::create_dir_all(path).map_err(|e| {
                StateError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    path, e
                ))
            })?;
        }

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            if config.is_root {
                db.signin(Root {
                    username: username.as_str(),
                    password: password.as_str(),
                })
                .await
                .map_err(|e| StateError::Authentication(format!("root sign-in: {e}")))?;
            } else {
                db.signin(Database {
                    namespace: config.namespace.as_str(),
                    database: config.database.as_str(),
                    username: username.as_str(),
                    password: password.as_str(),
                })
                .await
                .map_err(|e| StateError::Authentication(format!("database sign-in: {e}")))?;
            }
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        db.health()
            .await
            .map_err(|e| StateError::Connection(format!("health check failed: {e}")))?;

        migrations::init_schema(&db).await?;

        info!("SurrealResultStore connected ({})", config.endpoint);
        Ok(Self { db })
    }

    fn rows_to_records(rows: Vec<PackageRow>) -> Vec<ResultRecord> {
        rows.into_iter().map(PackageRow::into_record).collect()
    }
}

#[async_trait]
impl ResultSink for SurrealResultStore {
    async fn insert(&self, record: &ResultRecord) -> StorageResult<()> {
        let key = record.identifier.as_str().to_string();
        debug!(identifier = %record.identifier, "upserting package row");

        let _stored: Option<PackageRow> = self
            .db
            .upsert((PACKAGES_TABLE, key))
            .content(PackageRow::from(record))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ResultStore for SurrealResultStore {
    async fn get(&self, identifier: &Identifier) -> StorageResult<ResultRecord> {
        let row: Option<PackageRow> = self
            .db
            .select((PACKAGES_TABLE, identifier.as_str().to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(PackageRow::into_record)
            .ok_or_else(|| StorageError::NotFound {
                identifier: identifier.to_string(),
            })
    }

    async fn find_by_remote_url(&self, url: &str) -> StorageResult<Vec<ResultRecord>> {
        let url_owned = url.to_string();
        let mut res = self
            .db
            .query(
                "SELECT * FROM packages WHERE repository.remote_url = $url \
                 ORDER BY identifier ASC",
            )
            .bind(("url", url_owned))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<PackageRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(Self::rows_to_records(rows))
    }

    async fn list(&self) -> StorageResult<Vec<ResultRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM packages ORDER BY identifier ASC")
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<PackageRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(Self::rows_to_records(rows))
    }
}
