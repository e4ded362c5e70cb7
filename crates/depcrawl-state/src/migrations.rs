//! SurrealDB schema initialization
//!
//! Defines the `packages` table and its indexes. Safe to call on every
//! connection (idempotent).

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StateError;

/// Initialize all depcrawl tables in SurrealDB
pub async fn init_schema(db: &Surreal<Any>) -> Result<(), StateError> {
    info!("Initializing depcrawl SurrealDB schema");
    init_packages_table(db).await?;
    info!("depcrawl schema initialization complete");
    Ok(())
}

/// Initialize `packages` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE packages {
///   identifier:   STRING (unique)
///   recorded_at:  DATETIME (indexed)
///   repository:   OBJECT { vcs_type, revision, root, remote_url (indexed) }
///   build_info:   OBJECT { imports, uses_foreign_code, source_files }
///   fetch:        OBJECT?
///   compile:      OBJECT?
///   format:       OBJECT?
///   test:         OBJECT?
///   lints:        OBJECT
/// }
/// ```
async fn init_packages_table(db: &Surreal<Any>) -> Result<(), StateError> {
    debug!("Initializing packages table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS packages SCHEMALESS;

        -- One row per identifier
        DEFINE INDEX IF NOT EXISTS idx_identifier ON TABLE packages COLUMNS identifier UNIQUE;

        -- Reporting: packages sharing a repository
        DEFINE INDEX IF NOT EXISTS idx_remote_url ON TABLE packages COLUMNS repository.remote_url;

        -- Reporting: most recent results
        DEFINE INDEX IF NOT EXISTS idx_recorded_at ON TABLE packages COLUMNS recorded_at;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(format!("packages: {e}")))?
        .check()
        .map_err(|e| StateError::SchemaSetup(format!("packages: {e}")))?;

    Ok(())
}
