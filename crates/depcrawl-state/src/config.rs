//! Store selection and SurrealDB connection settings.

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Default SurrealDB namespace
pub const DEFAULT_NAMESPACE: &str = "depcrawl";
/// Default SurrealDB database
pub const DEFAULT_DATABASE: &str = "crawl";

/// SurrealDB connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurrealConfig {
    /// Endpoint URL ("ws://localhost:8000", "surrealkv://.depcrawl/db", "mem://")
    pub endpoint: String,
    /// Database username (sign-in is skipped when absent)
    pub username: Option<String>,
    /// Database password
    pub password: Option<String>,
    /// Namespace (default: "depcrawl")
    pub namespace: String,
    /// Database name (default: "crawl")
    pub database: String,
    /// Whether the credentials belong to a root user
    pub is_root: bool,
}

impl SurrealConfig {
    /// Unauthenticated connection to `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: None,
            password: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    /// Set database-user credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
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

    /// Set whether this is a root user
    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Credentials must be given as a pair.
    pub fn validate(&self) -> Result<(), StateError> {
        if self.endpoint.trim().is_empty() {
            return Err(StateError::Config("empty SurrealDB endpoint".to_string()));
        }
        match (&self.username, &self.password) {
            (Some(_), None) => Err(StateError::Config(
                "username given without password".to_string(),
            )),
            (None, Some(_)) => Err(StateError::Config(
                "password given without username".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Which persistence backend receives result records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreConfig {
    /// Keep records in process; dump them to the log at shutdown
    #[default]
    Memory,
    /// Durable SurrealDB store
    Surreal(SurrealConfig),
}
