//! Row definitions for the SurrealDB `packages` table
//!
//! One row per identifier, with the record id derived from the identifier so
//! repeated inserts upsert in place.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::{
    BuildInfo, CheckOutcome, Identifier, RepositoryInfo, ResultRecord, StepOutcome,
};

/// Table holding one row per crawled identifier
pub const PACKAGES_TABLE: &str = "packages";

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Package row - a [`ResultRecord`] as stored in SurrealDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    /// Crawled identifier (unique)
    pub identifier: String,
    /// When the pipeline finished
    #[serde(with = "surreal_datetime")]
    pub recorded_at: DateTime<Utc>,
    /// Version-control facts; `repository.remote_url` is indexed
    pub repository: RepositoryInfo,
    pub build_info: BuildInfo,
    pub fetch: Option<StepOutcome>,
    pub compile: Option<StepOutcome>,
    pub format: Option<CheckOutcome>,
    pub test: Option<StepOutcome>,
    #[serde(default)]
    pub lints: BTreeMap<String, CheckOutcome>,
}

impl From<&ResultRecord> for PackageRow {
    fn from(record: &ResultRecord) -> Self {
        PackageRow {
            id: None,
            identifier: record.identifier.as_str().to_string(),
            recorded_at: record.recorded_at,
            repository: record.repository.clone(),
            build_info: record.build_info.clone(),
            fetch: record.fetch.clone(),
            compile: record.compile.clone(),
            format: record.format.clone(),
            test: record.test.clone(),
            lints: record.lints.clone(),
        }
    }
}

impl PackageRow {
    pub fn into_record(self) -> ResultRecord {
        ResultRecord {
            identifier: Identifier::new(self.identifier),
            recorded_at: self.recorded_at,
            repository: self.repository,
            build_info: self.build_info,
            fetch: self.fetch,
            compile: self.compile,
            format: self.format,
            test: self.test,
            lints: self.lints,
        }
    }
}
