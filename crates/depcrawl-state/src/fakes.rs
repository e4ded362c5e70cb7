//! Sink fakes for exercising the crawler's persistence-failure path
//! (testing only).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::records::ResultRecord;
use crate::sink::{ResultSink, StorageResult};

/// Wraps a sink and rejects a scripted number of inserts per identifier.
///
/// Every insert attempt is counted, whether it was rejected or forwarded.
#[derive(Debug)]
pub struct FlakySink<S> {
    inner: S,
    remaining_failures: Mutex<HashMap<String, u32>>,
    attempts: Mutex<HashMap<String, u32>>,
    always_fail: bool,
}

impl<S: ResultSink> FlakySink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            remaining_failures: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            always_fail: false,
        }
    }

    /// A sink whose every insert fails.
    pub fn always_failing(inner: S) -> Self {
        Self {
            always_fail: true,
            ..Self::new(inner)
        }
    }

    /// Reject the next `times` inserts of `identifier`.
    pub fn failing(self, identifier: &str, times: u32) -> Self {
        self.remaining_failures
            .lock()
            .unwrap()
            .insert(identifier.to_string(), times);
        self
    }

    /// Number of insert attempts seen for `identifier`.
    pub fn attempts(&self, identifier: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ResultSink> ResultSink for FlakySink<S> {
    async fn insert(&self, record: &ResultRecord) -> StorageResult<()> {
        let key = record.identifier.as_str();
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert(0) += 1;

        if self.always_fail {
            return Err(StorageError::Unavailable("sink is down".to_string()));
        }

        let reject = {
            let mut remaining = self.remaining_failures.lock().unwrap();
            match remaining.get_mut(key) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        };
        if reject {
            return Err(StorageError::Unavailable(format!(
                "scripted failure for {key}"
            )));
        }

        self.inner.insert(record).await
    }
}
