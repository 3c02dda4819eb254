use super::transaction::{Completion, LogEntry, NewTransaction, Transaction, TransactionId, TransactionStatus};
use crate::error::{Result, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Persistence port for transactions and their audit log.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persists a new `Pending` transaction and assigns its id.
    async fn create(&self, new: NewTransaction) -> Result<Transaction>;
    async fn find(&self, id: TransactionId) -> Result<Option<Transaction>>;
    async fn set_ref_id(&self, id: TransactionId, ref_id: &str) -> Result<Transaction>;
    /// Atomically moves the transaction to a terminal state if its current status
    /// is `expected`. A lost race surfaces as [`crate::error::GatewayError::Retry`].
    async fn complete(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        completion: Completion,
    ) -> Result<Transaction>;
    async fn append_log(&self, entry: LogEntry) -> Result<()>;
    async fn logs(&self, id: TransactionId) -> Result<Vec<LogEntry>>;
    async fn all(&self) -> Result<Vec<Transaction>>;
}

/// Outbound JSON-over-HTTP port used by drivers to reach vendor APIs.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POSTs `body` as JSON and returns the decoded JSON response.
    ///
    /// Vendors report business failures inside the body, so a JSON body is
    /// returned even for non-2xx statuses.
    async fn post_json(&self, url: &Url, body: &Value) -> std::result::Result<Value, TransportError>;
}

pub type TransactionStoreRef = Arc<dyn TransactionStore>;
pub type HttpTransportRef = Arc<dyn HttpTransport>;
