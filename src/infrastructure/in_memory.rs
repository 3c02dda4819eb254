use crate::domain::ports::TransactionStore;
use crate::domain::transaction::{
    Completion, LogEntry, NewTransaction, Transaction, TransactionId, TransactionStatus,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    last_id: TransactionId,
    transactions: BTreeMap<TransactionId, Transaction>,
    logs: Vec<LogEntry>,
}

/// A thread-safe in-memory transaction store.
///
/// Uses `Arc<RwLock<..>>` to allow shared concurrent access. Every mutation,
/// including the compare-and-set in `complete`, runs under the write lock.
/// Ideal for testing or for a single-process deployment where persistence is
/// not required.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryTransactionStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, new: NewTransaction) -> Result<Transaction> {
        let mut state = self.state.write().await;
        state.last_id += 1;
        let tx = Transaction::from_new(state.last_id, new, Utc::now());
        state.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn find(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let state = self.state.read().await;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn set_ref_id(&self, id: TransactionId, ref_id: &str) -> Result<Transaction> {
        let mut state = self.state.write().await;
        let tx = state
            .transactions
            .get_mut(&id)
            .ok_or_else(|| GatewayError::TransactionNotFound(id.to_string()))?;
        tx.set_ref_id(ref_id, Utc::now())?;
        Ok(tx.clone())
    }

    async fn complete(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        completion: Completion,
    ) -> Result<Transaction> {
        let mut state = self.state.write().await;
        let tx = state
            .transactions
            .get_mut(&id)
            .ok_or_else(|| GatewayError::TransactionNotFound(id.to_string()))?;
        tx.complete(expected, completion, Utc::now())?;
        Ok(tx.clone())
    }

    async fn append_log(&self, entry: LogEntry) -> Result<()> {
        let mut state = self.state.write().await;
        state.logs.push(entry);
        Ok(())
    }

    async fn logs(&self, id: TransactionId) -> Result<Vec<LogEntry>> {
        let state = self.state.read().await;
        Ok(state
            .logs
            .iter()
            .filter(|entry| entry.transaction_id == id)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        Ok(state.transactions.values().cloned().collect())
    }
}
