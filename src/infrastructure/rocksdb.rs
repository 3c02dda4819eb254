use crate::domain::ports::TransactionStore;
use crate::domain::transaction::{
    Completion, LogEntry, NewTransaction, Transaction, TransactionId, TransactionStatus,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for transaction records, keyed by big-endian id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for log entries, keyed by big-endian transaction id + sequence.
pub const CF_LOGS: &str = "logs";
/// Column Family for counters.
pub const CF_META: &str = "meta";

const LAST_TRANSACTION_ID: &[u8] = b"last_transaction_id";
const LAST_LOG_SEQ: &[u8] = b"last_log_seq";

/// A persistent store implementation using RocksDB.
///
/// Transactions, log entries and id counters live in separate Column Families.
/// Read-modify-write sequences (id allocation, reference updates and the
/// terminal compare-and-set) are serialised by `write_lock`, so two callbacks
/// for the same transaction cannot both complete it.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_TRANSACTIONS, CF_LOGS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            GatewayError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn next_counter(&self, key: &[u8]) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let current = match self.db.get_cf(cf, key)? {
            Some(bytes) => u64::from_be_bytes(bytes.as_slice().try_into().map_err(|_| {
                GatewayError::InternalError(Box::new(std::io::Error::other(
                    "corrupt counter value",
                )))
            })?),
            None => 0,
        };
        let next = current + 1;
        self.db.put_cf(cf, key, next.to_be_bytes())?;
        Ok(next)
    }

    fn load(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        self.db
            .get_cf(cf, id.to_be_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn save(&self, tx: &Transaction) -> Result<()> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        self.db.put_cf(cf, tx.id.to_be_bytes(), encode(tx)?)?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        GatewayError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        )))
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        GatewayError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn create(&self, new: NewTransaction) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        let id = self.next_counter(LAST_TRANSACTION_ID)?;
        let tx = Transaction::from_new(id, new, Utc::now());
        self.save(&tx)?;
        Ok(tx)
    }

    async fn find(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.load(id)
    }

    async fn set_ref_id(&self, id: TransactionId, ref_id: &str) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self
            .load(id)?
            .ok_or_else(|| GatewayError::TransactionNotFound(id.to_string()))?;
        tx.set_ref_id(ref_id, Utc::now())?;
        self.save(&tx)?;
        Ok(tx)
    }

    async fn complete(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        completion: Completion,
    ) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self
            .load(id)?
            .ok_or_else(|| GatewayError::TransactionNotFound(id.to_string()))?;
        tx.complete(expected, completion, Utc::now())?;
        self.save(&tx)?;
        Ok(tx)
    }

    async fn append_log(&self, entry: LogEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let seq = self.next_counter(LAST_LOG_SEQ)?;
        let mut key = entry.transaction_id.to_be_bytes().to_vec();
        key.extend_from_slice(&seq.to_be_bytes());

        let cf = self.cf(CF_LOGS)?;
        self.db.put_cf(cf, key, encode(&entry)?)?;
        Ok(())
    }

    async fn logs(&self, id: TransactionId) -> Result<Vec<LogEntry>> {
        let cf = self.cf(CF_LOGS)?;
        let prefix = id.to_be_bytes();

        let mut entries = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            entries.push(decode(&value)?);
        }
        Ok(entries)
    }

    async fn all(&self) -> Result<Vec<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;

        let mut transactions = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            transactions.push(decode(&value)?);
        }
        Ok(transactions)
    }
}
