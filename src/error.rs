use crate::config::ConfigError;
use crate::domain::gateway::Gateway;
use crate::domain::transaction::{Transaction, TransactionId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Port not found: {0}")]
    PortNotFound(String),
    #[error("Invalid callback request: expected a transaction_id or iN field")]
    InvalidRequest,
    /// The callback named a transaction that does not exist. Carries the raw value.
    #[error("Transaction {0} not found")]
    TransactionNotFound(String),
    #[error("Transaction {0} has already been processed")]
    Retry(TransactionId),
    #[error("{0} does not support multiple verified card numbers, use set_valid_card_number instead")]
    CardValidationNotSupported(Gateway),
    #[error(transparent)]
    Vendor(Box<VendorError>),
    #[error("No port selected, call make first")]
    NoPortSelected,
    #[error("Payment request is not ready: {0}")]
    NotReady(&'static str),
    #[error("You have to set callback url first")]
    MissingCallback,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
}

/// A vendor rejected the payment.
///
/// Carries the transaction in its final (`failed`) state so callers can read
/// the outcome without a second store lookup.
#[derive(Error, Debug)]
#[error("{gateway} rejected transaction {id} with code {code}: {message}", id = .transaction.id)]
pub struct VendorError {
    pub gateway: Gateway,
    pub code: String,
    pub message: String,
    pub transaction: Transaction,
}

impl From<VendorError> for GatewayError {
    fn from(err: VendorError) -> Self {
        GatewayError::Vendor(Box::new(err))
    }
}

impl GatewayError {
    /// Returns the vendor rejection, if this error is one.
    pub fn as_vendor(&self) -> Option<&VendorError> {
        match self {
            GatewayError::Vendor(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors raised by the outbound HTTP transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}
