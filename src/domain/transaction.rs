use super::gateway::Gateway;
use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TransactionId = u64;

/// Log code written when a payment is verified.
pub const SUCCEED_CODE: &str = "SUCCEED";
/// Log message written when a payment is verified.
pub const SUCCEED_TEXT: &str = "Payment completed successfully";
/// Fallback message for vendor codes missing from a driver's table.
pub const FAILED_TEXT: &str = "Transaction failed";

/// Lifecycle of a payment attempt.
///
/// The only legal transitions are `Pending -> Succeeded` and `Pending -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Succeeded | TransactionStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Succeeded => "succeeded",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted payment attempt.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub port: Gateway,
    /// Amount requested by the caller, before any vendor unit conversion.
    pub price: Decimal,
    pub status: TransactionStatus,
    /// Vendor reference (authority) token issued when the request was created.
    pub ref_id: Option<String>,
    /// Vendor receipt issued after a successful verification.
    pub tracking_code: Option<String>,
    /// Payer card, always stored masked.
    pub card_number: Option<String>,
    pub description: Option<String>,
    pub ip: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds the initial `Pending` record for a store-assigned id.
    pub fn from_new(id: TransactionId, new: NewTransaction, now: DateTime<Utc>) -> Self {
        Self {
            id,
            port: new.port,
            price: new.price,
            status: TransactionStatus::Pending,
            ref_id: None,
            tracking_code: None,
            card_number: None,
            description: new.description,
            ip: new.ip,
            payment_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Records the vendor reference token. Rejected once the transaction is terminal.
    pub fn set_ref_id(&mut self, ref_id: &str, now: DateTime<Utc>) -> Result<()> {
        if self.is_terminal() {
            return Err(GatewayError::Retry(self.id));
        }
        self.ref_id = Some(ref_id.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Compare-and-set transition into a terminal state.
    ///
    /// Fails with [`GatewayError::Retry`] unless the current status equals `expected`
    /// and is not already terminal.
    pub fn complete(
        &mut self,
        expected: TransactionStatus,
        completion: Completion,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status != expected || self.is_terminal() {
            return Err(GatewayError::Retry(self.id));
        }

        self.status = completion.status;
        if completion.status == TransactionStatus::Succeeded {
            self.tracking_code = completion.tracking_code;
            self.card_number = completion.card_number;
            self.payment_date = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Fields supplied by a driver when it opens a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub port: Gateway,
    pub price: Decimal,
    pub description: Option<String>,
    pub ip: Option<String>,
}

/// A terminal outcome to apply with [`Transaction::complete`].
///
/// Only constructible as success or failure, so a completion can never move a
/// transaction back to `Pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    status: TransactionStatus,
    tracking_code: Option<String>,
    card_number: Option<String>,
}

impl Completion {
    pub fn succeeded(tracking_code: Option<String>, card_number: Option<&str>) -> Self {
        Self {
            status: TransactionStatus::Succeeded,
            tracking_code,
            card_number: card_number.map(mask_card_number),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: TransactionStatus::Failed,
            tracking_code: None,
            card_number: None,
        }
    }
}

/// One row of the transaction audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub transaction_id: TransactionId,
    pub result_code: String,
    pub result_message: String,
    pub log_date: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(
        transaction_id: TransactionId,
        result_code: impl Into<String>,
        result_message: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id,
            result_code: result_code.into(),
            result_message: result_message.into(),
            log_date: Utc::now(),
        }
    }
}

/// Masks a card number, keeping at most the first six and last four digits.
///
/// Spaces and dashes are dropped; characters already masked by the vendor are kept.
/// Any Unicode digit counts, so Persian and Arabic-Indic card numbers are masked too.
pub fn mask_card_number(card: &str) -> String {
    let chars: Vec<char> = card
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let len = chars.len();
    let head = if len >= 10 { 6 } else { 0 };
    let tail = if len > 4 { 4 } else { 0 };

    chars
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i >= head && i < len - tail && c.is_numeric() {
                '*'
            } else {
                *c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pending() -> Transaction {
        let new = NewTransaction {
            port: Gateway::Novinpal,
            price: dec!(1000),
            description: None,
            ip: None,
        };
        Transaction::from_new(1, new, Utc::now())
    }

    #[test]
    fn test_new_transaction_is_pending() {
        let tx = pending();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(!tx.is_terminal());
        assert_eq!(tx.created_at, tx.updated_at);
    }

    #[test]
    fn test_complete_success_records_receipt() {
        let mut tx = pending();
        let completion = Completion::succeeded(Some("RCPT-1".into()), Some("6037991234567890"));
        tx.complete(TransactionStatus::Pending, completion, Utc::now())
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Succeeded);
        assert_eq!(tx.tracking_code.as_deref(), Some("RCPT-1"));
        assert_eq!(tx.card_number.as_deref(), Some("603799******7890"));
        assert!(tx.payment_date.is_some());
    }

    #[test]
    fn test_terminal_status_is_final() {
        let mut tx = pending();
        tx.complete(TransactionStatus::Pending, Completion::failed(), Utc::now())
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);

        let again = tx.complete(
            TransactionStatus::Failed,
            Completion::succeeded(None, None),
            Utc::now(),
        );
        assert!(matches!(again, Err(GatewayError::Retry(1))));
        assert_eq!(tx.status, TransactionStatus::Failed);

        assert!(tx.set_ref_id("late", Utc::now()).is_err());
        assert_eq!(tx.ref_id, None);
    }

    #[test]
    fn test_complete_rejects_unexpected_prior_status() {
        let mut tx = pending();
        let result = tx.complete(
            TransactionStatus::Succeeded,
            Completion::failed(),
            Utc::now(),
        );
        assert!(result.is_err());
        assert_eq!(tx.status, TransactionStatus::Pending);
    }

    #[test]
    fn test_failure_does_not_store_receipt() {
        let mut tx = pending();
        tx.complete(TransactionStatus::Pending, Completion::failed(), Utc::now())
            .unwrap();
        assert_eq!(tx.tracking_code, None);
        assert_eq!(tx.payment_date, None);
    }

    #[test]
    fn test_mask_card_number() {
        assert_eq!(mask_card_number("6037991234567890"), "603799******7890");
        assert_eq!(mask_card_number("6037-9912-3456-7890"), "603799******7890");
        assert_eq!(mask_card_number("603799******7890"), "603799******7890");
        assert_eq!(mask_card_number("123456"), "**3456");
        assert_eq!(mask_card_number("1234"), "****");
        assert_eq!(mask_card_number(""), "");
    }

    #[test]
    fn test_mask_card_number_non_ascii_digits() {
        assert_eq!(mask_card_number("۶۰۳۷۹۹۱۲۳۴۵۶۷۸۹۰"), "۶۰۳۷۹۹******۷۸۹۰");
        assert_eq!(mask_card_number("٦٠٣٧ ٩٩١٢ ٣٤٥٦ ٧٨٩٠"), "٦٠٣٧٩٩******٧٨٩٠");

        let completion = Completion::succeeded(None, Some("۶۰۳۷۹۹۱۲۳۴۵۶۷۸۹۰"));
        let mut tx = pending();
        tx.complete(TransactionStatus::Pending, completion, Utc::now())
            .unwrap();
        assert_eq!(tx.card_number.as_deref(), Some("۶۰۳۷۹۹******۷۸۹۰"));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TransactionStatus::Succeeded).unwrap();
        assert_eq!(json, "\"succeeded\"");
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
    }
}
