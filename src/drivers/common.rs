//! State and bookkeeping shared by every driver.

use crate::config::{GatewayConfig, VendorConfig};
use crate::domain::amount::Amount;
use crate::domain::gateway::Gateway;
use crate::domain::ports::{HttpTransportRef, TransactionStoreRef};
use crate::domain::transaction::{
    Completion, LogEntry, NewTransaction, SUCCEED_CODE, SUCCEED_TEXT, Transaction, TransactionId,
    TransactionStatus,
};
use crate::error::{GatewayError, Result, VendorError};
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Query parameter appended to every callback URL.
pub const TRANSACTION_ID_FIELD: &str = "transaction_id";

/// Where to send the payer after `ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub url: Url,
}

impl RedirectTarget {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// Per-attempt driver state plus the helpers that persist it.
pub struct PortCore {
    gateway: Gateway,
    config: Arc<GatewayConfig>,
    store: TransactionStoreRef,
    transport: HttpTransportRef,
    amount: Option<Amount>,
    transaction: Option<Transaction>,
    ref_id: Option<String>,
    tracking_code: Option<String>,
    card_number: Option<String>,
    callback_url: Option<Url>,
    description: Option<String>,
    ip: Option<String>,
    valid_card_numbers: Vec<String>,
}

impl std::fmt::Debug for PortCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortCore")
            .field("gateway", &self.gateway)
            .field("amount", &self.amount)
            .field("transaction_id", &self.transaction_id())
            .field("ref_id", &self.ref_id)
            .field("tracking_code", &self.tracking_code)
            .finish_non_exhaustive()
    }
}

impl PortCore {
    pub fn new(
        gateway: Gateway,
        config: Arc<GatewayConfig>,
        store: TransactionStoreRef,
        transport: HttpTransportRef,
    ) -> Self {
        Self {
            gateway,
            config,
            store,
            transport,
            amount: None,
            transaction: None,
            ref_id: None,
            tracking_code: None,
            card_number: None,
            callback_url: None,
            description: None,
            ip: None,
            valid_card_numbers: Vec::new(),
        }
    }

    /// Replaces the shared collaborators, keeping per-attempt state.
    pub(crate) fn inject(
        &mut self,
        config: Arc<GatewayConfig>,
        store: TransactionStoreRef,
        transport: HttpTransportRef,
    ) {
        self.config = config;
        self.store = store;
        self.transport = transport;
    }

    /// Checks that the vendor section exists. Called by the resolver after `make`.
    pub(crate) fn boot(&self) -> Result<()> {
        self.vendor()?;
        Ok(())
    }

    pub fn gateway(&self) -> Gateway {
        self.gateway
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn vendor(&self) -> Result<&VendorConfig> {
        Ok(self.config.get(self.gateway)?)
    }

    /// Vendor API base: configured override, then sandbox or production default.
    pub fn api_base(&self, production: &str, sandbox: Option<&str>) -> Result<Url> {
        let vendor = self.vendor()?;
        self.base_url(vendor.api_url.as_ref(), vendor.sandbox, production, sandbox)
    }

    /// Vendor payment page base: configured override, then sandbox or production default.
    pub fn gate_base(&self, production: &str, sandbox: Option<&str>) -> Result<Url> {
        let vendor = self.vendor()?;
        self.base_url(vendor.gate_url.as_ref(), vendor.sandbox, production, sandbox)
    }

    fn base_url(
        &self,
        configured: Option<&Url>,
        use_sandbox: bool,
        production: &str,
        sandbox: Option<&str>,
    ) -> Result<Url> {
        if let Some(url) = configured {
            return Ok(url.clone());
        }
        let raw = match sandbox {
            Some(sandbox) if use_sandbox => sandbox,
            _ => production,
        };
        Url::parse(raw).map_err(|e| GatewayError::InternalError(Box::new(e)))
    }

    pub fn endpoint(&self, base: &Url, path: &str) -> Result<Url> {
        base.join(path)
            .map_err(|e| GatewayError::InternalError(Box::new(e)))
    }

    pub async fn post(&self, url: &Url, body: &Value) -> Result<Value> {
        tracing::debug!(gateway = %self.gateway, url = %url, "calling vendor");
        Ok(self.transport.post_json(url, body).await?)
    }

    pub fn set_amount(&mut self, amount: Decimal) -> Result<()> {
        self.amount = Some(Amount::new(amount)?);
        Ok(())
    }

    pub fn amount(&self) -> Option<Amount> {
        self.amount
    }

    /// The amount in the vendor's unit.
    pub fn vendor_amount(&self, factor: Decimal) -> Result<i64> {
        self.amount
            .ok_or(GatewayError::NotReady("amount is not set"))?
            .to_vendor_units(factor)
    }

    pub fn set_callback(&mut self, url: Url) {
        self.callback_url = Some(url);
    }

    /// The callback URL for the current transaction, with `transaction_id` appended.
    ///
    /// Falls back to the vendor section, then the global setting.
    pub fn callback(&self) -> Result<Url> {
        let mut url = self.callback_base()?;
        let id = self.require_transaction_id()?;
        url.query_pairs_mut()
            .append_pair(TRANSACTION_ID_FIELD, &id.to_string());
        Ok(url)
    }

    fn callback_base(&self) -> Result<Url> {
        let vendor = self.vendor()?;
        self.callback_url
            .as_ref()
            .or(vendor.callback_url.as_ref())
            .or(self.config.callback_url.as_ref())
            .cloned()
            .ok_or(GatewayError::MissingCallback)
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Caller description, then the vendor default, then `txn #<id>`.
    pub fn description(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.vendor().ok().and_then(|v| v.description.clone()))
            .or_else(|| self.transaction_id().map(|id| format!("txn #{id}")))
            .unwrap_or_default()
    }

    pub fn set_ip(&mut self, ip: impl Into<String>) {
        self.ip = Some(ip.into());
    }

    pub fn set_valid_card_number(&mut self, card: impl Into<String>) {
        self.valid_card_numbers = vec![card.into()];
    }

    /// Replaces the allow-list. Drivers without multi-card support reject more than one card.
    pub fn set_valid_card_numbers(
        &mut self,
        cards: Vec<String>,
        supports_multiple: bool,
    ) -> Result<()> {
        if cards.len() > 1 && !supports_multiple {
            return Err(GatewayError::CardValidationNotSupported(self.gateway));
        }
        self.valid_card_numbers = cards;
        Ok(())
    }

    pub fn valid_card_numbers(&self) -> &[String] {
        &self.valid_card_numbers
    }

    pub fn valid_card_number(&self) -> Option<&str> {
        self.valid_card_numbers.first().map(String::as_str)
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction.as_ref().map(|tx| tx.id)
    }

    fn require_transaction_id(&self) -> Result<TransactionId> {
        self.transaction_id()
            .ok_or(GatewayError::NotReady("no transaction has been created"))
    }

    pub fn ref_id(&self) -> Option<&str> {
        self.ref_id.as_deref()
    }

    pub fn tracking_code(&self) -> Option<&str> {
        self.tracking_code.as_deref()
    }

    pub fn card_number(&self) -> Option<&str> {
        self.card_number.as_deref()
    }

    /// Opens a `Pending` transaction for the current amount.
    ///
    /// Nothing is stored unless the amount converts with `factor` and a
    /// callback URL resolves.
    pub async fn new_transaction(&mut self, factor: Decimal) -> Result<TransactionId> {
        let amount = self
            .amount
            .ok_or(GatewayError::NotReady("amount is not set"))?;
        amount.to_vendor_units(factor)?;
        self.callback_base()?;

        let tx = self
            .store
            .create(NewTransaction {
                port: self.gateway,
                price: amount.value(),
                description: self.description.clone(),
                ip: self.ip.clone(),
            })
            .await?;
        tracing::info!(gateway = %self.gateway, transaction_id = tx.id, amount = %amount, "transaction created");

        let id = tx.id;
        self.ref_id = None;
        self.tracking_code = None;
        self.card_number = None;
        self.transaction = Some(tx);
        Ok(id)
    }

    /// Loads a stored transaction for verification.
    pub fn attach(&mut self, tx: Transaction) -> Result<()> {
        self.amount = Some(Amount::new(tx.price)?);
        self.ref_id = tx.ref_id.clone();
        self.tracking_code = tx.tracking_code.clone();
        self.card_number = tx.card_number.clone();
        self.transaction = Some(tx);
        Ok(())
    }

    pub async fn transaction_set_ref_id(&mut self, ref_id: impl Into<String>) -> Result<()> {
        let ref_id = ref_id.into();
        let id = self.require_transaction_id()?;
        let tx = self.store.set_ref_id(id, &ref_id).await?;
        self.ref_id = Some(ref_id);
        self.transaction = Some(tx);
        Ok(())
    }

    /// Marks the transaction succeeded and writes the success log entry.
    pub async fn transaction_succeed(
        &mut self,
        tracking_code: Option<String>,
        card_number: Option<&str>,
    ) -> Result<Transaction> {
        let id = self.require_transaction_id()?;
        let tx = self
            .store
            .complete(
                id,
                TransactionStatus::Pending,
                Completion::succeeded(tracking_code, card_number),
            )
            .await?;
        self.store
            .append_log(LogEntry::new(id, SUCCEED_CODE, SUCCEED_TEXT))
            .await?;
        tracing::info!(gateway = %self.gateway, transaction_id = id, "transaction succeeded");

        self.tracking_code = tx.tracking_code.clone();
        self.card_number = tx.card_number.clone();
        self.transaction = Some(tx.clone());
        Ok(tx)
    }

    /// Marks the transaction failed, logs the vendor code and builds the error to return.
    ///
    /// A storage failure while recording the outcome takes precedence over the
    /// vendor error.
    pub async fn failed(&mut self, code: impl Into<String>, message: impl Into<String>) -> GatewayError {
        match self.reject(code.into(), message.into()).await {
            Ok(vendor) => vendor.into(),
            Err(err) => err,
        }
    }

    async fn reject(&mut self, code: String, message: String) -> Result<VendorError> {
        let id = self.require_transaction_id()?;
        let tx = self
            .store
            .complete(id, TransactionStatus::Pending, Completion::failed())
            .await?;
        self.store
            .append_log(LogEntry::new(id, code.clone(), message.clone()))
            .await?;
        tracing::warn!(gateway = %self.gateway, transaction_id = id, %code, %message, "transaction failed");

        self.transaction = Some(tx.clone());
        Ok(VendorError {
            gateway: self.gateway,
            code,
            message,
            transaction: tx,
        })
    }

    /// Payment page URL for the stored reference token.
    pub fn redirect_to(&self, gate: &Url) -> Result<RedirectTarget> {
        let ref_id = self
            .ref_id
            .as_deref()
            .ok_or(GatewayError::NotReady("call ready before redirect"))?;
        Ok(RedirectTarget {
            url: self.endpoint(gate, ref_id)?,
        })
    }
}

/// Reads a scalar JSON field as a string; numbers are stringified.
pub fn field_str(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reads a JSON field as an integer, accepting numeric strings.
pub fn field_i64(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
