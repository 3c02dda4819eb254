//! Novinpal invoice API.
//!
//! | Step     | Endpoint                         |
//! |----------|----------------------------------|
//! | request  | `POST {api}/request`             |
//! | redirect | `GET  {gate}/{refId}`            |
//! | verify   | `POST {api}/verify`              |
//!
//! Amounts are given in toman and sent in rial. The callback carries
//! `success=1` and `refId` on a completed payment.

use super::common::{PortCore, RedirectTarget, field_i64, field_str};
use super::Driver;
use crate::domain::request::CallbackRequest;
use crate::domain::transaction::{FAILED_TEXT, Transaction};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

const API_URL: &str = "https://api.novinpal.ir/invoice/";
const GATE_URL: &str = "https://api.novinpal.ir/invoice/start/";

/// Toman to rial.
const AMOUNT_FACTOR: Decimal = dec!(10);

const STATUS_SUCCESS: i64 = 1;

/// Code logged when the payer returns without a successful payment.
const CALLBACK_FAILED_CODE: &str = "0";

#[derive(Debug)]
pub struct Novinpal {
    core: PortCore,
}

impl Novinpal {
    pub fn new(core: PortCore) -> Self {
        Self { core }
    }

    async fn send_pay_request(&mut self) -> Result<()> {
        let url = self.core.endpoint(&self.core.api_base(API_URL, None)?, "request")?;
        let id = self.core.new_transaction(AMOUNT_FACTOR).await?;

        let mut body = json!({
            "api_key": self.core.vendor()?.api_key,
            "amount": self.core.vendor_amount(AMOUNT_FACTOR)?,
            "order_id": id.to_string(),
            "description": self.core.description(),
            "return_url": self.core.callback()?.as_str(),
        });
        if let Some(card) = self.core.valid_card_number() {
            body["card_number"] = json!(card);
        }

        let response = self.core.post(&url, &body).await?;

        let ref_id = field_str(&response, "refId");
        match ref_id {
            Some(ref_id) if field_i64(&response, "status") == Some(STATUS_SUCCESS) => {
                self.core.transaction_set_ref_id(ref_id).await
            }
            _ => {
                let (code, message) = vendor_error(&response);
                Err(self.core.failed(code, message).await)
            }
        }
    }

    async fn verify_payment(&mut self, callback_ref_id: &str) -> Result<Transaction> {
        let ref_id = self.core.ref_id().unwrap_or(callback_ref_id).to_string();
        let body = json!({
            "api_key": self.core.vendor()?.api_key,
            "ref_id": ref_id,
        });

        let url = self.core.endpoint(&self.core.api_base(API_URL, None)?, "verify")?;
        let response = self.core.post(&url, &body).await?;

        if field_i64(&response, "status") != Some(STATUS_SUCCESS) {
            let (code, message) = vendor_error(&response);
            return Err(self.core.failed(code, message).await);
        }

        let tracking_code = field_str(&response, "refNumber").or_else(|| field_str(&response, "refId"));
        let card_number = field_str(&response, "cardNumber");
        self.core
            .transaction_succeed(tracking_code, card_number.as_deref())
            .await
    }
}

/// Novinpal reports failures as `errorCode` plus a human-readable description.
fn vendor_error(response: &Value) -> (String, String) {
    let code = field_str(response, "errorCode")
        .or_else(|| field_str(response, "status"))
        .unwrap_or_else(|| "0".to_string());
    let message = field_str(response, "errorDescription")
        .or_else(|| field_str(response, "message"))
        .unwrap_or_else(|| FAILED_TEXT.to_string());
    (code, message)
}

#[async_trait]
impl Driver for Novinpal {
    fn core(&self) -> &PortCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PortCore {
        &mut self.core
    }

    async fn ready(&mut self) -> Result<()> {
        self.send_pay_request().await
    }

    fn redirect(&self) -> Result<RedirectTarget> {
        let gate = self.core.gate_base(GATE_URL, None)?;
        self.core.redirect_to(&gate)
    }

    async fn verify(&mut self, request: &CallbackRequest) -> Result<Transaction> {
        let status = request.get("success");
        let ref_id = request.get("refId");

        match (status, ref_id) {
            (Some("1"), Some(ref_id)) => self.verify_payment(ref_id).await,
            _ => Err(self
                .core
                .failed(CALLBACK_FAILED_CODE, "Payment was cancelled or declined")
                .await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewayConfig, VendorConfig};
    use crate::domain::gateway::Gateway;
    use crate::domain::ports::TransactionStore;
    use crate::domain::transaction::TransactionStatus;
    use crate::error::GatewayError;
    use crate::infrastructure::in_memory::InMemoryTransactionStore;
    use crate::infrastructure::testing::ScriptedTransport;
    use std::sync::Arc;
    use url::Url;

    fn driver(transport: ScriptedTransport) -> (Novinpal, Arc<ScriptedTransport>, Arc<InMemoryTransactionStore>) {
        let mut vendor = VendorConfig::new("nv-key");
        vendor.callback_url = Some(Url::parse("https://shop.test/callback").unwrap());
        let config = GatewayConfig::default().with_gateway(Gateway::Novinpal, vendor);
        let transport = Arc::new(transport);
        let store = Arc::new(InMemoryTransactionStore::new());
        let core = PortCore::new(Gateway::Novinpal, Arc::new(config), store.clone(), transport.clone());
        (Novinpal::new(core), transport, store)
    }

    #[tokio::test]
    async fn test_ready_sends_rial_amount_and_callback() {
        let (mut novinpal, transport, _) =
            driver(ScriptedTransport::new().respond(json!({ "status": 1, "refId": "NV-1" })));
        novinpal.set(dec!(1000)).unwrap();
        novinpal.ready().await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let (url, body) = &requests[0];
        assert_eq!(url.as_str(), "https://api.novinpal.ir/invoice/request");
        assert_eq!(body["amount"], json!(10_000));
        assert_eq!(body["order_id"], json!("1"));
        assert_eq!(body["return_url"], json!("https://shop.test/callback?transaction_id=1"));
        assert!(body.get("card_number").is_none());

        assert_eq!(
            novinpal.redirect().unwrap().as_str(),
            "https://api.novinpal.ir/invoice/start/NV-1"
        );
    }

    #[tokio::test]
    async fn test_ready_forwards_allowed_card() {
        let (mut novinpal, transport, _) =
            driver(ScriptedTransport::new().respond(json!({ "status": 1, "refId": "NV-1" })));
        novinpal.set(dec!(1000)).unwrap();
        novinpal.core_mut().set_valid_card_number("6037991234567890");
        novinpal.ready().await.unwrap();

        assert_eq!(transport.requests()[0].1["card_number"], json!("6037991234567890"));
    }

    #[tokio::test]
    async fn test_ready_without_ref_id_fails() {
        let (mut novinpal, _, store) =
            driver(ScriptedTransport::new().respond(json!({ "status": 1 })));
        novinpal.set(dec!(1000)).unwrap();
        let err = novinpal.ready().await.unwrap_err();

        assert!(matches!(err, GatewayError::Vendor(_)));
        let tx = store.find(1).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_redirect_before_ready() {
        let (novinpal, _, _) = driver(ScriptedTransport::new());
        assert!(matches!(novinpal.redirect(), Err(GatewayError::NotReady(_))));
    }

    #[test]
    fn test_vendor_error_fields() {
        let (code, message) =
            vendor_error(&json!({ "status": 0, "errorCode": 105, "errorDescription": "invalid api key" }));
        assert_eq!(code, "105");
        assert_eq!(message, "invalid api key");

        let (code, message) = vendor_error(&json!({ "status": 0 }));
        assert_eq!(code, "0");
        assert_eq!(message, FAILED_TEXT);
    }
}
