//! Pay.ir payment gateway.
//!
//! `POST /pg/send` returns a `token`, the payer is redirected to `/pg/{token}`,
//! and the callback carries `status` and `token`. Amounts are in rial.
//! The vendor accepts the literal api key `test` for its sandbox.

use super::common::{PortCore, RedirectTarget, field_i64, field_str};
use super::Driver;
use crate::domain::request::CallbackRequest;
use crate::domain::transaction::{FAILED_TEXT, Transaction};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

const API_URL: &str = "https://pay.ir/pg/";
const GATE_URL: &str = "https://pay.ir/pg/";

const AMOUNT_FACTOR: Decimal = dec!(1);
const STATUS_SUCCESS: i64 = 1;
const CALLBACK_FAILED_CODE: &str = "0";

/// Pay.ir error codes.
pub fn error_message(code: &str) -> &'static str {
    match code {
        "0" => "Payment was cancelled or declined",
        "-1" => "The api parameter is required",
        "-2" => "The amount must be numeric",
        "-3" => "The amount is required",
        "-4" => "The amount is below the minimum",
        "-5" => "The redirect parameter is required",
        "-6" => "Gateway not found or inactive",
        _ => FAILED_TEXT,
    }
}

#[derive(Debug)]
pub struct Payir {
    core: PortCore,
}

impl Payir {
    pub fn new(core: PortCore) -> Self {
        Self { core }
    }

    async fn send_pay_request(&mut self) -> Result<()> {
        let url = self.core.endpoint(&self.core.api_base(API_URL, None)?, "send")?;
        let id = self.core.new_transaction(AMOUNT_FACTOR).await?;

        let mut body = json!({
            "api": self.core.vendor()?.api_key,
            "amount": self.core.vendor_amount(AMOUNT_FACTOR)?,
            "redirect": self.core.callback()?.as_str(),
            "factorNumber": id.to_string(),
            "description": self.core.description(),
        });
        if let Some(card) = self.core.valid_card_number() {
            body["validCardNumber"] = json!(card);
        }

        let response = self.core.post(&url, &body).await?;

        match field_str(&response, "token") {
            Some(token) if field_i64(&response, "status") == Some(STATUS_SUCCESS) => {
                self.core.transaction_set_ref_id(token).await
            }
            _ => {
                let (code, message) = vendor_error(&response);
                Err(self.core.failed(code, message).await)
            }
        }
    }

    async fn verify_payment(&mut self, token: &str) -> Result<Transaction> {
        let body = json!({
            "api": self.core.vendor()?.api_key,
            "token": token,
        });

        let url = self.core.endpoint(&self.core.api_base(API_URL, None)?, "verify")?;
        let response = self.core.post(&url, &body).await?;

        if field_i64(&response, "status") != Some(STATUS_SUCCESS) {
            let (code, message) = vendor_error(&response);
            return Err(self.core.failed(code, message).await);
        }

        let tracking_code = field_str(&response, "transId");
        let card_number = field_str(&response, "cardNumber");
        self.core
            .transaction_succeed(tracking_code, card_number.as_deref())
            .await
    }
}

/// Prefers the vendor's own message over the local table.
fn vendor_error(response: &Value) -> (String, String) {
    let code = field_str(response, "errorCode").unwrap_or_else(|| "0".to_string());
    let message = field_str(response, "errorMessage")
        .unwrap_or_else(|| error_message(&code).to_string());
    (code, message)
}

#[async_trait]
impl Driver for Payir {
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
        let status = request.get("status");
        let token = request.get("token");

        match (status, token) {
            (Some("1"), Some(token)) => {
                let token = self.core.ref_id().unwrap_or(token).to_string();
                self.verify_payment(&token).await
            }
            _ => Err(self
                .core
                .failed(CALLBACK_FAILED_CODE, error_message(CALLBACK_FAILED_CODE))
                .await),
        }
    }
}
