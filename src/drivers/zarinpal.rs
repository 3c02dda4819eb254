//! Zarinpal payment gateway, REST v4.
//!
//! Requests are created with `request.json`, the payer is sent to
//! `StartPay/{authority}`, and the callback carries `Status=OK` plus the
//! `Authority`. Responses wrap results in `data`; failures are reported in
//! `errors`. Amounts are sent in rial (`currency: IRR`).

use super::common::{PortCore, RedirectTarget, field_i64, field_str};
use super::Driver;
use crate::domain::request::CallbackRequest;
use crate::domain::transaction::{FAILED_TEXT, Transaction};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

const API_URL: &str = "https://payment.zarinpal.com/pg/v4/payment/";
const SANDBOX_API_URL: &str = "https://sandbox.zarinpal.com/pg/v4/payment/";
const GATE_URL: &str = "https://payment.zarinpal.com/pg/StartPay/";
const SANDBOX_GATE_URL: &str = "https://sandbox.zarinpal.com/pg/StartPay/";

const AMOUNT_FACTOR: Decimal = dec!(1);
const CURRENCY: &str = "IRR";

const CODE_SUCCESS: i64 = 100;
const CODE_ALREADY_VERIFIED: i64 = 101;

const CALLBACK_OK: &str = "OK";
const CALLBACK_FAILED_CODE: &str = "NOK";

/// Zarinpal error codes.
pub fn error_message(code: &str) -> &'static str {
    match code {
        "-9" => "Validation error",
        "-10" => "Terminal is not valid, check the merchant id or server IP",
        "-11" => "Terminal is not active",
        "-12" => "Too many attempts, try again later",
        "-15" => "Terminal user is suspended",
        "-16" => "Terminal user level is not valid",
        "-30" => "Terminal does not allow floating wages",
        "-50" => "Session is not valid, amounts do not match",
        "-51" => "Session is not valid, payment was not successful",
        "-52" => "Unexpected error, contact Zarinpal support",
        "-53" => "Session does not belong to this merchant",
        "-54" => "Invalid authority",
        "NOK" => "Payment was cancelled by the payer",
        _ => FAILED_TEXT,
    }
}

#[derive(Debug)]
pub struct Zarinpal {
    core: PortCore,
}

impl Zarinpal {
    pub fn new(core: PortCore) -> Self {
        Self { core }
    }

    fn api(&self, path: &str) -> Result<url::Url> {
        let base = self.core.api_base(API_URL, Some(SANDBOX_API_URL))?;
        self.core.endpoint(&base, path)
    }

    async fn send_pay_request(&mut self) -> Result<()> {
        let url = self.api("request.json")?;
        let id = self.core.new_transaction(AMOUNT_FACTOR).await?;

        let mut metadata = json!({ "order_id": id.to_string() });
        if let Some(card) = self.core.valid_card_number() {
            metadata["card_pan"] = json!(card);
        }
        let body = json!({
            "merchant_id": self.core.vendor()?.api_key,
            "amount": self.core.vendor_amount(AMOUNT_FACTOR)?,
            "currency": CURRENCY,
            "callback_url": self.core.callback()?.as_str(),
            "description": self.core.description(),
            "metadata": metadata,
        });

        let response = self.core.post(&url, &body).await?;
        let data = &response["data"];

        match field_str(data, "authority") {
            Some(authority) if field_i64(data, "code") == Some(CODE_SUCCESS) => {
                self.core.transaction_set_ref_id(authority).await
            }
            _ => {
                let code = error_code(&response);
                let message = error_message(&code);
                Err(self.core.failed(code, message).await)
            }
        }
    }

    async fn verify_payment(&mut self, authority: &str) -> Result<Transaction> {
        let body = json!({
            "merchant_id": self.core.vendor()?.api_key,
            "amount": self.core.vendor_amount(AMOUNT_FACTOR)?,
            "authority": authority,
        });

        let url = self.api("verify.json")?;
        let response = self.core.post(&url, &body).await?;
        let data = &response["data"];

        match field_i64(data, "code") {
            Some(CODE_SUCCESS) | Some(CODE_ALREADY_VERIFIED) => {
                let tracking_code = field_str(data, "ref_id");
                let card_number = field_str(data, "card_pan");
                self.core
                    .transaction_succeed(tracking_code, card_number.as_deref())
                    .await
            }
            _ => {
                let code = error_code(&response);
                let message = error_message(&code);
                Err(self.core.failed(code, message).await)
            }
        }
    }
}

/// Failures come back as `errors.code`; anything else falls back to `data.code`.
fn error_code(response: &Value) -> String {
    field_str(&response["errors"], "code")
        .or_else(|| field_str(&response["data"], "code"))
        .unwrap_or_else(|| "0".to_string())
}

#[async_trait]
impl Driver for Zarinpal {
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
        let gate = self.core.gate_base(GATE_URL, Some(SANDBOX_GATE_URL))?;
        self.core.redirect_to(&gate)
    }

    async fn verify(&mut self, request: &CallbackRequest) -> Result<Transaction> {
        let status = request.get("Status");
        let authority = request.get("Authority");

        match (status, authority) {
            (Some(CALLBACK_OK), Some(authority)) => {
                let authority = self.core.ref_id().unwrap_or(authority).to_string();
                self.verify_payment(&authority).await
            }
            _ => Err(self
                .core
                .failed(CALLBACK_FAILED_CODE, error_message(CALLBACK_FAILED_CODE))
                .await),
        }
    }
}
