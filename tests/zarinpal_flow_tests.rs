mod common;

use paygate::domain::ports::TransactionStore;
use paygate::{CallbackRequest, Gateway, TransactionStatus};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUTHORITY: &str = "A00000000000000000000000000217885159";

async fn ready(server: &MockServer) -> (paygate::Resolver, paygate::infrastructure::in_memory::InMemoryTransactionStore) {
    Mock::given(method("POST"))
        .and(path("/pg/v4/payment/request.json"))
        .and(body_partial_json(json!({
            "merchant_id": "test-key",
            "amount": 50000,
            "currency": "IRR",
            "callback_url": "https://shop.test/callback?transaction_id=1",
            "metadata": { "order_id": "1" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "code": 100, "message": "Success", "authority": AUTHORITY, "fee_type": "Merchant", "fee": 100 },
            "errors": []
        })))
        .expect(1)
        .mount(server)
        .await;

    let (mut resolver, store) = common::resolver(common::config(server));
    resolver
        .make(Gateway::Zarinpal)
        .unwrap()
        .set(dec!(50000))
        .unwrap()
        .ready()
        .await
        .unwrap();
    (resolver, store)
}

#[tokio::test]
async fn request_then_verify_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pg/v4/payment/verify.json"))
        .and(body_partial_json(json!({
            "merchant_id": "test-key",
            "amount": 50000,
            "authority": AUTHORITY
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "code": 100,
                "message": "Verified",
                "card_pan": "502229******5995",
                "ref_id": 201,
                "fee_type": "Merchant",
                "fee": 0
            },
            "errors": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (mut resolver, store) = ready(&server).await;
    assert_eq!(
        resolver.port().unwrap().redirect().unwrap().as_str(),
        format!("{}{AUTHORITY}", common::GATE)
    );

    let request = CallbackRequest::new()
        .with("transaction_id", "1")
        .with("Status", "OK")
        .with("Authority", AUTHORITY);
    let tx = resolver.verify(&request).await.unwrap();

    assert_eq!(tx.status, TransactionStatus::Succeeded);
    assert_eq!(tx.tracking_code.as_deref(), Some("201"));
    assert_eq!(tx.card_number.as_deref(), Some("502229******5995"));
    assert_eq!(store.logs(1).await.unwrap()[0].result_code, "SUCCEED");
}

#[tokio::test]
async fn already_verified_counts_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pg/v4/payment/verify.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "code": 101, "message": "Verified", "ref_id": 201 },
            "errors": []
        })))
        .mount(&server)
        .await;

    let (mut resolver, _) = ready(&server).await;
    let request = CallbackRequest::from_query(&format!("transaction_id=1&Status=OK&Authority={AUTHORITY}"));
    let tx = resolver.verify(&request).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Succeeded);
    assert_eq!(tx.card_number, None);
}

#[tokio::test]
async fn nok_callback_fails_without_verify_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pg/v4/payment/verify.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (mut resolver, store) = ready(&server).await;
    let request = CallbackRequest::from_query(&format!("transaction_id=1&Status=NOK&Authority={AUTHORITY}"));
    let err = resolver.verify(&request).await.unwrap_err();

    let vendor = err.as_vendor().unwrap();
    assert_eq!(vendor.code, "NOK");
    assert_eq!(vendor.gateway, Gateway::Zarinpal);
    assert_eq!(store.logs(1).await.unwrap()[0].result_code, "NOK");
}

#[tokio::test]
async fn verify_errors_map_to_vendor_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pg/v4/payment/verify.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "errors": { "code": -51, "message": "Session is not valid", "validations": [] }
        })))
        .mount(&server)
        .await;

    let (mut resolver, store) = ready(&server).await;
    let request = CallbackRequest::from_query(&format!("transaction_id=1&Status=OK&Authority={AUTHORITY}"));
    let err = resolver.verify(&request).await.unwrap_err();

    let vendor = err.as_vendor().unwrap();
    assert_eq!(vendor.code, "-51");
    assert_eq!(vendor.message, paygate::drivers::zarinpal::error_message("-51"));
    assert_eq!(
        store.find(1).await.unwrap().unwrap().status,
        TransactionStatus::Failed
    );
}
