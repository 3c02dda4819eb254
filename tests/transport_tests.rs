use paygate::domain::ports::HttpTransport;
use paygate::error::TransportError;
use paygate::infrastructure::http::ReqwestTransport;
use serde_json::json;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(Duration::from_secs(5)).unwrap()
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{route}", server.uri())).unwrap()
}

#[tokio::test]
async fn posts_json_and_decodes_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pg/send"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "api": "test", "amount": 1000 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 1, "token": "T" })))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport()
        .post_json(&url(&server, "/pg/send"), &json!({ "api": "test", "amount": 1000 }))
        .await
        .unwrap();
    assert_eq!(response["token"], json!("T"));
}

#[tokio::test]
async fn json_error_body_is_returned_to_driver() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "status": 0, "errorCode": "-4" })))
        .mount(&server)
        .await;

    let response = transport()
        .post_json(&url(&server, "/pg/send"), &json!({}))
        .await
        .unwrap();
    assert_eq!(response["errorCode"], json!("-4"));
}

#[tokio::test]
async fn non_json_error_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;

    let err = transport()
        .post_json(&url(&server, "/invoice/verify"), &json!({}))
        .await
        .unwrap_err();
    match err {
        TransportError::Status { endpoint, status, body } => {
            assert_eq!(endpoint, "POST /invoice/verify");
            assert_eq!(status, 500);
            assert_eq!(body, "internal error");
        }
        other => panic!("expected status error, got {other}"),
    }
}

#[tokio::test]
async fn non_json_success_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let err = transport()
        .post_json(&url(&server, "/invoice/request"), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Decode { .. }));
}

#[tokio::test]
async fn timeout_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(Duration::from_millis(100)).unwrap();
    let err = transport
        .post_json(&url(&server, "/invoice/request"), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Http { .. }));
}
