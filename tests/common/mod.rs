#![allow(dead_code)]

use paygate::domain::ports::TransactionStoreRef;
use paygate::infrastructure::http::ReqwestTransport;
use paygate::infrastructure::in_memory::InMemoryTransactionStore;
use paygate::{Gateway, GatewayConfig, Resolver, VendorConfig};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::MockServer;

pub const CALLBACK: &str = "https://shop.test/callback";
pub const GATE: &str = "https://gate.test/start/";

/// Vendor section whose API base points at the mock server.
pub fn vendor(server: &MockServer, prefix: &str) -> VendorConfig {
    let mut vendor = VendorConfig::new("test-key");
    vendor.api_url = Some(Url::parse(&format!("{}/{prefix}/", server.uri())).unwrap());
    vendor.gate_url = Some(Url::parse(GATE).unwrap());
    vendor
}

/// Every gateway configured against `server`, with a global callback URL.
pub fn config(server: &MockServer) -> GatewayConfig {
    let mut config = GatewayConfig::default()
        .with_gateway(Gateway::Novinpal, vendor(server, "invoice"))
        .with_gateway(Gateway::Zarinpal, vendor(server, "pg/v4/payment"))
        .with_gateway(Gateway::Payir, vendor(server, "pg"));
    config.callback_url = Some(Url::parse(CALLBACK).unwrap());
    config
}

pub fn resolver(config: GatewayConfig) -> (Resolver, InMemoryTransactionStore) {
    let store = InMemoryTransactionStore::new();
    let shared: TransactionStoreRef = Arc::new(store.clone());
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    (
        Resolver::new(Arc::new(config), shared, Arc::new(transport)),
        store,
    )
}
