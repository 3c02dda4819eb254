use crate::config::GatewayConfig;
use crate::domain::gateway::Gateway;
use crate::domain::ports::{HttpTransportRef, TransactionStoreRef};
use crate::domain::request::CallbackRequest;
use crate::domain::transaction::{Transaction, TransactionId};
use crate::drivers::{Port, RedirectTarget};
use crate::error::{GatewayError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use url::Url;

/// Callback field carrying the transaction id.
pub const TRANSACTION_ID_FIELD: &str = crate::drivers::common::TRANSACTION_ID_FIELD;
/// Alternate callback field accepted for the transaction id.
pub const SHORT_TRANSACTION_ID_FIELD: &str = "iN";

/// What `make` can resolve.
#[derive(Debug)]
pub enum PortIdentifier {
    Name(String),
    Gateway(Gateway),
    Instance(Box<Port>),
}

impl From<&str> for PortIdentifier {
    fn from(name: &str) -> Self {
        PortIdentifier::Name(name.to_string())
    }
}

impl From<String> for PortIdentifier {
    fn from(name: String) -> Self {
        PortIdentifier::Name(name)
    }
}

impl From<Gateway> for PortIdentifier {
    fn from(gateway: Gateway) -> Self {
        PortIdentifier::Gateway(gateway)
    }
}

impl From<Port> for PortIdentifier {
    fn from(port: Port) -> Self {
        PortIdentifier::Instance(Box::new(port))
    }
}

/// Calls the resolver can forward to the selected driver.
#[derive(Debug, Clone, PartialEq)]
pub enum PortCall {
    Select(Gateway),
    SetAmount(Decimal),
    Ready,
    Redirect,
    SetCallback(Url),
    SetDescription(String),
    SetIp(String),
    SetValidCardNumber(String),
    SetValidCardNumbers(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortReply {
    Selected(Gateway),
    Done,
    Redirect(RedirectTarget),
}

/// Picks a driver by name or by an inbound callback and runs the verification flow.
///
/// Holds the shared configuration, store and transport; every driver it builds
/// receives the same instances.
pub struct Resolver {
    config: Arc<GatewayConfig>,
    store: TransactionStoreRef,
    transport: HttpTransportRef,
    port: Option<Port>,
}

impl Resolver {
    pub fn new(
        config: Arc<GatewayConfig>,
        store: TransactionStoreRef,
        transport: HttpTransportRef,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            port: None,
        }
    }

    /// Builds a resolver and immediately selects `port`.
    pub fn with_port(
        config: Arc<GatewayConfig>,
        store: TransactionStoreRef,
        transport: HttpTransportRef,
        port: impl Into<PortIdentifier>,
    ) -> Result<Self> {
        let mut resolver = Self::new(config, store, transport);
        resolver.make(port)?;
        Ok(resolver)
    }

    pub fn supported_ports(&self) -> &'static [Gateway] {
        &Gateway::ALL
    }

    /// Resolves `port` to a driver, injects the shared collaborators and boots it.
    pub fn make(&mut self, port: impl Into<PortIdentifier>) -> Result<&mut Port> {
        let mut port = match port.into() {
            PortIdentifier::Name(name) => self.build(name.parse()?),
            PortIdentifier::Gateway(gateway) => self.build(gateway),
            PortIdentifier::Instance(port) => *port,
        };
        port.inject(
            self.config.clone(),
            self.store.clone(),
            self.transport.clone(),
        );
        port.boot()?;
        tracing::debug!(gateway = %port.gateway(), "port resolved");

        Ok(self.port.insert(port))
    }

    fn build(&self, gateway: Gateway) -> Port {
        Port::new(
            gateway,
            self.config.clone(),
            self.store.clone(),
            self.transport.clone(),
        )
    }

    pub fn port(&self) -> Result<&Port> {
        self.port.as_ref().ok_or(GatewayError::NoPortSelected)
    }

    pub fn port_mut(&mut self) -> Result<&mut Port> {
        self.port.as_mut().ok_or(GatewayError::NoPortSelected)
    }

    pub fn into_port(self) -> Option<Port> {
        self.port
    }

    /// Forwards `call` to the current driver, or selects a gateway.
    pub async fn dispatch(&mut self, call: PortCall) -> Result<PortReply> {
        let port = match call {
            PortCall::Select(gateway) => {
                self.make(gateway)?;
                return Ok(PortReply::Selected(gateway));
            }
            _ => self.port_mut()?,
        };

        match call {
            PortCall::Select(_) => {}
            PortCall::SetAmount(amount) => {
                port.set(amount)?;
            }
            PortCall::Ready => port.ready().await?,
            PortCall::Redirect => return Ok(PortReply::Redirect(port.redirect()?)),
            PortCall::SetCallback(url) => {
                port.set_callback(url);
            }
            PortCall::SetDescription(description) => {
                port.set_description(description);
            }
            PortCall::SetIp(ip) => {
                port.set_ip(ip);
            }
            PortCall::SetValidCardNumber(card) => {
                port.set_valid_card_number(card);
            }
            PortCall::SetValidCardNumbers(cards) => {
                port.set_valid_card_numbers(cards)?;
            }
        }
        Ok(PortReply::Done)
    }

    /// Callback entry point.
    ///
    /// Loads the transaction named by the request, refuses terminal ones, and
    /// hands it to the driver recorded on the transaction.
    pub async fn verify(&mut self, request: &CallbackRequest) -> Result<Transaction> {
        let id = transaction_id(request)?;

        let transaction = self
            .store
            .find(id)
            .await?
            .ok_or_else(|| GatewayError::TransactionNotFound(id.to_string()))?;

        if transaction.is_terminal() {
            tracing::warn!(transaction_id = id, status = %transaction.status, "callback replay rejected");
            return Err(GatewayError::Retry(id));
        }

        tracing::info!(transaction_id = id, gateway = %transaction.port, "verifying callback");
        let port = self.make(transaction.port)?;
        port.verify(transaction, request).await
    }
}

/// `InvalidRequest` only when neither field is present. A value that is not an
/// id cannot name a stored transaction, so it is reported as not found.
fn transaction_id(request: &CallbackRequest) -> Result<TransactionId> {
    let raw = request
        .get(TRANSACTION_ID_FIELD)
        .or_else(|| request.get(SHORT_TRANSACTION_ID_FIELD))
        .ok_or(GatewayError::InvalidRequest)?;
    raw.trim()
        .parse()
        .map_err(|_| GatewayError::TransactionNotFound(raw.to_string()))
}
