//! Gateway drivers.
//!
//! Each vendor implements [`Driver`]; [`Port`] is the tagged union the
//! resolver hands out. The match in [`Port::new`] is the only place a gateway
//! is bound to its driver.

pub mod common;
pub mod novinpal;
pub mod payir;
pub mod zarinpal;

pub use self::common::{PortCore, RedirectTarget};
pub use self::novinpal::Novinpal;
pub use self::payir::Payir;
pub use self::zarinpal::Zarinpal;

use crate::config::GatewayConfig;
use crate::domain::amount::Amount;
use crate::domain::gateway::Gateway;
use crate::domain::ports::{HttpTransportRef, TransactionStoreRef};
use crate::domain::request::CallbackRequest;
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use url::Url;

/// The four-stage protocol every vendor implements.
#[async_trait]
pub trait Driver: Send {
    fn core(&self) -> &PortCore;
    fn core_mut(&mut self) -> &mut PortCore;

    /// Records the amount. Pure, no I/O.
    fn set(&mut self, amount: Decimal) -> Result<()> {
        self.core_mut().set_amount(amount)
    }

    /// Opens a pending transaction and requests a reference token from the vendor.
    async fn ready(&mut self) -> Result<()>;

    /// Vendor payment page for the stored reference token.
    fn redirect(&self) -> Result<RedirectTarget>;

    /// Checks the callback parameters and confirms the payment with the vendor.
    ///
    /// The transaction is already attached to the core when this runs.
    async fn verify(&mut self, request: &CallbackRequest) -> Result<Transaction>;

    fn supports_multiple_cards(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub enum Port {
    Novinpal(Novinpal),
    Zarinpal(Zarinpal),
    Payir(Payir),
}

macro_rules! driver {
    ($port:expr, $driver:ident => $body:expr) => {
        match $port {
            Port::Novinpal($driver) => $body,
            Port::Zarinpal($driver) => $body,
            Port::Payir($driver) => $body,
        }
    };
}

impl Port {
    pub fn new(
        gateway: Gateway,
        config: Arc<GatewayConfig>,
        store: TransactionStoreRef,
        transport: HttpTransportRef,
    ) -> Self {
        let core = PortCore::new(gateway, config, store, transport);
        match gateway {
            Gateway::Novinpal => Port::Novinpal(Novinpal::new(core)),
            Gateway::Zarinpal => Port::Zarinpal(Zarinpal::new(core)),
            Gateway::Payir => Port::Payir(Payir::new(core)),
        }
    }

    fn driver(&self) -> &dyn Driver {
        driver!(self, d => d as &dyn Driver)
    }

    fn driver_mut(&mut self) -> &mut dyn Driver {
        driver!(self, d => d as &mut dyn Driver)
    }

    fn core(&self) -> &PortCore {
        self.driver().core()
    }

    fn core_mut(&mut self) -> &mut PortCore {
        self.driver_mut().core_mut()
    }

    pub(crate) fn inject(
        &mut self,
        config: Arc<GatewayConfig>,
        store: TransactionStoreRef,
        transport: HttpTransportRef,
    ) {
        self.core_mut().inject(config, store, transport);
    }

    pub(crate) fn boot(&self) -> Result<()> {
        self.core().boot()
    }

    pub fn gateway(&self) -> Gateway {
        self.core().gateway()
    }

    pub fn set(&mut self, amount: Decimal) -> Result<&mut Self> {
        self.driver_mut().set(amount)?;
        Ok(self)
    }

    pub async fn ready(&mut self) -> Result<()> {
        self.driver_mut().ready().await
    }

    pub fn redirect(&self) -> Result<RedirectTarget> {
        self.driver().redirect()
    }

    /// Verifies a callback for `transaction`.
    ///
    /// Rejects transactions that belong to another gateway or are already terminal.
    pub async fn verify(
        &mut self,
        transaction: Transaction,
        request: &CallbackRequest,
    ) -> Result<Transaction> {
        if transaction.port != self.gateway() {
            return Err(GatewayError::PortNotFound(transaction.port.to_string()));
        }
        if transaction.is_terminal() {
            return Err(GatewayError::Retry(transaction.id));
        }
        self.core_mut().attach(transaction)?;
        self.driver_mut().verify(request).await
    }

    pub fn set_callback(&mut self, url: Url) -> &mut Self {
        self.core_mut().set_callback(url);
        self
    }

    pub fn callback(&self) -> Result<Url> {
        self.core().callback()
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.core_mut().set_description(description);
        self
    }

    pub fn set_ip(&mut self, ip: impl Into<String>) -> &mut Self {
        self.core_mut().set_ip(ip);
        self
    }

    pub fn set_valid_card_number(&mut self, card: impl Into<String>) -> &mut Self {
        self.core_mut().set_valid_card_number(card);
        self
    }

    pub fn set_valid_card_numbers(&mut self, cards: Vec<String>) -> Result<&mut Self> {
        let supports_multiple = self.driver().supports_multiple_cards();
        self.core_mut()
            .set_valid_card_numbers(cards, supports_multiple)?;
        Ok(self)
    }

    pub fn valid_card_numbers(&self) -> &[String] {
        self.core().valid_card_numbers()
    }

    pub fn amount(&self) -> Option<Amount> {
        self.core().amount()
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.core().transaction()
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.core().transaction_id()
    }

    pub fn ref_id(&self) -> Option<&str> {
        self.core().ref_id()
    }

    pub fn tracking_code(&self) -> Option<&str> {
        self.core().tracking_code()
    }

    pub fn card_number(&self) -> Option<&str> {
        self.core().card_number()
    }
}
