pub mod application;
pub mod config;
pub mod domain;
pub mod drivers;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

pub use application::resolver::{PortCall, PortIdentifier, PortReply, Resolver};
pub use config::{GatewayConfig, VendorConfig};
pub use domain::gateway::Gateway;
pub use domain::request::CallbackRequest;
pub use domain::transaction::{Transaction, TransactionStatus};
pub use drivers::{Port, RedirectTarget};
pub use error::{GatewayError, Result, VendorError};
