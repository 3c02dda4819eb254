//! Domain types and the ports the application layer depends on.

pub mod amount;
pub mod gateway;
pub mod ports;
pub mod request;
pub mod transaction;
