//! Application layer: resolves gateways to drivers and owns the callback flow.

pub mod resolver;
