use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported payment gateways.
///
/// This enum is the registration table: every variant has exactly one driver
/// in [`crate::drivers::Port`], so the supported set is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    Novinpal,
    Zarinpal,
    Payir,
}

impl Gateway {
    pub const ALL: [Gateway; 3] = [Gateway::Novinpal, Gateway::Zarinpal, Gateway::Payir];

    /// Canonical upper-case port name, as stored on transactions and shown to users.
    pub fn name(self) -> &'static str {
        match self {
            Gateway::Novinpal => "NOVINPAL",
            Gateway::Zarinpal => "ZARINPAL",
            Gateway::Payir => "PAYIR",
        }
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Gateway {
    type Err = GatewayError;

    /// Case-insensitive lookup against [`Gateway::ALL`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gateway::ALL
            .into_iter()
            .find(|gateway| gateway.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| GatewayError::PortNotFound(s.to_string()))
    }
}
