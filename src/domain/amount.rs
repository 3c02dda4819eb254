use crate::error::GatewayError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a positive payment amount as requested by the caller.
///
/// Vendors usually expect an integer in their own unit; see [`Amount::to_vendor_units`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, GatewayError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(GatewayError::InvalidAmount(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Converts to the integer unit a vendor expects, multiplying by `factor`.
    ///
    /// Fractions left after scaling are rounded half away from zero.
    pub fn to_vendor_units(self, factor: Decimal) -> Result<i64, GatewayError> {
        let scaled = self
            .0
            .checked_mul(factor)
            .ok_or_else(|| GatewayError::InvalidAmount(format!("{} overflows", self.0)))?;
        scaled
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| GatewayError::InvalidAmount(format!("{scaled} is out of range")))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = GatewayError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
