use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wallet,
    Gateway,
    Rfid,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Gateway => "gateway",
            PaymentMethod::Rfid => "rfid",
            PaymentMethod::Cash => "cash",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wallet" => Some(PaymentMethod::Wallet),
            "gateway" => Some(PaymentMethod::Gateway),
            "rfid" => Some(PaymentMethod::Rfid),
            "cash" => Some(PaymentMethod::Cash),
            _ => None,
        }
    }

    /// Riders can only buy through the purchase pipeline with these two.
    pub fn is_purchasable(&self) -> bool {
        matches!(self, PaymentMethod::Wallet | PaymentMethod::Gateway)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
