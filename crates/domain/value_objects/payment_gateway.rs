use serde::{Deserialize, Serialize};

/// Hosted-checkout request for one gateway transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentInitRequest {
    pub tran_id: String,
    pub total_amount: f64,
    pub product_name: String,
    pub customer_name: String,
    pub customer_email: String,
    pub success_url: String,
    pub fail_url: String,
    pub cancel_url: String,
    pub ipn_url: String,
}

/// Server-to-server validation answer for a `val_id`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayValidation {
    pub status: String,
    #[serde(default)]
    pub tran_id: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub risk_level: Option<String>,
}

impl GatewayValidation {
    pub fn is_valid(&self) -> bool {
        is_valid_status(&self.status)
    }

    pub fn parsed_amount(&self) -> Option<f64> {
        self.amount.trim().parse::<f64>().ok()
    }
}

pub fn is_valid_status(status: &str) -> bool {
    matches!(status, "VALID" | "VALIDATED")
}

/// Form fields posted by the gateway (IPN and browser redirects).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentNotification {
    pub tran_id: Option<String>,
    pub val_id: Option<String>,
    pub amount: Option<String>,
    pub status: Option<String>,
    pub risk_level: Option<String>,
}

/// A confirmation call after the payload has been parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfirmation {
    pub val_id: String,
    pub tran_id: String,
    pub amount: f64,
}

/// Redirect and notification targets handed to the gateway at checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackUrls {
    pub success_url: String,
    pub fail_url: String,
    pub cancel_url: String,
    pub ipn_url: String,
}

impl CallbackUrls {
    pub fn tickets(public_base_url: &str) -> Self {
        let base = public_base_url.trim_end_matches('/');
        Self {
            success_url: format!("{base}/api/v1/tickets/payment/success"),
            fail_url: format!("{base}/api/v1/tickets/payment/fail"),
            cancel_url: format!("{base}/api/v1/tickets/payment/cancel"),
            ipn_url: format!("{base}/api/v1/tickets/payment/ipn"),
        }
    }

    /// Recharges share the ticket IPN endpoint; it dispatches on the `tran_id` prefix.
    pub fn recharge(public_base_url: &str) -> Self {
        let base = public_base_url.trim_end_matches('/');
        Self {
            success_url: format!("{base}/api/v1/wallet/recharge/success"),
            fail_url: format!("{base}/api/v1/wallet/recharge/fail"),
            cancel_url: format!("{base}/api/v1/wallet/recharge/cancel"),
            ipn_url: format!("{base}/api/v1/tickets/payment/ipn"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_valid_and_validated_pass() {
        assert!(is_valid_status("VALID"));
        assert!(is_valid_status("VALIDATED"));
        assert!(!is_valid_status("FAILED"));
        assert!(!is_valid_status("valid"));
    }

    #[test]
    fn amount_is_parsed_from_gateway_string() {
        let validation = GatewayValidation {
            status: "VALID".to_string(),
            tran_id: "TICKET-1-x".to_string(),
            amount: "40.00".to_string(),
            risk_level: Some("0".to_string()),
        };
        assert_eq!(validation.parsed_amount(), Some(40.0));
    }

    #[test]
    fn recharge_callbacks_share_ticket_ipn() {
        let tickets = CallbackUrls::tickets("https://transit.example/");
        let recharge = CallbackUrls::recharge("https://transit.example");
        assert_eq!(tickets.ipn_url, "https://transit.example/api/v1/tickets/payment/ipn");
        assert_eq!(recharge.ipn_url, tickets.ipn_url);
        assert_eq!(
            recharge.success_url,
            "https://transit.example/api/v1/wallet/recharge/success"
        );
    }
}
