use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};
use url::Url;

use crate::domain::{
    repositories::payment_gateway::PaymentGateway,
    value_objects::payment_gateway::{GatewayValidation, PaymentInitRequest},
};

const SANDBOX_BASE_URL: &str = "https://sandbox.sslcommerz.com";
const LIVE_BASE_URL: &str = "https://securepay.sslcommerz.com";
const INIT_PATH: &str = "/gwprocess/v4/api.php";
const VALIDATION_PATH: &str = "/validator/api/validationserverAPI.php";

#[derive(Debug, Clone)]
pub struct SslCommerzConfig {
    pub store_id: String,
    pub store_password: String,
    pub sandbox: bool,
}

/// Minimal SSLCommerz client built on reqwest.
pub struct SslCommerzClient {
    http: reqwest::Client,
    config: SslCommerzConfig,
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    status: String,
    #[serde(default, rename = "failedreason")]
    failed_reason: Option<String>,
    #[serde(default, rename = "GatewayPageURL")]
    gateway_page_url: Option<String>,
}

impl SslCommerzClient {
    pub fn new(config: SslCommerzConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("failed to build sslcommerz http client")?;

        Ok(Self { http, config })
    }

    fn base_url(&self) -> &'static str {
        if self.config.sandbox {
            SANDBOX_BASE_URL
        } else {
            LIVE_BASE_URL
        }
    }

    fn init_form(&self, request: &PaymentInitRequest) -> Vec<(&'static str, String)> {
        vec![
            ("store_id", self.config.store_id.clone()),
            ("store_passwd", self.config.store_password.clone()),
            ("total_amount", format!("{:.2}", request.total_amount)),
            ("currency", "BDT".to_string()),
            ("tran_id", request.tran_id.clone()),
            ("success_url", request.success_url.clone()),
            ("fail_url", request.fail_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("ipn_url", request.ipn_url.clone()),
            ("emi_option", "0".to_string()),
            ("cus_name", request.customer_name.clone()),
            ("cus_email", request.customer_email.clone()),
            ("cus_add1", "Dhaka".to_string()),
            ("cus_city", "Dhaka".to_string()),
            ("cus_country", "Bangladesh".to_string()),
            ("cus_phone", "01700000000".to_string()),
            ("shipping_method", "NO".to_string()),
            ("product_name", request.product_name.clone()),
            ("product_category", "Ticket".to_string()),
            ("product_profile", "general".to_string()),
        ]
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        error!(
            status = %status,
            response_body = %body,
            context = %context,
            "sslcommerz: api request failed"
        );

        anyhow::bail!("SSLCommerz request failed: {} (status {})", context, status);
    }
}

fn gateway_url_from(response: InitResponse) -> Result<String> {
    if response.status.eq_ignore_ascii_case("FAILED") {
        anyhow::bail!(
            "payment init failed: {}",
            response.failed_reason.unwrap_or_else(|| "unknown reason".to_string())
        );
    }

    response
        .gateway_page_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| anyhow::anyhow!("payment init returned no gateway url"))
}

#[async_trait]
impl PaymentGateway for SslCommerzClient {
    async fn init_payment(&self, request: PaymentInitRequest) -> Result<String> {
        let form = self.init_form(&request);

        let resp = self
            .http
            .post(format!("{}{}", self.base_url(), INIT_PATH))
            .form(&form)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "init payment").await?;

        let parsed: InitResponse = resp.json().await?;
        let url = gateway_url_from(parsed)?;

        info!(tran_id = %request.tran_id, "sslcommerz: hosted checkout created");
        Ok(url)
    }

    async fn validate_transaction(&self, val_id: String) -> Result<GatewayValidation> {
        let mut url = Url::parse(&format!("{}{}", self.base_url(), VALIDATION_PATH))?;
        url.query_pairs_mut()
            .append_pair("val_id", &val_id)
            .append_pair("store_id", &self.config.store_id)
            .append_pair("store_passwd", &self.config.store_password)
            .append_pair("format", "json");

        let resp = self.http.get(url).send().await?;
        let resp = Self::ensure_success(resp, "validate transaction").await?;

        let validation: GatewayValidation = resp.json().await?;
        Ok(validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(sandbox: bool) -> SslCommerzClient {
        SslCommerzClient::new(SslCommerzConfig {
            store_id: "store".to_string(),
            store_password: "secret".to_string(),
            sandbox,
        })
        .unwrap()
    }

    #[test]
    fn picks_base_url_by_mode() {
        assert_eq!(client(true).base_url(), SANDBOX_BASE_URL);
        assert_eq!(client(false).base_url(), LIVE_BASE_URL);
    }

    #[test]
    fn init_form_formats_amount_with_two_decimals() {
        let request = PaymentInitRequest {
            tran_id: "TICKET-1-abc".to_string(),
            total_amount: 40.0,
            product_name: "Bus Ticket".to_string(),
            customer_name: "Rider".to_string(),
            customer_email: "rider@example.com".to_string(),
            success_url: "https://api.example/success".to_string(),
            fail_url: "https://api.example/fail".to_string(),
            cancel_url: "https://api.example/cancel".to_string(),
            ipn_url: "https://api.example/ipn".to_string(),
        };
        let form = client(true).init_form(&request);
        let amount = form.iter().find(|(k, _)| *k == "total_amount").unwrap();
        assert_eq!(amount.1, "40.00");
        let tran_id = form.iter().find(|(k, _)| *k == "tran_id").unwrap();
        assert_eq!(tran_id.1, "TICKET-1-abc");
    }

    #[test]
    fn failed_init_surfaces_reason() {
        let response: InitResponse =
            serde_json::from_str(r#"{"status":"FAILED","failedreason":"Store is inactive"}"#)
                .unwrap();
        let err = gateway_url_from(response).unwrap_err();
        assert!(err.to_string().contains("Store is inactive"));
    }

    #[test]
    fn successful_init_returns_gateway_url() {
        let response: InitResponse = serde_json::from_str(
            r#"{"status":"SUCCESS","GatewayPageURL":"https://sandbox.sslcommerz.com/pay/xyz"}"#,
        )
        .unwrap();
        assert_eq!(
            gateway_url_from(response).unwrap(),
            "https://sandbox.sslcommerz.com/pay/xyz"
        );
    }
}
