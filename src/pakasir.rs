use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::config::PakasirConfig;

/// Payment methods the gateway accepts for direct (api-mode) transactions.
pub const GATEWAY_PAYMENT_METHODS: [&str; 11] = [
    "cimb_niaga_va",
    "bni_va",
    "qris",
    "sampoerna_va",
    "bnc_va",
    "maybank_va",
    "permata_va",
    "atm_bersama_va",
    "artha_graha_va",
    "bri_va",
    "paypal",
];

pub fn is_gateway_payment_method(method: &str) -> bool {
    GATEWAY_PAYMENT_METHODS.contains(&method)
}

/// `payment` object returned by the transaction-create endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct GatewayPayment {
    pub order_id: Option<String>,
    pub payment_method: Option<String>,
    pub amount: Option<f64>,
    pub fee: Option<f64>,
    pub total_payment: Option<f64>,
    pub payment_number: Option<Value>,
    pub expired_at: Option<String>,
}

/// `transaction` object returned by the transaction-detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct GatewayTransaction {
    pub project: Option<String>,
    pub order_id: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub completed_at: Option<String>,
}

/// Typed view over a gateway response, with the raw payload kept for audit.
#[derive(Debug, Clone)]
pub struct CreateTransactionResponse {
    pub payment: GatewayPayment,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct TransactionDetailResponse {
    pub transaction: GatewayTransaction,
    pub raw: Value,
}

#[derive(Clone)]
pub struct PakasirClient {
    http: reqwest::Client,
    config: PakasirConfig,
}

impl PakasirClient {
    pub fn new(config: PakasirConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn project_slug(&self) -> &str {
        &self.config.project_slug
    }

    pub async fn create_transaction(
        &self,
        payment_method: &str,
        order_id: &str,
        amount: i64,
    ) -> Result<CreateTransactionResponse, reqwest::Error> {
        let url = format!(
            "{}/api/transactioncreate/{payment_method}",
            self.config.base_url.trim_end_matches('/')
        );
        let raw: Value = self
            .http
            .post(url)
            .json(&serde_json::json!({
                "project": self.config.project_slug,
                "order_id": order_id,
                "amount": amount,
                "api_key": self.config.api_key,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let payment = raw
            .get("payment")
            .cloned()
            .map(serde_json::from_value)
            .and_then(Result::ok)
            .unwrap_or_default();

        Ok(CreateTransactionResponse { payment, raw })
    }

    pub async fn transaction_detail(
        &self,
        order_id: &str,
        amount: i64,
    ) -> Result<TransactionDetailResponse, reqwest::Error> {
        let url = format!(
            "{}/api/transactiondetail",
            self.config.base_url.trim_end_matches('/')
        );
        let raw: Value = self
            .http
            .get(url)
            .query(&[
                ("project", self.config.project_slug.as_str()),
                ("amount", &amount.to_string()),
                ("order_id", order_id),
                ("api_key", self.config.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let transaction = raw
            .get("transaction")
            .cloned()
            .map(serde_json::from_value)
            .and_then(Result::ok)
            .unwrap_or_default();

        Ok(TransactionDetailResponse { transaction, raw })
    }

    /// Hosted checkout URL: `{base}/{pay|paypal}/{project}/{amount}?order_id=..`.
    pub fn payment_url(
        &self,
        order_id: &str,
        amount: i64,
        redirect_url: Option<&str>,
        qris_only: bool,
        payment_method: &str,
    ) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let prefix = if payment_method == "paypal" {
            "paypal"
        } else {
            "pay"
        };

        let mut query = format!("order_id={}", urlencode(order_id));
        if let Some(redirect) = redirect_url.filter(|r| !r.is_empty()) {
            query.push_str(&format!("&redirect={}", urlencode(redirect)));
        }
        if qris_only {
            query.push_str("&qris_only=1");
        }

        format!(
            "{base}/{prefix}/{}/{amount}?{query}",
            urlencode(&self.config.project_slug)
        )
    }
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Gateway status vocabulary mapped onto the local `payment_status` one.
pub fn map_gateway_status(status: &str) -> &'static str {
    match status {
        "completed" => "paid",
        "failed" => "failed",
        "refunded" => "refunded",
        _ => "unpaid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PakasirClient {
        PakasirClient::new(PakasirConfig {
            base_url: "https://gateway.test/".into(),
            project_slug: "studio demo".into(),
            api_key: "secret".into(),
        })
        .unwrap()
    }

    #[test]
    fn payment_url_uses_pay_prefix_and_encodes_slug() {
        let url = client().payment_url("INV-1", 150000, None, false, "qris");
        assert_eq!(
            url,
            "https://gateway.test/pay/studio%20demo/150000?order_id=INV-1"
        );
    }

    #[test]
    fn payment_url_paypal_prefix_and_flags() {
        let url = client().payment_url(
            "INV-2",
            50000,
            Some("https://app.test/done"),
            false,
            "paypal",
        );
        assert!(url.starts_with("https://gateway.test/paypal/studio%20demo/50000?"));
        assert!(url.contains("order_id=INV-2"));
        assert!(url.contains("redirect=https%3A%2F%2Fapp.test%2Fdone"));
    }

    #[test]
    fn payment_url_qris_only_flag() {
        let url = client().payment_url("INV-3", 1000, None, true, "qris");
        assert!(url.ends_with("order_id=INV-3&qris_only=1"));
    }

    #[test]
    fn status_mapping_covers_vocabulary() {
        assert_eq!(map_gateway_status("completed"), "paid");
        assert_eq!(map_gateway_status("failed"), "failed");
        assert_eq!(map_gateway_status("refunded"), "refunded");
        assert_eq!(map_gateway_status("pending"), "unpaid");
        assert_eq!(map_gateway_status(""), "unpaid");
    }
}
