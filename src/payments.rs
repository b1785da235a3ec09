//! Toss Payments REST client (server-side confirm and cancel).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct TossClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmBody<'a> {
    payment_key: &'a str,
    order_id: &'a str,
    amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody<'a> {
    cancel_reason: &'a str,
}

/// Subset of the Payment object returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub payment_key: String,
    pub order_id: String,
    pub status: String,
    #[serde(default)]
    pub total_amount: i64,
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    code: Option<String>,
    message: Option<String>,
}

impl TossClient {
    pub fn new(base_url: &str, secret_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    pub async fn confirm(
        &self,
        payment_key: &str,
        order_id: &str,
        amount: i64,
    ) -> Result<Payment, AppError> {
        let url = format!("{}/v1/payments/confirm", self.base_url);
        let body = ConfirmBody {
            payment_key,
            order_id,
            amount,
        };
        self.post(&url, &body).await
    }

    pub async fn cancel(&self, payment_key: &str, reason: &str) -> Result<Payment, AppError> {
        let url = self.cancel_url(payment_key);
        let body = CancelBody {
            cancel_reason: reason,
        };
        self.post(&url, &body).await
    }

    /// The payment key comes from the browser, so it is escaped before it
    /// lands in the path.
    fn cancel_url(&self, payment_key: &str) -> String {
        format!(
            "{}/v1/payments/{}/cancel",
            self.base_url,
            urlencoding::encode(payment_key)
        )
    }

    async fn post<B: Serialize>(&self, url: &str, body: &B) -> Result<Payment, AppError> {
        // Basic auth with the secret key as username and an empty password.
        let resp = self
            .http
            .post(url)
            .basic_auth(&self.secret_key, Some(""))
            .json(body)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, url, "payment gateway unreachable");
                AppError::Payment("payment gateway unreachable".into())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let err = resp.json::<GatewayError>().await.ok();
            let code = err.as_ref().and_then(|e| e.code.clone()).unwrap_or_default();
            let message = err
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("gateway responded with {status}"));
            tracing::warn!(%status, code = %code, message = %message, "payment gateway rejected request");
            return Err(AppError::Payment(message));
        }

        resp.json::<Payment>().await.map_err(|err| {
            AppError::Internal(anyhow::anyhow!("invalid payment gateway response: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_url_escapes_payment_key() {
        let client = TossClient::new("https://api.tosspayments.com/", "test_sk");
        assert_eq!(
            client.cancel_url("tgen_2024"),
            "https://api.tosspayments.com/v1/payments/tgen_2024/cancel"
        );
        assert_eq!(
            client.cancel_url("../confirm?x=1"),
            "https://api.tosspayments.com/v1/payments/..%2Fconfirm%3Fx%3D1/cancel"
        );
    }
}
