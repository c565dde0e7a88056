//! External payment gateway client.
//!
//! The gateway is the source of truth for payment status and amount. The
//! reconciler receives an implementation of [`PaymentGateway`] at
//! construction, which keeps the entities free of I/O and lets tests swap in
//! a scripted gateway.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::GatewayConfig;
use crate::entities::payment_attempt::PayStatus;

/// Gateway call failure. Transport problems (including timeouts) and
/// application-level rejections are distinct here, but callers treat both as
/// "verification unavailable".
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway rejected request (code {code}): {message}")]
    Api { code: i64, message: String },
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// Verified payment record as reported by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub status: PayStatus,
    pub amount: i64,
    /// Full payload exactly as the gateway returned it.
    pub raw: Value,
}

/// Lookup contract of the external gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Fetches the payment record keyed by the merchant-facing uid.
    async fn lookup(&self, merchant_uid: &str) -> Result<GatewayPayment, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: i64,
    message: Option<String>,
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

fn envelope_response(envelope: ApiEnvelope) -> Result<Value, GatewayError> {
    if envelope.code != 0 {
        return Err(GatewayError::Api {
            code: envelope.code,
            message: envelope
                .message
                .unwrap_or_else(|| "unknown gateway error".to_string()),
        });
    }
    envelope.response.ok_or(GatewayError::Api {
        code: -1,
        message: "gateway response body missing".to_string(),
    })
}

/// Parses the `response` object of a payment lookup into a
/// [`GatewayPayment`]. A payload without a recognised status or an integer
/// amount counts as an application-level rejection.
fn payment_from_response(raw: Value) -> Result<GatewayPayment, GatewayError> {
    let status = raw
        .get("status")
        .and_then(Value::as_str)
        .and_then(PayStatus::from_gateway)
        .ok_or(GatewayError::Api {
            code: -1,
            message: "gateway payload carries no recognised status".to_string(),
        })?;
    let amount = raw
        .get("amount")
        .and_then(Value::as_i64)
        .ok_or(GatewayError::Api {
            code: -1,
            message: "gateway payload carries no integer amount".to_string(),
        })?;
    Ok(GatewayPayment {
        status,
        amount,
        raw,
    })
}

/// PortOne-style REST client: token request with the configured key/secret,
/// then payment lookup by merchant uid. Every request carries the configured
/// timeout; expiry surfaces as a transport error.
#[derive(Debug, Clone)]
pub struct PortoneClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl PortoneClient {
    pub fn new(cfg: &GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            api_secret: cfg.api_secret.clone(),
        })
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let envelope: ApiEnvelope = self
            .http
            .post(format!("{}/users/getToken", self.base_url))
            .json(&serde_json::json!({
                "imp_key": self.api_key,
                "imp_secret": self.api_secret,
            }))
            .send()
            .await?
            .json()
            .await?;
        let response = envelope_response(envelope)?;
        let token: TokenResponse =
            serde_json::from_value(response).map_err(|e| GatewayError::Api {
                code: -1,
                message: format!("malformed token response: {}", e),
            })?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentGateway for PortoneClient {
    #[instrument(skip(self))]
    async fn lookup(&self, merchant_uid: &str) -> Result<GatewayPayment, GatewayError> {
        let token = self.access_token().await?;
        debug!(merchant_uid, "looking up payment at gateway");
        let envelope: ApiEnvelope = self
            .http
            .get(format!(
                "{}/payments/find/{}",
                self.base_url, merchant_uid
            ))
            .bearer_auth(token)
            .send()
            .await?
            .json()
            .await?;
        payment_from_response(envelope_response(envelope)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn lookup_payload_parses_status_and_amount() {
        let raw = json!({
            "merchant_uid": "11111111-2222-3333-4444-555555555555",
            "status": "paid",
            "amount": 2500,
            "pay_method": "card",
        });
        let payment = payment_from_response(raw.clone()).unwrap();
        assert_eq!(payment.status, PayStatus::Paid);
        assert_eq!(payment.amount, 2500);
        assert_eq!(payment.raw, raw);
    }

    #[test]
    fn unknown_status_is_an_api_error() {
        let raw = json!({ "status": "refunded", "amount": 100 });
        assert_matches!(
            payment_from_response(raw),
            Err(GatewayError::Api { .. })
        );
    }

    #[test]
    fn non_zero_envelope_code_is_rejected() {
        let envelope = ApiEnvelope {
            code: 1,
            message: Some("payment record not found".to_string()),
            response: None,
        };
        assert_matches!(
            envelope_response(envelope),
            Err(GatewayError::Api { code: 1, .. })
        );
    }
}
