//! Swap-routing API client
//!
//! HTTP client for a PumpPortal-style trade endpoint. The service
//! routes the swap, signs, and submits; we only see the realized
//! output amount and signature.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SwapApiConfig;
use crate::error::{Error, Result};
use crate::trading::gateway::{ExecutionGateway, SwapDirection, SwapReceipt, SwapRequest};

/// Error codes the API uses for permanently untradable tokens
const SCAM_ERROR_CODES: &[&str] = &["SCAM_TOKEN", "PROGRAM_NOT_EXECUTABLE", "INVALID_ACCOUNT_OWNER"];

/// Trade request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TradeRequest {
    action: SwapDirection,
    mint: String,
    /// SOL for buys, token quantity for sells
    amount: String,
    denominated_in_sol: bool,
    /// Slippage percentage
    slippage: f64,
}

/// Trade response body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradeResponse {
    signature: Option<String>,
    output_amount: Option<f64>,
    error: Option<String>,
    error_code: Option<String>,
}

/// Swap-routing API client
pub struct SwapApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SwapApiClient {
    pub fn new(config: &SwapApiConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    async fn execute(&self, request: &SwapRequest) -> Result<SwapReceipt> {
        let body = TradeRequest {
            action: request.direction,
            mint: request.token_address.clone(),
            amount: request.amount.to_string(),
            denominated_in_sol: request.direction == SwapDirection::Buy,
            slippage: request.slippage_pct,
        };

        debug!(
            "Submitting {:?} for {} (amount {})",
            request.direction, request.token_address, request.amount
        );

        let response = self
            .client
            .post(format!("{}/trade?api-key={}", self.base_url, self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::SwapFailed(format!("HTTP request failed: {}", e)))?;

        let trade: TradeResponse = response
            .json()
            .await
            .map_err(|e| Error::SwapFailed(format!("Failed to parse response: {}", e)))?;

        if let Some(code) = &trade.error_code {
            if SCAM_ERROR_CODES.contains(&code.as_str()) {
                return Err(Error::ScamDetected(format!(
                    "{}: {}",
                    request.token_address,
                    trade.error.unwrap_or_else(|| code.clone())
                )));
            }
        }

        if let Some(error) = trade.error {
            return Err(Error::SwapFailed(error));
        }

        let signature = trade
            .signature
            .ok_or_else(|| Error::SwapFailed("No signature in response".to_string()))?;
        let output_amount = trade
            .output_amount
            .ok_or_else(|| Error::SwapFailed("No output amount in response".to_string()))?;

        info!(
            "Swap {:?} {} filled: {} out, sig {}",
            request.direction, request.token_address, output_amount, signature
        );

        Ok(SwapReceipt {
            output_amount,
            signature,
        })
    }
}

#[async_trait]
impl ExecutionGateway for SwapApiClient {
    async fn swap(&self, request: &SwapRequest) -> Result<SwapReceipt> {
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_request_serialization() {
        let body = TradeRequest {
            action: SwapDirection::Buy,
            mint: "DYw8jCTfwHNRJhhmFcbXvVDTqWMEVFBX6ZKUmG5CNSKK".to_string(),
            amount: "0.1".to_string(),
            denominated_in_sol: true,
            slippage: 5.0,
        };

        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"action\":\"buy\""));
        assert!(json.contains("\"denominatedInSol\":true"));
    }

    #[test]
    fn test_scam_code_recognized() {
        let raw = r#"{"error":"program not executable","errorCode":"SCAM_TOKEN"}"#;
        let trade: TradeResponse = serde_json::from_str(raw).unwrap();
        assert!(SCAM_ERROR_CODES.contains(&trade.error_code.unwrap().as_str()));
    }

    #[test]
    fn test_response_with_fill_parses() {
        let raw = r#"{"signature":"5abc","outputAmount":1234.5}"#;
        let trade: TradeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(trade.signature.as_deref(), Some("5abc"));
        assert!((trade.output_amount.unwrap() - 1234.5).abs() < 1e-9);
        assert!(trade.error.is_none());
    }
}
