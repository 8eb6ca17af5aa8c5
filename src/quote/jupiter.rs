//! Jupiter aggregator client.
//!
//! `GET /quote` for pricing and `POST /swap` to exchange a quote for an
//! unsigned versioned transaction. Requests go through a governor rate
//! limiter; nothing here retries, so an expired quote always surfaces to the
//! caller and has to be replaced by a new one.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use std::num::NonZeroU32;
use tracing::{debug, instrument, warn};

use crate::config::AggregatorConfig;
use crate::error::QuoteError;
use crate::quote::types::{Quote, QuoteRequest, UnsignedTransaction};
use crate::quote::QuoteSource;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
    #[serde(default)]
    last_valid_block_height: Option<u64>,
}

/// How a non-success `/swap` status should be reported. The response body is
/// aggregator-controlled and only ever logged.
pub fn classify_swap_status(status: StatusCode, body: &str) -> QuoteError {
    debug!("Swap response body: {}", body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        QuoteError::TransactionBuild {
            reason: format!("aggregator returned {}", status),
            transient: true,
        }
    } else if status.is_client_error() {
        QuoteError::Expired(format!("aggregator rejected the quote ({})", status))
    } else {
        QuoteError::TransactionBuild {
            reason: format!("unexpected aggregator status {}", status),
            transient: false,
        }
    }
}

/// QuoteSource backed by the Jupiter HTTP API.
pub struct JupiterQuoteSource {
    http_client: Client,
    config: AggregatorConfig,
    limiter: DefaultDirectRateLimiter,
}

impl JupiterQuoteSource {
    pub fn new(http_client: Client, config: AggregatorConfig) -> Self {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(per_second));
        Self {
            http_client,
            config,
            limiter,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl QuoteSource for JupiterQuoteSource {
    #[instrument(skip(self), fields(input = %request.input_mint, output = %request.output_mint, amount = request.amount))]
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError> {
        request.validate(self.config.max_slippage_bps)?;
        self.limiter.until_ready().await;

        let response = self
            .http_client
            .get(self.endpoint("quote"))
            .query(&[
                ("inputMint", request.input_mint.to_string()),
                ("outputMint", request.output_mint.to_string()),
                ("amount", request.amount.to_string()),
                ("slippageBps", request.slippage_bps.to_string()),
            ])
            .timeout(self.config.quote_timeout())
            .send()
            .await
            .map_err(|e| {
                debug!("Quote request error: {}", e);
                QuoteError::Unavailable("aggregator unreachable".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Quote request failed with status {}", status);
            return Err(QuoteError::Unavailable(format!("aggregator returned {}", status)));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|_| QuoteError::Unavailable("aggregator returned invalid JSON".to_string()))?;

        let quote = Quote::from_aggregator_json(raw, request, self.config.max_slippage_bps)?;
        debug!(
            out_amount = quote.out_amount(),
            price_impact_pct = quote.price_impact_pct(),
            hops = quote.route_hops(),
            "Received quote"
        );
        Ok(quote)
    }

    #[instrument(skip(self, quote), fields(user = %user))]
    async fn build_signable_transaction(
        &self,
        quote: &Quote,
        user: &Pubkey,
    ) -> Result<UnsignedTransaction, QuoteError> {
        let ttl = self.config.quote_ttl();
        if quote.is_expired(ttl) {
            return Err(QuoteError::Expired(format!(
                "quote is {} ms old, limit is {} ms",
                quote.age().as_millis(),
                ttl.as_millis()
            )));
        }

        self.limiter.until_ready().await;

        let body = json!({
            "quoteResponse": quote.raw(),
            "userPublicKey": user.to_string(),
            "wrapAndUnwrapSol": true,
            "dynamicComputeUnitLimit": true,
        });

        let response = self
            .http_client
            .post(self.endpoint("swap"))
            .json(&body)
            .timeout(self.config.build_timeout())
            .send()
            .await
            .map_err(|e| {
                debug!("Swap request error: {}", e);
                QuoteError::TransactionBuild {
                    reason: "aggregator unreachable".to_string(),
                    transient: true,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Swap build failed with status {}", status);
            return Err(classify_swap_status(status, &text));
        }

        let swap: SwapResponse = response.json().await.map_err(|e| {
            debug!("Swap response decode error: {}", e);
            QuoteError::TransactionBuild {
                reason: "malformed swap response".to_string(),
                transient: false,
            }
        })?;

        let unsigned = UnsignedTransaction::from_base64(&swap.swap_transaction, swap.last_valid_block_height)?;
        debug!(
            blockhash = %unsigned.recent_blockhash(),
            last_valid_block_height = ?unsigned.last_valid_block_height(),
            "Built unsigned swap transaction"
        );
        Ok(unsigned)
    }
}
