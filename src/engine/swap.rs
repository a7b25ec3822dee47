//! SOL → token swaps through the Jupiter aggregator.
//!
//! Two-phase protocol: fetch an indicative quote, then post the quote back
//! to receive a ready-to-sign transaction. The quote payload is carried
//! opaquely because the aggregator requires it echoed back verbatim.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_client::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;
use tracing::debug;

use crate::chain::{self, DEFAULT_TOKEN_DECIMALS};
use crate::ledger::{ActivityKind, BotStatus, Ledger};

const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
/// Fixed maximum slippage tolerance, 5%.
const SLIPPAGE_BPS: u16 = 500;
const PRIORITY_FEE_LAMPORTS: u64 = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub tokens_received: f64,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapBuildResponse {
    #[serde(default)]
    swap_transaction: String,
}

pub struct Swapper {
    http: Client,
    rpc: Arc<RpcClient>,
    wallet: Arc<Keypair>,
    ledger: Arc<Ledger>,
    token_mint: Pubkey,
    quote_url: String,
    swap_url: String,
    api_key: String,
}

impl Swapper {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: Client,
        rpc: Arc<RpcClient>,
        wallet: Arc<Keypair>,
        ledger: Arc<Ledger>,
        token_mint: Pubkey,
        quote_url: String,
        swap_url: String,
        api_key: String,
    ) -> Self {
        Self {
            http,
            rpc,
            wallet,
            ledger,
            token_mint,
            quote_url,
            swap_url,
            api_key,
        }
    }

    /// Swaps `sol_amount` of SOL into the target token. Either both phases
    /// complete and the confirmed signature is returned, or no swap happens
    /// at all.
    pub async fn swap(&self, sol_amount: f64) -> Result<SwapOutcome> {
        self.ledger.set_status(BotStatus::Swapping);
        self.ledger.record_activity(
            ActivityKind::Info,
            format!("Swapping {:.4} SOL for tokens...", sol_amount),
            None,
        );

        let lamports = chain::to_lamports(sol_amount);

        // Phase 1: quote
        let quote = self.fetch_quote(lamports).await?;
        if let Some(err) = quote_error(&quote) {
            bail!("No route found: {}", err);
        }
        let expected_output = quote_output_amount(&quote);
        self.ledger.record_activity(
            ActivityKind::Info,
            format!("Quote: ~{:.2} tokens", expected_output),
            None,
        );

        // Phase 2: build, sign, submit
        let build = self.fetch_swap_transaction(&quote).await?;
        if build.swap_transaction.is_empty() {
            bail!("No swap transaction returned");
        }

        let tx_bytes = BASE64
            .decode(&build.swap_transaction)
            .context("Failed to decode swap transaction")?;
        let unsigned: VersionedTransaction =
            bincode::deserialize(&tx_bytes).context("Failed to deserialize swap transaction")?;
        let signed = VersionedTransaction::try_new(unsigned.message, &[self.wallet.as_ref()])
            .context("Failed to sign swap transaction")?;

        self.ledger
            .record_activity(ActivityKind::Info, "Sending swap transaction...", None);
        let signature = chain::submit_and_confirm(&self.rpc, &signed)?;

        self.ledger.record_activity(
            ActivityKind::Swap,
            format!(
                "Swapped {:.4} SOL for {:.2} tokens",
                sol_amount, expected_output
            ),
            Some(signature.to_string()),
        );

        Ok(SwapOutcome {
            tokens_received: expected_output,
            signature: signature.to_string(),
        })
    }

    async fn fetch_quote(&self, lamports: u64) -> Result<Value> {
        debug!(lamports, mint = %self.token_mint, "Requesting swap quote");

        let params = [
            ("inputMint", SOL_MINT.to_string()),
            ("outputMint", self.token_mint.to_string()),
            ("amount", lamports.to_string()),
            ("slippageBps", SLIPPAGE_BPS.to_string()),
        ];

        let response = self
            .http
            .get(&self.quote_url)
            .query(&params)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .context("Failed to request quote")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Quote failed with status {}: {}", status, text);
        }

        response.json().await.context("Failed to parse quote")
    }

    async fn fetch_swap_transaction(&self, quote: &Value) -> Result<SwapBuildResponse> {
        let body = json!({
            "quoteResponse": quote,
            "userPublicKey": self.wallet.pubkey().to_string(),
            "wrapAndUnwrapSol": true,
            "dynamicComputeUnitLimit": true,
            "prioritizationFeeLamports": PRIORITY_FEE_LAMPORTS,
        });

        let response = self
            .http
            .post(&self.swap_url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to request swap transaction")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Swap build failed with status {}: {}", status, text);
        }

        response
            .json()
            .await
            .context("Failed to parse swap build response")
    }
}

fn quote_error(quote: &Value) -> Option<&str> {
    quote.get("error").and_then(Value::as_str)
}

/// Expected output in UI units: `outAmount` base units scaled by the
/// quote's declared decimals, defaulting to 6 when absent.
fn quote_output_amount(quote: &Value) -> f64 {
    let raw = match quote.get("outAmount") {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    };
    let decimals = quote
        .get("outputDecimals")
        .and_then(Value::as_u64)
        .map(|d| d as u8)
        .unwrap_or(DEFAULT_TOKEN_DECIMALS);
    chain::from_base_units(raw, decimals)
}
