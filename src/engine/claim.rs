//! Creator-fee claiming against the launch platform's trade API.
//!
//! The service builds the claim transaction server-side and returns it
//! unsigned; we sign with the treasury key and submit it ourselves. It has
//! no dedicated status code for "nothing accrued yet", so that case is
//! recognized from the error body text.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::json;
use solana_client::rpc_client::RpcClient;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;
use tracing::debug;

use crate::chain;
use crate::ledger::{ActivityKind, Ledger};

const CLAIM_PRIORITY_FEE_SOL: f64 = 0.0001;

/// Phrasings the service uses for the benign "no accrued fees" case.
const NO_FEES_PHRASES: &[&str] = &["no fees", "nothing to claim", "0 SOL", "No claimable"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed { signature: String },
    NothingToClaim,
}

pub struct FeeClaimer {
    http: Client,
    rpc: Arc<RpcClient>,
    wallet: Arc<Keypair>,
    ledger: Arc<Ledger>,
    api_url: String,
}

impl FeeClaimer {
    pub fn new(
        http: Client,
        rpc: Arc<RpcClient>,
        wallet: Arc<Keypair>,
        ledger: Arc<Ledger>,
        api_url: String,
    ) -> Self {
        Self {
            http,
            rpc,
            wallet,
            ledger,
            api_url,
        }
    }

    pub async fn claim(&self) -> Result<ClaimOutcome> {
        self.ledger.record_activity(
            ActivityKind::Info,
            "Attempting to claim creator fees...",
            None,
        );

        let body = json!({
            "action": "collectCreatorFee",
            "pool": "pump",
            "priorityFee": CLAIM_PRIORITY_FEE_SOL,
            "publicKey": self.wallet.pubkey().to_string(),
        });

        let response = self
            .http
            .post(&self.api_url)
            .json(&body)
            .send()
            .await
            .context("Failed to reach fee claim service")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if is_no_fees_response(&text) {
                debug!("No creator fees accrued");
                return Ok(ClaimOutcome::NothingToClaim);
            }
            bail!("Claim service error {}: {}", status, text);
        }

        // Success body is the raw serialized unsigned transaction.
        let bytes = response
            .bytes()
            .await
            .context("Failed to read claim transaction")?;
        let unsigned: VersionedTransaction = bincode::deserialize(&bytes)
            .context("Claim service returned an unreadable transaction")?;

        let signed = VersionedTransaction::try_new(unsigned.message, &[self.wallet.as_ref()])
            .context("Failed to sign claim transaction")?;
        let signature = chain::submit_and_confirm(&self.rpc, &signed)?;

        self.ledger.record_activity(
            ActivityKind::Claim,
            "Claimed creator fees",
            Some(signature.to_string()),
        );

        Ok(ClaimOutcome::Claimed {
            signature: signature.to_string(),
        })
    }
}

/// True when an error body means "nothing accrued" rather than a failure.
pub(crate) fn is_no_fees_response(body: &str) -> bool {
    NO_FEES_PHRASES.iter().any(|phrase| body.contains(phrase))
}
