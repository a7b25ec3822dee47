//! Network plumbing shared by the claim, swap and burn paths: balance
//! reads, token-program detection, transaction submission and unit
//! conversions.

use anyhow::{Context, Result};
use solana_client::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, VersionedTransaction};
use spl_associated_token_account::get_associated_token_address_with_program_id;
use tracing::debug;

/// Decimals assumed when an aggregator quote omits them.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

const MAX_SEND_RETRIES: usize = 3;

/// Which token program governs a mint. The network runs two standards with
/// different instruction encodings, selected by the mint account's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStandard {
    Legacy,
    Token2022,
}

impl TokenStandard {
    pub fn from_owner(owner: &Pubkey) -> Self {
        if *owner == spl_token_2022::id() {
            TokenStandard::Token2022
        } else {
            TokenStandard::Legacy
        }
    }

    /// Probes the mint account to find its owning program.
    pub fn detect(rpc: &RpcClient, mint: &Pubkey) -> Result<Self> {
        let account = rpc
            .get_account(mint)
            .context("Mint account not found")?;
        Ok(Self::from_owner(&account.owner))
    }

    pub fn program_id(&self) -> Pubkey {
        match self {
            TokenStandard::Legacy => spl_token::id(),
            TokenStandard::Token2022 => spl_token_2022::id(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TokenStandard::Legacy => "SPL Token",
            TokenStandard::Token2022 => "Token-2022",
        }
    }
}

/// Token holdings in both UI and raw base-unit form.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenBalance {
    pub ui_amount: f64,
    pub raw_amount: u64,
    pub decimals: u8,
}

pub fn sol_balance(rpc: &RpcClient, owner: &Pubkey) -> Result<f64> {
    let lamports = rpc
        .get_balance(owner)
        .context("Failed to fetch SOL balance")?;
    Ok(lamports as f64 / LAMPORTS_PER_SOL as f64)
}

/// Reads the full token balance held by `owner` for `mint`. An absent
/// token account reads as zero rather than an error.
pub fn token_balance(rpc: &RpcClient, owner: &Pubkey, mint: &Pubkey) -> Result<TokenBalance> {
    let standard = TokenStandard::detect(rpc, mint)?;
    let token_account = associated_token_address(owner, mint, standard);

    match rpc.get_token_account_balance(&token_account) {
        Ok(balance) => Ok(TokenBalance {
            ui_amount: balance.ui_amount.unwrap_or(0.0),
            raw_amount: balance.amount.parse().unwrap_or(0),
            decimals: balance.decimals,
        }),
        Err(e) => {
            debug!("Token account {} unreadable ({}), treating as empty", token_account, e);
            Ok(TokenBalance::default())
        }
    }
}

pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey, standard: TokenStandard) -> Pubkey {
    get_associated_token_address_with_program_id(owner, mint, &standard.program_id())
}

/// Submits a signed transaction and waits for confirmation against a
/// just-fetched blockhash, which bounds how long the confirmation poll can
/// run.
pub fn submit_and_confirm(rpc: &RpcClient, tx: &VersionedTransaction) -> Result<Signature> {
    let signature = rpc
        .send_transaction_with_config(tx, send_config())
        .context("Failed to submit transaction")?;
    confirm(rpc, &signature)?;
    Ok(signature)
}

pub fn submit_and_confirm_legacy(rpc: &RpcClient, tx: &Transaction) -> Result<Signature> {
    let signature = rpc
        .send_transaction_with_config(tx, send_config())
        .context("Failed to submit transaction")?;
    confirm(rpc, &signature)?;
    Ok(signature)
}

fn send_config() -> RpcSendTransactionConfig {
    RpcSendTransactionConfig {
        skip_preflight: false,
        preflight_commitment: Some(CommitmentLevel::Confirmed),
        max_retries: Some(MAX_SEND_RETRIES),
        ..Default::default()
    }
}

fn confirm(rpc: &RpcClient, signature: &Signature) -> Result<()> {
    let recent_blockhash = rpc
        .get_latest_blockhash()
        .context("Failed to fetch blockhash for confirmation")?;
    rpc.confirm_transaction_with_spinner(
        signature,
        &recent_blockhash,
        CommitmentConfig::confirmed(),
    )
    .context("Transaction not confirmed")
}

/// SOL → lamports, truncating sub-lamport dust.
pub fn to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).floor() as u64
}

/// Raw base units → UI amount under the given decimal precision.
pub fn from_base_units(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}
