//! Environment-driven configuration, validated once at startup.
//!
//! Every fatal misconfiguration (missing variable, malformed key or mint)
//! surfaces here, before the first cycle runs.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use thiserror::Error;

const DEFAULT_CLAIM_API_URL: &str = "https://pumpportal.fun/api/trade-local";
const DEFAULT_QUOTE_API_URL: &str = "https://api.jup.ag/swap/v1/quote";
const DEFAULT_SWAP_API_URL: &str = "https://api.jup.ag/swap/v1/swap";
const DEFAULT_STATS_FILE: &str = "data/stats.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Chain-facing settings, only present outside demo mode.
pub struct ChainConfig {
    pub rpc_url: String,
    /// Operating account used to sign claim, swap and burn transactions.
    pub treasury: Keypair,
    pub token_mint: Pubkey,
    pub jupiter_api_key: String,
    pub claim_api_url: String,
    pub quote_api_url: String,
    pub swap_api_url: String,
}

pub struct Config {
    pub demo_mode: bool,
    pub min_sol_to_swap: f64,
    pub loop_interval: Duration,
    pub dashboard_port: u16,
    pub stats_file: PathBuf,
    pub chain: Option<ChainConfig>,
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// In demo mode the chain credentials are not required and are left
    /// unparsed; everything else falls back to defaults where documented.
    pub fn from_env() -> Result<Self, ConfigError> {
        let demo_mode = env::var("DEMO_MODE").map(|v| v == "true").unwrap_or(false);

        let min_sol_to_swap = parse_or_default("MIN_SOL_TO_SWAP", 0.1)?;
        let interval_secs: u64 = parse_or_default("LOOP_INTERVAL_SECONDS", 60)?;
        let dashboard_port: u16 = parse_or_default("DASHBOARD_PORT", 3001)?;
        let stats_file = env::var("STATS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATS_FILE));

        let chain = if demo_mode {
            None
        } else {
            let rpc_url = required("RPC_URL")?;
            let treasury = parse_treasury_key(&required("TREASURY_PRIVATE_KEY")?)?;
            let token_mint = parse_mint(&required("TOKEN_MINT")?)?;
            let jupiter_api_key = required("JUPITER_API_KEY")?;

            Some(ChainConfig {
                rpc_url,
                treasury,
                token_mint,
                jupiter_api_key,
                claim_api_url: env::var("CLAIM_API_URL")
                    .unwrap_or_else(|_| DEFAULT_CLAIM_API_URL.to_string()),
                quote_api_url: env::var("JUPITER_QUOTE_URL")
                    .unwrap_or_else(|_| DEFAULT_QUOTE_API_URL.to_string()),
                swap_api_url: env::var("JUPITER_SWAP_URL")
                    .unwrap_or_else(|_| DEFAULT_SWAP_API_URL.to_string()),
            })
        };

        Ok(Self {
            demo_mode,
            min_sol_to_swap,
            loop_interval: Duration::from_secs(interval_secs),
            dashboard_port,
            stats_file,
            chain,
        })
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn parse_or_default<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Decodes a base58-encoded 64-byte ed25519 keypair.
fn parse_treasury_key(raw: &str) -> Result<Keypair, ConfigError> {
    let bytes = bs58::decode(raw.trim())
        .into_vec()
        .map_err(|e| ConfigError::Invalid {
            var: "TREASURY_PRIVATE_KEY",
            reason: format!("not valid base58: {}", e),
        })?;

    Keypair::from_bytes(&bytes).map_err(|e| ConfigError::Invalid {
        var: "TREASURY_PRIVATE_KEY",
        reason: format!("not a valid keypair: {}", e),
    })
}

fn parse_mint(raw: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(raw.trim()).map_err(|e| ConfigError::Invalid {
        var: "TOKEN_MINT",
        reason: e.to_string(),
    })
}
