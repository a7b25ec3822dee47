use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use solana_client::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signer;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pyre::config::{ChainConfig, Config};
use pyre::engine::{Burner, Engine, FeeClaimer, Swapper, TreasuryBalances};
use pyre::ledger::store::StatsStore;
use pyre::{dashboard, demo, Ledger};

fn init_tracing() -> Result<()> {
    // Create logs directory if it doesn't exist
    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::daily("logs", "pyre.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
        .compact();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .json()
        .with_current_span(false)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Keep the file appender alive for the process lifetime
    std::mem::forget(guard);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    info!("🔥 Pyre - buyback & burn bot");
    info!("============================");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let ledger = Arc::new(Ledger::new(StatsStore::new(config.stats_file.clone())));
    let _dashboard = dashboard::start_server(Arc::clone(&ledger), config.dashboard_port).await?;

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let worker: tokio::task::JoinHandle<Result<()>> = if let Some(chain_cfg) = config.chain {
        let ChainConfig {
            rpc_url,
            treasury,
            token_mint,
            jupiter_api_key,
            claim_api_url,
            quote_api_url,
            swap_api_url,
        } = chain_cfg;

        let rpc = Arc::new(RpcClient::new_with_commitment(
            rpc_url,
            CommitmentConfig::confirmed(),
        ));
        let wallet = Arc::new(treasury);
        info!("Treasury wallet: {}", wallet.pubkey());
        info!("Target token mint: {}", token_mint);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let claimer = FeeClaimer::new(
            http.clone(),
            Arc::clone(&rpc),
            Arc::clone(&wallet),
            Arc::clone(&ledger),
            claim_api_url,
        );
        let swapper = Swapper::new(
            http,
            Arc::clone(&rpc),
            Arc::clone(&wallet),
            Arc::clone(&ledger),
            token_mint,
            quote_api_url,
            swap_api_url,
            jupiter_api_key,
        );
        let burner = Burner::new(
            Arc::clone(&rpc),
            Arc::clone(&wallet),
            Arc::clone(&ledger),
            token_mint,
        );
        let balances = TreasuryBalances::new(Arc::clone(&rpc), wallet.pubkey(), token_mint);

        let engine = Engine::new(
            Arc::clone(&ledger),
            Box::new(claimer),
            Box::new(swapper),
            Box::new(burner),
            Box::new(balances),
            config.min_sol_to_swap,
            config.loop_interval,
        );

        tokio::spawn(engine.run(shutdown_tx.subscribe()))
    } else {
        info!("⚠️  Demo mode - dashboard only, no real transactions");
        let demo_ledger = Arc::clone(&ledger);
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            demo::run(demo_ledger, shutdown_rx).await;
            Ok(())
        })
    };

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    let _ = shutdown_tx.send(());
    match worker.await {
        Ok(Ok(())) => info!("Worker shut down cleanly"),
        Ok(Err(e)) => warn!("Worker error during shutdown: {}", e),
        Err(e) => error!("Worker task failed: {}", e),
    }

    info!("Shutdown complete");
    Ok(())
}
