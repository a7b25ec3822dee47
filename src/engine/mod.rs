//! Cycle orchestrator: claim → balance check → swap → burn on a fixed
//! timer. The timer is the only retry mechanism; a failed step surfaces in
//! the activity feed and the next tick starts fresh.

pub mod burn;
pub mod claim;
pub mod swap;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use solana_client::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::chain;
use crate::ledger::{ActivityKind, Balances, BotStatus, Ledger};

pub use burn::{BurnOutcome, Burner};
pub use claim::{ClaimOutcome, FeeClaimer};
pub use swap::{SwapOutcome, Swapper};

/// SOL held back from every swap to keep the treasury able to pay
/// transaction fees.
pub const FEE_RESERVE_SOL: f64 = 0.01;

/// Pause after a claim or swap lands, letting upstream balance state settle
/// before it is read back.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

#[async_trait]
pub trait ClaimFees: Send + Sync {
    async fn claim(&self) -> Result<ClaimOutcome>;
}

#[async_trait]
pub trait SwapSol: Send + Sync {
    async fn swap(&self, sol_amount: f64) -> Result<SwapOutcome>;
}

#[async_trait]
pub trait BurnTokens: Send + Sync {
    async fn burn_all(&self) -> Result<BurnOutcome>;
}

#[async_trait]
pub trait ReportBalances: Send + Sync {
    async fn fetch(&self) -> Result<Balances>;
}

#[async_trait]
impl ClaimFees for FeeClaimer {
    async fn claim(&self) -> Result<ClaimOutcome> {
        FeeClaimer::claim(self).await
    }
}

#[async_trait]
impl SwapSol for Swapper {
    async fn swap(&self, sol_amount: f64) -> Result<SwapOutcome> {
        Swapper::swap(self, sol_amount).await
    }
}

#[async_trait]
impl BurnTokens for Burner {
    async fn burn_all(&self) -> Result<BurnOutcome> {
        Burner::burn_all(self).await
    }
}

/// Live balance reporter for the treasury account.
pub struct TreasuryBalances {
    rpc: Arc<RpcClient>,
    owner: Pubkey,
    mint: Pubkey,
}

impl TreasuryBalances {
    pub fn new(rpc: Arc<RpcClient>, owner: Pubkey, mint: Pubkey) -> Self {
        Self { rpc, owner, mint }
    }
}

#[async_trait]
impl ReportBalances for TreasuryBalances {
    async fn fetch(&self) -> Result<Balances> {
        let sol = chain::sol_balance(&self.rpc, &self.owner)?;
        let tokens = chain::token_balance(&self.rpc, &self.owner, &self.mint)?;
        Ok(Balances {
            sol_balance: sol,
            token_balance: tokens.ui_amount,
        })
    }
}

/// SOL committed to the next swap, or `None` when the balance has not
/// cleared the threshold. The fee reserve is always held back.
pub fn swap_budget(sol_balance: f64, min_sol_to_swap: f64) -> Option<f64> {
    if sol_balance >= min_sol_to_swap {
        Some(sol_balance - FEE_RESERVE_SOL)
    } else {
        None
    }
}

pub struct Engine {
    ledger: Arc<Ledger>,
    claimer: Box<dyn ClaimFees>,
    swapper: Box<dyn SwapSol>,
    burner: Box<dyn BurnTokens>,
    balances: Box<dyn ReportBalances>,
    min_sol_to_swap: f64,
    loop_interval: Duration,
    settle_delay: Duration,
    is_processing: bool,
}

impl Engine {
    pub fn new(
        ledger: Arc<Ledger>,
        claimer: Box<dyn ClaimFees>,
        swapper: Box<dyn SwapSol>,
        burner: Box<dyn BurnTokens>,
        balances: Box<dyn ReportBalances>,
        min_sol_to_swap: f64,
        loop_interval: Duration,
    ) -> Self {
        Self {
            ledger,
            claimer,
            swapper,
            burner,
            balances,
            min_sol_to_swap,
            loop_interval,
            settle_delay: SETTLE_DELAY,
            is_processing: false,
        }
    }

    /// Drives cycles on a fixed cadence until the shutdown signal arrives.
    /// A tick that finds a cycle still in flight is skipped, never queued.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!(
            interval_secs = self.loop_interval.as_secs(),
            min_sol_to_swap = self.min_sol_to_swap,
            "Starting buyback & burn loop"
        );

        if let Err(e) = self.refresh_balances().await {
            debug!("Initial balance refresh failed: {:#}", e);
        }
        self.ledger.record_activity(
            ActivityKind::Info,
            "Bot started - watching for creator fees...",
            None,
        );

        let mut ticker = interval(self.loop_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.is_processing {
                        debug!("Previous cycle still in flight, skipping tick");
                        continue;
                    }
                    self.cycle().await;
                }
                _ = shutdown.recv() => {
                    info!("Engine shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// One full claim → check → swap → burn iteration. Per-step failures
    /// are recorded in the activity feed; the cycle always finishes its
    /// balance refresh and returns to idle.
    async fn cycle(&mut self) {
        self.is_processing = true;
        self.ledger.set_status(BotStatus::Checking);

        match self.claimer.claim().await {
            Ok(ClaimOutcome::Claimed { .. }) => {
                // Claimed lamports take a moment to land in the balance.
                tokio::time::sleep(self.settle_delay).await;
            }
            Ok(ClaimOutcome::NothingToClaim) => {
                debug!("No creator fees to claim this tick");
            }
            Err(e) => {
                self.ledger.record_activity(
                    ActivityKind::Error,
                    format!("Claim failed: {:#}", e),
                    None,
                );
            }
        }

        if let Err(e) = self.refresh_balances().await {
            self.ledger.record_activity(
                ActivityKind::Error,
                format!("Balance refresh failed: {:#}", e),
                None,
            );
        }

        let sol_balance = self.ledger.balances().sol_balance;
        if let Some(budget) = swap_budget(sol_balance, self.min_sol_to_swap) {
            self.ledger.record_activity(
                ActivityKind::Info,
                format!("{:.4} SOL available - starting buyback...", sol_balance),
                None,
            );
            self.buyback(budget).await;
        } else {
            debug!(
                sol_balance,
                threshold = self.min_sol_to_swap,
                "Balance below swap threshold, skipping"
            );
        }

        if let Err(e) = self.refresh_balances().await {
            self.ledger.record_activity(
                ActivityKind::Error,
                format!("Balance refresh failed: {:#}", e),
                None,
            );
        }

        self.is_processing = false;
        self.ledger.set_status(BotStatus::Idle);
    }

    async fn buyback(&self, budget: f64) {
        let swap = match self.swapper.swap(budget).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.ledger.set_status(BotStatus::Error);
                self.ledger.record_activity(
                    ActivityKind::Error,
                    format!("Swap failed: {:#}", e),
                    None,
                );
                return;
            }
        };
        debug!(signature = %swap.signature, "Swap confirmed");

        // Swapped tokens take a moment to land in the token account.
        tokio::time::sleep(self.settle_delay).await;

        match self.burner.burn_all().await {
            Ok(BurnOutcome::Burned { amount, signature }) => {
                self.ledger.record_burn(budget, amount, &signature);
            }
            Ok(BurnOutcome::NothingToBurn) => {
                debug!("Nothing to burn after swap");
            }
            Err(e) => {
                self.ledger.set_status(BotStatus::Error);
                self.ledger.record_activity(
                    ActivityKind::Error,
                    format!("Burn failed: {:#}", e),
                    None,
                );
            }
        }
    }

    async fn refresh_balances(&self) -> Result<()> {
        let balances = self.balances.fetch().await?;
        self.ledger
            .set_balances(balances.sol_balance, balances.token_balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::store::StatsStore;
    use crate::ledger::FeedEvent;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubClaimer {
        outcome: Box<dyn Fn() -> Result<ClaimOutcome> + Send + Sync>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ClaimFees for StubClaimer {
        async fn claim(&self) -> Result<ClaimOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    struct StubSwapper {
        calls: Arc<Mutex<Vec<f64>>>,
        succeed: bool,
    }

    #[async_trait]
    impl SwapSol for StubSwapper {
        async fn swap(&self, sol_amount: f64) -> Result<SwapOutcome> {
            self.calls.lock().unwrap().push(sol_amount);
            if self.succeed {
                Ok(SwapOutcome {
                    tokens_received: 1000.0,
                    signature: "swap-sig".to_string(),
                })
            } else {
                Err(anyhow!("aggregator unavailable"))
            }
        }
    }

    struct StubBurner {
        outcome: Box<dyn Fn() -> Result<BurnOutcome> + Send + Sync>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BurnTokens for StubBurner {
        async fn burn_all(&self) -> Result<BurnOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    struct StubBalances {
        sol: f64,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReportBalances for StubBalances {
        async fn fetch(&self) -> Result<Balances> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Balances {
                sol_balance: self.sol,
                token_balance: 0.0,
            })
        }
    }

    struct Harness {
        engine: Engine,
        ledger: Arc<Ledger>,
        claim_calls: Arc<AtomicUsize>,
        swap_calls: Arc<Mutex<Vec<f64>>>,
        burn_calls: Arc<AtomicUsize>,
        balance_calls: Arc<AtomicUsize>,
        _dir: tempfile::TempDir,
    }

    fn harness(
        sol_balance: f64,
        min_sol: f64,
        claim: impl Fn() -> Result<ClaimOutcome> + Send + Sync + 'static,
        swap_succeeds: bool,
        burn: impl Fn() -> Result<BurnOutcome> + Send + Sync + 'static,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::new(StatsStore::new(dir.path().join("stats.json"))));

        let claim_calls = Arc::new(AtomicUsize::new(0));
        let swap_calls = Arc::new(Mutex::new(Vec::new()));
        let burn_calls = Arc::new(AtomicUsize::new(0));
        let balance_calls = Arc::new(AtomicUsize::new(0));

        let mut engine = Engine::new(
            Arc::clone(&ledger),
            Box::new(StubClaimer {
                outcome: Box::new(claim),
                calls: Arc::clone(&claim_calls),
            }),
            Box::new(StubSwapper {
                calls: Arc::clone(&swap_calls),
                succeed: swap_succeeds,
            }),
            Box::new(StubBurner {
                outcome: Box::new(burn),
                calls: Arc::clone(&burn_calls),
            }),
            Box::new(StubBalances {
                sol: sol_balance,
                calls: Arc::clone(&balance_calls),
            }),
            min_sol,
            Duration::from_secs(60),
        );
        engine.settle_delay = Duration::ZERO;

        Harness {
            engine,
            ledger,
            claim_calls,
            swap_calls,
            burn_calls,
            balance_calls,
            _dir: dir,
        }
    }

    #[test]
    fn swap_budget_below_threshold_is_none() {
        assert_eq!(swap_budget(0.05, 0.1), None);
        assert_eq!(swap_budget(0.0, 0.1), None);
    }

    #[test]
    fn swap_budget_holds_back_fee_reserve() {
        assert_eq!(swap_budget(1.0, 0.1), Some(0.99));
        // Exactly at threshold still swaps
        let budget = swap_budget(0.1, 0.1).unwrap();
        assert!((budget - 0.09).abs() < 1e-12);
    }

    #[tokio::test]
    async fn below_threshold_cycle_skips_swap_and_burn_without_error() {
        let mut h = harness(
            0.05,
            0.1,
            || Ok(ClaimOutcome::NothingToClaim),
            true,
            || Ok(BurnOutcome::NothingToBurn),
        );
        let mut feed = h.ledger.subscribe();

        h.engine.cycle().await;

        assert_eq!(h.ledger.status(), BotStatus::Idle);
        assert!(!h.engine.is_processing);
        assert!(h.swap_calls.lock().unwrap().is_empty());
        assert_eq!(h.burn_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.ledger.stats().burn_count, 0);

        // No error activity and no swap/burn status transitions on the feed
        while let Ok(event) = feed.try_recv() {
            match event {
                FeedEvent::Activity { activity } => {
                    assert_ne!(activity.kind, ActivityKind::Error);
                }
                FeedEvent::Status { status } => {
                    assert_ne!(status, BotStatus::Swapping);
                    assert_ne!(status, BotStatus::Burning);
                    assert_ne!(status, BotStatus::Error);
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn swap_invoked_with_balance_minus_reserve() {
        let mut h = harness(
            1.0,
            0.1,
            || Ok(ClaimOutcome::NothingToClaim),
            true,
            || {
                Ok(BurnOutcome::Burned {
                    amount: 1000.0,
                    signature: "burn-sig".to_string(),
                })
            },
        );

        h.engine.cycle().await;

        let calls = h.swap_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!((calls[0] - 0.99).abs() < 1e-12);
    }

    #[tokio::test]
    async fn burn_success_records_exactly_one_burn_event() {
        let mut h = harness(
            1.0,
            0.1,
            || Ok(ClaimOutcome::NothingToClaim),
            true,
            || {
                Ok(BurnOutcome::Burned {
                    amount: 1000.0,
                    signature: "burn-sig".to_string(),
                })
            },
        );

        h.engine.cycle().await;

        let stats = h.ledger.stats();
        assert_eq!(stats.burn_count, 1);
        assert_eq!(stats.history.len(), 1);
        assert!((stats.total_sol_used - 0.99).abs() < 1e-12);
        assert_eq!(stats.total_burned, 1000.0);
        assert_eq!(stats.last_burn_tx.as_deref(), Some("burn-sig"));
    }

    #[tokio::test]
    async fn nothing_to_burn_leaves_stats_untouched() {
        let mut h = harness(
            1.0,
            0.1,
            || Ok(ClaimOutcome::NothingToClaim),
            true,
            || Ok(BurnOutcome::NothingToBurn),
        );

        h.engine.cycle().await;

        assert_eq!(h.burn_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.ledger.stats().burn_count, 0);
        assert!(h.ledger.stats().history.is_empty());
        assert_eq!(h.ledger.status(), BotStatus::Idle);
    }

    #[tokio::test]
    async fn claim_failure_does_not_prevent_balance_refresh() {
        let mut h = harness(
            0.05,
            0.1,
            || Err(anyhow!("claim service down")),
            true,
            || Ok(BurnOutcome::NothingToBurn),
        );

        h.engine.cycle().await;

        // Both refreshes still ran and the cycle returned to idle
        assert_eq!(h.balance_calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.ledger.status(), BotStatus::Idle);
    }

    #[tokio::test]
    async fn swap_failure_skips_burn_and_records_error() {
        let mut h = harness(
            1.0,
            0.1,
            || Ok(ClaimOutcome::NothingToClaim),
            false,
            || {
                Ok(BurnOutcome::Burned {
                    amount: 1.0,
                    signature: "never".to_string(),
                })
            },
        );
        let mut feed = h.ledger.subscribe();

        h.engine.cycle().await;

        assert_eq!(h.burn_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.ledger.stats().burn_count, 0);

        let mut saw_error = false;
        while let Ok(event) = feed.try_recv() {
            if let FeedEvent::Activity { activity } = event {
                if activity.kind == ActivityKind::Error {
                    saw_error = true;
                }
            }
        }
        assert!(saw_error);
        // The tick still finishes cleanly
        assert_eq!(h.ledger.status(), BotStatus::Idle);
    }

    #[tokio::test]
    async fn successful_claim_still_checks_threshold() {
        let mut h = harness(
            0.05,
            0.1,
            || {
                Ok(ClaimOutcome::Claimed {
                    signature: "claim-sig".to_string(),
                })
            },
            true,
            || Ok(BurnOutcome::NothingToBurn),
        );

        h.engine.cycle().await;

        assert!(h.swap_calls.lock().unwrap().is_empty());
        assert_eq!(h.ledger.status(), BotStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_with_cycle_in_flight_starts_no_new_cycle() {
        let mut h = harness(
            0.05,
            0.1,
            || Ok(ClaimOutcome::NothingToClaim),
            true,
            || Ok(BurnOutcome::NothingToBurn),
        );
        h.engine.is_processing = true;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let worker = tokio::spawn(h.engine.run(shutdown_rx));

        // Several intervals elapse while the in-flight flag is held; every
        // tick must be skipped rather than queued.
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(h.claim_calls.load(Ordering::SeqCst), 0);
        assert!(h.swap_calls.lock().unwrap().is_empty());
        assert_eq!(h.burn_calls.load(Ordering::SeqCst), 0);

        shutdown_tx.send(()).unwrap();
        worker.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_stops_the_loop() {
        let h = harness(
            0.05,
            0.1,
            || Ok(ClaimOutcome::NothingToClaim),
            true,
            || Ok(BurnOutcome::NothingToBurn),
        );
        let claim_calls = Arc::clone(&h.claim_calls);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let worker = tokio::spawn(h.engine.run(shutdown_rx));

        // The first tick fires immediately and its cycle completes
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(claim_calls.load(Ordering::SeqCst), 1);

        shutdown_tx.send(()).unwrap();
        let result = worker.await.unwrap();
        assert!(result.is_ok());
    }
}
