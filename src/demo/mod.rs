//! Demo mode: fabricated buyback cycles driven through the real ledger so
//! the dashboard and observer feed can be exercised without chain
//! credentials or real transactions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::info;

use crate::ledger::{ActivityKind, BotStatus, Ledger};

const CYCLE_PAUSE: Duration = Duration::from_secs(30);

pub async fn run(ledger: Arc<Ledger>, mut shutdown: broadcast::Receiver<()>) {
    ledger.set_balances(2.5, 0.0);
    ledger.record_activity(
        ActivityKind::Info,
        "Demo mode active - simulating buyback & burn...",
        None,
    );

    loop {
        tokio::select! {
            _ = simulate_cycle(&ledger) => {}
            _ = shutdown.recv() => {
                info!("Demo simulation stopped");
                return;
            }
        }
    }
}

async fn simulate_cycle(ledger: &Ledger) {
    let (sol_amount, token_amount) = {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let sol: f64 = rng.gen_range(0.5..2.5);
        let tokens = (sol * 50_000.0 + rng.gen_range(0.0..20_000.0)).floor();
        (sol, tokens)
    };

    ledger.set_status(BotStatus::Checking);
    ledger.record_activity(ActivityKind::Info, "Checking for creator fees...", None);
    sleep(Duration::from_secs(2)).await;

    ledger.record_activity(
        ActivityKind::Claim,
        format!("Claimed {:.4} SOL in fees", sol_amount),
        None,
    );
    ledger.set_balances(sol_amount, 0.0);
    sleep(Duration::from_secs(2)).await;

    ledger.set_status(BotStatus::Swapping);
    ledger.record_activity(
        ActivityKind::Info,
        format!("Swapping {:.4} SOL for tokens...", sol_amount),
        None,
    );
    sleep(Duration::from_secs(3)).await;

    ledger.record_activity(
        ActivityKind::Swap,
        format!("Received {:.0} tokens", token_amount),
        None,
    );
    ledger.set_balances(0.01, token_amount);
    sleep(Duration::from_secs(2)).await;

    ledger.set_status(BotStatus::Burning);
    ledger.record_activity(
        ActivityKind::Info,
        format!("Burning {:.0} tokens...", token_amount),
        None,
    );
    sleep(Duration::from_secs(2)).await;

    let fake_tx = fake_signature();
    ledger.record_activity(
        ActivityKind::Burn,
        format!("Burned {:.0} tokens", token_amount),
        Some(fake_tx.clone()),
    );
    ledger.record_burn(sol_amount, token_amount, &fake_tx);
    ledger.set_balances(0.01, 0.0);

    ledger.set_status(BotStatus::Idle);
    ledger.record_activity(ActivityKind::Info, "Waiting for next cycle...", None);
    sleep(CYCLE_PAUSE).await;
}

fn fake_signature() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("demo{}", suffix)
}
