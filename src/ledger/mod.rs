//! Ledger & broadcast hub.
//!
//! Single write path for everything the dashboard observes: bot status, the
//! latest balance snapshot, a bounded activity log, and the durable burn
//! statistics. Every mutation is pushed to connected observers over a
//! broadcast channel — at-most-once, best-effort, no replay.

pub mod store;

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use store::StatsStore;

/// Bounded activity log length.
const ACTIVITY_CAP: usize = 100;
/// Bounded burn history length.
const HISTORY_CAP: usize = 100;
/// Activities included in a new observer's catch-up snapshot.
const SNAPSHOT_ACTIVITIES: usize = 50;
/// Outbound feed capacity; a lagged observer skips ahead rather than
/// being replayed to.
const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Claim,
    Swap,
    Burn,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub message: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Idle,
    Checking,
    Swapping,
    Burning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    pub sol_balance: f64,
    pub token_balance: f64,
}

/// One completed buyback-and-burn, immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnEvent {
    /// Unix milliseconds.
    pub timestamp: i64,
    pub sol_used: f64,
    pub tokens_burned: f64,
    pub tx_signature: String,
}

/// Cumulative burn statistics, persisted across restarts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BurnStats {
    pub total_sol_used: f64,
    pub total_burned: f64,
    pub burn_count: u64,
    pub last_burn_time: Option<i64>,
    pub last_burn_amount: f64,
    pub last_burn_tx: Option<String>,
    pub history: Vec<BurnEvent>,
}

/// Server-to-observer feed frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedEvent {
    /// One-shot catch-up sent to a newly connected observer.
    Init {
        stats: BurnStats,
        activities: Vec<Activity>,
        status: BotStatus,
        #[serde(rename = "solBalance")]
        sol_balance: f64,
        #[serde(rename = "tokenBalance")]
        token_balance: f64,
    },
    Activity { activity: Activity },
    Status { status: BotStatus },
    Balances {
        #[serde(rename = "solBalance")]
        sol_balance: f64,
        #[serde(rename = "tokenBalance")]
        token_balance: f64,
    },
    Stats { stats: BurnStats },
}

struct LedgerState {
    stats: BurnStats,
    activities: VecDeque<Activity>,
    status: BotStatus,
    balances: Balances,
}

pub struct Ledger {
    state: Mutex<LedgerState>,
    feed: broadcast::Sender<FeedEvent>,
    store: StatsStore,
}

impl Ledger {
    pub fn new(store: StatsStore) -> Self {
        let stats = store.load();
        let (feed, _) = broadcast::channel(FEED_CAPACITY);

        Self {
            state: Mutex::new(LedgerState {
                stats,
                activities: VecDeque::with_capacity(ACTIVITY_CAP),
                status: BotStatus::Idle,
                balances: Balances::default(),
            }),
            feed,
            store,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.feed.subscribe()
    }

    /// Appends an activity record, evicting the oldest beyond the cap.
    pub fn record_activity(
        &self,
        kind: ActivityKind,
        message: impl Into<String>,
        tx: Option<String>,
    ) {
        let activity = Activity {
            kind,
            message: message.into(),
            timestamp: Utc::now().timestamp_millis(),
            tx,
        };

        match kind {
            ActivityKind::Error => warn!(target: "activity", "{}", activity.message),
            _ => info!(target: "activity", "{}", activity.message),
        }

        {
            let mut state = self.state.lock().unwrap();
            state.activities.push_back(activity.clone());
            while state.activities.len() > ACTIVITY_CAP {
                state.activities.pop_front();
            }
        }

        self.publish(FeedEvent::Activity { activity });
    }

    pub fn set_status(&self, status: BotStatus) {
        self.state.lock().unwrap().status = status;
        self.publish(FeedEvent::Status { status });
    }

    pub fn set_balances(&self, sol: f64, tokens: f64) {
        {
            let mut state = self.state.lock().unwrap();
            state.balances = Balances {
                sol_balance: sol,
                token_balance: tokens,
            };
        }
        self.publish(FeedEvent::Balances {
            sol_balance: sol,
            token_balance: tokens,
        });
    }

    /// Folds a completed burn into the cumulative stats, persists them, and
    /// pushes the new totals to observers. The only mutation path for
    /// durable state.
    pub fn record_burn(&self, sol_used: f64, tokens_burned: f64, tx_signature: &str) {
        let now = Utc::now().timestamp_millis();

        let stats = {
            let mut state = self.state.lock().unwrap();
            let stats = &mut state.stats;

            stats.total_sol_used += sol_used;
            stats.total_burned += tokens_burned;
            stats.burn_count += 1;
            stats.last_burn_time = Some(now);
            stats.last_burn_amount = tokens_burned;
            stats.last_burn_tx = Some(tx_signature.to_string());

            stats.history.push(BurnEvent {
                timestamp: now,
                sol_used,
                tokens_burned,
                tx_signature: tx_signature.to_string(),
            });
            if stats.history.len() > HISTORY_CAP {
                let overflow = stats.history.len() - HISTORY_CAP;
                stats.history.drain(..overflow);
            }

            stats.clone()
        };

        if let Err(e) = self.store.save(&stats) {
            error!("Failed to persist burn stats: {:#}", e);
        }

        self.publish(FeedEvent::Stats { stats });
    }

    pub fn stats(&self) -> BurnStats {
        self.state.lock().unwrap().stats.clone()
    }

    pub fn status(&self) -> BotStatus {
        self.state.lock().unwrap().status
    }

    pub fn balances(&self) -> Balances {
        self.state.lock().unwrap().balances
    }

    /// Catch-up frame for a newly connected observer: current stats, the
    /// most recent activity, current status and balances.
    pub fn snapshot(&self) -> FeedEvent {
        let state = self.state.lock().unwrap();
        let skip = state.activities.len().saturating_sub(SNAPSHOT_ACTIVITIES);

        FeedEvent::Init {
            stats: state.stats.clone(),
            activities: state.activities.iter().skip(skip).cloned().collect(),
            status: state.status,
            sol_balance: state.balances.sol_balance,
            token_balance: state.balances.token_balance,
        }
    }

    fn publish(&self, event: FeedEvent) {
        // Fire and forget; send only fails when no observer is connected.
        let _ = self.feed.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ledger() -> (Ledger, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(StatsStore::new(dir.path().join("stats.json")));
        (ledger, dir)
    }

    #[test]
    fn activity_ring_evicts_oldest_beyond_cap() {
        let (ledger, _dir) = test_ledger();

        for i in 0..101 {
            ledger.record_activity(ActivityKind::Info, format!("event {}", i), None);
        }

        let state = ledger.state.lock().unwrap();
        assert_eq!(state.activities.len(), 100);
        assert_eq!(state.activities.front().unwrap().message, "event 1");
        assert_eq!(state.activities.back().unwrap().message, "event 100");

        // Relative order of the survivors is unchanged
        let messages: Vec<_> = state.activities.iter().map(|a| a.message.clone()).collect();
        for (offset, msg) in messages.iter().enumerate() {
            assert_eq!(msg, &format!("event {}", offset + 1));
        }
    }

    #[test]
    fn record_burn_accumulates_and_appends_one_event() {
        let (ledger, _dir) = test_ledger();

        ledger.record_burn(0.5, 100_000.0, "sig1");
        ledger.record_burn(0.25, 50_000.0, "sig2");

        let stats = ledger.stats();
        assert_eq!(stats.burn_count, 2);
        assert!((stats.total_sol_used - 0.75).abs() < f64::EPSILON);
        assert!((stats.total_burned - 150_000.0).abs() < f64::EPSILON);
        assert_eq!(stats.last_burn_tx.as_deref(), Some("sig2"));
        assert_eq!(stats.last_burn_amount, 50_000.0);
        assert_eq!(stats.history.len(), 2);
    }

    #[test]
    fn burn_history_is_capped_fifo() {
        let (ledger, _dir) = test_ledger();

        for i in 0..105 {
            ledger.record_burn(0.1, 1000.0, &format!("sig{}", i));
        }

        let stats = ledger.stats();
        assert_eq!(stats.burn_count, 105);
        assert_eq!(stats.history.len(), 100);
        assert_eq!(stats.history.first().unwrap().tx_signature, "sig5");
        assert_eq!(stats.history.last().unwrap().tx_signature, "sig104");
    }

    #[test]
    fn stats_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let ledger = Ledger::new(StatsStore::new(path.clone()));
        ledger.record_burn(1.0, 250_000.0, "sig-persist");
        let before = ledger.stats();
        drop(ledger);

        let reloaded = Ledger::new(StatsStore::new(path));
        assert_eq!(reloaded.stats(), before);
    }

    #[test]
    fn snapshot_carries_last_fifty_activities() {
        let (ledger, _dir) = test_ledger();

        for i in 0..80 {
            ledger.record_activity(ActivityKind::Info, format!("event {}", i), None);
        }
        ledger.set_status(BotStatus::Checking);
        ledger.set_balances(1.5, 42.0);

        match ledger.snapshot() {
            FeedEvent::Init {
                activities,
                status,
                sol_balance,
                token_balance,
                ..
            } => {
                assert_eq!(activities.len(), 50);
                assert_eq!(activities.first().unwrap().message, "event 30");
                assert_eq!(activities.last().unwrap().message, "event 79");
                assert_eq!(status, BotStatus::Checking);
                assert_eq!(sol_balance, 1.5);
                assert_eq!(token_balance, 42.0);
            }
            other => panic!("expected init snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn mutations_reach_subscribers() {
        let (ledger, _dir) = test_ledger();
        let mut rx = ledger.subscribe();

        ledger.set_status(BotStatus::Swapping);
        ledger.record_activity(ActivityKind::Swap, "swapped", Some("sig".into()));

        match rx.recv().await.unwrap() {
            FeedEvent::Status { status } => assert_eq!(status, BotStatus::Swapping),
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await.unwrap() {
            FeedEvent::Activity { activity } => {
                assert_eq!(activity.kind, ActivityKind::Swap);
                assert_eq!(activity.tx.as_deref(), Some("sig"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn feed_serializes_in_dashboard_wire_format() {
        let event = FeedEvent::Balances {
            sol_balance: 1.25,
            token_balance: 10.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "balances");
        assert_eq!(json["solBalance"], 1.25);
        assert_eq!(json["tokenBalance"], 10.0);

        let event = FeedEvent::Status { status: BotStatus::Idle };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "idle");
    }
}
