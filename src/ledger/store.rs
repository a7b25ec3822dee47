//! Durable burn statistics file.
//!
//! The stats document is read once at startup and rewritten wholesale after
//! every recorded burn. A missing or unreadable file starts fresh rather
//! than failing the process.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::BurnStats;

pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads persisted stats, falling back to defaults when the file is
    /// absent or corrupt.
    pub fn load(&self) -> BurnStats {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<BurnStats>(&raw) {
                Ok(stats) => {
                    info!(
                        total_burned = stats.total_burned,
                        burn_count = stats.burn_count,
                        "Loaded burn stats from {}",
                        self.path.display()
                    );
                    stats
                }
                Err(e) => {
                    warn!("Stats file unreadable, starting fresh: {}", e);
                    BurnStats::default()
                }
            },
            Err(_) => {
                info!("No stats file at {}, starting fresh", self.path.display());
                BurnStats::default()
            }
        }
    }

    /// Overwrites the stats document on disk.
    pub fn save(&self, stats: &BurnStats) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create stats directory {}", dir.display()))?;
        }

        let json = serde_json::to_string_pretty(stats).context("Failed to serialize stats")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write stats file {}", self.path.display()))?;
        Ok(())
    }
}
