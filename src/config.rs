use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    pub base_url: String,
    pub profile_dir: PathBuf,
    pub dry_run: bool,
    pub timeouts: Timeouts,
    pub session: SessionConfig,
}

/// Every wait the engine performs, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    pub element_wait_ms: u64,
    pub navigation_ms: u64,
    pub settle_ms: u64,
    pub probe_candidate_ms: u64,
    pub poll_interval_ms: u64,
    pub enrichment_max_wait_ms: u64,
    pub dry_run_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub max_age_days: i64,
    pub file_name: String,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app.example.com".to_string(),
            profile_dir: PathBuf::from(".enrich-pilot"),
            dry_run: false,
            timeouts: Timeouts::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element_wait_ms: 10_000,
            navigation_ms: 30_000,
            settle_ms: 500,
            probe_candidate_ms: 2_000,
            poll_interval_ms: 5_000,
            enrichment_max_wait_ms: 600_000,
            dry_run_delay_ms: 50,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age_days: 7,
            file_name: "session.json".to_string(),
        }
    }
}

impl Timeouts {
    pub fn element_wait(&self) -> Duration {
        Duration::from_millis(self.element_wait_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn probe_candidate(&self) -> Duration {
        Duration::from_millis(self.probe_candidate_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn enrichment_max_wait(&self) -> Duration {
        Duration::from_millis(self.enrichment_max_wait_ms)
    }

    pub fn dry_run_delay(&self) -> Duration {
        Duration::from_millis(self.dry_run_delay_ms)
    }
}
