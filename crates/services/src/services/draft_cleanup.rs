//! Periodic removal of drafts that were never submitted.

use std::time::Duration;

use chrono::Utc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use super::drafts::DraftService;

pub struct DraftCleanupService {
    drafts: DraftService,
    poll_interval: Duration,
}

impl DraftCleanupService {
    /// Spawn the cleanup loop. The first sweep runs immediately.
    pub fn spawn(drafts: DraftService, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
        let service = Self {
            drafts,
            poll_interval,
        };
        tokio::spawn(async move {
            service.start().await;
        })
    }

    async fn start(&self) {
        info!(interval = ?self.poll_interval, "Starting draft cleanup service");

        let mut interval = interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }

    async fn sweep(&self) {
        if let Err(e) = self.drafts.cleanup_expired_drafts(Utc::now()).await {
            error!(error = %e, "Error cleaning up expired drafts");
        }
    }
}
