use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::monitor::RegionMonitor;

/// Run a full monitoring cycle every `every`, starting immediately.
///
/// Each cycle runs in its own task so a panic is logged and the loop
/// keeps its schedule.
pub async fn run_monitor_loop(monitor: Arc<RegionMonitor>, every: Duration) {
    info!(interval_secs = every.as_secs(), "monitor scheduler started");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let monitor = monitor.clone();
        match tokio::spawn(async move { monitor.run_full_cycle().await }).await {
            Ok(summaries) => {
                let alerts: usize = summaries.iter().map(|s| s.alerts_triggered).sum();
                info!(regions = summaries.len(), alerts, "scheduled cycle finished");
            }
            Err(e) => error!("scheduled monitoring cycle failed: {}", e),
        }
    }
}
