use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use custody_application::commands::auto_approval_commands::run_auto_approval;
use custody_application::AppState;
use custody_domain::Principal;

/// In-process trigger. Runs the engine every `interval_minutes` as the system
/// principal until the task is dropped.
pub async fn schedule_auto_approval(state: AppState, interval_minutes: u64) {
    let period = Duration::from_secs(interval_minutes.max(1) * 60);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; skip it so startup is not a run.
    ticker.tick().await;
    info!(interval_minutes, "auto-approval scheduler started");
    loop {
        ticker.tick().await;
        if let Err(err) = run_auto_approval(&state, &Principal::System, Utc::now()).await {
            error!("scheduled auto-approval failed: {}", err);
        }
    }
}
