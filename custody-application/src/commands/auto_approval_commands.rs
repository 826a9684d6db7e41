use std::time::Duration as StdDuration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::commands::transition_commands::transition_shipment;
use crate::{AppError, AppState};
use custody_domain::{
    format_duration, AutoApprovalReport, OverdueShipment, Principal, ShipmentId,
    TransitionOutcome, TransitionRequest,
};

enum ItemOutcome {
    Advanced,
    Skipped,
    Failed,
}

/// Advances every shipment that outstayed its stage by exactly one stage,
/// acting as the system sentinel.
///
/// Per-shipment failures are counted in the report; only a failed candidate
/// query fails the run. Work committed before the deadline stays committed.
pub async fn run_auto_approval(
    state: &AppState,
    triggered_by: &Principal,
    now: DateTime<Utc>,
) -> Result<AutoApprovalReport, AppError> {
    let result = execute_run(state, triggered_by, now).await;
    match &result {
        Ok(report) => state.metrics.record_run(report),
        Err(err) => {
            state.metrics.record_run_failure();
            warn!("auto-approval run failed: {}", err);
        }
    }
    result
}

async fn execute_run(
    state: &AppState,
    triggered_by: &Principal,
    now: DateTime<Utc>,
) -> Result<AutoApprovalReport, AppError> {
    let started_at = Utc::now();
    let deadline =
        Instant::now() + StdDuration::from_secs(state.config.auto_approve_deadline_seconds);
    let query = state.ledger.find_overdue(
        now,
        &state.dwell_policy,
        state.config.auto_approve_batch_limit.max(1),
    );
    let candidates = timeout_at(deadline, query).await.map_err(|_| {
        anyhow!(
            "overdue shipment query did not finish within {}s",
            state.config.auto_approve_deadline_seconds
        )
    })??;
    let total = candidates.len();

    let mut advanced = 0;
    let mut skipped = 0;
    let mut failed = 0;
    let mut processed = 0;

    let mut outcomes = stream::iter(
        candidates
            .into_iter()
            .map(|candidate| approve_one(state, candidate, now)),
    )
    .buffer_unordered(state.config.auto_approve_concurrency.max(1));

    let timed_out = loop {
        match timeout_at(deadline, outcomes.next()).await {
            Ok(Some(outcome)) => {
                processed += 1;
                match outcome {
                    ItemOutcome::Advanced => advanced += 1,
                    ItemOutcome::Skipped => skipped += 1,
                    ItemOutcome::Failed => failed += 1,
                }
            }
            Ok(None) => break false,
            Err(_) => break true,
        }
    };

    let report = AutoApprovalReport {
        candidates: total,
        advanced,
        skipped,
        failed,
        remaining: total - processed,
        timed_out,
        started_at,
        finished_at: Utc::now(),
    };

    if report.is_partial() {
        warn!(
            triggered_by = %triggered_by.actor_id(),
            candidates = report.candidates,
            advanced = report.advanced,
            failed = report.failed,
            remaining = report.remaining,
            timed_out = report.timed_out,
            "auto-approval run finished with unprocessed shipments"
        );
    } else {
        info!(
            triggered_by = %triggered_by.actor_id(),
            candidates = report.candidates,
            advanced = report.advanced,
            skipped = report.skipped,
            "auto-approval run finished"
        );
    }
    Ok(report)
}

async fn approve_one(state: &AppState, candidate: OverdueShipment, now: DateTime<Utc>) -> ItemOutcome {
    let shipment = &candidate.shipment;
    let Some(target) = shipment.status.next() else {
        return ItemOutcome::Skipped;
    };

    let mut request = TransitionRequest::new(shipment.id, target, Principal::System);
    request.at = Some(now);
    request.notes = Some(approval_note(&candidate));

    match transition_shipment(state, request, now).await {
        Ok(TransitionOutcome::Applied { .. }) => ItemOutcome::Advanced,
        Ok(TransitionOutcome::AlreadyApplied { .. }) => ItemOutcome::Skipped,
        Err(err) => {
            log_failure(shipment.id, &err);
            ItemOutcome::Failed
        }
    }
}

fn approval_note(candidate: &OverdueShipment) -> String {
    format!(
        "auto-approved: {} exceeded max dwell of {} (waited {})",
        candidate.shipment.status,
        format_duration(candidate.max_dwell),
        format_duration(candidate.elapsed)
    )
}

fn log_failure(shipment_id: ShipmentId, err: &AppError) {
    warn!(shipment_id = %shipment_id, "auto-approval skipped shipment: {}", err);
}
