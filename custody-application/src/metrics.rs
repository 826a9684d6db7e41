use std::sync::atomic::{AtomicU64, Ordering};

use custody_domain::{AutoApprovalReport, TriggerKind};

#[derive(Debug, Default)]
pub struct Metrics {
    registrations: AtomicU64,
    manual_transitions: AtomicU64,
    auto_transitions: AtomicU64,
    idempotent_noops: AtomicU64,
    rejected_transitions: AtomicU64,
    auto_approval_runs: AtomicU64,
    auto_approval_run_failures: AtomicU64,
    auto_approval_item_failures: AtomicU64,
}

impl Metrics {
    pub fn record_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self, trigger: TriggerKind) {
        let counter = match trigger {
            TriggerKind::Human => &self.manual_transitions,
            TriggerKind::System => &self.auto_transitions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_noop(&self) {
        self.idempotent_noops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run(&self, report: &AutoApprovalReport) {
        self.auto_approval_runs.fetch_add(1, Ordering::Relaxed);
        self.auto_approval_item_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    pub fn record_run_failure(&self) {
        self.auto_approval_run_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transitions(&self, trigger: TriggerKind) -> u64 {
        match trigger {
            TriggerKind::Human => self.manual_transitions.load(Ordering::Relaxed),
            TriggerKind::System => self.auto_transitions.load(Ordering::Relaxed),
        }
    }

    pub fn noops(&self) -> u64 {
        self.idempotent_noops.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            ("custody_registrations_total", &self.registrations),
            ("custody_manual_transitions_total", &self.manual_transitions),
            ("custody_auto_transitions_total", &self.auto_transitions),
            ("custody_idempotent_noops_total", &self.idempotent_noops),
            ("custody_rejected_transitions_total", &self.rejected_transitions),
            ("custody_auto_approval_runs_total", &self.auto_approval_runs),
            (
                "custody_auto_approval_run_failures_total",
                &self.auto_approval_run_failures,
            ),
            (
                "custody_auto_approval_item_failures_total",
                &self.auto_approval_item_failures,
            ),
        ];
        let mut out = String::new();
        for (name, counter) in counters {
            out.push_str(&format!(
                "# TYPE {name} counter\n{name} {}\n",
                counter.load(Ordering::Relaxed)
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_counter() {
        let metrics = Metrics::default();
        metrics.record_transition(TriggerKind::System);
        metrics.record_transition(TriggerKind::System);
        metrics.record_noop();
        let text = metrics.render_prometheus();
        assert!(text.contains("custody_auto_transitions_total 2\n"));
        assert!(text.contains("custody_manual_transitions_total 0\n"));
        assert!(text.contains("custody_idempotent_noops_total 1\n"));
        assert_eq!(text.matches("# TYPE").count(), 8);
    }
}
