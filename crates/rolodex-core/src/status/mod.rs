//! Sync status reporting
//!
//! Converts finished-pass reports into [`SyncAlert`] values and holds the
//! zero-or-one pending alert the caller displays. Full successes stay
//! silent.

use parking_lot::Mutex;

use crate::models::SyncAlert;
use crate::sync::{PassError, SyncOutcome, SyncReport};

/// Holds the pending alert slot and builds alerts from pass reports
#[derive(Debug, Default)]
pub struct StatusReporter {
    pending: Mutex<Option<SyncAlert>>,
}

impl StatusReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the outcome of a finished pass.
    ///
    /// A newly produced alert replaces any previous pending one; silent
    /// outcomes leave the slot untouched.
    pub fn publish(&self, report: &SyncReport) {
        if let Some(alert) = Self::alert_for(report) {
            tracing::warn!(
                "sync alert: {} - {} ({} ok, {} failed)",
                alert.title,
                alert.message,
                report.succeeded,
                report.failed
            );
            *self.pending.lock() = Some(alert);
        }
    }

    /// The currently pending alert, if any
    #[must_use]
    pub fn pending_alert(&self) -> Option<SyncAlert> {
        self.pending.lock().clone()
    }

    /// Dismiss the pending alert
    pub fn acknowledge(&self) {
        *self.pending.lock() = None;
    }

    fn alert_for(report: &SyncReport) -> Option<SyncAlert> {
        if let Some(error) = &report.error {
            return Some(match error {
                PassError::Store(message) => SyncAlert::fatal(
                    "Local store error",
                    format!("Sync was aborted: {message}"),
                ),
                PassError::Remote(message) => SyncAlert::acknowledge_or_stop(
                    "Sync failed",
                    format!("Could not reach the remote service: {message}"),
                ),
            });
        }

        if report.outcome == SyncOutcome::Cancelled {
            return None;
        }

        if report.failed > 0 {
            let attempted = report.succeeded + report.failed;
            return Some(SyncAlert::acknowledge(
                "Sync incomplete",
                format!(
                    "{} of {attempted} records could not be synced; they will be retried on the next sync.",
                    report.failed
                ),
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncDirection;

    fn report(outcome: SyncOutcome, succeeded: usize, failed: usize) -> SyncReport {
        SyncReport {
            direction: SyncDirection::Up,
            outcome,
            succeeded,
            failed,
            error: None,
        }
    }

    #[test]
    fn full_success_is_silent() {
        let reporter = StatusReporter::new();
        reporter.publish(&report(SyncOutcome::Succeeded, 3, 0));
        assert_eq!(reporter.pending_alert(), None);
    }

    #[test]
    fn cancelled_pass_is_silent() {
        let reporter = StatusReporter::new();
        reporter.publish(&report(SyncOutcome::Cancelled, 1, 0));
        assert_eq!(reporter.pending_alert(), None);
    }

    #[test]
    fn partial_failure_offers_acknowledge_only() {
        let reporter = StatusReporter::new();
        reporter.publish(&report(SyncOutcome::Failed, 2, 1));

        let alert = reporter.pending_alert().unwrap();
        assert!(alert.offers_acknowledge);
        assert!(!alert.offers_stop);
        assert!(alert.message.contains("1 of 3"));

        reporter.acknowledge();
        assert_eq!(reporter.pending_alert(), None);
    }

    #[test]
    fn remote_failure_offers_acknowledge_and_stop() {
        let reporter = StatusReporter::new();
        let mut failed = report(SyncOutcome::Failed, 0, 0);
        failed.error = Some(PassError::Remote("connection refused".to_string()));
        reporter.publish(&failed);

        let alert = reporter.pending_alert().unwrap();
        assert!(alert.offers_acknowledge);
        assert!(alert.offers_stop);
    }

    #[test]
    fn store_failure_is_stop_only() {
        let reporter = StatusReporter::new();
        let mut failed = report(SyncOutcome::Failed, 0, 0);
        failed.error = Some(PassError::Store("disk I/O error".to_string()));
        reporter.publish(&failed);

        let alert = reporter.pending_alert().unwrap();
        assert!(!alert.offers_acknowledge);
        assert!(alert.offers_stop);
    }

    #[test]
    fn newer_alert_replaces_pending_one() {
        let reporter = StatusReporter::new();
        reporter.publish(&report(SyncOutcome::Failed, 0, 2));
        let mut remote = report(SyncOutcome::Failed, 0, 0);
        remote.error = Some(PassError::Remote("timeout".to_string()));
        reporter.publish(&remote);

        let alert = reporter.pending_alert().unwrap();
        assert_eq!(alert.title, "Sync failed");
    }
}
