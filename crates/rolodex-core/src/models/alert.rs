//! Sync alert model

/// User-facing alert produced by the status reporter after a sync pass.
///
/// Alerts are never persisted; at most one is pending at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncAlert {
    /// Short headline
    pub title: String,
    /// Detail text
    pub message: String,
    /// Offer an acknowledge ("Ok") action that dismisses the alert
    pub offers_acknowledge: bool,
    /// Offer a stop action that cancels remaining sync work
    pub offers_stop: bool,
}

impl SyncAlert {
    /// Acknowledge-only alert
    #[must_use]
    pub fn acknowledge(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            offers_acknowledge: true,
            offers_stop: false,
        }
    }

    /// Alert offering both acknowledge and stop
    #[must_use]
    pub fn acknowledge_or_stop(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            offers_acknowledge: true,
            offers_stop: true,
        }
    }

    /// Stop-only alert for fatal conditions with no retry path
    #[must_use]
    pub fn fatal(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            offers_acknowledge: false,
            offers_stop: true,
        }
    }
}
