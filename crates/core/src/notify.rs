//! Notification sink: the one capability the assembler needs from the UI.
//!
//! Notices are fire-and-forget: the sink never reports back, and a sink
//! that drops everything is a valid sink.

use std::time::Duration;

/// Surface that shows short user-visible notices.
pub trait NotificationSink: Send + Sync {
    /// Show `message` for roughly `duration`.
    fn notify(&self, message: &str, duration: Duration);
}

/// A sink that writes notices to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, message: &str, duration: Duration) {
        tracing::info!(duration_ms = duration.as_millis() as u64, "{message}");
    }
}
