//! Failure reporting for subscriber invocations

use serde::Serialize;
use thiserror::Error;

use crate::subscriber::SubscriptionId;

/// Errors surfaced by the bus itself.
///
/// Subscriber failures never take this form toward the publisher; they are
/// routed to the [`ErrorSink`] instead.
#[derive(Debug, Error)]
pub enum BusError {
    /// A callback panicked during dispatch
    #[error("subscriber {subscription} panicked while handling {event_type}: {message}")]
    SubscriberPanic {
        event_type: &'static str,
        subscription: SubscriptionId,
        message: String,
    },
}

/// Record of one failed subscriber invocation
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    /// Type name of the event being delivered
    pub event_type: &'static str,

    /// Which subscription failed
    pub subscription: SubscriptionId,

    /// When the failure was observed (nanoseconds since epoch)
    pub timestamp_ns: i64,

    /// Panic payload rendered as text
    pub message: String,
}

impl FailureReport {
    pub(crate) fn new(
        event_type: &'static str,
        subscription: SubscriptionId,
        message: String,
    ) -> Self {
        Self {
            event_type,
            subscription,
            timestamp_ns: chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
            message,
        }
    }
}

/// Destination for subscriber failure reports.
///
/// The bus holds an `Arc<dyn ErrorSink>` and calls it once per failed
/// invocation; it never depends on a concrete logging backend. Inject a
/// recording sink in tests, or wire this to telemetry in production.
pub trait ErrorSink: Send + Sync {
    fn subscriber_failure(&self, report: &FailureReport);
}

/// Default sink: logs each failure through `tracing`
#[derive(Debug, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn subscriber_failure(&self, report: &FailureReport) {
        tracing::error!(
            event_type = report.event_type,
            subscription = %report.subscription,
            "subscriber panicked: {}",
            report.message
        );
    }
}
