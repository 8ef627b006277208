//! Snapshot dispatch with per-subscriber failure isolation

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{ErrorSink, FailureReport};
use crate::subscriber::Subscription;

/// Delivery tally for one publish call
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DispatchOutcome {
    pub delivered: u64,
    pub failed: u64,
}

/// Invokes snapshot entries and routes failures to the sink.
///
/// Stateless per call: the dispatcher holds only the sink. No registry lock
/// is held while it runs, so callbacks are free to call back into the bus,
/// including unsubscribing themselves.
pub(crate) struct Dispatcher {
    sink: Arc<dyn ErrorSink>,
}

impl Dispatcher {
    pub(crate) fn new(sink: Arc<dyn ErrorSink>) -> Self {
        Self { sink }
    }

    /// Invoke every snapshot entry, in snapshot order, with `event`.
    ///
    /// A panicking subscriber is caught, reported once, and skipped; the
    /// remaining entries are still invoked. Nothing propagates to the caller.
    pub(crate) fn dispatch<E: 'static>(
        &self,
        snapshot: &[Subscription<E>],
        event: &E,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        for subscription in snapshot {
            match catch_unwind(AssertUnwindSafe(|| (subscription.callback)(event))) {
                Ok(()) => outcome.delivered += 1,
                Err(payload) => {
                    outcome.failed += 1;
                    let report = FailureReport::new(
                        std::any::type_name::<E>(),
                        subscription.id(),
                        panic_message(payload),
                    );
                    self.sink.subscriber_failure(&report);
                }
            }
        }

        outcome
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<FailureReport>>,
    }

    impl ErrorSink for RecordingSink {
        fn subscriber_failure(&self, report: &FailureReport) {
            self.reports.lock().push(report.clone());
        }
    }

    #[test]
    fn test_failure_does_not_stop_later_subscribers() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(sink.clone());
        let invoked = Arc::new(AtomicUsize::new(0));

        let invoked_clone = invoked.clone();
        let snapshot = vec![
            Subscription::new(move |_: &u32| panic!("first subscriber down")),
            Subscription::new(move |_: &u32| {
                invoked_clone.fetch_add(1, Ordering::SeqCst);
            }),
        ];

        let outcome = dispatcher.dispatch(&snapshot, &7);

        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(invoked.load(Ordering::SeqCst), 1);

        let reports = sink.reports.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].event_type, "u32");
        assert_eq!(reports[0].subscription, snapshot[0].id());
        assert!(reports[0].message.contains("first subscriber down"));
    }

    #[test]
    fn test_dispatch_preserves_snapshot_order() {
        let dispatcher = Dispatcher::new(Arc::new(RecordingSink::default()));
        let order = Arc::new(Mutex::new(Vec::new()));

        let snapshot: Vec<Subscription<u32>> = (0..3)
            .map(|n| {
                let order = order.clone();
                Subscription::new(move |_: &u32| order.lock().push(n))
            })
            .collect();

        dispatcher.dispatch(&snapshot, &0);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_snapshot_reports_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(sink.clone());

        let outcome = dispatcher.dispatch::<u32>(&[], &0);

        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.failed, 0);
        assert!(sink.reports.lock().is_empty());
    }

    #[test]
    fn test_string_panic_payload_is_captured() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(sink.clone());

        let snapshot = vec![Subscription::new(|n: &u32| {
            panic!("bad value: {n}");
        })];
        dispatcher.dispatch(&snapshot, &42);

        assert_eq!(sink.reports.lock()[0].message, "bad value: 42");
    }
}
