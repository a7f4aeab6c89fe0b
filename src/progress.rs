//! Progress-callback trait for per-unit extraction events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! real-time events as the batch processes each page or image.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a terminal progress bar, a log file, or a UI widget
//! without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` so the same callback can be
//! shared with a reader thread.

use std::sync::Arc;

/// Called by the extraction batch as it processes each unit.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Units are processed strictly in order, one at a
/// time, so events for unit N always arrive before events for unit N+1.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any unit is processed.
    fn on_batch_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called just before a unit's first extraction call is sent.
    fn on_unit_start(&self, unit: usize, total_units: usize, label: &str) {
        let _ = (unit, total_units, label);
    }

    /// Called when a unit yields at least one normalized record.
    fn on_unit_complete(&self, unit: usize, total_units: usize, records: usize) {
        let _ = (unit, total_units, records);
    }

    /// Called when a unit fails after both groundings exhaust their retries.
    fn on_unit_error(&self, unit: usize, total_units: usize, error: &str) {
        let _ = (unit, total_units, error);
    }

    /// Called once after every unit has been attempted.
    fn on_batch_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_unit_start(&self, _unit: usize, _total: usize, _label: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_unit_complete(&self, _unit: usize, _total: usize, _records: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_unit_error(&self, _unit: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(3);
        cb.on_unit_start(1, 3, "page 1");
        cb.on_unit_complete(1, 3, 4);
        cb.on_unit_error(2, 3, "no JSON recovered");
        cb.on_batch_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        };
        tracker.on_unit_start(1, 2, "page 1");
        tracker.on_unit_complete(1, 2, 5);
        tracker.on_unit_start(2, 2, "page 2");
        tracker.on_unit_error(2, 2, "transport error");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn BatchProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_unit_complete(1, 10, 2);
    }
}
