//! Phase progress sinks.

use std::sync::{Mutex, PoisonError};

use tracing::info;

/// Receives a label when a reload enters a new phase.
pub trait Reporter: Send + Sync {
    /// Called once per phase, in order.
    fn report(&self, phase: &str);
}

/// Forwards phases to the `tracing` log at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, phase: &str) {
        info!(target: "boardray::reload", "{phase}");
    }
}

/// Keeps every phase label.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    phases: Mutex<Vec<String>>,
}

impl CollectingReporter {
    /// An empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels received so far.
    pub fn phases(&self) -> Vec<String> {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, phase: &str) {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(phase.to_string());
    }
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn report(&self, phase: &str) {
        (**self).report(phase);
    }
}

/// Report to an optional sink.
pub(crate) fn report(reporter: Option<&dyn Reporter>, phase: &str) {
    if let Some(r) = reporter {
        r.report(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter_keeps_order() {
        let r = CollectingReporter::new();
        report(Some(&r), "one");
        report(None, "lost");
        report(Some(&r), "two");
        assert_eq!(r.phases(), vec!["one".to_string(), "two".to_string()]);
    }
}
