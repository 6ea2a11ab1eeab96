//! Best-effort progress telemetry.
//!
//! Reporting never blocks and never fails; with no subscriber every report is
//! a no-op.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};

/// Percent reached when body layout starts.
pub const LAYOUT_PROGRESS_START: f32 = 30.0;
/// Percent span covered by body layout.
pub const LAYOUT_PROGRESS_SPAN: f32 = 60.0;

/// One progress notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Completion in `0.0..=100.0`.
    pub percent: f32,
    pub status: String,
}

impl ProgressEvent {
    pub fn new(percent: f32, status: impl Into<String>) -> Self {
        Self {
            percent: percent.clamp(0.0, 100.0),
            status: status.into(),
        }
    }

    /// Body layout event after `processed` of `total` blocks.
    pub fn layout(processed: usize, total: usize) -> Self {
        let ratio = if total == 0 {
            1.0
        } else {
            processed as f32 / total as f32
        };
        Self::new(
            LAYOUT_PROGRESS_START + ratio * LAYOUT_PROGRESS_SPAN,
            format!("Processing content: {}/{}", processed, total),
        )
    }
}

/// Fixed conversion milestones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressStage {
    Locating,
    Extracting,
    Generating,
    Preparing,
    Done,
}

impl ProgressStage {
    pub fn percent(self) -> f32 {
        match self {
            Self::Locating => 10.0,
            Self::Extracting => 20.0,
            Self::Generating => LAYOUT_PROGRESS_START,
            Self::Preparing => LAYOUT_PROGRESS_START + LAYOUT_PROGRESS_SPAN,
            Self::Done => 100.0,
        }
    }

    pub fn status(self) -> &'static str {
        match self {
            Self::Locating => "Locating article content...",
            Self::Extracting => "Extracting text content...",
            Self::Generating => "Generating document...",
            Self::Preparing => "Preparing output...",
            Self::Done => "Conversion complete",
        }
    }

    pub fn event(self) -> ProgressEvent {
        ProgressEvent::new(self.percent(), self.status())
    }
}

type ProgressCallback = Arc<Mutex<Box<dyn FnMut(ProgressEvent) + Send + 'static>>>;

/// Optional progress subscriber handle. Cheap to clone.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    sink: Option<ProgressCallback>,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("subscribed", &self.sink.is_some())
            .finish()
    }
}

impl ProgressReporter {
    /// Reporter with no subscriber.
    pub fn none() -> Self {
        Self::default()
    }

    /// Reporter invoking `sink` for every event.
    pub fn from_fn<F>(sink: F) -> Self
    where
        F: FnMut(ProgressEvent) + Send + 'static,
    {
        Self {
            sink: Some(Arc::new(Mutex::new(Box::new(sink)))),
        }
    }

    /// Reporter feeding an unbounded channel. Dropping the receiver is fine.
    pub fn channel() -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = channel();
        let reporter = Self::from_fn(move |event| {
            let _ = tx.send(event);
        });
        (reporter, rx)
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.is_some()
    }

    pub fn emit(&self, event: ProgressEvent) {
        log::debug!("[progress] {:.1}% {}", event.percent, event.status);
        let Some(sink) = &self.sink else {
            return;
        };
        if let Ok(mut sink) = sink.lock() {
            sink(event);
        }
    }

    pub fn report(&self, percent: f32, status: impl Into<String>) {
        self.emit(ProgressEvent::new(percent, status));
    }

    pub fn stage(&self, stage: ProgressStage) {
        self.emit(stage.event());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_event_maps_into_thirty_to_ninety() {
        let event = ProgressEvent::layout(10, 40);
        assert_eq!(event.percent, 45.0);
        assert_eq!(event.status, "Processing content: 10/40");
        assert_eq!(ProgressEvent::layout(40, 40).percent, 90.0);
        assert_eq!(ProgressEvent::layout(0, 0).percent, 90.0);
    }

    #[test]
    fn channel_receives_events_in_order() {
        let (reporter, rx) = ProgressReporter::channel();
        reporter.stage(ProgressStage::Locating);
        reporter.report(55.0, "halfway");
        reporter.stage(ProgressStage::Done);
        let events: Vec<ProgressEvent> = rx.try_iter().collect();
        assert_eq!(
            events.iter().map(|e| e.percent).collect::<Vec<_>>(),
            vec![10.0, 55.0, 100.0]
        );
        assert_eq!(events[1].status, "halfway");
    }

    #[test]
    fn reporting_without_subscriber_or_receiver_is_harmless() {
        ProgressReporter::none().report(50.0, "nobody listening");
        let (reporter, rx) = ProgressReporter::channel();
        drop(rx);
        reporter.stage(ProgressStage::Generating);
        assert!(reporter.is_subscribed());
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(ProgressEvent::new(140.0, "x").percent, 100.0);
        assert_eq!(ProgressEvent::new(-3.0, "x").percent, 0.0);
    }
}
