//! Progress and event reporting interface.
//!
//! The conversion pipeline reports per-item progress and structured log
//! events through a caller-supplied [`ProgressSink`]. Both operations are
//! synchronous and infallible by signature, so a misbehaving sink can never
//! fail a running conversion: the core fires and keeps going. This is what
//! decouples the transcoding engine from any presentation technology. The
//! CLI hooks up [`crate::notifier::Notifier`], a GUI would hook up its own
//! implementation, and library callers who don't care pass [`NullSink`].

/// Severity of a structured log event emitted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Info,
    Debug,
    Note,
    Warn,
    Error,
    Fatal,
}

impl EventLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            EventLevel::Info => "INFO",
            EventLevel::Debug => "DEBUG",
            EventLevel::Note => "NOTE",
            EventLevel::Warn => "WARN",
            EventLevel::Error => "ERROR",
            EventLevel::Fatal => "FATAL",
        }
    }
}

/// Sink for per-item progress and log events from a running conversion.
///
/// `progress` is invoked before and after each entry is processed with the
/// number of completed entries, the total, and the current entry name.
/// `event` carries everything else. Implementations must not panic; the
/// core treats the sink as best-effort.
pub trait ProgressSink {
    fn progress(&self, completed: usize, total: usize, current: &str);

    fn event(&self, level: EventLevel, message: &str);
}

/// Sink that discards everything.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn progress(&self, _completed: usize, _total: usize, _current: &str) {}

    fn event(&self, _level: EventLevel, _message: &str) {}
}

/// Sink that records events in memory, for tests and batch callers that
/// want to inspect what the pipeline reported.
#[derive(Default)]
pub struct MemorySink {
    pub events: std::sync::Mutex<Vec<(EventLevel, String)>>,
    pub ticks: std::sync::Mutex<Vec<(usize, usize, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(level, message)| format!("[{}] {}", level.as_str(), message))
            .collect()
    }
}

impl ProgressSink for MemorySink {
    fn progress(&self, completed: usize, total: usize, current: &str) {
        self.ticks
            .lock()
            .unwrap()
            .push((completed, total, current.to_string()));
    }

    fn event(&self, level: EventLevel, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}
