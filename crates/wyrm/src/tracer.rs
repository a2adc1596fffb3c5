//! Call-protocol tracing.
//!
//! The runtime reports call, frame and raise events to a [`CallTracer`].
//! The default tracer does nothing; `StderrTracer` prints events for ad-hoc
//! debugging and `RecordingTracer` captures them for tests.

use crate::exceptions::ExcType;

/// An event observed by the call protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A callable was invoked; the payload is a short description and the
    /// positional argument count.
    Call { what: String, nargs: usize },
    /// A frame was pushed onto the thread stack.
    FramePush { code_name: String },
    /// A frame was popped.
    FramePop { code_name: String },
    /// A Language exception started propagating.
    Raise { exc_type: ExcType },
}

/// Receives call-protocol events.
pub trait CallTracer: std::fmt::Debug {
    fn on_event(&mut self, event: TraceEvent);
}

/// The default tracer: drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl CallTracer for NoopTracer {
    fn on_event(&mut self, _event: TraceEvent) {}
}

/// Prints events to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrTracer;

impl CallTracer for StderrTracer {
    fn on_event(&mut self, event: TraceEvent) {
        eprintln!("[wyrm] {event:?}");
    }
}

/// Captures events in order, for assertions in tests.
///
/// Clones share one buffer, so a clone handed to the runtime stays
/// observable from the original.
#[derive(Debug, Default, Clone)]
pub struct RecordingTracer {
    events: std::rc::Rc<std::cell::RefCell<Vec<TraceEvent>>>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }
}

impl CallTracer for RecordingTracer {
    fn on_event(&mut self, event: TraceEvent) {
        self.events.borrow_mut().push(event);
    }
}
