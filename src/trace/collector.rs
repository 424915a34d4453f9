//! Trace bookkeeping over an event sink
//!
//! The collector owns the sink, the most recently completed top-level trace
//! and the last terminal error. Requests are serialized by the caller; the
//! collector itself never blocks.

use crate::{
    errors::{TraceError, TraceFailure},
    traits::{ExecutionHooks, Reset},
};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, error};

use super::{
    sink::EventSink,
    types::{CallEvent, EnterMessage, ExitMessage, MessageTrace, StepData},
};

/// Collects the call tree of the request in flight
#[derive(Debug, Default, Clone)]
pub struct TraceCollector {
    /// Open-frame state machine
    sink: EventSink,
    /// Most recently completed top-level trace
    last_trace: Option<MessageTrace>,
    /// Most recent terminal failure
    last_error: Option<TraceFailure>,
}

impl TraceCollector {
    /// Creates a collector with no trace and no error
    pub fn new() -> Self {
        Default::default()
    }

    /// Forwards an enter-message event to the sink
    ///
    /// A top-level enter starts a new request and drops the error left by
    /// the previous one, so the error always describes the latest trace.
    pub fn add_before_message(&mut self, message: EnterMessage) -> Result<(), TraceError> {
        let starts_request = self.sink.is_idle();
        let result = self.sink.on_enter_message(message);
        if result.is_ok() && starts_request {
            self.last_error = None;
        }
        self.record_violation(result)
    }

    /// Forwards a step event to the sink
    pub fn add_step(&mut self, step: StepData) -> Result<(), TraceError> {
        let result = self.sink.on_step(step);
        self.record_violation(result)
    }

    /// Forwards an exit-message event to the sink
    ///
    /// When the exit closes the top-level frame, the finished tree becomes
    /// the last trace. An abnormal top-level outcome also replaces the last
    /// error; the trace is retained either way.
    pub fn add_after_message(&mut self, message: ExitMessage) -> Result<(), TraceError> {
        let completed = match self.sink.on_exit_message(message) {
            Ok(completed) => completed,
            Err(violation) => return self.record_violation(Err(violation)),
        };

        if let Some(trace) = completed {
            if let Some(failure) = trace.exit.as_ref().and_then(ExitMessage::failure) {
                debug!(%failure, "top-level message exited abnormally");
                self.last_error = Some(failure);
            }
            self.last_trace = Some(trace);
        }
        Ok(())
    }

    /// Dispatches one queued event
    pub fn add_event(&mut self, event: CallEvent) -> Result<(), TraceError> {
        match event {
            CallEvent::EnterMessage(message) => self.add_before_message(message),
            CallEvent::Step(step) => self.add_step(step),
            CallEvent::ExitMessage(message) => self.add_after_message(message),
        }
    }

    /// Dispatches a queued event stream in order
    ///
    /// Stops at the first sequencing violation.
    pub fn drain<I>(&mut self, events: I) -> Result<(), TraceError>
    where
        I: IntoIterator<Item = CallEvent>,
    {
        events.into_iter().try_for_each(|event| self.add_event(event))
    }

    /// Most recently completed top-level trace, if any since the last clear
    pub fn last_top_level_message_trace(&self) -> Option<&MessageTrace> {
        self.last_trace.as_ref()
    }

    /// Most recent terminal error, if any
    pub fn last_error(&self) -> Option<&TraceFailure> {
        self.last_error.as_ref()
    }

    /// Forgets the retained error; the retained trace is kept
    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    /// Forgets the trace, the error and any open frames
    pub fn clear(&mut self) {
        self.sink.reset();
        self.last_trace = None;
        self.last_error = None;
    }

    /// Number of frames open in the sink
    pub fn open_depth(&self) -> usize {
        self.sink.open_depth()
    }

    fn record_violation(&mut self, result: Result<(), TraceError>) -> Result<(), TraceError> {
        if let Err(violation) = &result {
            error!(%violation, "trace assembly failed");
            self.last_error = Some(TraceFailure::Sequencing(violation.clone()));
        }
        result
    }
}

impl Reset for TraceCollector {
    fn reset(&mut self) {
        self.clear();
    }
}

/// Cloneable handle to a collector shared by a provider and an executor
///
/// The provider writes through the [`ExecutionHooks`] implementation while a
/// request runs; the executor reads once the request has settled. The last
/// error belongs to the last top-level trace: it is replaced when the next
/// top-level message begins.
#[derive(Debug, Default, Clone)]
pub struct SharedTraceCollector {
    inner: Arc<Mutex<TraceCollector>>,
}

impl SharedTraceCollector {
    /// Creates a handle to a fresh collector
    pub fn new() -> Self {
        Default::default()
    }

    /// Locks the collector for direct access
    pub fn lock(&self) -> MutexGuard<'_, TraceCollector> {
        self.inner.lock()
    }

    /// Clone of the last completed top-level trace
    pub fn last_top_level_message_trace(&self) -> Option<MessageTrace> {
        self.inner.lock().last_top_level_message_trace().cloned()
    }

    /// Clone of the last terminal error
    pub fn last_error(&self) -> Option<TraceFailure> {
        self.inner.lock().last_error().cloned()
    }

    /// Forgets the retained error
    pub fn clear_last_error(&self) {
        self.inner.lock().clear_last_error();
    }

    /// Forgets all retained state
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl ExecutionHooks for SharedTraceCollector {
    fn on_before_message(&self, message: EnterMessage) -> Result<(), TraceError> {
        self.inner.lock().add_before_message(message)
    }

    fn on_step(&self, step: StepData) -> Result<(), TraceError> {
        self.inner.lock().add_step(step)
    }

    fn on_after_message(&self, message: ExitMessage) -> Result<(), TraceError> {
        self.inner.lock().add_after_message(message)
    }

    fn on_events(&self, events: Vec<CallEvent>) -> Result<(), TraceError> {
        self.inner.lock().drain(events)
    }
}
