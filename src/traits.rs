//! Core traits shared by the engine, provider and trace collector
//!
//! This module provides traits for:
//! - Receiving execution lifecycle events (`ExecutionHooks`)
//! - Resetting accumulated inspector state between transactions (`Reset`)
//! - Extracting collected data from an inspector (`TraceOutput`)

use crate::{
    errors::TraceError,
    trace::{CallEvent, EnterMessage, ExitMessage, StepData},
};

/// Consumer of execution lifecycle events registered with a provider
///
/// The provider calls these hooks synchronously, in emission order, after the
/// engine has finished a transaction. Implementations must not block.
pub trait ExecutionHooks: Send + Sync {
    /// A message frame (call or creation) was entered
    fn on_before_message(&self, message: EnterMessage) -> Result<(), TraceError>;

    /// An opcode executed in the active frame
    fn on_step(&self, step: StepData) -> Result<(), TraceError>;

    /// The active message frame finished
    fn on_after_message(&self, message: ExitMessage) -> Result<(), TraceError>;

    /// Dispatches a recorded event queue in order
    ///
    /// Stops at the first rejected event.
    fn on_events(&self, events: Vec<CallEvent>) -> Result<(), TraceError> {
        events.into_iter().try_for_each(|event| match event {
            CallEvent::EnterMessage(message) => self.on_before_message(message),
            CallEvent::Step(step) => self.on_step(step),
            CallEvent::ExitMessage(message) => self.on_after_message(message),
        })
    }
}

/// Trait for resetting accumulated state between transactions
pub trait Reset {
    /// Clears all accumulated state data
    fn reset(&mut self);
}

/// Trait for extracting the data an inspector collected
pub trait TraceOutput {
    /// Collected data type
    type Output;

    /// Moves the collected data out, leaving the inspector empty
    fn take_output(&mut self) -> Self::Output;
}
