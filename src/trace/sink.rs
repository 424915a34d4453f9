//! Call tree assembly from an ordered event stream
//!
//! The sink is a stack machine over open frames. There is no node-id
//! linking between events: nesting is inferred purely from the order in
//! which enter, step and exit events arrive.
//!
//! A node is attached to its parent when it closes. Because a parent cannot
//! receive a second enter event before its current child exits, attachment
//! order equals enter order.

use crate::errors::TraceError;
use super::types::{EnterMessage, ExitMessage, MessageTrace, StepData};

/// Accumulates lifecycle events into an in-progress call tree
///
/// Exactly one request may be in flight per sink; interleaving two event
/// streams is not supported.
#[derive(Debug, Default, Clone)]
pub struct EventSink {
    /// Currently open frames, outermost first
    open_frames: Vec<MessageTrace>,
}

impl EventSink {
    /// Creates an idle sink
    pub fn new() -> Self {
        Default::default()
    }

    /// Opens a new frame for an enter message
    ///
    /// The frame becomes the candidate top-level trace when no frame is
    /// open, otherwise a child of the current top frame.
    ///
    /// # Errors
    /// * `TraceError::DepthMismatch` - The message depth disagrees with the
    ///   number of open frames
    pub fn on_enter_message(&mut self, data: EnterMessage) -> Result<(), TraceError> {
        let expected = self.open_frames.len();
        if data.depth != expected {
            return Err(TraceError::DepthMismatch {
                expected,
                found: data.depth,
            });
        }
        self.open_frames.push(MessageTrace::new(data));
        Ok(())
    }

    /// Attributes a step to the active frame
    ///
    /// # Errors
    /// * `TraceError::StepOutsideMessage` - No frame is open
    pub fn on_step(&mut self, data: StepData) -> Result<(), TraceError> {
        let frame = self
            .open_frames
            .last_mut()
            .ok_or(TraceError::StepOutsideMessage)?;
        frame.steps.push(data);
        Ok(())
    }

    /// Closes the active frame
    ///
    /// Returns the closed node when it was the outermost frame, i.e. the
    /// completed top-level trace. Nested nodes are moved into their parent.
    ///
    /// # Errors
    /// * `TraceError::ExitWithoutEnter` - No frame is open
    pub fn on_exit_message(&mut self, data: ExitMessage) -> Result<Option<MessageTrace>, TraceError> {
        let mut frame = self
            .open_frames
            .pop()
            .ok_or(TraceError::ExitWithoutEnter)?;
        frame.exit = Some(data);

        match self.open_frames.last_mut() {
            Some(parent) => {
                parent.children.push(frame);
                Ok(None)
            }
            None => Ok(Some(frame)),
        }
    }

    /// Number of frames currently open
    pub fn open_depth(&self) -> usize {
        self.open_frames.len()
    }

    /// Check if no frame is open
    pub fn is_idle(&self) -> bool {
        self.open_frames.is_empty()
    }

    /// Discards every open frame
    pub fn reset(&mut self) {
        self.open_frames.clear();
    }
}
