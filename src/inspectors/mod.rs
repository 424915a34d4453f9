//! EVM execution inspectors
//!
//! - `event_recorder`: converts the engine's call, step and exit hooks into
//!   an ordered [`CallEvent`](crate::trace::CallEvent) queue

pub mod event_recorder;

pub use event_recorder::EventRecorder;
