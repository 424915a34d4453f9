//! Execution trace capture and correlation
//!
//! This module provides functionality for:
//! - Modelling execution lifecycle events and the call tree they describe
//! - Folding an ordered event stream into a call tree ([`EventSink`])
//! - Retaining the last completed trace and the last terminal error
//!   ([`TraceCollector`], [`SharedTraceCollector`])
//!
//! # Example
//! ```
//! use evm_trace_harness::trace::*;
//!
//! let mut collector = TraceCollector::new();
//! collector.add_before_message(EnterMessage {
//!     kind: MessageKind::Call { to: Address::ZERO, scheme: CallScheme::Call },
//!     caller: Address::ZERO,
//!     input: Bytes::new(),
//!     value: U256::ZERO,
//!     gas_limit: 30_000,
//!     depth: 0,
//! })?;
//! collector.add_after_message(ExitMessage {
//!     outcome: ExitOutcome::Success,
//!     output: Bytes::new(),
//!     gas_used: 0,
//!     created_address: None,
//! })?;
//!
//! assert!(collector.last_top_level_message_trace().is_some());
//! assert!(collector.last_error().is_none());
//! # Ok::<(), evm_trace_harness::errors::TraceError>(())
//! ```

pub mod collector;
pub mod sink;
pub mod types;

pub use collector::{SharedTraceCollector, TraceCollector};
pub use sink::EventSink;
pub use types::*;
