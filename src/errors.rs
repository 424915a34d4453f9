//! Error types for the trace harness
//!
//! This module defines the error taxonomy shared by every layer:
//! - Sequencing violations raised while assembling call trees
//! - Terminal execution failures retained as the collector's "last error"
//! - Provider submission failures
//! - Harness initialization, server and teardown failures
//!
//! Engine-reported failures (`TraceFailure`, `ProviderError`) are kept apart
//! from harness defects (`HarnessError::NoTraceProduced`,
//! `TeardownError::Timeout`, `TraceError`) so tests can tell "the transaction
//! failed" from "the harness is broken".

use alloy::primitives::{Address, Bytes};
use std::time::Duration;
use thiserror::Error;

/// Top-level error type returned to test code
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Errors occurring while building the provider or harness
    #[error("Failed to initialize harness: {0}")]
    Init(#[from] InitError),

    /// The request was rejected and no trace could be retrieved
    #[error("Provider request failed: {0}")]
    Provider(#[from] ProviderError),

    /// The engine reported a terminal failure and no trace was produced
    #[error("Execution failed: {0}")]
    Trace(#[from] TraceFailure),

    /// Neither a trace nor an error was produced for a request
    ///
    /// This is a collector/engine contract violation, never a legitimate
    /// empty result.
    #[error("Harness defect: cannot get last top level message trace (no trace and no error recorded)")]
    NoTraceProduced,

    /// JSON-RPC server failures
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Teardown failures
    #[error("Teardown failed: {0}")]
    Teardown(#[from] TeardownError),
}

/// Event ordering violations detected by the event sink
///
/// These signal a breach of the engine/collector contract and are never
/// retried or swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// A step arrived while no message frame was open
    #[error("Sequencing violation: step event received outside of any message")]
    StepOutsideMessage,

    /// An exit arrived while no message frame was open
    #[error("Sequencing violation: exit message received without a matching enter message")]
    ExitWithoutEnter,

    /// An enter message reported a depth that disagrees with the open frames
    #[error("Sequencing violation: enter message at depth {found}, expected depth {expected}")]
    DepthMismatch {
        /// Number of frames open when the message arrived
        expected: usize,
        /// Depth carried by the message
        found: usize,
    },
}

/// Terminal failure retained by the trace collector as its "last error"
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceFailure {
    /// The top-level call reverted
    ///
    /// # Fields
    /// * `reason` - Decoded `Error(string)` / `Panic(uint256)` message, if any
    /// * `output` - Raw revert data
    #[error("Transaction reverted: {}", .reason.as_deref().unwrap_or("without a reason string"))]
    Reverted {
        reason: Option<String>,
        output: Bytes,
    },

    /// The top-level call halted with an exceptional condition
    #[error("Transaction halted: {reason}")]
    Halted { reason: String },

    /// The event stream could not be assembled into a call tree
    #[error(transparent)]
    Sequencing(#[from] TraceError),
}

impl TraceFailure {
    /// Check if this failure describes a revert
    pub fn is_revert(&self) -> bool {
        matches!(self, TraceFailure::Reverted { .. })
    }

    /// Check if this failure is a harness-internal inconsistency
    pub fn is_sequencing(&self) -> bool {
        matches!(self, TraceFailure::Sequencing(_))
    }
}

/// Provider submission errors
///
/// Recoverable from the executor's point of view: a trace may still be
/// retrievable after any of these.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Transaction executed and reverted
    #[error("Transaction reverted: {reason}")]
    TransactionReverted { reason: String },

    /// Transaction executed and halted
    #[error("Transaction halted: {reason}")]
    TransactionHalted { reason: String },

    /// Transaction rejected before execution (nonce, balance, gas limits)
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Sender is not one of the provider's accounts
    #[error("Unknown account {0}")]
    UnknownAccount(Address),

    /// State access failures
    #[error("Database error: {0}")]
    Database(String),

    /// The registered execution hooks rejected the event stream
    #[error("Execution hooks failed: {0}")]
    Hooks(#[from] TraceError),

    /// Malformed JSON-RPC parameters
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Method not served by the provider
    #[error("Method {0} is not supported")]
    MethodNotFound(String),

    /// Error object returned by a remote JSON-RPC endpoint
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Transport level failures talking to the server
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    /// JSON-RPC error code used when serving this error over the wire
    pub fn code(&self) -> i64 {
        match self {
            ProviderError::MethodNotFound(_) => -32601,
            ProviderError::InvalidParams(_) => -32602,
            ProviderError::TransactionReverted { .. } => 3,
            ProviderError::Rpc { code, .. } => *code,
            _ => -32603,
        }
    }
}

/// Initialization-specific errors
#[derive(Debug, Error)]
pub enum InitError {
    /// Hardfork name not recognized
    #[error("Unknown hardfork: {0}")]
    UnknownHardfork(String),

    /// Genesis account key could not be parsed
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Invalid or malformed RPC URL for forking
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    /// Fork backend setup failures
    #[error("Fork initialization failed: {0}")]
    Fork(String),
}

/// JSON-RPC server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// Loopback listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Serving task failed or panicked
    #[error("Server task failed: {0}")]
    Serve(String),
}

/// Teardown failures
#[derive(Debug, Error)]
pub enum TeardownError {
    /// Closing took longer than the configured bound
    #[error("Closing the server took more than {}ms ({}ms), which can lead to incredibly slow tests", .limit.as_millis(), .elapsed.as_millis())]
    Timeout { elapsed: Duration, limit: Duration },

    /// Server shutdown reported an error
    #[error("Server shutdown failed: {0}")]
    Server(String),
}

/// ABI encoding errors
#[derive(Debug, Error)]
pub enum AbiError {
    /// No function with this name and arity in the ABI
    #[error("Function {name} with {arity} arguments not found in ABI")]
    UnknownFunction { name: String, arity: usize },

    /// Constructor arguments given for an ABI without a constructor
    #[error("ABI has no constructor")]
    MissingConstructor,

    /// Arguments do not match the parameter types
    #[error("Failed to encode arguments: {0}")]
    Encoding(String),
}
