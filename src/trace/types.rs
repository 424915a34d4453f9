//! Execution event and call tree types
//!
//! The execution engine reports a transaction as a flat, ordered stream of
//! [`CallEvent`]s. The [`EventSink`](super::EventSink) folds that stream into
//! a tree of [`MessageTrace`] nodes, one per message frame.

use crate::{errors::TraceFailure, utils::error_utils::decode_revert_reason};
pub use alloy::primitives::{Address, Bytes, U256};
pub use revm::interpreter::{CallScheme, CreateScheme};
use serde::Serialize;

/// One lifecycle event emitted by the execution engine
#[derive(Debug, Clone, Serialize)]
pub enum CallEvent {
    /// A message frame (call or creation) was entered
    EnterMessage(EnterMessage),
    /// An opcode is about to execute in the active frame
    Step(StepData),
    /// The active message frame finished
    ExitMessage(ExitMessage),
}

/// Target of a message frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    /// Contract call
    Call {
        /// Address whose code runs (bytecode address for delegate calls)
        to: Address,
        /// Call opcode flavour
        scheme: CallScheme,
    },
    /// Contract creation; the address is known only at exit
    Create {
        /// Create opcode flavour
        scheme: CreateScheme,
    },
}

/// Data carried by an enter-message event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnterMessage {
    /// Call or creation target
    pub kind: MessageKind,
    /// Effective caller of the frame
    pub caller: Address,
    /// Calldata, or init code for creations
    pub input: Bytes,
    /// Native value transferred with the message
    pub value: U256,
    /// Gas made available to the frame
    pub gas_limit: u64,
    /// Nesting level, 0 for the top-level call
    pub depth: usize,
}

impl EnterMessage {
    /// Depth of the parent frame, none for the top-level call
    pub fn parent_depth(&self) -> Option<usize> {
        self.depth.checked_sub(1)
    }

    /// Check if this message creates a contract
    pub fn is_create(&self) -> bool {
        matches!(self.kind, MessageKind::Create { .. })
    }

    /// Called address, none for creations
    pub fn to(&self) -> Option<Address> {
        match self.kind {
            MessageKind::Call { to, .. } => Some(to),
            MessageKind::Create { .. } => None,
        }
    }
}

/// Program-counter-level execution metadata
///
/// Opaque to the trace assembly; kept exactly as reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepData {
    /// Program counter
    pub pc: usize,
    /// Opcode about to execute
    pub opcode: u8,
    /// Depth of the frame executing the step
    pub depth: usize,
    /// Stack height before the opcode runs
    pub stack_len: usize,
}

/// Outcome classification of a finished message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExitOutcome {
    /// Message completed successfully
    Success,
    /// Message reverted
    Revert,
    /// Message halted with an exceptional condition
    Halt(String),
}

impl ExitOutcome {
    /// Check if the message completed successfully
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }
}

/// Data carried by an exit-message event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitMessage {
    /// Outcome classification
    pub outcome: ExitOutcome,
    /// Return data, revert data, or deployed code
    pub output: Bytes,
    /// Gas consumed by the frame
    pub gas_used: u64,
    /// Deployed contract address for successful creations
    pub created_address: Option<Address>,
}

impl ExitMessage {
    /// Describe an abnormal exit as a terminal failure
    ///
    /// Returns `None` for successful exits. Revert data is decoded as
    /// `Error(string)` or `Panic(uint256)` when possible.
    pub fn failure(&self) -> Option<TraceFailure> {
        match &self.outcome {
            ExitOutcome::Success => None,
            ExitOutcome::Revert => Some(TraceFailure::Reverted {
                reason: decode_revert_reason(&self.output),
                output: self.output.clone(),
            }),
            ExitOutcome::Halt(reason) => Some(TraceFailure::Halted {
                reason: reason.clone(),
            }),
        }
    }
}

/// A node of the reconstructed call tree
///
/// A node is open (accepting children and steps) until its exit message
/// arrives; it is never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageTrace {
    /// Message that opened this frame
    pub enter: EnterMessage,
    /// Nested messages, in call order
    pub children: Vec<MessageTrace>,
    /// Steps executed while this frame was active
    pub steps: Vec<StepData>,
    /// Exit data, none while the frame is open
    pub exit: Option<ExitMessage>,
}

impl MessageTrace {
    /// Creates an open node for an enter message
    pub fn new(enter: EnterMessage) -> Self {
        Self {
            enter,
            children: Vec::new(),
            steps: Vec::new(),
            exit: None,
        }
    }

    /// Check if the node still accepts children and steps
    pub fn is_open(&self) -> bool {
        self.exit.is_none()
    }

    /// Outcome of the message, none while open
    pub fn outcome(&self) -> Option<&ExitOutcome> {
        self.exit.as_ref().map(|exit| &exit.outcome)
    }

    /// Check if the message closed successfully
    pub fn is_success(&self) -> bool {
        self.outcome().is_some_and(ExitOutcome::is_success)
    }

    /// Check if this node is a contract creation
    pub fn is_create(&self) -> bool {
        self.enter.is_create()
    }

    /// Address of the contract deployed by this node, if any
    pub fn created_address(&self) -> Option<Address> {
        self.exit.as_ref().and_then(|exit| exit.created_address)
    }

    /// Visits this node and all descendants in pre-order
    pub fn depth_first(&self) -> Vec<&MessageTrace> {
        let mut nodes = Vec::new();
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            nodes.push(node);
            pending.extend(node.children.iter().rev());
        }
        nodes
    }

    /// Total number of steps recorded in this subtree
    pub fn total_steps(&self) -> usize {
        self.depth_first().iter().map(|node| node.steps.len()).sum()
    }

    /// Locates the call where a failure originated
    ///
    /// Searches failed children depth-first and returns the last failed
    /// node whose own children all succeeded, i.e. where the error was
    /// raised rather than where it was propagated to.
    pub fn find_failure_origin(&self) -> Option<&MessageTrace> {
        if self.is_success() || self.is_open() {
            return None;
        }

        let mut origin = None;
        for child in &self.children {
            if let Some(found) = child.find_failure_origin() {
                origin = Some(found);
            }
        }

        let raised_here = self.children.iter().all(MessageTrace::is_success);
        if raised_here {
            Some(self)
        } else {
            origin.or(Some(self))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::{Revert, SolError};

    fn enter(depth: usize) -> EnterMessage {
        EnterMessage {
            kind: MessageKind::Call {
                to: Address::repeat_byte(0x11),
                scheme: CallScheme::Call,
            },
            caller: Address::repeat_byte(0x22),
            input: Bytes::new(),
            value: U256::ZERO,
            gas_limit: 100_000,
            depth,
        }
    }

    fn closed(depth: usize, outcome: ExitOutcome, children: Vec<MessageTrace>) -> MessageTrace {
        MessageTrace {
            enter: enter(depth),
            children,
            steps: Vec::new(),
            exit: Some(ExitMessage {
                outcome,
                output: Bytes::new(),
                gas_used: 0,
                created_address: None,
            }),
        }
    }

    #[test]
    fn test_parent_depth() {
        assert_eq!(enter(0).parent_depth(), None);
        assert_eq!(enter(3).parent_depth(), Some(2));
    }

    #[test]
    fn test_revert_failure_decodes_reason() {
        let exit = ExitMessage {
            outcome: ExitOutcome::Revert,
            output: Revert { reason: "Only the owner".into() }.abi_encode().into(),
            gas_used: 10,
            created_address: None,
        };

        match exit.failure() {
            Some(TraceFailure::Reverted { reason, .. }) => {
                assert_eq!(reason.as_deref(), Some("Only the owner"));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_success_has_no_failure() {
        let exit = ExitMessage {
            outcome: ExitOutcome::Success,
            output: Bytes::new(),
            gas_used: 0,
            created_address: None,
        };
        assert!(exit.failure().is_none());
    }

    #[test]
    fn test_find_failure_origin_prefers_deepest_raiser() {
        // root(revert) -> [ok, revert -> [revert]]
        let leaf = closed(2, ExitOutcome::Revert, vec![]);
        let middle = closed(1, ExitOutcome::Revert, vec![leaf.clone()]);
        let sibling = closed(1, ExitOutcome::Success, vec![]);
        let root = closed(0, ExitOutcome::Revert, vec![sibling, middle]);

        let origin = root.find_failure_origin().unwrap();
        assert_eq!(origin, &leaf);
    }

    #[test]
    fn test_depth_first_order() {
        let a = closed(1, ExitOutcome::Success, vec![closed(2, ExitOutcome::Success, vec![])]);
        let b = closed(1, ExitOutcome::Success, vec![]);
        let root = closed(0, ExitOutcome::Success, vec![a, b]);

        let depths: Vec<usize> = root.depth_first().iter().map(|n| n.enter.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1]);
        assert!(root.find_failure_origin().is_none());
    }
}
