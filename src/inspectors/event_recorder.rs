//! REVM Inspector that records execution lifecycle events
//!
//! The engine drives this inspector through its hooks while a transaction
//! runs. Instead of building a tree in place, every hook appends one
//! [`CallEvent`] to an ordered queue; the provider hands that queue to its
//! registered hooks once the engine returns.
//!
//! Hook mapping:
//! - `call` / `create` => `EnterMessage`
//! - `step` => `Step`
//! - `call_end` / `create_end` => `ExitMessage`

use crate::{
    trace::{CallEvent, EnterMessage, ExitMessage, ExitOutcome, MessageKind, StepData},
    traits::{Reset, TraceOutput},
};
use alloy::primitives::{Address, Bytes, U256};
use revm::{
    context::ContextTr,
    context_interface::result::HaltReason,
    interpreter::{
        interpreter::EthInterpreter, interpreter_types::Jumps, CallInputs, CallOutcome,
        CallScheme, CreateInputs, CreateOutcome, InstructionResult, Interpreter, SuccessOrHalt,
    },
    Inspector,
};

/// Inspector that turns engine hooks into an ordered event queue
#[derive(Debug, Clone)]
pub struct EventRecorder {
    /// Recorded events in emission order
    events: Vec<CallEvent>,
    /// Number of frames entered and not yet exited
    open_frames: usize,
    /// Whether per-opcode steps are recorded
    record_steps: bool,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            open_frames: 0,
            record_steps: true,
        }
    }
}

impl EventRecorder {
    /// Creates a recorder that also records steps
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a recorder that only records message boundaries
    pub fn without_steps() -> Self {
        Self {
            record_steps: false,
            ..Default::default()
        }
    }

    /// Events recorded so far
    pub fn events(&self) -> &[CallEvent] {
        &self.events
    }

    fn enter(&mut self, kind: MessageKind, caller: Address, input: Bytes, value: U256, gas_limit: u64) {
        self.events.push(CallEvent::EnterMessage(EnterMessage {
            kind,
            caller,
            input,
            value,
            gas_limit,
            depth: self.open_frames,
        }));
        self.open_frames += 1;
    }

    fn exit(&mut self, result: InstructionResult, gas_used: u64, output: Bytes, created_address: Option<Address>) {
        self.open_frames = self.open_frames.saturating_sub(1);
        let outcome = classify(result);
        self.events.push(CallEvent::ExitMessage(ExitMessage {
            created_address: created_address.filter(|_| outcome.is_success()),
            outcome,
            output,
            gas_used,
        }));
    }
}

/// Maps an interpreter result to an exit outcome
pub fn classify(result: InstructionResult) -> ExitOutcome {
    match SuccessOrHalt::<HaltReason>::from(result) {
        SuccessOrHalt::Success(_) => ExitOutcome::Success,
        SuccessOrHalt::Revert => ExitOutcome::Revert,
        SuccessOrHalt::Halt(reason) => ExitOutcome::Halt(format!("{reason:?}")),
        SuccessOrHalt::FatalExternalError => ExitOutcome::Halt("FatalExternalError".to_string()),
        // Only reachable mid-execution; a finished frame never reports it
        SuccessOrHalt::Internal(_) => ExitOutcome::Success,
    }
}

impl<CTX> Inspector<CTX, EthInterpreter> for EventRecorder
where
    CTX: ContextTr,
{
    fn step(&mut self, interp: &mut Interpreter<EthInterpreter>, _context: &mut CTX) {
        if !self.record_steps {
            return;
        }
        self.events.push(CallEvent::Step(StepData {
            pc: interp.bytecode.pc(),
            opcode: interp.bytecode.opcode(),
            depth: self.open_frames.saturating_sub(1),
            stack_len: interp.stack.len(),
        }));
    }

    /// Records a call frame entry
    ///
    /// Delegate calls report the address whose code runs.
    fn call(&mut self, context: &mut CTX, inputs: &mut CallInputs) -> Option<CallOutcome> {
        let to = match inputs.scheme {
            CallScheme::DelegateCall => inputs.bytecode_address,
            _ => inputs.target_address,
        };
        let input = inputs.input.bytes(context);
        self.enter(
            MessageKind::Call {
                to,
                scheme: inputs.scheme,
            },
            inputs.caller,
            input,
            inputs.call_value(),
            inputs.gas_limit,
        );
        None
    }

    /// Records a creation frame entry; the address is only known at exit
    fn create(&mut self, _context: &mut CTX, inputs: &mut CreateInputs) -> Option<CreateOutcome> {
        self.enter(
            MessageKind::Create {
                scheme: inputs.scheme,
            },
            inputs.caller,
            inputs.init_code.clone(),
            inputs.value,
            inputs.gas_limit,
        );
        None
    }

    fn call_end(&mut self, _context: &mut CTX, _inputs: &CallInputs, outcome: &mut CallOutcome) {
        self.exit(
            outcome.result.result,
            outcome.result.gas.spent(),
            outcome.result.output.clone(),
            None,
        );
    }

    fn create_end(&mut self, _context: &mut CTX, _inputs: &CreateInputs, outcome: &mut CreateOutcome) {
        self.exit(
            outcome.result.result,
            outcome.result.gas.spent(),
            outcome.result.output.clone(),
            outcome.address,
        );
    }
}

impl Reset for EventRecorder {
    fn reset(&mut self) {
        self.events = Vec::new();
        self.open_frames = 0;
    }
}

impl TraceOutput for EventRecorder {
    type Output = Vec<CallEvent>;

    fn take_output(&mut self) -> Self::Output {
        self.open_frames = 0;
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_results() {
        assert_eq!(classify(InstructionResult::Stop), ExitOutcome::Success);
        assert_eq!(classify(InstructionResult::Return), ExitOutcome::Success);
        assert_eq!(classify(InstructionResult::Revert), ExitOutcome::Revert);
        assert!(matches!(classify(InstructionResult::OutOfGas), ExitOutcome::Halt(_)));
    }

    #[test]
    fn test_take_output_empties_recorder() {
        let mut recorder = EventRecorder::new();
        recorder.enter(
            MessageKind::Create {
                scheme: revm::interpreter::CreateScheme::Create,
            },
            Address::ZERO,
            Bytes::new(),
            Default::default(),
            100,
        );
        recorder.exit(InstructionResult::Stop, 10, Bytes::new(), Some(Address::repeat_byte(1)));

        let events = recorder.take_output();
        assert_eq!(events.len(), 2);
        assert!(recorder.events().is_empty());
        match &events[1] {
            CallEvent::ExitMessage(exit) => {
                assert_eq!(exit.created_address, Some(Address::repeat_byte(1)));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_failed_create_reports_no_address() {
        let mut recorder = EventRecorder::without_steps();
        recorder.enter(
            MessageKind::Create {
                scheme: revm::interpreter::CreateScheme::Create,
            },
            Address::ZERO,
            Bytes::new(),
            Default::default(),
            100,
        );
        recorder.exit(InstructionResult::Revert, 10, Bytes::new(), Some(Address::repeat_byte(1)));

        match recorder.events().last() {
            Some(CallEvent::ExitMessage(exit)) => assert!(exit.created_address.is_none()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
