//! Transaction processing implementation for TraceEvm
//!
//! Executes one transaction with the event recorder attached and commits its
//! state changes to the borrowed chain state. Read-only calls run the same
//! transaction without recording or committing.

use crate::{
    errors::ProviderError,
    evm::TraceEvm,
    inspectors::EventRecorder,
    trace::CallEvent,
    traits::{Reset, TraceOutput},
    types::SimulationTx,
};

use revm::{
    context::{ContextTr, TxEnv},
    context_interface::result::{EVMError, ExecutionResult},
    database::{CacheDB, Database, DatabaseRef},
    ExecuteEvm, InspectCommitEvm,
};
use std::fmt::Display;
use tracing::trace;

fn map_evm_error<E: Display>(error: EVMError<E>) -> ProviderError {
    match error {
        EVMError::Transaction(e) => ProviderError::InvalidTransaction(e.to_string()),
        EVMError::Database(e) => ProviderError::Database(e.to_string()),
        other => ProviderError::InvalidTransaction(other.to_string()),
    }
}

impl<'db, DB> TraceEvm<&'db mut CacheDB<DB>, EventRecorder>
where
    DB: DatabaseRef,
{
    /// Process a single transaction with event recording
    ///
    /// # Arguments
    /// * `input` - Transaction parameters and data
    ///
    /// # Returns
    /// * `Ok((ExecutionResult, Vec<CallEvent>))` - Committed result and the
    ///   recorded event queue, in emission order
    /// * `Err(ProviderError)` - The transaction was rejected before execution
    ///
    /// # Implementation Details
    /// 1. Resets recorder state before execution
    /// 2. Builds the transaction environment with the sender's current nonce
    /// 3. Executes and commits the transaction
    /// 4. Drains the recorder, also on rejection
    pub fn process_transaction(
        &mut self,
        input: SimulationTx,
    ) -> Result<(ExecutionResult, Vec<CallEvent>), ProviderError> {
        self.inspector.reset();
        let tx = self.tx_env(input)?;

        let recorder = self.inspector.clone();
        let result = self.inspect_commit(tx, recorder).map_err(map_evm_error);
        let events = self.inspector.take_output();
        let result = result?;

        trace!(events = events.len(), gas_used = result.gas_used(), "transaction executed");
        Ok((result, events))
    }

    /// Executes a transaction without recording events or committing state
    pub fn call_transaction(&mut self, input: SimulationTx) -> Result<ExecutionResult, ProviderError> {
        let tx = self.tx_env(input)?;
        let result = self.transact(tx).map_err(map_evm_error)?.result;
        trace!(gas_used = result.gas_used(), "call executed");
        Ok(result)
    }

    /// Transaction environment with the sender's current nonce
    fn tx_env(&mut self, input: SimulationTx) -> Result<TxEnv, ProviderError> {
        let nonce = self
            .ctx
            .db()
            .basic(input.caller)
            .map_err(|e| ProviderError::Database(e.to_string()))?
            .map(|account| account.nonce)
            .unwrap_or_default();
        let chain_id = self.ctx.cfg.chain_id;
        Ok(TxEnv::builder()
            .caller(input.caller)
            .kind(input.transact_to)
            .value(input.value)
            .data(input.data)
            .gas_limit(input.gas_limit)
            .gas_price(input.gas_price)
            .nonce(nonce)
            .chain_id(Some(chain_id))
            .build_fill())
    }
}
