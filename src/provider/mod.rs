//! In-process development provider
//!
//! `DevProvider` owns the chain state, the block counter, the mempool and
//! the mining mode. Requests are serialized by one async mutex; the engine
//! runs synchronously while it is held. After every transaction
//! the recorded event queue is handed, in order, to each registered
//! [`ExecutionHooks`] implementation before the request returns.
//!
//! ## Key Components
//!
//! - **`DevProvider`**: transaction submission, mining and state queries
//! - **`rpc`**: the JSON-RPC method table served by the provider
//! - **`mempool`**: pending transactions while automining is off
//! - **`logger`**: recorded log lines

use alloy::{primitives::keccak256, rpc::types::TransactionRequest};
use parking_lot::RwLock;
use revm::context_interface::result::ExecutionResult;
use std::sync::{Arc, Weak};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    config::{ProviderConfig, DEFAULT_GAS_PRICE},
    errors::{InitError, ProviderError},
    evm::{create_chain_state, ChainState},
    trace::CallEvent,
    traits::ExecutionHooks,
    types::{Address, BlockEnv, Bytes, SimulationTx, TxKind, B256, U256},
    utils::error_utils::describe_revert,
};

pub mod logger;
pub mod mempool;
pub mod rpc;

pub use logger::ProviderLogger;
pub use mempool::{Mempool, PendingTx};

/// Mutable provider state guarded by the request mutex
struct ProviderState {
    chain: ChainState,
    /// Last mined block
    head: BlockEnv,
    automine: bool,
    mempool: Mempool,
}

impl ProviderState {
    /// Marks the block under construction as mined and opens the next one
    fn seal_block(&mut self, config: &ProviderConfig) -> BlockEnv {
        let mined = self.chain.block_env();
        self.head = mined;
        let next = BlockEnv {
            number: mined.number + 1,
            timestamp: mined.timestamp + 1,
        };
        if let Err(error) = self.chain.open_block(next, config) {
            // The hardfork was resolved at startup; keep it
            warn!(%error, "keeping current hardfork");
            self.chain.set_block_env(next);
        }
        mined
    }
}

/// Development provider executing transactions on revm
pub struct DevProvider {
    config: ProviderConfig,
    accounts: Vec<Address>,
    state: Mutex<ProviderState>,
    hooks: RwLock<Vec<Arc<dyn ExecutionHooks>>>,
    logger: ProviderLogger,
}

impl DevProvider {
    /// Creates a provider with funded genesis accounts
    ///
    /// # Errors
    /// Any [`InitError`] raised while resolving the hardfork, the genesis
    /// keys or the fork backend
    pub async fn new(config: ProviderConfig, logger: ProviderLogger) -> Result<Self, InitError> {
        let accounts = config.account_addresses()?;
        let (chain, head) = create_chain_state(&config).await?;
        info!(
            chain_id = config.chain_id,
            hardfork = %config.hardfork,
            head = head.number,
            accounts = accounts.len(),
            "development provider created"
        );

        Ok(Self {
            accounts,
            state: Mutex::new(ProviderState {
                chain,
                head,
                automine: config.mining.auto,
                mempool: Mempool::default(),
            }),
            hooks: RwLock::new(Vec::new()),
            logger,
            config,
        })
    }

    /// Registers a consumer of execution events
    pub fn register_hooks(&self, hooks: Arc<dyn ExecutionHooks>) {
        self.hooks.write().push(hooks);
    }

    /// Configuration the provider was built with
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Recorded provider log lines
    pub fn logger(&self) -> &ProviderLogger {
        &self.logger
    }

    /// Chain id reported by `eth_chainId`
    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// Network id reported by `net_version`
    pub fn network_id(&self) -> u64 {
        self.config.network_id
    }

    /// Addresses of the genesis accounts, in configuration order
    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// Number of the last mined block
    pub async fn block_number(&self) -> u64 {
        self.state.lock().await.head.number
    }

    /// Environment of the last mined block
    pub async fn head(&self) -> BlockEnv {
        self.state.lock().await.head
    }

    /// Whether each submitted transaction is mined immediately
    pub async fn automine(&self) -> bool {
        self.state.lock().await.automine
    }

    /// Switches automining; queued transactions stay queued
    pub async fn set_automine(&self, enabled: bool) {
        self.state.lock().await.automine = enabled;
        debug!(enabled, "automine toggled");
    }

    /// Number of transactions waiting to be mined
    pub async fn pending_transactions(&self) -> usize {
        self.state.lock().await.mempool.len()
    }

    /// Committed balance of `address`
    pub async fn balance(&self, address: Address) -> Result<U256, ProviderError> {
        self.state.lock().await.chain.account_balance(address)
    }

    /// Committed nonce of `address`, excluding queued transactions
    pub async fn nonce(&self, address: Address) -> Result<u64, ProviderError> {
        self.state.lock().await.chain.account_nonce(address)
    }

    /// Deployed code of `address`
    pub async fn code(&self, address: Address) -> Result<Bytes, ProviderError> {
        self.state.lock().await.chain.account_code(address)
    }

    /// Submits a transaction
    ///
    /// Missing fields default to the first genesis account as sender,
    /// [`DEFAULT_GAS_PRICE`], the block gas limit and zero value. With
    /// automining the transaction is executed in its own block before this
    /// returns; otherwise it is queued until the next [`mine_block`].
    ///
    /// # Returns
    /// The transaction hash
    ///
    /// # Errors
    /// * `ProviderError::UnknownAccount` - Sender is not a genesis account
    /// * `ProviderError::InvalidTransaction` - Rejected before execution
    /// * `ProviderError::Hooks` - A registered hook rejected the event
    ///   stream. The transaction is committed and its block mined.
    /// * `ProviderError::TransactionReverted` / `TransactionHalted` -
    ///   Execution failed and `throw_on_transaction_failures` is set. The
    ///   hooks have already received the full event stream.
    ///
    /// [`mine_block`]: DevProvider::mine_block
    pub async fn send_transaction(&self, request: TransactionRequest) -> Result<B256, ProviderError> {
        let tx = self.simulation_tx(request)?;
        let mut state = self.state.lock().await;

        let nonce = state.chain.account_nonce(tx.caller)? + state.mempool.pending_from(tx.caller);
        let hash = transaction_hash(tx.caller, nonce);

        if !state.automine {
            state.mempool.push(PendingTx { hash, nonce, tx });
            self.logger
                .log_line(format!("  Transaction {hash} queued ({} pending)", state.mempool.len()));
            return Ok(hash);
        }

        let (result, dispatched) = self.execute(&mut state, hash, tx)?;
        let block = state.seal_block(&self.config);
        self.logger.log_line(format!("  Block #{}", block.number));
        dispatched?;

        if self.config.throw_on_transaction_failures {
            failure_to_error(&result)?;
        }
        Ok(hash)
    }

    /// Executes a request against the pending block without committing it
    ///
    /// Any address may be the sender. Gas price defaults to the base fee.
    /// No execution events are dispatched.
    ///
    /// # Returns
    /// The returned data, or the revert data of a failed call when
    /// `throw_on_call_failures` is off
    ///
    /// # Errors
    /// * `ProviderError::TransactionReverted` / `TransactionHalted` -
    ///   Execution failed and `throw_on_call_failures` is set
    pub async fn call(&self, request: TransactionRequest) -> Result<Bytes, ProviderError> {
        let tx = self.request_to_tx(request, u128::from(self.config.initial_base_fee_per_gas))?;
        let mut state = self.state.lock().await;
        let result = state.chain.evm().call_transaction(tx)?;

        if self.config.throw_on_call_failures {
            failure_to_error(&result)?;
        }
        Ok(match result {
            ExecutionResult::Success { output, .. } => output.into_data(),
            ExecutionResult::Revert { output, .. } => output,
            ExecutionResult::Halt { .. } => Bytes::new(),
        })
    }

    /// Mines the queued transactions as one block
    ///
    /// # Arguments
    /// * `timestamp` - Block timestamp; defaults to one second after the head
    ///
    /// # Returns
    /// The mined block
    ///
    /// # Errors
    /// * `ProviderError::InvalidParams` - The timestamp does not advance past
    ///   the head and `allow_blocks_with_same_timestamp` is off
    /// * `ProviderError::Hooks` - A registered hook rejected an event
    ///   stream. The first rejection is returned after the block is mined.
    pub async fn mine_block(&self, timestamp: Option<u64>) -> Result<BlockEnv, ProviderError> {
        let mut state = self.state.lock().await;

        if let Some(timestamp) = timestamp {
            let head = state.head.timestamp;
            let valid = if self.config.allow_blocks_with_same_timestamp {
                timestamp >= head
            } else {
                timestamp > head
            };
            if !valid {
                return Err(ProviderError::InvalidParams(format!(
                    "timestamp {timestamp} is lower than or equal to previous block's timestamp {head}"
                )));
            }
            let number = state.head.number + 1;
            state.chain.set_block_env(BlockEnv { number, timestamp });
        }

        let queued = state.mempool.drain_ordered(self.config.mempool_order);
        let mut hook_error = None;
        for PendingTx { hash, tx, .. } in queued {
            match self.execute(&mut state, hash, tx) {
                Ok((result, dispatched)) => {
                    if !result.is_success() {
                        debug!(%hash, "queued transaction failed");
                    }
                    if let Err(error) = dispatched {
                        hook_error.get_or_insert(error);
                    }
                }
                Err(error) => warn!(%hash, %error, "dropping queued transaction"),
            }
        }

        let block = state.seal_block(&self.config);
        info!(number = block.number, timestamp = block.timestamp, "mined block");
        self.logger.log_line(format!("  Block #{}", block.number));
        match hook_error {
            Some(error) => Err(error),
            None => Ok(block),
        }
    }

    /// Spawns the interval miner, if one is configured
    ///
    /// The task stops once the provider is dropped. Must be called from
    /// within a tokio runtime.
    pub fn start_interval_mining(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let period = self.config.mining.interval?;
        let provider: Weak<Self> = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(provider) = provider.upgrade() else {
                    break;
                };
                if let Err(error) = provider.mine_block(None).await {
                    warn!(%error, "interval mining failed");
                }
            }
        }))
    }

    /// Runs one transaction and dispatches its events to every hook
    ///
    /// Fails only when the transaction is rejected before execution. Once it
    /// has executed its state is committed, so a hook rejection is returned
    /// next to the result for the caller to report after sealing the block.
    fn execute(
        &self,
        state: &mut ProviderState,
        hash: B256,
        tx: SimulationTx,
    ) -> Result<(ExecutionResult, Result<(), ProviderError>), ProviderError> {
        let caller = tx.caller;
        let (result, events) = state.chain.evm().process_transaction(tx)?;
        let dispatched = self.dispatch(events);

        self.logger.log_line(format!("  Transaction: {hash}"));
        self.logger.log_line(format!("  From:        {caller}"));
        self.logger.log_line(format!("  Gas used:    {}", result.gas_used()));
        debug!(%hash, success = result.is_success(), gas_used = result.gas_used(), "executed transaction");
        Ok((result, dispatched))
    }

    fn dispatch(&self, events: Vec<CallEvent>) -> Result<(), ProviderError> {
        let hooks = self.hooks.read();
        for hook in hooks.iter() {
            hook.on_events(events.clone())?;
        }
        Ok(())
    }

    fn simulation_tx(&self, request: TransactionRequest) -> Result<SimulationTx, ProviderError> {
        let tx = self.request_to_tx(request, DEFAULT_GAS_PRICE)?;
        if !self.accounts.contains(&tx.caller) {
            return Err(ProviderError::UnknownAccount(tx.caller));
        }
        if tx.gas_price < self.config.min_gas_price {
            return Err(ProviderError::InvalidTransaction(format!(
                "gas price {} is below the minimum of {}",
                tx.gas_price, self.config.min_gas_price
            )));
        }
        Ok(tx)
    }

    /// Applies request defaults; a missing sender is the first local account
    fn request_to_tx(&self, request: TransactionRequest, gas_price: u128) -> Result<SimulationTx, ProviderError> {
        let caller = match request.from {
            Some(from) => from,
            None => *self
                .accounts
                .first()
                .ok_or_else(|| ProviderError::InvalidTransaction("no sender and no local accounts".into()))?,
        };

        Ok(SimulationTx {
            caller,
            transact_to: request.to.unwrap_or(TxKind::Create),
            value: request.value.unwrap_or_default(),
            data: request.input.into_input().unwrap_or_default(),
            gas_limit: request.gas.unwrap_or(self.config.block_gas_limit),
            gas_price: request.gas_price.unwrap_or(gas_price),
        })
    }
}

/// Deterministic hash standing in for the signed transaction hash
fn transaction_hash(sender: Address, nonce: u64) -> B256 {
    let mut preimage = [0u8; 28];
    preimage[..20].copy_from_slice(sender.as_slice());
    preimage[20..].copy_from_slice(&nonce.to_be_bytes());
    keccak256(preimage)
}

fn failure_to_error(result: &ExecutionResult) -> Result<(), ProviderError> {
    match result {
        ExecutionResult::Success { .. } => Ok(()),
        ExecutionResult::Revert { output, .. } => Err(ProviderError::TransactionReverted {
            reason: describe_revert(output),
        }),
        ExecutionResult::Halt { reason, .. } => Err(ProviderError::TransactionHalted {
            reason: format!("{reason:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{MempoolOrder, MiningConfig, FIRST_DEFAULT_ACCOUNT},
        errors::TraceError,
        trace::SharedTraceCollector,
    };
    use alloy::rpc::types::TransactionInput;

    fn transfer(to: Address, value: u64) -> TransactionRequest {
        TransactionRequest {
            to: Some(TxKind::Call(to)),
            value: Some(U256::from(value)),
            gas: Some(21_000),
            ..Default::default()
        }
    }

    async fn provider(config: ProviderConfig) -> DevProvider {
        DevProvider::new(config, ProviderLogger::new(true)).await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_automine_mines_one_block_per_transaction() {
        let provider = provider(ProviderConfig::default()).await;
        let to = Address::repeat_byte(0x11);

        assert_eq!(provider.block_number().await, 0);
        provider.send_transaction(transfer(to, 5)).await.unwrap();
        provider.send_transaction(transfer(to, 5)).await.unwrap();

        assert_eq!(provider.block_number().await, 2);
        assert_eq!(provider.balance(to).await.unwrap(), U256::from(10));
        assert_eq!(provider.nonce(FIRST_DEFAULT_ACCOUNT).await.unwrap(), 2);
        assert!(provider.logger().lines().iter().any(|line| line.contains("Block #2")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_hooks_receive_events_before_return() {
        let provider = provider(ProviderConfig::default()).await;
        let collector = SharedTraceCollector::new();
        provider.register_hooks(Arc::new(collector.clone()));

        let to = Address::repeat_byte(0x22);
        provider.send_transaction(transfer(to, 1)).await.unwrap();

        let trace = collector.last_top_level_message_trace().unwrap();
        assert_eq!(trace.enter.to(), Some(to));
        assert!(collector.last_error().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_revert_is_reported_after_trace() {
        let provider = provider(ProviderConfig::default()).await;
        let collector = SharedTraceCollector::new();
        provider.register_hooks(Arc::new(collector.clone()));

        // PUSH1 0 PUSH1 0 REVERT
        let request = TransactionRequest {
            input: TransactionInput::new(Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0xfd])),
            ..Default::default()
        };
        let error = provider.send_transaction(request).await.unwrap_err();
        assert!(matches!(error, ProviderError::TransactionReverted { .. }));
        assert!(collector.last_top_level_message_trace().is_some());
        assert!(collector.last_error().unwrap().is_revert());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_sender_is_rejected() {
        let provider = provider(ProviderConfig::default()).await;
        let request = TransactionRequest {
            from: Some(Address::repeat_byte(0xee)),
            ..transfer(Address::repeat_byte(1), 1)
        };
        let error = provider.send_transaction(request).await.unwrap_err();
        assert!(matches!(error, ProviderError::UnknownAccount(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_gas_price_below_minimum_is_rejected() {
        let provider = provider(ProviderConfig {
            min_gas_price: 100,
            ..Default::default()
        })
        .await;
        let error = provider
            .send_transaction(transfer(Address::repeat_byte(1), 1))
            .await
            .unwrap_err();
        assert!(matches!(error, ProviderError::InvalidTransaction(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queued_transactions_mine_in_priority_order() {
        let provider = provider(ProviderConfig {
            mining: MiningConfig {
                auto: false,
                interval: None,
            },
            mempool_order: MempoolOrder::Priority,
            ..Default::default()
        })
        .await;
        let collector = SharedTraceCollector::new();
        provider.register_hooks(Arc::new(collector.clone()));

        let accounts = provider.accounts().to_vec();
        let cheap = TransactionRequest {
            from: Some(accounts[0]),
            gas_price: Some(10),
            ..transfer(Address::repeat_byte(0x31), 1)
        };
        let expensive = TransactionRequest {
            from: Some(accounts[1]),
            gas_price: Some(20),
            ..transfer(Address::repeat_byte(0x32), 1)
        };
        provider.send_transaction(cheap).await.unwrap();
        provider.send_transaction(expensive).await.unwrap();
        assert_eq!(provider.pending_transactions().await, 2);
        assert_eq!(provider.block_number().await, 0);

        let block = provider.mine_block(None).await.unwrap();
        assert_eq!(block.number, 1);
        assert_eq!(provider.pending_transactions().await, 0);

        // The last transaction executed is the cheaper one
        let trace = collector.last_top_level_message_trace().unwrap();
        assert_eq!(trace.enter.to(), Some(Address::repeat_byte(0x31)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_call_leaves_state_untouched() {
        let lenient = provider(ProviderConfig {
            throw_on_call_failures: false,
            ..Default::default()
        })
        .await;
        let provider = provider(ProviderConfig::default()).await;

        // PUSH1 0x2a PUSH1 0 MSTORE8 PUSH1 1 PUSH1 0 RETURN
        let returning = TransactionRequest {
            input: TransactionInput::new(Bytes::from_static(&[
                0x60, 0x2a, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3,
            ])),
            ..Default::default()
        };
        let output = provider.call(returning).await.unwrap();
        assert_eq!(output, Bytes::from_static(&[0x2a]));
        assert_eq!(provider.block_number().await, 0);
        assert_eq!(provider.nonce(FIRST_DEFAULT_ACCOUNT).await.unwrap(), 0);

        // PUSH1 0 PUSH1 0 REVERT
        let reverting = TransactionRequest {
            input: TransactionInput::new(Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0xfd])),
            ..Default::default()
        };
        let error = provider.call(reverting.clone()).await.unwrap_err();
        assert!(matches!(error, ProviderError::TransactionReverted { .. }));
        assert!(lenient.call(reverting).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queued_transactions_keep_sender_nonce_order() {
        let provider = provider(ProviderConfig {
            mining: MiningConfig {
                auto: false,
                interval: None,
            },
            mempool_order: MempoolOrder::Priority,
            ..Default::default()
        })
        .await;
        let collector = SharedTraceCollector::new();
        provider.register_hooks(Arc::new(collector.clone()));

        let first = TransactionRequest {
            gas_price: Some(10),
            ..transfer(Address::repeat_byte(0xa1), 1)
        };
        let second = TransactionRequest {
            gas_price: Some(20),
            ..transfer(Address::repeat_byte(0xb2), 1)
        };
        provider.send_transaction(first).await.unwrap();
        provider.send_transaction(second).await.unwrap();
        provider.mine_block(None).await.unwrap();

        // Both executed, the pricier second one last
        let trace = collector.last_top_level_message_trace().unwrap();
        assert_eq!(trace.enter.to(), Some(Address::repeat_byte(0xb2)));
        assert_eq!(provider.nonce(FIRST_DEFAULT_ACCOUNT).await.unwrap(), 2);
        assert_eq!(provider.balance(Address::repeat_byte(0xa1)).await.unwrap(), U256::from(1));
    }

    struct RejectingHooks;

    impl ExecutionHooks for RejectingHooks {
        fn on_before_message(&self, _message: crate::trace::EnterMessage) -> Result<(), TraceError> {
            Err(TraceError::ExitWithoutEnter)
        }

        fn on_step(&self, _step: crate::trace::StepData) -> Result<(), TraceError> {
            Ok(())
        }

        fn on_after_message(&self, _message: crate::trace::ExitMessage) -> Result<(), TraceError> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_hook_rejection_still_mines_block() {
        let provider = provider(ProviderConfig::default()).await;
        provider.register_hooks(Arc::new(RejectingHooks));
        let to = Address::repeat_byte(0x55);

        let error = provider.send_transaction(transfer(to, 1)).await.unwrap_err();
        assert!(matches!(error, ProviderError::Hooks(_)));
        assert_eq!(provider.block_number().await, 1);
        assert_eq!(provider.balance(to).await.unwrap(), U256::from(1));

        // The next transaction lands in a fresh block
        provider.send_transaction(transfer(to, 1)).await.unwrap_err();
        assert_eq!(provider.block_number().await, 2);

        provider.set_automine(false).await;
        provider.send_transaction(transfer(to, 1)).await.unwrap();
        let error = provider.mine_block(None).await.unwrap_err();
        assert!(matches!(error, ProviderError::Hooks(_)));
        assert_eq!(provider.block_number().await, 3);
        assert_eq!(provider.balance(to).await.unwrap(), U256::from(3));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mine_rejects_stale_timestamp() {
        let provider = provider(ProviderConfig::default()).await;
        let head = provider.head().await;

        let error = provider.mine_block(Some(head.timestamp)).await.unwrap_err();
        assert!(matches!(error, ProviderError::InvalidParams(_)));

        let block = provider.mine_block(Some(head.timestamp + 100)).await.unwrap();
        assert_eq!(block.timestamp, head.timestamp + 100);
        assert_eq!(provider.head().await, block);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_same_timestamp_allowed_when_configured() {
        let provider = provider(ProviderConfig {
            allow_blocks_with_same_timestamp: true,
            ..Default::default()
        })
        .await;
        let head = provider.head().await;
        let block = provider.mine_block(Some(head.timestamp)).await.unwrap();
        assert_eq!(block.timestamp, head.timestamp);
    }

    #[test]
    fn test_transaction_hash_depends_on_nonce() {
        let sender = Address::repeat_byte(0xab);
        assert_ne!(transaction_hash(sender, 0), transaction_hash(sender, 1));
        assert_eq!(transaction_hash(sender, 3), transaction_hash(sender, 3));
    }
}
