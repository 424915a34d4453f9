//! Sends one transaction and retrieves its execution trace
//!
//! `RequestExecutor` is bound to a client and to the trace collector that is
//! registered with the same provider. Each call clears the collector, submits
//! the request and reads back the top-level trace recorded for it.

use alloy::rpc::types::{TransactionInput, TransactionRequest};
use tracing::debug;

use crate::{
    client::HarnessClient,
    config::{DEFAULT_GAS_PRICE, DEFAULT_TX_GAS_LIMIT},
    errors::{HarnessError, TraceFailure},
    trace::{MessageTrace, SharedTraceCollector},
    types::{Address, TxData},
};

/// Trace of one request, with the failure observed while producing it
#[derive(Debug, Clone)]
pub struct TracedTransaction {
    /// Top-level message trace
    pub trace: MessageTrace,
    /// Terminal failure recorded by the collector, if the top-level call
    /// did not succeed
    pub error: Option<TraceFailure>,
    /// Error returned by the submission, if any
    pub submission_error: Option<String>,
}

impl TracedTransaction {
    /// Whether the top-level call succeeded and no failure was recorded
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.trace.is_success()
    }

    /// Deployed address when the request was a successful deployment
    pub fn created_address(&self) -> Option<Address> {
        self.trace.created_address()
    }
}

/// Clears the collector's last error when dropped
struct ClearLastError<'a>(&'a SharedTraceCollector);

impl Drop for ClearLastError<'_> {
    fn drop(&mut self) {
        self.0.clear_last_error();
    }
}

/// Executor of traced requests
#[derive(Clone)]
pub struct RequestExecutor {
    client: HarnessClient,
    collector: SharedTraceCollector,
    sender: Address,
}

impl RequestExecutor {
    /// Creates an executor sending from `sender`
    ///
    /// `collector` must be registered with the provider `client` talks to.
    pub fn new(client: HarnessClient, collector: SharedTraceCollector, sender: Address) -> Self {
        Self {
            client,
            collector,
            sender,
        }
    }

    /// Account every request is sent from
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Builds the submitted request, applying default gas, price and value
    pub fn transaction_request(&self, tx: TxData) -> TransactionRequest {
        TransactionRequest {
            from: Some(self.sender),
            to: Some(tx.kind()),
            value: Some(tx.value.unwrap_or_default()),
            gas: Some(tx.gas.unwrap_or(DEFAULT_TX_GAS_LIMIT)),
            gas_price: Some(DEFAULT_GAS_PRICE),
            input: TransactionInput::new(tx.data),
            ..Default::default()
        }
    }

    /// Sends `tx` and returns its top-level trace
    ///
    /// A failed submission does not fail the call as long as a trace was
    /// recorded; the failure is reported in the returned value instead. The
    /// collector's last error is cleared on every exit path.
    ///
    /// # Errors
    /// When no trace was recorded, in order of precedence:
    /// * `HarnessError::Trace` - The collector recorded a failure
    /// * `HarnessError::Provider` - The submission failed
    /// * `HarnessError::NoTraceProduced` - Neither happened; with automining
    ///   off this is expected until the block is mined
    pub async fn trace_transaction(&self, tx: TxData) -> Result<TracedTransaction, HarnessError> {
        self.collector.clear();
        let _clear_on_exit = ClearLastError(&self.collector);

        let request = self.transaction_request(tx);
        let submission_error = match self.client.send_transaction(request).await {
            Ok(hash) => {
                debug!(%hash, "request submitted");
                None
            }
            Err(error) => {
                debug!(%error, "request failed");
                Some(error)
            }
        };

        let error = self.collector.last_error();
        let Some(trace) = self.collector.last_top_level_message_trace() else {
            return Err(match (error, submission_error) {
                (Some(failure), _) => HarnessError::Trace(failure),
                (None, Some(error)) => HarnessError::Provider(error),
                (None, None) => HarnessError::NoTraceProduced,
            });
        };

        Ok(TracedTransaction {
            trace,
            error,
            submission_error: submission_error.map(|e| e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ProviderConfig, FIRST_DEFAULT_ACCOUNT},
        provider::{DevProvider, ProviderLogger},
        types::{Bytes, TxKind, U256},
    };
    use std::sync::Arc;

    async fn executor(config: ProviderConfig) -> (RequestExecutor, SharedTraceCollector) {
        let provider = Arc::new(DevProvider::new(config, ProviderLogger::default()).await.unwrap());
        let collector = SharedTraceCollector::new();
        provider.register_hooks(Arc::new(collector.clone()));
        let executor = RequestExecutor::new(HarnessClient::Direct(provider), collector.clone(), FIRST_DEFAULT_ACCOUNT);
        (executor, collector)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_request_defaults() {
        let (executor, _) = executor(ProviderConfig::default()).await;
        let request = executor.transaction_request(TxData::deploy(vec![0x00]));

        assert_eq!(request.from, Some(FIRST_DEFAULT_ACCOUNT));
        assert_eq!(request.to, Some(TxKind::Create));
        assert_eq!(request.gas, Some(DEFAULT_TX_GAS_LIMIT));
        assert_eq!(request.gas_price, Some(DEFAULT_GAS_PRICE));
        assert_eq!(request.value, Some(U256::ZERO));

        let request = executor.transaction_request(TxData::deploy(vec![0x00]).with_gas(50_000));
        assert_eq!(request.gas, Some(50_000));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_successful_request_has_no_error() {
        let (executor, collector) = executor(ProviderConfig::default()).await;
        let to = Address::repeat_byte(0x55);

        let traced = executor
            .trace_transaction(TxData::call(to, Bytes::new()).with_value(U256::from(7)))
            .await
            .unwrap();
        assert!(traced.is_success());
        assert!(traced.submission_error.is_none());
        assert_eq!(traced.trace.enter.to(), Some(to));
        assert!(collector.last_error().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_revert_keeps_trace_and_clears_error() {
        let (executor, collector) = executor(ProviderConfig::default()).await;

        // PUSH1 0 PUSH1 0 REVERT
        let traced = executor
            .trace_transaction(TxData::deploy(vec![0x60, 0x00, 0x60, 0x00, 0xfd]))
            .await
            .unwrap();
        assert!(!traced.is_success());
        assert!(traced.error.as_ref().is_some_and(TraceFailure::is_revert));
        assert!(traced.submission_error.is_some());
        assert!(collector.last_error().is_none());
        assert!(collector.last_top_level_message_trace().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejected_request_surfaces_provider_error() {
        let (executor, _) = executor(ProviderConfig::default()).await;
        let error = executor
            .trace_transaction(TxData::deploy(vec![0x00]).with_gas(1_000))
            .await
            .unwrap_err();
        assert!(matches!(error, HarnessError::Provider(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queued_request_produces_no_trace() {
        let (executor, _) = executor(ProviderConfig {
            mining: crate::config::MiningConfig {
                auto: false,
                interval: None,
            },
            ..Default::default()
        })
        .await;
        let error = executor
            .trace_transaction(TxData::deploy(vec![0x00]))
            .await
            .unwrap_err();
        assert!(matches!(error, HarnessError::NoTraceProduced));
    }
}
