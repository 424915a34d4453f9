//! Test-scoped owner of a provider, its trace collector and optional server
//!
//! ```rust,no_run
//! use evm_trace_harness::{config::HarnessOptions, harness::ProviderHarness, types::TxData};
//!
//! # async fn example() -> Result<(), evm_trace_harness::errors::HarnessError> {
//! let harness = ProviderHarness::start(HarnessOptions::json_rpc()).await?;
//! let executor = harness.executor(harness.provider().accounts()[0]);
//!
//! // PUSH1 0 PUSH1 0 RETURN
//! let traced = executor.trace_transaction(TxData::deploy(vec![0x60, 0x00, 0x60, 0x00, 0xf3])).await?;
//! assert!(traced.is_success());
//!
//! harness.teardown().await?;
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    client::HarnessClient,
    config::HarnessOptions,
    errors::{HarnessError, TeardownError},
    executor::RequestExecutor,
    provider::{DevProvider, ProviderLogger},
    server::JsonRpcServer,
    trace::SharedTraceCollector,
    types::{Address, ServerInfo},
};

/// Provider, collector and transport for one test
///
/// Dropping the harness without [`teardown`](ProviderHarness::teardown)
/// aborts its background tasks.
pub struct ProviderHarness {
    provider: Arc<DevProvider>,
    collector: SharedTraceCollector,
    client: HarnessClient,
    server: Option<JsonRpcServer>,
    interval_mining: Option<JoinHandle<()>>,
    teardown_timeout: Duration,
}

impl ProviderHarness {
    /// Builds the provider, registers a fresh trace collector and, when
    /// `use_json_rpc` is set, starts a loopback server and routes the client
    /// through it
    ///
    /// # Errors
    /// * `HarnessError::Init` - Provider or client setup failed
    /// * `HarnessError::Server` - The server could not be started
    pub async fn start(options: HarnessOptions) -> Result<Self, HarnessError> {
        let logger = ProviderLogger::new(options.logger_enabled);
        let provider = Arc::new(DevProvider::new(options.provider, logger).await?);

        let collector = SharedTraceCollector::new();
        provider.register_hooks(Arc::new(collector.clone()));

        let (client, server) = if options.use_json_rpc {
            let server = JsonRpcServer::listen(provider.clone(), &options.server).await?;
            let client = HarnessClient::http(&server.info().url())?;
            (client, Some(server))
        } else {
            (HarnessClient::Direct(provider.clone()), None)
        };

        let interval_mining = provider.start_interval_mining();
        debug!(json_rpc = options.use_json_rpc, "provider harness started");

        Ok(Self {
            provider,
            collector,
            client,
            server,
            interval_mining,
            teardown_timeout: options.teardown_timeout,
        })
    }

    /// Client routed the way the harness was configured
    pub fn client(&self) -> &HarnessClient {
        &self.client
    }

    /// The in-process provider, whatever the transport
    pub fn provider(&self) -> &Arc<DevProvider> {
        &self.provider
    }

    /// Trace collector registered with the provider
    pub fn collector(&self) -> &SharedTraceCollector {
        &self.collector
    }

    /// Provider log lines recorded so far
    pub fn logger(&self) -> &ProviderLogger {
        self.provider.logger()
    }

    /// Address of the JSON-RPC server, when one is running
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server.as_ref().map(JsonRpcServer::info)
    }

    /// Request executor sending from `sender` through this harness's client
    pub fn executor(&self, sender: Address) -> RequestExecutor {
        RequestExecutor::new(self.client.clone(), self.collector.clone(), sender)
    }

    /// Stops interval mining and closes the server within the teardown bound
    ///
    /// # Errors
    /// * `TeardownError::Timeout` - Closing took longer than the bound; the
    ///   server task is aborted
    /// * `TeardownError::Server` - The server reported an error while closing
    pub async fn teardown(mut self) -> Result<(), HarnessError> {
        if let Some(task) = self.interval_mining.take() {
            task.abort();
        }
        let Some(mut server) = self.server.take() else {
            return Ok(());
        };

        let limit = self.teardown_timeout;
        let started = Instant::now();
        let closed = tokio::time::timeout(limit, server.close()).await;
        match closed {
            Ok(Ok(())) => {
                info!(elapsed_ms = started.elapsed().as_millis() as u64, "provider harness torn down");
                Ok(())
            }
            Ok(Err(error)) => Err(TeardownError::Server(error.to_string()).into()),
            Err(_) => {
                server.abort();
                let elapsed = started.elapsed();
                warn!(limit_ms = limit.as_millis() as u64, "server close timed out");
                Err(TeardownError::Timeout { elapsed, limit }.into())
            }
        }
    }
}

impl Drop for ProviderHarness {
    fn drop(&mut self) {
        if let Some(task) = self.interval_mining.take() {
            task.abort();
        }
    }
}
