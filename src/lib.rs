//! # EVM Provider Test Harness
//!
//! A test-support library that boots an in-process EVM development provider
//! and captures hierarchical execution traces of the transactions it runs.
//!
//! ## Core Features
//!
//! - **Provider Bootstrapping**
//!   - Deterministic genesis accounts, chain id and hardfork
//!   - Automining, manual mining and interval mining
//!   - Optional state forking from a remote node
//!
//! - **Execution Trace Capture**
//!   - Call trees assembled from enter/step/exit events
//!   - Revert and halt reasons retained next to the trace
//!   - Sequencing violations reported as harness defects
//!
//! - **Transports**
//!   - Direct in-process requests
//!   - Loopback HTTP JSON-RPC server with bounded teardown
//!
//! ## Features
//!
//! - `rustls-tls`: Uses rustls as the TLS implementation instead of native-tls (OpenSSL)
//!   for the HTTP client and the fork backend.
//!
//!   Usage example:
//!   ```toml
//!   [dependencies]
//!   evm-trace-harness = { version = "0.1", default-features = false, features = ["rustls-tls"] }
//!   ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use evm_trace_harness::{HarnessOptions, ProviderHarness, TxData};
//!
//! # async fn example() -> Result<(), evm_trace_harness::HarnessError> {
//! let harness = ProviderHarness::start(HarnessOptions::default()).await?;
//! let executor = harness.executor(harness.provider().accounts()[0]);
//!
//! // Deploy init code that reverts: PUSH1 0 PUSH1 0 REVERT
//! let traced = executor
//!     .trace_transaction(TxData::deploy(vec![0x60, 0x00, 0x60, 0x00, 0xfd]))
//!     .await?;
//!
//! assert!(traced.trace.is_create());
//! match traced.error {
//!     Some(failure) => println!("Top-level call failed: {failure}"),
//!     None => println!("Deployed at {:?}", traced.created_address()),
//! }
//!
//! harness.teardown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - `trace`: Call tree model, event sink and trace collector
//! - `inspectors`: revm inspector turning execution hooks into events
//! - `evm`: Chain state, EVM construction and transaction processing
//! - `provider`: Development provider and its JSON-RPC method table
//! - `server`: HTTP JSON-RPC server
//! - `client`: Direct or HTTP request path
//! - `executor`: Traced request execution
//! - `harness`: Per-test provider lifecycle
//! - `config`: Configuration types and defaults
//! - `types`: Core data structures
//! - `traits`: Trait definitions for extensibility
//! - `errors`: Error types and handling
//! - `utils`: ABI and revert data helpers

pub mod client;
pub mod config;
pub mod errors;
pub mod evm;
pub mod executor;
pub mod harness;
pub mod inspectors;
pub mod provider;
pub mod server;
pub mod trace;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export only the essential types and functions
pub use client::HarnessClient;
pub use config::{HarnessOptions, ProviderConfig};
pub use errors::{HarnessError, ProviderError, TraceFailure};
pub use executor::{RequestExecutor, TracedTransaction};
pub use harness::ProviderHarness;
pub use provider::DevProvider;
pub use trace::{MessageTrace, SharedTraceCollector};
pub use traits::ExecutionHooks;
pub use types::TxData;
