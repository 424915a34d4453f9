//! Core EVM wrapper used by the development provider
//!
//! This module provides the `TraceEvm` wrapper around revm's `MainnetEvm`
//! and the persistent chain state the provider owns.
//!
//! ## Key Components
//!
//! - **`TraceEvm`**: Wrapper struct giving transparent access to revm's EVM
//! - **`state`**: `ChainState`, the committed state and environment an EVM
//!   is built from for each transaction
//! - **`builder`**: Builds the chain state from a [`ProviderConfig`](crate::config::ProviderConfig)
//! - **`processor`**: Executes one transaction and returns its recorded events
//! - **`backing_db`**: Local or forked state underneath the cache

use revm::database::CacheDB;
pub use revm::{
    context_interface::ContextTr,
    database::Database,
    handler::MainnetContext,
    MainnetEvm,
};
use std::ops::{Deref, DerefMut};

use crate::inspectors::EventRecorder;

pub mod backing_db;
pub mod builder;
pub mod processor;
pub mod state;

pub use backing_db::{BackingDb, BackingDbError, ForkDb};
pub use builder::create_chain_state;
pub use state::ChainState;

/// EVM instance borrowing the provider's chain state for one transaction
pub type HarnessEvm<'db> = TraceEvm<&'db mut CacheDB<BackingDb>, EventRecorder>;

/// EVM wrapper with event recording
///
/// # Type Parameters
/// - `DB`: Database backend implementing the `Database` trait
/// - `INSP`: Inspector driven during execution
pub struct TraceEvm<DB: Database, INSP>(MainnetEvm<MainnetContext<DB>, INSP>);

impl<DB, INSP> TraceEvm<DB, INSP>
where
    DB: Database,
{
    /// Wraps a configured `MainnetEvm`
    pub fn new(evm: MainnetEvm<MainnetContext<DB>, INSP>) -> Self {
        Self(evm)
    }
}

/// Transparent access to the underlying MainnetEvm
impl<DB, INSP> Deref for TraceEvm<DB, INSP>
where
    DB: Database,
{
    type Target = MainnetEvm<MainnetContext<DB>, INSP>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<DB, INSP> DerefMut for TraceEvm<DB, INSP>
where
    DB: Database,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
