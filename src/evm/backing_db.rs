//! Backing state for the provider's cache database
//!
//! The provider always executes against a `CacheDB`; this module supplies
//! the state underneath it:
//! - `Local`: empty state, only genesis accounts exist
//! - `Fork`: state fetched lazily from a remote node at a pinned block
//!
//! The fork variant bridges revm's synchronous `DatabaseRef` to alloy's
//! async provider by blocking on the current tokio runtime, which must be a
//! multi-threaded one.

use alloy::{
    eips::BlockId,
    network::Ethereum,
    primitives::{keccak256, Address, B256},
    providers::DynProvider,
};
use revm::{
    database::{AlloyDB, DBErrorMarker, DatabaseRef},
    database_interface::async_db::DatabaseAsyncRef,
    primitives::{StorageKey, StorageValue},
    state::{AccountInfo, Bytecode},
};
use core::future::Future;
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::errors::InitError;

/// State access failures of the backing database
#[derive(Debug, Error)]
pub enum BackingDbError {
    /// The remote node could not serve a state request
    #[error("Fork backend error: {0}")]
    Fork(String),
}

impl DBErrorMarker for BackingDbError {}

/// Remote state pinned at one block
#[derive(Debug)]
pub struct ForkDb {
    db: AlloyDB<Ethereum, DynProvider>,
    rt: Handle,
}

impl ForkDb {
    /// Wraps a remote provider pinned at `block`
    ///
    /// # Errors
    /// * `InitError::Fork` - No tokio runtime is available, or the current
    ///   runtime is single-threaded
    pub fn new(provider: DynProvider, block: BlockId) -> Result<Self, InitError> {
        let rt = Handle::try_current().map_err(|_| {
            InitError::Fork("forking requires a running tokio runtime".to_string())
        })?;
        if rt.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(InitError::Fork(
                "forking requires a multi-threaded runtime; use #[tokio::test(flavor = \"multi_thread\")]"
                    .to_string(),
            ));
        }
        Ok(Self {
            db: AlloyDB::new(provider, block),
            rt,
        })
    }

    #[inline]
    fn block_on<F>(&self, f: F) -> F::Output
    where
        F: Future + Send,
        F::Output: Send,
    {
        tokio::task::block_in_place(move || self.rt.block_on(f))
    }
}

/// State underneath the provider's cache
#[derive(Debug)]
pub enum BackingDb {
    /// Empty state
    Local,
    /// Remote state
    Fork(Box<ForkDb>),
}

impl BackingDb {
    /// Check if state is fetched from a remote node
    pub fn is_fork(&self) -> bool {
        matches!(self, BackingDb::Fork(_))
    }
}

fn fork_error(error: impl ToString) -> BackingDbError {
    BackingDbError::Fork(error.to_string())
}

impl DatabaseRef for BackingDb {
    type Error = BackingDbError;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        match self {
            BackingDb::Local => Ok(None),
            BackingDb::Fork(fork) => fork
                .block_on(fork.db.basic_async_ref(address))
                .map_err(fork_error),
        }
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        match self {
            BackingDb::Local => Ok(Bytecode::default()),
            BackingDb::Fork(fork) => fork
                .block_on(fork.db.code_by_hash_async_ref(code_hash))
                .map_err(fork_error),
        }
    }

    fn storage_ref(&self, address: Address, index: StorageKey) -> Result<StorageValue, Self::Error> {
        match self {
            BackingDb::Local => Ok(StorageValue::ZERO),
            BackingDb::Fork(fork) => fork
                .block_on(fork.db.storage_async_ref(address, index))
                .map_err(fork_error),
        }
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        match self {
            // Same scheme as revm's EmptyDB
            BackingDb::Local => Ok(keccak256(number.to_string().as_bytes())),
            BackingDb::Fork(fork) => fork
                .block_on(fork.db.block_hash_async_ref(number))
                .map_err(fork_error),
        }
    }
}
