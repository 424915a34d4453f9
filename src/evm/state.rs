//! Committed chain state owned by the provider
//!
//! revm's EVM borrows its database, so the provider keeps the state and the
//! environment here and builds a short-lived [`HarnessEvm`] for each
//! transaction. State queries read the cache directly.

use revm::{
    context::{BlockEnv as RevmBlockEnv, CfgEnv},
    database::{CacheDB, Database},
    primitives::hardfork::SpecId,
};
use std::fmt::Display;
use tracing::info;

use crate::{
    config::ProviderConfig,
    errors::{InitError, ProviderError},
    types::{Address, BlockEnv, Bytes, U256},
};

use super::{builder::build_evm, BackingDb, HarnessEvm};

fn db_error(error: impl Display) -> ProviderError {
    ProviderError::Database(error.to_string())
}

/// State, configuration and pending block environment
#[derive(Debug)]
pub struct ChainState {
    db: CacheDB<BackingDb>,
    cfg: CfgEnv,
    block: RevmBlockEnv,
}

impl ChainState {
    /// Wraps a funded cache, its cfg and the pending block
    pub fn new(db: CacheDB<BackingDb>, cfg: CfgEnv, block: RevmBlockEnv) -> Self {
        Self { db, cfg, block }
    }

    /// EVM executing in the pending block
    pub fn evm(&mut self) -> HarnessEvm<'_> {
        build_evm(&mut self.db, &self.cfg, &self.block)
    }

    /// Chain id used for transaction validation
    pub fn chain_id(&self) -> u64 {
        self.cfg.chain_id
    }

    /// Hardfork the pending block executes under
    pub fn spec(&self) -> SpecId {
        self.cfg.spec
    }

    /// Check if state is fetched from a remote node
    pub fn is_fork(&self) -> bool {
        self.db.db.is_fork()
    }

    /// Current nonce of an account, zero for unknown accounts
    pub fn account_nonce(&mut self, address: Address) -> Result<u64, ProviderError> {
        Ok(self
            .db
            .basic(address)
            .map_err(db_error)?
            .map(|account| account.nonce)
            .unwrap_or_default())
    }

    /// Current balance of an account, zero for unknown accounts
    pub fn account_balance(&mut self, address: Address) -> Result<U256, ProviderError> {
        Ok(self
            .db
            .basic(address)
            .map_err(db_error)?
            .map(|account| account.balance)
            .unwrap_or_default())
    }

    /// Deployed code of an account, empty for non-contracts
    pub fn account_code(&mut self, address: Address) -> Result<Bytes, ProviderError> {
        let Some(account) = self.db.basic(address).map_err(db_error)? else {
            return Ok(Bytes::new());
        };
        let code = match account.code {
            Some(code) => code,
            None => self.db.code_by_hash(account.code_hash).map_err(db_error)?,
        };
        Ok(code.original_bytes())
    }

    /// Sets the number and timestamp of the pending block
    pub fn set_block_env(&mut self, block: BlockEnv) {
        self.block.number = block.number;
        self.block.timestamp = block.timestamp;
    }

    /// Opens `block` as the pending block
    ///
    /// The spec is resolved again for the new number, so a forked chain
    /// with a known hardfork history upgrades at activation heights.
    pub fn open_block(&mut self, block: BlockEnv, config: &ProviderConfig) -> Result<(), InitError> {
        let spec = config.spec_at(block.number)?;
        if spec != self.cfg.spec {
            info!(number = block.number, ?spec, "hardfork activated");
            self.cfg.spec = spec;
        }
        self.set_block_env(block);
        Ok(())
    }

    /// Number and timestamp of the pending block
    pub fn block_env(&self) -> BlockEnv {
        BlockEnv {
            number: self.block.number,
            timestamp: self.block.timestamp,
        }
    }

    /// Gas limit of the pending block
    pub fn block_gas_limit(&self) -> u64 {
        self.block.gas_limit
    }
}
