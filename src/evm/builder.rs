//! Builds the provider's chain state and the per-transaction EVM

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    providers::{Provider, ProviderBuilder},
};
use revm::{
    context::{BlockEnv, CfgEnv, Context, JournalTr},
    database::CacheDB,
    handler::{MainBuilder, MainContext},
    primitives::B256,
    state::AccountInfo,
};
use tracing::{debug, info};

use crate::{
    config::ProviderConfig,
    errors::InitError,
    inspectors::EventRecorder,
    types,
};

use super::{BackingDb, ChainState, ForkDb, HarnessEvm, TraceEvm};

/// Contract size limit applied when unlimited contract size is allowed
///
/// Kept well below `usize::MAX` since the init code limit is derived from it.
const UNLIMITED_CONTRACT_SIZE: usize = usize::MAX / 4;

/// Resolves the state backing the cache and the head block
///
/// The head is the genesis block locally, or the pinned block of a fork.
async fn resolve_backing(config: &ProviderConfig) -> Result<(BackingDb, types::BlockEnv), InitError> {
    let Some(fork) = &config.fork else {
        return Ok((
            BackingDb::Local,
            types::BlockEnv {
                number: 0,
                timestamp: config.initial_timestamp,
            },
        ));
    };

    let url = fork
        .json_rpc_url
        .parse()
        .map_err(|_| InitError::InvalidRpcUrl(fork.json_rpc_url.clone()))?;
    let provider = ProviderBuilder::new().connect_http(url).erased();

    let number = match fork.block_number {
        Some(number) => number,
        None => provider
            .get_block_number()
            .await
            .map_err(|e| InitError::Fork(format!("failed to fetch latest block: {e}")))?,
    };
    let block = provider
        .get_block_by_number(BlockNumberOrTag::Number(number))
        .await
        .map_err(|e| InitError::Fork(format!("failed to fetch block {number}: {e}")))?
        .ok_or_else(|| InitError::Fork(format!("block {number} not found")))?;

    info!(url = %fork.json_rpc_url, block = number, "forking remote state");
    let db = ForkDb::new(provider, BlockId::number(number))?;
    Ok((
        BackingDb::Fork(Box::new(db)),
        types::BlockEnv {
            number,
            timestamp: block.header.timestamp,
        },
    ))
}

/// Creates the provider's chain state
///
/// Applies the configured hardfork, chain id, block gas limit, base fee and
/// coinbase, and funds every genesis account.
///
/// # Returns
/// The chain state and the environment of the last block (genesis or forked
/// block). The state's pending block is the one after it.
///
/// # Errors
/// * `InitError::UnknownHardfork` - The hardfork name is not recognized
/// * `InitError::InvalidPrivateKey` - A genesis key cannot be parsed
/// * `InitError::InvalidRpcUrl`, `InitError::Fork` - Fork setup failed
pub async fn create_chain_state(
    config: &ProviderConfig,
) -> Result<(ChainState, types::BlockEnv), InitError> {
    let (backing, head) = resolve_backing(config).await?;
    let spec = config.spec_at(head.number)?;

    let mut db = CacheDB::new(backing);
    for account in &config.genesis_accounts {
        let address = account.address()?;
        db.insert_account_info(
            address,
            AccountInfo {
                balance: account.balance,
                ..Default::default()
            },
        );
        debug!(%address, balance = %account.balance, "funded genesis account");
    }

    let mut cfg = CfgEnv::default();
    cfg.chain_id = config.chain_id;
    cfg.spec = spec;
    cfg.disable_eip3607 = true;
    cfg.disable_base_fee = config.initial_base_fee_per_gas == 0;
    if config.allow_unlimited_contract_size {
        cfg.limit_contract_code_size = Some(UNLIMITED_CONTRACT_SIZE);
    }

    let block = BlockEnv {
        number: head.number + 1,
        timestamp: head.timestamp + 1,
        gas_limit: config.block_gas_limit,
        basefee: config.initial_base_fee_per_gas,
        beneficiary: config.coinbase,
        prevrandao: Some(B256::ZERO),
        ..Default::default()
    };

    Ok((ChainState::new(db, cfg, block), head))
}

/// Builds an EVM over `db` with the given environment and a fresh recorder
pub fn build_evm<'db>(
    db: &'db mut CacheDB<BackingDb>,
    cfg: &CfgEnv,
    block: &BlockEnv,
) -> HarnessEvm<'db> {
    let mut ctx = Context::mainnet().with_db(db);
    ctx.cfg = cfg.clone();
    ctx.journaled_state.set_spec_id(cfg.spec);
    ctx.block = block.clone();
    TraceEvm::new(ctx.build_mainnet_with_inspector(EventRecorder::new()))
}
