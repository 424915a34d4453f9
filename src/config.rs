//! Provider and harness configuration
//!
//! Every default used by the harness lives here as an explicit constant so
//! tests can refer to the exact values the provider was built with.

use crate::errors::InitError;
use alloy::{
    primitives::{address, Address, U256},
    signers::local::PrivateKeySigner,
};
use once_cell::sync::Lazy;
use revm::primitives::hardfork::SpecId;
use serde::Serialize;
use std::{collections::BTreeMap, str::FromStr, time::Duration};

/// Hardfork used when none is configured
pub const DEFAULT_HARDFORK: &str = "shanghai";
/// Chain id reported by `eth_chainId`
pub const DEFAULT_CHAIN_ID: u64 = 123;
/// Network id reported by `net_version`
pub const DEFAULT_NETWORK_ID: u64 = 234;
/// Gas limit of every mined block
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 6_000_000;
/// Minimum gas price accepted by the provider
pub const DEFAULT_MIN_GAS_PRICE: u128 = 0;
/// Gas limit used by the request executor when a request omits it
pub const DEFAULT_TX_GAS_LIMIT: u64 = 4_000_000;
/// Gas price attached to every executor request
pub const DEFAULT_GAS_PRICE: u128 = 10;
/// Timestamp of the genesis block
pub const DEFAULT_INITIAL_TIMESTAMP: u64 = 1_700_000_000;
/// Whether the harness fronts the provider with a JSON-RPC server
pub const DEFAULT_USE_JSON_RPC: bool = false;
/// Whether contracts above the EIP-170 size limit may be deployed
pub const DEFAULT_ALLOW_UNLIMITED_CONTRACT_SIZE: bool = false;
/// Upper bound on how long closing the server may take
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_millis(1500);
/// Loopback host the JSON-RPC server binds to
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
/// Version string reported by `web3_clientVersion`
pub const CLIENT_VERSION: &str = concat!("evm-trace-harness/", env!("CARGO_PKG_VERSION"));

/// Address of the first default development account
pub const FIRST_DEFAULT_ACCOUNT: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// Private key of the sender used by the tracing preset
pub const TRACING_SENDER_PRIVATE_KEY: &str =
    "0xe331b6d69882b4cb4ea581d88e0b604039a3de5967688d3dcffdd2270c0fd109";

/// Funded development accounts used when none are configured
pub static DEFAULT_ACCOUNTS: Lazy<Vec<GenesisAccount>> = Lazy::new(|| {
    let balance = U256::from(10_000u128 * 10u128.pow(18));
    [
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
        "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    ]
    .into_iter()
    .map(|private_key| GenesisAccount {
        private_key: private_key.to_string(),
        balance,
    })
    .collect()
});

/// Hardfork activation history of known chains
///
/// Used to pick the hardfork of a forked remote block.
pub static DEFAULT_CHAINS: Lazy<BTreeMap<u64, ChainConfig>> = Lazy::new(|| {
    let mainnet = ChainConfig::new([
        (0, "frontier"),
        (1_150_000, "homestead"),
        (1_920_000, "dao"),
        (2_463_000, "tangerineWhistle"),
        (2_675_000, "spuriousDragon"),
        (4_370_000, "byzantium"),
        (7_280_000, "petersburg"),
        (9_069_000, "istanbul"),
        (9_200_000, "muirGlacier"),
        (12_244_000, "berlin"),
        (12_965_000, "london"),
        (13_773_000, "arrowGlacier"),
        (15_050_000, "grayGlacier"),
        (15_537_394, "merge"),
        (17_034_870, "shanghai"),
        (19_426_589, "cancun"),
    ]);
    let sepolia = ChainConfig::new([
        (0, "london"),
        (1_450_409, "merge"),
        (2_990_908, "shanghai"),
        (5_187_023, "cancun"),
    ]);
    BTreeMap::from([(1, mainnet), (11_155_111, sepolia)])
});

/// Account funded at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenesisAccount {
    /// Hex-encoded secp256k1 private key
    pub private_key: String,
    /// Initial balance in wei
    pub balance: U256,
}

impl GenesisAccount {
    /// Derives the account address from its private key
    pub fn address(&self) -> Result<Address, InitError> {
        PrivateKeySigner::from_str(&self.private_key)
            .map(|signer| signer.address())
            .map_err(|e| InitError::InvalidPrivateKey(e.to_string()))
    }
}

/// Block production mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MiningConfig {
    /// Mine a block for every submitted transaction
    pub auto: bool,
    /// Mine a block on a fixed interval, in addition to automining
    pub interval: Option<Duration>,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            auto: true,
            interval: None,
        }
    }
}

/// Order in which queued transactions are mined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum MempoolOrder {
    /// Submission order
    Fifo,
    /// Highest gas price first, submission order among equals
    #[default]
    Priority,
}

/// Remote state to fork from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkConfig {
    /// HTTP JSON-RPC endpoint of the remote node
    pub json_rpc_url: String,
    /// Block to fork at, latest when omitted
    pub block_number: Option<u64>,
}

/// Hardfork activation history of one chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainConfig {
    /// Activation block => hardfork name
    pub hardfork_history: BTreeMap<u64, String>,
}

impl ChainConfig {
    /// Builds a history from `(activation block, hardfork)` pairs
    pub fn new<I, S>(history: I) -> Self
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        Self {
            hardfork_history: history
                .into_iter()
                .map(|(block, name)| (block, name.into()))
                .collect(),
        }
    }

    /// Name of the hardfork active at `block_number`
    pub fn hardfork_at(&self, block_number: u64) -> Option<&str> {
        self.hardfork_history
            .range(..=block_number)
            .next_back()
            .map(|(_, name)| name.as_str())
    }
}

/// Configuration of the in-process development provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfig {
    /// Hardfork name, e.g. `"shanghai"`
    pub hardfork: String,
    pub chain_id: u64,
    pub network_id: u64,
    pub block_gas_limit: u64,
    /// Transactions priced below this are rejected
    pub min_gas_price: u128,
    pub mining: MiningConfig,
    pub mempool_order: MempoolOrder,
    /// Per-chain hardfork histories, consulted when forking
    pub chains: BTreeMap<u64, ChainConfig>,
    pub genesis_accounts: Vec<GenesisAccount>,
    pub allow_unlimited_contract_size: bool,
    /// Base fee of the genesis block; zero disables base fee checks
    pub initial_base_fee_per_gas: u64,
    pub coinbase: Address,
    pub allow_blocks_with_same_timestamp: bool,
    /// Enables EIP-1153 transient storage; upgrades pre-Cancun hardforks
    pub enable_transient_storage: bool,
    pub fork: Option<ForkConfig>,
    /// Reverted or halted transactions are reported as request errors
    pub throw_on_transaction_failures: bool,
    pub throw_on_call_failures: bool,
    pub initial_timestamp: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            hardfork: DEFAULT_HARDFORK.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            network_id: DEFAULT_NETWORK_ID,
            block_gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            min_gas_price: DEFAULT_MIN_GAS_PRICE,
            mining: MiningConfig::default(),
            mempool_order: MempoolOrder::default(),
            chains: DEFAULT_CHAINS.clone(),
            genesis_accounts: DEFAULT_ACCOUNTS.clone(),
            allow_unlimited_contract_size: DEFAULT_ALLOW_UNLIMITED_CONTRACT_SIZE,
            initial_base_fee_per_gas: 0,
            coinbase: Address::ZERO,
            allow_blocks_with_same_timestamp: false,
            enable_transient_storage: false,
            fork: None,
            throw_on_transaction_failures: true,
            throw_on_call_failures: true,
            initial_timestamp: DEFAULT_INITIAL_TIMESTAMP,
        }
    }
}

impl ProviderConfig {
    /// Configuration used for execution tracing tests
    ///
    /// Mainnet chain id, a 10M block gas limit, a single funded sender and
    /// failures reported through the trace rather than as request errors.
    pub fn tracing() -> Self {
        Self {
            chain_id: 1,
            network_id: 1,
            block_gas_limit: 10_000_000,
            genesis_accounts: vec![GenesisAccount {
                private_key: TRACING_SENDER_PRIVATE_KEY.to_string(),
                balance: U256::from(10u64.pow(15)),
            }],
            throw_on_transaction_failures: false,
            throw_on_call_failures: false,
            ..Default::default()
        }
    }

    /// Resolves the execution spec for a block of this chain
    ///
    /// When forking a chain with a known history, the hardfork active at
    /// the forked block wins over the configured one.
    ///
    /// # Errors
    /// * `InitError::UnknownHardfork` - The hardfork name is not recognized
    pub fn spec_at(&self, block_number: u64) -> Result<SpecId, InitError> {
        let name = self
            .fork
            .as_ref()
            .and_then(|_| self.chains.get(&self.chain_id))
            .and_then(|chain| chain.hardfork_at(block_number))
            .unwrap_or(&self.hardfork);

        let spec = parse_hardfork(name)?;
        if self.enable_transient_storage && !spec.is_enabled_in(SpecId::CANCUN) {
            return Ok(SpecId::CANCUN);
        }
        Ok(spec)
    }

    /// Addresses of the genesis accounts, in configuration order
    pub fn account_addresses(&self) -> Result<Vec<Address>, InitError> {
        self.genesis_accounts.iter().map(GenesisAccount::address).collect()
    }
}

/// Maps a hardfork name to an execution spec
///
/// Accepts the camelCase names used by Ethereum tooling. Matching is case
/// insensitive.
pub fn parse_hardfork(name: &str) -> Result<SpecId, InitError> {
    let spec = match name.to_ascii_lowercase().as_str() {
        "chainstart" | "frontier" => SpecId::FRONTIER,
        "homestead" => SpecId::HOMESTEAD,
        "dao" => SpecId::DAO_FORK,
        "tangerinewhistle" => SpecId::TANGERINE,
        "spuriousdragon" => SpecId::SPURIOUS_DRAGON,
        "byzantium" => SpecId::BYZANTIUM,
        "constantinople" => SpecId::CONSTANTINOPLE,
        "petersburg" => SpecId::PETERSBURG,
        "istanbul" => SpecId::ISTANBUL,
        "muirglacier" => SpecId::MUIR_GLACIER,
        "berlin" => SpecId::BERLIN,
        "london" => SpecId::LONDON,
        "arrowglacier" => SpecId::ARROW_GLACIER,
        "grayglacier" => SpecId::GRAY_GLACIER,
        "merge" | "paris" => SpecId::MERGE,
        "shanghai" => SpecId::SHANGHAI,
        "cancun" => SpecId::CANCUN,
        "prague" => SpecId::PRAGUE,
        _ => return Err(InitError::UnknownHardfork(name.to_string())),
    };
    Ok(spec)
}

/// JSON-RPC server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub hostname: String,
    /// Zero picks an ephemeral port
    pub port: u16,
    /// Artificial delay before the server acknowledges shutdown
    pub shutdown_delay: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_SERVER_HOST.to_string(),
            port: 0,
            shutdown_delay: None,
        }
    }
}

/// Options for one provider harness
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub provider: ProviderConfig,
    /// Route requests through a loopback JSON-RPC server
    pub use_json_rpc: bool,
    /// Record provider log lines
    pub logger_enabled: bool,
    pub server: ServerConfig,
    /// Upper bound on server close during teardown
    pub teardown_timeout: Duration,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            use_json_rpc: DEFAULT_USE_JSON_RPC,
            logger_enabled: true,
            server: ServerConfig::default(),
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
        }
    }
}

impl HarnessOptions {
    /// Options that route requests through the JSON-RPC server
    pub fn json_rpc() -> Self {
        Self {
            use_json_rpc: true,
            ..Default::default()
        }
    }
}
