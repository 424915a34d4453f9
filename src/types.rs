//! Request, block and server types shared across the harness
//!
//! This module defines:
//! - Transaction-shaped request data for the executor
//! - Block environment parameters the provider mines with
//! - Addresses reported by the JSON-RPC server

pub use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use serde::Serialize;
use std::net::SocketAddr;

/// Transaction request issued by the request executor
///
/// Omitted fields fall back to executor defaults: gas to
/// [`DEFAULT_TX_GAS_LIMIT`](crate::config::DEFAULT_TX_GAS_LIMIT) and value
/// to zero. A missing `to` deploys `data` as init code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxData {
    /// Calldata or init code
    pub data: Bytes,
    /// Called contract, none for deployments
    pub to: Option<Address>,
    /// Native value to transfer
    pub value: Option<U256>,
    /// Gas limit
    pub gas: Option<u64>,
}

impl TxData {
    /// Deployment of `init_code`
    pub fn deploy(init_code: impl Into<Bytes>) -> Self {
        Self {
            data: init_code.into(),
            ..Default::default()
        }
    }

    /// Call of `to` with `data`
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            to: Some(to),
            ..Default::default()
        }
    }

    /// Sets the value to transfer
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets an explicit gas limit
    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    /// Transaction kind derived from `to`
    pub fn kind(&self) -> TxKind {
        self.to.map(TxKind::Call).unwrap_or(TxKind::Create)
    }
}

/// Transaction parameters handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationTx {
    /// Transaction sender
    pub caller: Address,
    /// Transaction target (address or contract creation)
    pub transact_to: TxKind,
    /// Native token value to send
    pub value: U256,
    /// Transaction input data
    pub data: Bytes,
    /// Gas limit
    pub gas_limit: u64,
    /// Legacy gas price in wei
    pub gas_price: u128,
}

/// Block environment parameters for the next mined block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockEnv {
    /// Block number
    pub number: u64,
    /// Block timestamp (Unix timestamp)
    pub timestamp: u64,
}

/// Address a JSON-RPC server is listening on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Bound host
    pub address: String,
    /// Bound port, never zero
    pub port: u16,
}

impl ServerInfo {
    /// HTTP URL of the server
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

impl From<SocketAddr> for ServerInfo {
    fn from(addr: SocketAddr) -> Self {
        Self {
            address: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_data_kind() {
        assert_eq!(TxData::deploy(vec![0x00]).kind(), TxKind::Create);
        let to = Address::repeat_byte(0x42);
        assert_eq!(TxData::call(to, Bytes::new()).kind(), TxKind::Call(to));
    }

    #[test]
    fn test_server_info_url() {
        let info = ServerInfo::from(SocketAddr::from(([127, 0, 0, 1], 8545)));
        assert_eq!(info.url(), "http://127.0.0.1:8545");
    }
}
