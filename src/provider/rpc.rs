//! JSON-RPC method table of the development provider
//!
//! Both transports go through [`DevProvider::request`]: the in-process client
//! calls it directly and the HTTP server forwards parsed requests to it, so
//! the two paths share parameter decoding and error codes.

use alloy::{primitives::U64, rpc::types::TransactionRequest};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use super::DevProvider;
use crate::{config::CLIENT_VERSION, errors::ProviderError, types::Address};

/// Encodes a response value
fn to_json<T: Serialize>(value: T) -> Result<Value, ProviderError> {
    serde_json::to_value(value)
        .map_err(|e| ProviderError::Transport(format!("failed to encode response: {e}")))
}

/// Hex quantity, e.g. `0x7b`
fn quantity(value: u64) -> Value {
    Value::String(format!("{value:#x}"))
}

/// Decodes a required positional parameter
fn param<T: DeserializeOwned>(params: &[Value], index: usize, name: &str) -> Result<T, ProviderError> {
    let value = params
        .get(index)
        .ok_or_else(|| ProviderError::InvalidParams(format!("missing parameter {index} ({name})")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| ProviderError::InvalidParams(format!("invalid {name}: {e}")))
}

/// Decodes an optional quantity given as a number or a hex string
fn optional_quantity(params: &[Value], index: usize, name: &str) -> Result<Option<u64>, ProviderError> {
    match params.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_u64()
            .map(Some)
            .ok_or_else(|| ProviderError::InvalidParams(format!("invalid {name}: {number}"))),
        Some(value) => param::<U64>(params, index, name)
            .map(|quantity| Some(quantity.to::<u64>()))
            .map_err(|_| ProviderError::InvalidParams(format!("invalid {name}: {value}"))),
    }
}

impl DevProvider {
    /// Handles one JSON-RPC call
    ///
    /// # Arguments
    /// * `method` - Method name, e.g. `eth_sendTransaction`
    /// * `params` - Positional parameters
    ///
    /// # Errors
    /// * `ProviderError::MethodNotFound` - The method is not served
    /// * `ProviderError::InvalidParams` - A parameter is missing or malformed
    /// * any error of the underlying provider operation
    pub async fn request(&self, method: &str, params: &[Value]) -> Result<Value, ProviderError> {
        debug!(method, params = params.len(), "handling request");
        self.logger.log_line(method);

        match method {
            "eth_chainId" => Ok(quantity(self.chain_id())),
            "net_version" => Ok(Value::String(self.network_id().to_string())),
            "web3_clientVersion" => Ok(Value::String(CLIENT_VERSION.to_string())),
            "eth_blockNumber" => Ok(quantity(self.block_number().await)),
            "eth_accounts" => to_json(self.accounts()),
            "eth_getBalance" => {
                let address: Address = param(params, 0, "address")?;
                to_json(self.balance(address).await?)
            }
            "eth_getTransactionCount" => {
                let address: Address = param(params, 0, "address")?;
                Ok(quantity(self.nonce(address).await?))
            }
            "eth_getCode" => {
                let address: Address = param(params, 0, "address")?;
                to_json(self.code(address).await?)
            }
            "eth_sendTransaction" => {
                let request: TransactionRequest = param(params, 0, "transaction")?;
                to_json(self.send_transaction(request).await?)
            }
            "eth_call" => {
                let request: TransactionRequest = param(params, 0, "transaction")?;
                to_json(self.call(request).await?)
            }
            "evm_mine" => {
                let timestamp = optional_quantity(params, 0, "timestamp")?;
                self.mine_block(timestamp).await?;
                Ok(Value::String("0".to_string()))
            }
            "evm_setAutomine" => {
                let enabled: bool = param(params, 0, "enabled")?;
                self.set_automine(enabled).await;
                Ok(Value::Bool(true))
            }
            unknown_method => Err(ProviderError::MethodNotFound(unknown_method.to_owned())),
        }
    }
}
