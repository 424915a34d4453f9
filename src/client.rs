//! Transport-agnostic access to a development provider
//!
//! `HarnessClient` issues the same JSON-RPC calls either in-process or over
//! HTTP through the harness server, so tests are written once for both
//! paths.

use alloy::{
    primitives::U64,
    rpc::{
        client::{ClientBuilder, RpcClient},
        json_rpc::RpcError,
        types::TransactionRequest,
    },
    transports::TransportErrorKind,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    errors::{InitError, ProviderError},
    provider::DevProvider,
    types::{Address, BlockEnv, Bytes, B256, U256},
};

fn map_rpc_error(error: RpcError<TransportErrorKind>) -> ProviderError {
    match error.as_error_resp() {
        Some(payload) => ProviderError::Rpc {
            code: payload.code,
            message: payload.message.to_string(),
        },
        None => ProviderError::Transport(error.to_string()),
    }
}

fn decode<R: DeserializeOwned>(value: Value) -> Result<R, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::Transport(format!("unexpected response: {e}")))
}

/// Request path to a provider
#[derive(Clone)]
pub enum HarnessClient {
    /// In-process calls
    Direct(Arc<DevProvider>),
    /// HTTP JSON-RPC calls
    Http(RpcClient),
}

impl HarnessClient {
    /// HTTP client for the server at `url`
    ///
    /// # Errors
    /// * `InitError::InvalidRpcUrl` - The URL cannot be parsed
    pub fn http(url: &str) -> Result<Self, InitError> {
        let url = url.parse().map_err(|_| InitError::InvalidRpcUrl(url.to_string()))?;
        Ok(Self::Http(ClientBuilder::default().http(url)))
    }

    /// Whether requests go through the JSON-RPC server
    pub fn is_http(&self) -> bool {
        matches!(self, HarnessClient::Http(_))
    }

    /// Issues one JSON-RPC call and decodes its result
    ///
    /// Direct calls surface the provider's own error variants; HTTP calls
    /// surface error responses as `ProviderError::Rpc`.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Vec<Value>,
    ) -> Result<R, ProviderError> {
        let value: Value = match self {
            HarnessClient::Direct(provider) => provider.request(method, &params).await?,
            HarnessClient::Http(client) => client
                .request(method, params)
                .await
                .map_err(map_rpc_error)?,
        };
        decode(value)
    }

    /// `eth_sendTransaction`
    pub async fn send_transaction(&self, request: TransactionRequest) -> Result<B256, ProviderError> {
        let request = serde_json::to_value(request)
            .map_err(|e| ProviderError::InvalidParams(e.to_string()))?;
        self.request("eth_sendTransaction", vec![request]).await
    }

    /// `eth_call` against the pending block
    pub async fn call(&self, request: TransactionRequest) -> Result<Bytes, ProviderError> {
        let request = serde_json::to_value(request)
            .map_err(|e| ProviderError::InvalidParams(e.to_string()))?;
        self.request("eth_call", vec![request]).await
    }

    /// `eth_chainId`
    pub async fn chain_id(&self) -> Result<u64, ProviderError> {
        let id: U64 = self.request("eth_chainId", vec![]).await?;
        Ok(id.to())
    }

    /// `eth_blockNumber`
    pub async fn block_number(&self) -> Result<u64, ProviderError> {
        let number: U64 = self.request("eth_blockNumber", vec![]).await?;
        Ok(number.to())
    }

    /// `eth_accounts`
    pub async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request("eth_accounts", vec![]).await
    }

    /// `eth_getBalance` at the latest block
    pub async fn get_balance(&self, address: Address) -> Result<U256, ProviderError> {
        self.request("eth_getBalance", vec![Value::from(address.to_string()), Value::from("latest")])
            .await
    }

    /// `evm_mine`, optionally at an explicit timestamp
    pub async fn mine(&self, timestamp: Option<u64>) -> Result<(), ProviderError> {
        let params = timestamp.map(|t| vec![Value::from(t)]).unwrap_or_default();
        let _: Value = self.request("evm_mine", params).await?;
        Ok(())
    }

    /// `evm_setAutomine`
    pub async fn set_automine(&self, enabled: bool) -> Result<(), ProviderError> {
        let _: Value = self.request("evm_setAutomine", vec![Value::from(enabled)]).await?;
        Ok(())
    }

    /// Head block of a direct provider
    ///
    /// Not exposed over JSON-RPC; HTTP clients get `None`.
    pub async fn head(&self) -> Option<BlockEnv> {
        match self {
            HarnessClient::Direct(provider) => Some(provider.head().await),
            HarnessClient::Http(_) => None,
        }
    }
}
