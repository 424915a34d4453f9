//! HTTP JSON-RPC server fronting a development provider
//!
//! Accepts single and batched JSON-RPC 2.0 requests on `POST /` and forwards
//! each call to [`DevProvider::request`]. The server runs as a spawned task;
//! closing it sends a shutdown signal and waits for the task to finish.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tracing::{debug, info};

use crate::{
    config::ServerConfig,
    errors::{ProviderError, ServerError},
    provider::DevProvider,
    types::ServerInfo,
};

/// Identifier of a JSON-RPC request, echoed in its response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcRequestId {
    Number(u64),
    String(String),
}

/// A parsed JSON-RPC 2.0 request
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: RpcRequestId,
    pub jsonrpc: String,
    pub method: String,
    pub params: Option<Vec<Value>>,
}

/// Single request or batch
#[derive(Deserialize)]
#[serde(untagged)]
pub enum RpcRequestWrapper {
    Single(RpcRequest),
    Multiple(Vec<RpcRequest>),
}

/// Error object of a JSON-RPC response
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcErrorMetadata {
    pub code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub message: String,
}

impl From<ProviderError> for RpcErrorMetadata {
    fn from(error: ProviderError) -> Self {
        let code = error.code();
        let message = match error {
            ProviderError::Rpc { message, .. } => message,
            other => other.to_string(),
        };
        Self {
            code,
            data: None,
            message,
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcSuccessResponse {
    id: RpcRequestId,
    jsonrpc: String,
    result: Value,
}

#[derive(Debug, Serialize)]
struct RpcErrorResponse {
    id: RpcRequestId,
    jsonrpc: String,
    error: RpcErrorMetadata,
}

/// Formats a handler result into a JSON-RPC 2.0 response
pub fn rpc_response<E>(id: RpcRequestId, res: Result<Value, E>) -> Result<Value, serde_json::Error>
where
    E: Into<RpcErrorMetadata>,
{
    match res {
        Ok(result) => serde_json::to_value(RpcSuccessResponse {
            id,
            jsonrpc: "2.0".to_string(),
            result,
        }),
        Err(error) => serde_json::to_value(RpcErrorResponse {
            id,
            jsonrpc: "2.0".to_string(),
            error: error.into(),
        }),
    }
}

async fn map_request(provider: &DevProvider, request: RpcRequest) -> Result<Value, serde_json::Error> {
    let params = request.params.unwrap_or_default();
    let res = provider.request(&request.method, &params).await;
    if let Err(error) = &res {
        debug!(method = %request.method, %error, "request failed");
    }
    rpc_response(request.id, res)
}

async fn handle_http_request(
    State(provider): State<Arc<DevProvider>>,
    body: String,
) -> Result<Json<Value>, StatusCode> {
    let res = match serde_json::from_str::<RpcRequestWrapper>(&body) {
        Ok(RpcRequestWrapper::Single(request)) => map_request(&provider, request)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?,
        Ok(RpcRequestWrapper::Multiple(requests)) => {
            let mut responses = Vec::with_capacity(requests.len());
            for request in requests {
                responses.push(
                    map_request(&provider, request)
                        .await
                        .map_err(|_| StatusCode::BAD_REQUEST)?,
                );
            }
            Value::Array(responses)
        }
        Err(_) => rpc_response(
            RpcRequestId::String(String::new()),
            Err(ProviderError::InvalidParams("Invalid request body".to_string())),
        )
        .map_err(|_| StatusCode::BAD_REQUEST)?,
    };
    Ok(Json(res))
}

/// Running JSON-RPC server
pub struct JsonRpcServer {
    info: ServerInfo,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl JsonRpcServer {
    /// Binds `hostname:port` and starts serving `provider`
    ///
    /// Port zero binds an ephemeral port; the bound one is reported by
    /// [`info`](JsonRpcServer::info).
    ///
    /// # Errors
    /// * `ServerError::Bind` - The address could not be bound
    pub async fn listen(provider: Arc<DevProvider>, config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", config.hostname, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let router = Router::new()
            .route("/", post(handle_http_request))
            .with_state(provider);

        let (shutdown, signal) = oneshot::channel::<()>();
        let delay = config.shutdown_delay;
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                })
                .await
        });

        info!("Starting HTTP server at {local_addr}");
        Ok(Self {
            info: ServerInfo::from(local_addr),
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }

    /// Address the server is bound to
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Stops accepting requests and waits for the serving task
    ///
    /// Dropping the returned future before it completes leaves the task
    /// running; [`abort`](JsonRpcServer::abort) stops it.
    pub async fn close(&mut self) -> Result<(), ServerError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let res = task.await;
        self.task = None;

        match res {
            Ok(Ok(())) => {
                info!(url = %self.info.url(), "HTTP server closed");
                Ok(())
            }
            Ok(Err(error)) => Err(ServerError::Serve(error.to_string())),
            Err(error) => Err(ServerError::Serve(error.to_string())),
        }
    }

    /// Stops the serving task without waiting
    pub fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for JsonRpcServer {
    fn drop(&mut self) {
        self.abort();
    }
}
