//! Integration tests for execution trace capture
//!
//! Every scenario runs twice: once with requests issued directly to the
//! in-process provider and once through the loopback JSON-RPC server. The
//! trace collector is registered with the provider in both cases, so the
//! captured trees must be identical.
//!
//! # Test Coverage
//! - Contract creation whose constructor calls another account
//! - Reverts with and without a reason, at the top level and nested
//! - Default gas for requests without an explicit limit
//! - Bounded teardown of a slow server

mod common;

use alloy::primitives::{Address, Bytes};
use common::*;
use evm_trace_harness::{
    config::{HarnessOptions, ServerConfig, DEFAULT_TEARDOWN_TIMEOUT, DEFAULT_TX_GAS_LIMIT},
    errors::{HarnessError, TeardownError, TraceFailure},
    harness::ProviderHarness,
    trace::{ExitOutcome, MessageKind},
    types::TxData,
};
use std::time::Duration;

async fn deploy(harness: &ProviderHarness, init_code: Vec<u8>) -> anyhow::Result<Address> {
    let executor = harness.executor(harness.provider().accounts()[0]);
    let traced = executor.trace_transaction(TxData::deploy(init_code)).await?;
    anyhow::ensure!(traced.is_success(), "deployment failed: {:?}", traced.error);
    traced
        .created_address()
        .ok_or_else(|| anyhow::anyhow!("deployment reported no address"))
}

async fn create_with_constructor_call(use_json_rpc: bool) -> anyhow::Result<()> {
    let harness = start_harness(use_json_rpc).await?;
    let sender = harness.provider().accounts()[0];
    let executor = harness.executor(sender);
    let target = Address::repeat_byte(0x12);

    let mut init_code = call_target(target);
    init_code.push(STOP);
    let traced = executor.trace_transaction(TxData::deploy(init_code)).await?;

    assert!(traced.is_success());
    assert!(traced.error.is_none());
    assert!(traced.submission_error.is_none());

    let trace = &traced.trace;
    assert!(trace.is_create());
    assert_eq!(trace.enter.depth, 0);
    assert_eq!(trace.enter.caller, sender);
    assert!(!trace.steps.is_empty());
    assert!(trace.steps.iter().all(|step| step.depth == 0));

    let created = traced.created_address().expect("created address");
    assert_eq!(trace.children.len(), 1);
    let child = &trace.children[0];
    assert_eq!(child.enter.to(), Some(target));
    assert_eq!(child.enter.caller, created);
    assert_eq!(child.enter.depth, 1);
    assert!(matches!(child.enter.kind, MessageKind::Call { .. }));
    assert!(child.is_success());
    // The target has no code
    assert!(child.steps.is_empty());
    assert!(child.children.is_empty());

    assert_eq!(harness.client().block_number().await?, 1);
    harness.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_create_with_constructor_call_direct() -> anyhow::Result<()> {
    create_with_constructor_call(false).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_create_with_constructor_call_json_rpc() -> anyhow::Result<()> {
    create_with_constructor_call(true).await
}

async fn revert_with_reason(use_json_rpc: bool) -> anyhow::Result<()> {
    let harness = start_harness(use_json_rpc).await?;
    let executor = harness.executor(harness.provider().accounts()[0]);
    let reverter = deploy(&harness, deployer(&reverter("boom"))).await?;

    let traced = executor
        .trace_transaction(TxData::call(reverter, Bytes::new()))
        .await?;

    assert_eq!(traced.trace.outcome(), Some(&ExitOutcome::Revert));
    match traced.error {
        Some(TraceFailure::Reverted { ref reason, ref output }) => {
            assert_eq!(reason.as_deref(), Some("boom"));
            assert_eq!(output.as_ref(), error_string("boom").as_slice());
        }
        ref other => panic!("unexpected error: {other:?}"),
    }
    let submission_error = traced.submission_error.expect("revert reported by the provider");
    assert!(submission_error.contains("boom"), "{submission_error}");

    // The executor clears the last error but keeps the trace
    assert!(harness.collector().last_error().is_none());
    assert!(harness.collector().last_top_level_message_trace().is_some());

    harness.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_revert_with_reason_direct() -> anyhow::Result<()> {
    revert_with_reason(false).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_revert_with_reason_json_rpc() -> anyhow::Result<()> {
    revert_with_reason(true).await
}

async fn nested_failures(use_json_rpc: bool) -> anyhow::Result<()> {
    let harness = start_harness(use_json_rpc).await?;
    let executor = harness.executor(harness.provider().accounts()[0]);
    let reverter = deploy(&harness, deployer(&reverter("inner"))).await?;

    // Swallows the failed call
    let mut swallowing = call_target(reverter);
    swallowing.push(STOP);
    let swallowing = deploy(&harness, deployer(&swallowing)).await?;

    let traced = executor
        .trace_transaction(TxData::call(swallowing, Bytes::new()))
        .await?;
    assert!(traced.is_success());
    assert_eq!(traced.trace.children.len(), 1);
    assert_eq!(traced.trace.children[0].outcome(), Some(&ExitOutcome::Revert));
    assert!(traced.trace.find_failure_origin().is_none());

    // Reverts without a reason after the failed call
    let mut propagating = call_target(reverter);
    propagating.extend_from_slice(&[PUSH1, 0x00, PUSH1, 0x00, REVERT]);
    let propagating = deploy(&harness, deployer(&propagating)).await?;

    let traced = executor
        .trace_transaction(TxData::call(propagating, Bytes::new()))
        .await?;
    assert_eq!(
        traced.error,
        Some(TraceFailure::Reverted {
            reason: None,
            output: Bytes::new()
        })
    );
    let origin = traced.trace.find_failure_origin().expect("failure origin");
    assert_eq!(origin.enter.to(), Some(reverter));
    assert_eq!(origin.enter.depth, 1);
    assert_eq!(traced.trace.depth_first().len(), 2);

    harness.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nested_failures_direct() -> anyhow::Result<()> {
    nested_failures(false).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nested_failures_json_rpc() -> anyhow::Result<()> {
    nested_failures(true).await
}

async fn default_gas(use_json_rpc: bool) -> anyhow::Result<()> {
    let harness = start_harness(use_json_rpc).await?;
    let executor = harness.executor(harness.provider().accounts()[0]);

    // Ten fresh storage slots need well over 200k gas
    let traced = executor
        .trace_transaction(TxData::deploy(storage_writer(10)))
        .await?;
    assert!(traced.is_success(), "{:?}", traced.error);
    let gas_limit = traced.trace.enter.gas_limit;
    assert!(gas_limit < DEFAULT_TX_GAS_LIMIT);
    assert!(gas_limit > DEFAULT_TX_GAS_LIMIT - 100_000);

    // The same deployment with a tight explicit limit runs out of gas
    let traced = executor
        .trace_transaction(TxData::deploy(storage_writer(10)).with_gas(80_000))
        .await?;
    assert!(matches!(traced.trace.outcome(), Some(ExitOutcome::Halt(_))));
    assert!(matches!(traced.error, Some(TraceFailure::Halted { .. })));

    harness.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_default_gas_direct() -> anyhow::Result<()> {
    default_gas(false).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_default_gas_json_rpc() -> anyhow::Result<()> {
    default_gas(true).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_server_close_fails_teardown() -> anyhow::Result<()> {
    init_tracing();
    let harness = ProviderHarness::start(HarnessOptions {
        server: ServerConfig {
            shutdown_delay: Some(DEFAULT_TEARDOWN_TIMEOUT * 2),
            ..Default::default()
        },
        ..HarnessOptions::json_rpc()
    })
    .await?;

    match harness.teardown().await {
        Err(HarnessError::Teardown(TeardownError::Timeout { elapsed, limit })) => {
            assert_eq!(limit, DEFAULT_TEARDOWN_TIMEOUT);
            assert!(elapsed >= limit);
            assert!(elapsed < limit + Duration::from_secs(1));
        }
        other => panic!("expected a teardown timeout, got {other:?}"),
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_requests_are_logged() -> anyhow::Result<()> {
    let harness = start_harness(false).await?;
    let executor = harness.executor(harness.provider().accounts()[0]);
    executor
        .trace_transaction(TxData::call(Address::repeat_byte(0x99), Bytes::new()))
        .await?;

    let lines = harness.logger().lines();
    assert_eq!(lines.first().map(String::as_str), Some("eth_sendTransaction"));
    assert!(lines.iter().any(|line| line.contains("Gas used:    21000")));

    harness.logger().clear();
    assert!(harness.logger().lines().is_empty());
    harness.teardown().await?;
    Ok(())
}
