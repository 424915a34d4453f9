//! Shared helpers for integration tests: tracing setup and hand-assembled
//! EVM bytecode

#![allow(dead_code)]

use alloy::primitives::{Address, U256};
use evm_trace_harness::{HarnessOptions, ProviderHarness};
use tracing_subscriber::EnvFilter;

pub const PUSH1: u8 = 0x60;
pub const PUSH20: u8 = 0x73;
pub const CODECOPY: u8 = 0x39;
pub const GAS: u8 = 0x5a;
pub const CALL: u8 = 0xf1;
pub const POP: u8 = 0x50;
pub const STOP: u8 = 0x00;
pub const RETURN: u8 = 0xf3;
pub const REVERT: u8 = 0xfd;
pub const SSTORE: u8 = 0x55;

/// Installs a log subscriber honouring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Harness over the direct path or the JSON-RPC path
pub async fn start_harness(use_json_rpc: bool) -> anyhow::Result<ProviderHarness> {
    init_tracing();
    let options = HarnessOptions {
        use_json_rpc,
        ..Default::default()
    };
    Ok(ProviderHarness::start(options).await?)
}

/// `CALL(gas, target, 0, 0, 0, 0, 0)` followed by `POP`
pub fn call_target(target: Address) -> Vec<u8> {
    let mut code = Vec::new();
    // retLen, retOffset, argsLen, argsOffset, value
    for _ in 0..5 {
        code.extend_from_slice(&[PUSH1, 0x00]);
    }
    code.push(PUSH20);
    code.extend_from_slice(target.as_slice());
    code.extend_from_slice(&[GAS, CALL, POP]);
    code
}

/// Code that copies `payload` (stored right after it) to memory and ends
/// with `op` (`RETURN` or `REVERT`) over it
pub fn emit_trailing_data(payload: &[u8], op: u8) -> Vec<u8> {
    assert!(payload.len() < 256);
    let size = payload.len() as u8;
    let mut code = vec![
        PUSH1, size, PUSH1, 0x0c, PUSH1, 0x00, CODECOPY, PUSH1, size, PUSH1, 0x00, op,
    ];
    code.extend_from_slice(payload);
    code
}

/// Init code deploying `runtime`
pub fn deployer(runtime: &[u8]) -> Vec<u8> {
    emit_trailing_data(runtime, RETURN)
}

/// `Error(string)` revert data for a reason of at most 32 bytes
pub fn error_string(reason: &str) -> Vec<u8> {
    assert!(reason.len() <= 32);
    let mut data = vec![0x08, 0xc3, 0x79, 0xa0];
    data.extend_from_slice(&U256::from(0x20).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(reason.len()).to_be_bytes::<32>());
    let mut word = [0u8; 32];
    word[..reason.len()].copy_from_slice(reason.as_bytes());
    data.extend_from_slice(&word);
    data
}

/// Runtime code that always reverts with `Error(reason)`
pub fn reverter(reason: &str) -> Vec<u8> {
    emit_trailing_data(&error_string(reason), REVERT)
}

/// Init code writing `slots` storage slots, then stopping
pub fn storage_writer(slots: u8) -> Vec<u8> {
    let mut code = Vec::new();
    for slot in 0..slots {
        code.extend_from_slice(&[PUSH1, 0x01, PUSH1, slot, SSTORE]);
    }
    code.push(STOP);
    code
}
