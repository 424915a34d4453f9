//! Revert data decoding
//!
//! Turns the raw output of a reverted frame into a readable reason:
//! - `Error(string)` reverts (`require`, `revert("...")`)
//! - `Panic(uint256)` codes raised by the Solidity compiler
//! - anything else is shown as hex

use alloy::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::hex,
};

/// Selector of `Error(string)`
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// Selector of `Panic(uint256)`
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Message for a Solidity panic code
pub fn panic_reason(code: u64) -> String {
    let reason = match code {
        0x00 => "Generic compiler panic",
        0x01 => "Assertion failed",
        0x11 => "Arithmetic overflow",
        0x12 => "Division by zero",
        0x21 => "Invalid enum value",
        0x22 => "Invalid storage byte array access",
        0x31 => "Pop on empty array",
        0x32 => "Array access out of bounds",
        0x41 => "Out of memory",
        0x51 => "Call to zero-initialized function",
        code => return format!("Panic: Unknown error code (0x{code:x})"),
    };
    format!("Panic: {reason}")
}

/// Decodes `Error(string)` and `Panic(uint256)` revert data
///
/// # Returns
/// * `Some(String)` - The revert message or panic description
/// * `None` - The selector is unknown or the payload is malformed
///
/// # Example
/// ```
/// use evm_trace_harness::utils::error_utils::decode_revert_reason;
/// use alloy::primitives::hex;
///
/// let output = hex!(
///     "08c379a0"
///     "0000000000000000000000000000000000000000000000000000000000000020"
///     "0000000000000000000000000000000000000000000000000000000000000004"
///     "626f6f6d00000000000000000000000000000000000000000000000000000000"
/// );
/// assert_eq!(decode_revert_reason(&output), Some("boom".to_string()));
/// ```
pub fn decode_revert_reason(output: &[u8]) -> Option<String> {
    let (selector, payload) = output.split_first_chunk::<4>()?;
    match *selector {
        ERROR_SELECTOR => match DynSolType::String.abi_decode(payload) {
            Ok(DynSolValue::String(reason)) => Some(reason),
            _ => None,
        },
        PANIC_SELECTOR => match DynSolType::Uint(256).abi_decode(payload) {
            Ok(DynSolValue::Uint(code, _)) => Some(panic_reason(code.saturating_to::<u64>())),
            _ => None,
        },
        _ => None,
    }
}

/// Readable description of any revert output
pub fn describe_revert(output: &[u8]) -> String {
    if let Some(reason) = decode_revert_reason(output) {
        return reason;
    }
    if output.is_empty() {
        "without reason".to_string()
    } else {
        format!("with data {}", hex::encode_prefixed(output))
    }
}
