//! Utility functions for building requests and reading results
//!
//! # Modules
//!
//! - [`abi_utils`]: Calldata and deployment data from a JSON ABI
//!   - Function call encoding with overload resolution
//!   - Constructor argument encoding
//!
//! - [`error_utils`]: Smart contract error handling
//!   - Revert reason extraction
//!   - Solidity panic code interpretation

/// ABI encoding helpers
pub mod abi_utils;

/// Error parsing utilities
pub mod error_utils;
