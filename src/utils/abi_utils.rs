//! Calldata and deployment data from a JSON ABI
//!
//! Encoding itself is alloy's; these helpers only select the ABI item and
//! assemble the bytes a transaction carries.

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    json_abi::JsonAbi,
    primitives::Bytes,
};

use crate::errors::AbiError;

/// Calldata for calling `name` with `args`
///
/// Overloads are resolved by argument count; the first match wins.
pub fn encode_call(abi: &JsonAbi, name: &str, args: &[DynSolValue]) -> Result<Bytes, AbiError> {
    let function = abi
        .function(name)
        .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == args.len()))
        .ok_or_else(|| AbiError::UnknownFunction {
            name: name.to_string(),
            arity: args.len(),
        })?;

    function
        .abi_encode_input(args)
        .map(Bytes::from)
        .map_err(|e| AbiError::Encoding(e.to_string()))
}

/// ABI-encoded constructor arguments, without the creation bytecode
///
/// No arguments always encode to empty bytes, whatever the constructor
/// declares. An ABI without a constructor accepts only an empty argument list.
pub fn encode_constructor_params(abi: &JsonAbi, args: &[DynSolValue]) -> Result<Bytes, AbiError> {
    if args.is_empty() {
        return Ok(Bytes::new());
    }
    let constructor = abi.constructor().ok_or(AbiError::MissingConstructor)?;
    constructor
        .abi_encode_input(args)
        .map(Bytes::from)
        .map_err(|e| AbiError::Encoding(e.to_string()))
}

/// Creation bytecode followed by the encoded constructor arguments
pub fn deployment_data(bytecode: &[u8], abi: &JsonAbi, args: &[DynSolValue]) -> Result<Bytes, AbiError> {
    let params = encode_constructor_params(abi, args)?;
    let mut data = Vec::with_capacity(bytecode.len() + params.len());
    data.extend_from_slice(bytecode);
    data.extend_from_slice(&params);
    Ok(data.into())
}
