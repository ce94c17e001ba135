//! Calldata encoding and return-value decoding for catalog functions

use super::FunctionDescriptor;
use crate::error::AbiError;
use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{keccak256, Bytes};

/// Typed encoder/decoder for one function, built once per registered command
#[derive(Debug, Clone, PartialEq)]
pub struct CallCodec {
    function: String,
    selector: [u8; 4],
    input_types: Vec<DynSolType>,
    output_types: Vec<DynSolType>,
}

impl CallCodec {
    /// Parse every input and output type of a function
    pub fn new(function: &FunctionDescriptor) -> Result<Self, AbiError> {
        let parse = |ty: String| {
            DynSolType::parse(&ty).map_err(|e| AbiError::InvalidType {
                ty,
                reason: e.to_string(),
            })
        };

        let input_types = function
            .inputs
            .iter()
            .map(|p| parse(p.canonical_type()))
            .collect::<Result<Vec<_>, _>>()?;
        let output_types = function
            .outputs
            .iter()
            .map(|p| parse(p.canonical_type()))
            .collect::<Result<Vec<_>, _>>()?;

        let hash = keccak256(function.signature.as_bytes());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&hash[..4]);

        Ok(Self {
            function: function.name.clone(),
            selector,
            input_types,
            output_types,
        })
    }

    /// 4-byte function selector
    pub fn selector(&self) -> [u8; 4] {
        self.selector
    }

    /// Coerce raw argument strings to typed values, in declared order
    pub fn coerce(&self, args: &[String]) -> Result<Vec<DynSolValue>, AbiError> {
        if args.len() != self.input_types.len() {
            return Err(AbiError::ArgumentCount {
                function: self.function.clone(),
                expected: self.input_types.len(),
                got: args.len(),
            });
        }

        self.input_types
            .iter()
            .zip(args)
            .map(|(ty, arg)| {
                ty.coerce_str(arg).map_err(|e| AbiError::InvalidValue {
                    value: arg.clone(),
                    ty: ty.sol_type_name().into_owned(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Selector followed by the ABI-encoded arguments
    pub fn encode(&self, values: &[DynSolValue]) -> Bytes {
        let mut calldata = self.selector.to_vec();
        if !values.is_empty() {
            let tuple = DynSolValue::Tuple(values.to_vec());
            calldata.extend_from_slice(&tuple.abi_encode_params());
        }
        calldata.into()
    }

    /// Decode returned data into one value per declared output
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<DynSolValue>, AbiError> {
        if self.output_types.is_empty() {
            return Ok(Vec::new());
        }

        let tuple = DynSolType::Tuple(self.output_types.clone());
        let decoded = tuple
            .abi_decode_params(data)
            .map_err(|e| AbiError::DecodeError {
                function: self.function.clone(),
                reason: e.to_string(),
            })?;

        match decoded {
            DynSolValue::Tuple(values) => Ok(values),
            other => Ok(vec![other]),
        }
    }
}

/// Format a DynSolValue for display
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::FixedBytes(b, size) => format!("0x{}", hex::encode(&b[..*size])),
        DynSolValue::Address(a) => a.to_checksum(None),
        DynSolValue::Function(f) => format!("0x{}", hex::encode(f)),
        DynSolValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        DynSolValue::String(s) => format!("\"{}\"", s),
        DynSolValue::Array(arr) | DynSolValue::FixedArray(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        DynSolValue::Tuple(tuple) => {
            let items: Vec<String> = tuple.iter().map(format_value).collect();
            format!("({})", items.join(", "))
        }
        // Struct values only exist with eip712 enabled somewhere in the graph
        #[allow(unreachable_patterns)]
        other => format!("{:?}", other),
    }
}

/// JSON rendering of a DynSolValue, numbers as decimal strings
pub fn value_to_json(value: &DynSolValue) -> serde_json::Value {
    use serde_json::Value;

    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(arr) | DynSolValue::FixedArray(arr) | DynSolValue::Tuple(arr) => {
            Value::Array(arr.iter().map(value_to_json).collect())
        }
        other => Value::String(format_value(other)),
    }
}
