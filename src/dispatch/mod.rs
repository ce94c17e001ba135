//! Read/write dispatch of prepared contract calls

mod engine;
mod lifecycle;

pub use engine::{DispatchEngine, DEFAULT_POLL_INTERVAL};
pub use lifecycle::{is_not_mined, LifecycleState, Transition, WriteLifecycle};

use crate::abi::{CallCodec, FunctionDescriptor};
use crate::cli::spec::CommandSpec;
use crate::error::AbiError;
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, TxHash, U256};

/// Per-invocation settings for a call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub contract_address: Address,
    /// Sender; the node's first account when unset
    pub sender: Option<Address>,
    pub gas_price: Option<u128>,
    pub gas_limit: Option<u64>,
    /// Wei sent along with a payable call
    pub value: Option<U256>,
    /// Print the request before a hardware signer is asked to sign it
    pub device_confirmation: bool,
}

/// A command resolved to its function with typed arguments
#[derive(Debug, Clone)]
pub struct PreparedCall<'a> {
    pub spec: &'a CommandSpec,
    pub function: &'a FunctionDescriptor,
    pub codec: &'a CallCodec,
    /// Arguments as the user typed them
    pub args: Vec<String>,
    pub values: Vec<DynSolValue>,
}

impl<'a> PreparedCall<'a> {
    /// Coerce `args` against the function's input types
    pub fn new(
        spec: &'a CommandSpec,
        function: &'a FunctionDescriptor,
        codec: &'a CallCodec,
        args: Vec<String>,
    ) -> Result<Self, AbiError> {
        let values = codec.coerce(&args)?;
        Ok(Self {
            spec,
            function,
            codec,
            args,
            values,
        })
    }

    /// Selector plus encoded arguments
    pub fn calldata(&self) -> Bytes {
        self.codec.encode(&self.values)
    }
}

/// Successful end of a dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R> {
    Read(Vec<DynSolValue>),
    Confirmed {
        tx_hash: TxHash,
        receipt: R,
        /// Receipt came from the slow-confirmation poll
        recovered: bool,
    },
}
