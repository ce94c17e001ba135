//! Contract interface catalog and call encoding

mod catalog;
mod codec;

pub use catalog::{Catalog, ContractDescriptor, FunctionDescriptor, MethodDevDoc, Param};
pub use codec::{format_value, value_to_json, CallCodec};
