//! Combined ABI + NatSpec catalog loading
//!
//! A catalog is the `--combined-json abi,devdoc,userdoc` output of solc: one
//! entry per `"<sourcePath>:<ContractName>"` key, each holding the interface
//! list and both documentation objects. Older compilers emit those three
//! fields as JSON-encoded strings, newer ones inline them; both are accepted.

use crate::error::{CatalogError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// One parameter of a function interface
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Param {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// Tuple members, for `tuple` / `tuple[]` types
    #[serde(default)]
    pub components: Vec<Param>,
}

impl Param {
    /// Canonical type string, expanding tuples into `(t1,t2)` form
    pub fn canonical_type(&self) -> String {
        match self.ty.strip_prefix("tuple") {
            Some(suffix) if !self.components.is_empty() => {
                let inner: Vec<String> = self.components.iter().map(|c| c.canonical_type()).collect();
                format!("({}){}", inner.join(","), suffix)
            }
            _ => self.ty.clone(),
        }
    }
}

/// Raw interface entry as it appears in the ABI array
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbiEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<Param>,
    #[serde(default)]
    outputs: Vec<Param>,
    #[serde(default)]
    constant: Option<bool>,
    #[serde(default)]
    payable: Option<bool>,
    #[serde(default)]
    state_mutability: Option<String>,
}

fn default_entry_type() -> String {
    "function".to_string()
}

/// One callable entry of a contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    /// Entry type (`function`, `event`, `constructor`, `fallback`, ...)
    pub kind: String,
    pub name: String,
    /// `name(type1,type2)`, the join key into the documentation maps
    pub signature: String,
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
    /// View/pure read that never needs a transaction
    pub is_constant: bool,
    pub is_payable: bool,
}

impl FunctionDescriptor {
    fn from_entry(entry: AbiEntry) -> Self {
        let mutability = entry.state_mutability.as_deref();
        let is_constant =
            entry.constant.unwrap_or(false) || matches!(mutability, Some("view") | Some("pure"));
        let is_payable = entry.payable.unwrap_or(false) || mutability == Some("payable");
        let types: Vec<String> = entry.inputs.iter().map(|p| p.canonical_type()).collect();
        let signature = format!("{}({})", entry.name, types.join(","));

        Self {
            kind: entry.kind,
            name: entry.name,
            signature,
            inputs: entry.inputs,
            outputs: entry.outputs,
            is_constant,
            is_payable,
        }
    }

    /// Whether this entry is a callable function (not an event, constructor, ...)
    pub fn is_function(&self) -> bool {
        self.kind == "function"
    }
}

/// Developer documentation for one method
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MethodDevDoc {
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct DevDoc {
    #[serde(default)]
    methods: BTreeMap<String, MethodDevDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct UserDoc {
    #[serde(default)]
    methods: BTreeMap<String, MethodUserDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct MethodUserDoc {
    #[serde(default)]
    notice: Option<String>,
}

/// One named contract with its interface and documentation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractDescriptor {
    pub name: String,
    pub functions: Vec<FunctionDescriptor>,
    /// User-facing notice per signature
    pub notices: BTreeMap<String, String>,
    /// Developer docs (param descriptions, details) per signature
    pub dev_docs: BTreeMap<String, MethodDevDoc>,
}

impl ContractDescriptor {
    /// Parameter documentation for a signature
    pub fn param_docs(&self, signature: &str) -> Option<&BTreeMap<String, String>> {
        self.dev_docs.get(signature).map(|d| &d.params)
    }

    /// Find a function by signature
    pub fn function(&self, signature: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| f.signature == signature)
    }
}

/// Loaded catalog: contracts by bare name plus the entries that failed
#[derive(Debug, Default)]
pub struct Catalog {
    pub contracts: BTreeMap<String, ContractDescriptor>,
    /// Entries whose nested JSON was malformed, with the reason
    pub failures: Vec<CatalogError>,
}

impl Catalog {
    /// Load a catalog from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse a catalog from its JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let combined: Value = serde_json::from_str(content).map_err(CatalogError::InvalidJson)?;
        let entries = combined
            .get("contracts")
            .and_then(Value::as_object)
            .ok_or(CatalogError::MissingContracts)?;

        let mut catalog = Catalog::default();
        let mut attempted = 0usize;

        for (raw_name, attributes) in entries {
            // Entries without an interface describe non-contract artifacts
            let Some(abi) = attributes.get("abi").filter(|v| !v.is_null()) else {
                tracing::debug!("Skipping {} (no abi)", raw_name);
                continue;
            };
            attempted += 1;

            let name = contract_name(raw_name);
            match parse_entry(&name, abi, attributes) {
                Ok(descriptor) => {
                    catalog.contracts.insert(name, descriptor);
                }
                Err(e) => {
                    tracing::warn!("Skipping contract {}: {}", raw_name, e);
                    catalog.failures.push(e);
                }
            }
        }

        if attempted > 0 && catalog.contracts.is_empty() {
            return Err(CatalogError::AllContractsFailed(attempted).into());
        }

        Ok(catalog)
    }

    /// Get a contract by bare name
    pub fn contract(&self, name: &str) -> Option<&ContractDescriptor> {
        self.contracts.get(name)
    }

    /// Contracts selected by an optional allow-list
    pub fn select<'a>(&'a self, allow: Option<&'a [String]>) -> Vec<&'a ContractDescriptor> {
        match allow {
            Some(names) => names.iter().filter_map(|n| self.contracts.get(n)).collect(),
            None => self.contracts.values().collect(),
        }
    }
}

/// `"contracts/Foo.sol:Foo"` -> `"Foo"`
fn contract_name(raw: &str) -> String {
    match raw.split(':').nth(1) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => raw.to_string(),
    }
}

fn parse_entry(name: &str, abi: &Value, attributes: &Value) -> std::result::Result<ContractDescriptor, CatalogError> {
    let entries: Vec<AbiEntry> = decode_field(name, "abi", abi)?;

    let devdoc: DevDoc = match attributes.get("devdoc").filter(|v| !v.is_null()) {
        Some(v) => decode_field(name, "devdoc", v)?,
        None => DevDoc::default(),
    };
    let userdoc: UserDoc = match attributes.get("userdoc").filter(|v| !v.is_null()) {
        Some(v) => decode_field(name, "userdoc", v)?,
        None => UserDoc::default(),
    };

    let notices = userdoc
        .methods
        .into_iter()
        .filter_map(|(sig, doc)| doc.notice.map(|n| (sig, n)))
        .collect();

    Ok(ContractDescriptor {
        name: name.to_string(),
        functions: entries.into_iter().map(FunctionDescriptor::from_entry).collect(),
        notices,
        dev_docs: devdoc.methods,
    })
}

/// Decode a field that is either a JSON-encoded string or inline JSON
fn decode_field<T: serde::de::DeserializeOwned>(
    contract: &str,
    field: &'static str,
    value: &Value,
) -> std::result::Result<T, CatalogError> {
    let invalid = |reason: String| CatalogError::InvalidEntry {
        contract: contract.to_string(),
        field,
        reason,
    };

    match value {
        Value::String(encoded) => serde_json::from_str(encoded).map_err(|e| invalid(e.to_string())),
        other => T::deserialize(other).map_err(|e| invalid(e.to_string())),
    }
}
