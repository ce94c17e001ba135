//! Caller-supplied options for command generation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Override for a single function signature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodOverride {
    /// Notice used when the catalog has none
    #[serde(default)]
    pub notice: Option<String>,

    /// Parameter descriptions used when the catalog has none
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Never register a command for this function
    #[serde(default)]
    pub skip: bool,
}

impl MethodOverride {
    /// Override that only supplies a notice
    pub fn notice(notice: impl Into<String>) -> Self {
        Self {
            notice: Some(notice.into()),
            ..Default::default()
        }
    }

    /// Override that hides the function
    pub fn skip() -> Self {
        Self {
            skip: true,
            ..Default::default()
        }
    }
}

/// Options for building commands from a catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Contract allow-list; `None` means every contract in the catalog
    pub contracts: Option<Vec<String>>,

    /// Overrides keyed by `name(type1,type2)`
    pub methods: BTreeMap<String, MethodOverride>,
}

impl BuildOptions {
    /// Restrict generation to the given contracts
    pub fn with_contracts<I, S>(mut self, contracts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contracts = Some(contracts.into_iter().map(Into::into).collect());
        self
    }

    /// Add an override for a signature
    pub fn with_method(mut self, signature: impl Into<String>, method: MethodOverride) -> Self {
        self.methods.insert(signature.into(), method);
        self
    }

    pub fn is_skipped(&self, signature: &str) -> bool {
        self.methods.get(signature).map(|m| m.skip).unwrap_or(false)
    }

    pub fn notice_for(&self, signature: &str) -> Option<&str> {
        self.methods
            .get(signature)
            .and_then(|m| m.notice.as_deref())
    }

    pub fn param_doc(&self, signature: &str, param: &str) -> Option<&str> {
        self.methods
            .get(signature)
            .and_then(|m| m.params.get(param))
            .map(String::as_str)
    }
}
