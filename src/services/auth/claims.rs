//! Verified token claims.
//!
//! `ClaimSet` is produced once by the access-token verifier and never mutated afterwards.
//! Values keep the JWT shape loosely typed; the identity builder decides which claims matter.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Claim names read by the pipeline.
pub mod names {
    pub const SUBJECT: &str = "sub";
    pub const ISSUER: &str = "iss";
    pub const AUDIENCE: &str = "aud";
    pub const EXPIRES_AT: &str = "exp";
    pub const TOKEN_ID: &str = "jti";
    pub const SCOPE: &str = "scope";
    pub const SCOPE_LIST: &str = "scp";

    // tenant binding
    pub const CLIENT_ID: &str = "m9d_client_id";
    pub const PROVIDER_ID: &str = "m9d_provider_id";
    pub const CONTAINER_ID: &str = "m9d_container_id";
}

/// A single claim value.
///
/// Anything that is not a string, a list of strings or an integer timestamp is kept as raw JSON
/// so unknown claims never make an otherwise valid token unparsable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Text(String),
    List(Vec<String>),
    Timestamp(i64),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeMap<String, ClaimValue>);

impl ClaimSet {
    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    /// String claim, if present and a string.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            ClaimValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// String-or-list claim flattened into owned strings (e.g. `aud`).
    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.0.get(name) {
            Some(ClaimValue::Text(s)) => vec![s.clone()],
            Some(ClaimValue::List(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn timestamp(&self, name: &str) -> Option<i64> {
        match self.0.get(name)? {
            ClaimValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
