use serde_json::Value;

use crate::services::auth::jws::JsonObject;

/// Identity claims returned by the upstream userinfo endpoint for one bearer token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityClaims(JsonObject);

impl IdentityClaims {
    pub fn new(claims: JsonObject) -> Self {
        Self(claims)
    }

    /// `sub` when present as a string.
    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &JsonObject {
        &self.0
    }
}
