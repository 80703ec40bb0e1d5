/// Token claim set
///
/// Represents the payload of a token: an insertion-ordered map of claim names
/// to JSON values, with typed accessors for the claims every token carries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const TOKEN_TYPE_CLAIM: &str = "token_type";
pub const JTI_CLAIM: &str = "jti";
pub const EXP_CLAIM: &str = "exp";
pub const IAT_CLAIM: &str = "iat";
pub const NBF_CLAIM: &str = "nbf";
pub const ISS_CLAIM: &str = "iss";
pub const AUD_CLAIM: &str = "aud";
pub const USER_ID_CLAIM: &str = "user_id";
pub const REFRESH_EXP_CLAIM: &str = "refresh_exp";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Sets a claim, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a claim and keeps the order of the remaining ones
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn token_type(&self) -> Option<&str> {
        self.get(TOKEN_TYPE_CLAIM).and_then(Value::as_str)
    }

    pub fn jti(&self) -> Option<&str> {
        self.get(JTI_CLAIM).and_then(Value::as_str)
    }

    pub fn exp(&self) -> Option<i64> {
        self.get(EXP_CLAIM).and_then(Value::as_i64)
    }

    pub fn iat(&self) -> Option<i64> {
        self.get(IAT_CLAIM).and_then(Value::as_i64)
    }

    pub fn user_id(&self) -> Option<&Value> {
        self.get(USER_ID_CLAIM)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
