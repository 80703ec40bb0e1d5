/// Identity collaborator
///
/// The authenticator resolves the `user_id` claim through an `IdentityStore`
/// supplied by the embedding service.

use std::fmt;

use serde_json::Value;
use uuid::Uuid;

/// User identifier as carried in the `user_id` claim
///
/// Integral ids travel as JSON numbers, everything else as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserId {
    Int(i64),
    Str(String),
}

impl UserId {
    pub fn to_claim(&self) -> Value {
        match self {
            UserId::Int(id) => Value::from(*id),
            UserId::Str(id) => Value::from(id.as_str()),
        }
    }

    /// Read a claim value back into an id
    ///
    /// Returns `None` for anything but an integer or a non-empty string.
    pub fn from_claim(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_i64().map(UserId::Int),
            Value::String(text) if !text.is_empty() => Some(UserId::Str(text.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Int(id) => write!(f, "{}", id),
            UserId::Str(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId::Int(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        UserId::Str(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId::Str(id.to_string())
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        UserId::Str(id.to_string())
    }
}

/// A resolved user
pub trait Identity {
    fn id(&self) -> UserId;
    fn is_active(&self) -> bool;
}

/// Lookup of users by id
pub trait IdentityStore: Send + Sync {
    type User: Identity;

    fn find_by_id(&self, id: &UserId) -> Option<Self::User>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integral_ids_stay_numbers() {
        assert_eq!(UserId::from(42).to_claim(), json!(42));
        assert_eq!(UserId::from_claim(&json!(42)), Some(UserId::Int(42)));
    }

    #[test]
    fn test_other_ids_become_strings() {
        let id = Uuid::new_v4();
        assert_eq!(UserId::from(id).to_claim(), json!(id.to_string()));
        assert_eq!(
            UserId::from_claim(&json!("alice")),
            Some(UserId::Str("alice".to_string()))
        );
    }

    #[test]
    fn test_unusable_claims() {
        assert_eq!(UserId::from_claim(&json!("")), None);
        assert_eq!(UserId::from_claim(&json!(1.5)), None);
        assert_eq!(UserId::from_claim(&json!(null)), None);
        assert_eq!(UserId::from_claim(&json!([1])), None);
    }
}
