use serde::{Deserialize, Serialize};

/// Strong typed IDs used throughout Covenant.

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyClass(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(pub uuid::Uuid);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpId(pub uuid::Uuid);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectionId(pub uuid::Uuid);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppealId(pub uuid::Uuid);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub uuid::Uuid);

impl PartyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartyClass {
    pub fn new(class: impl Into<String>) -> Self {
        Self(class.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! uuid_id {
    ($name:ident, $prefix:literal) => {
        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(DecisionId, "dec");
uuid_id!(EpId, "ep");
uuid_id!(ObjectionId, "obj");
uuid_id!(AppealId, "apl");
uuid_id!(EntryId, "aud");

impl std::fmt::Display for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for PartyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for PartyClass {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PartyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<String> for PartyClass {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_id_uniqueness() {
        let a = DecisionId::new();
        let b = DecisionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn transparent_serialization() {
        let id = PartyId::new("alice");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"alice\"");

        let did = DecisionId::new();
        let json = serde_json::to_string(&did).unwrap();
        let restored: DecisionId = serde_json::from_str(&json).unwrap();
        assert_eq!(did, restored);
    }

    #[test]
    fn display_formats() {
        assert!(format!("{}", DecisionId::new()).starts_with("dec:"));
        assert!(format!("{}", EpId::new()).starts_with("ep:"));
        assert!(format!("{}", ObjectionId::new()).starts_with("obj:"));
        assert!(format!("{}", AppealId::new()).starts_with("apl:"));
        assert!(format!("{}", EntryId::new()).starts_with("aud:"));
        assert_eq!(format!("{}", PartyClass::from("H")), "H");
    }
}
