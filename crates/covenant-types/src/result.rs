use serde::{Deserialize, Serialize};

use crate::ids::DecisionId;

/// Uniform outcome of every engine operation.
///
/// Domain failures (unknown party, wrong state, missed threshold, bans)
/// come back as `legitimate == false` with a reason. Callers branch on
/// `legitimate`; nothing here is an error type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GovernanceResult {
    pub legitimate: bool,
    pub reason: String,
    pub decision_id: Option<DecisionId>,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl GovernanceResult {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            legitimate: true,
            reason: reason.into(),
            decision_id: None,
            data: serde_json::Map::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            legitimate: false,
            reason: reason.into(),
            decision_id: None,
            data: serde_json::Map::new(),
        }
    }

    pub fn with_decision(mut self, id: DecisionId) -> Self {
        self.decision_id = Some(id);
        self
    }

    /// Attach a data value. Values that fail to serialize are skipped.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.data.insert(key.into(), v);
        }
        self
    }

    pub fn is_legitimate(&self) -> bool {
        self.legitimate
    }
}

impl std::fmt::Display for GovernanceResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.legitimate { "legitimate" } else { "rejected" };
        write!(f, "{}: {}", verdict, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_and_deny() {
        let ok = GovernanceResult::allow("registered");
        assert!(ok.is_legitimate());
        let no = GovernanceResult::deny("unknown party");
        assert!(!no.legitimate);
        assert_eq!(no.to_string(), "rejected: unknown party");
    }

    #[test]
    fn data_and_decision_attach() {
        let id = DecisionId::new();
        let r = GovernanceResult::allow("ok")
            .with_decision(id.clone())
            .with_data("votes", 3);
        assert_eq!(r.decision_id, Some(id));
        assert_eq!(r.data["votes"], serde_json::json!(3));
    }
}
