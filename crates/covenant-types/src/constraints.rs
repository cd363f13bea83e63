//! Constraint sets, capability manifests and the governed diffs that change them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Forbidden runtime action patterns.
///
/// A pattern matches an action exactly, or, when it ends in `.*`, any action
/// that starts with the text before the `*` (`"foo.*"` matches `"foo.bar"`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSet {
    pub forbidden_actions: BTreeSet<String>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forbidden(mut self, pattern: impl Into<String>) -> Self {
        self.forbidden_actions.insert(pattern.into());
        self
    }

    /// First forbidden pattern matching `action`, if any.
    pub fn matching_pattern(&self, action: &str) -> Option<&str> {
        self.forbidden_actions
            .iter()
            .find(|p| pattern_matches(p, action))
            .map(String::as_str)
    }

    pub fn is_forbidden(&self, action: &str) -> bool {
        self.matching_pattern(action).is_some()
    }

    /// Apply an executed constraint diff.
    pub fn apply(&mut self, diff: &CsDiff) {
        for pattern in &diff.remove_forbidden {
            self.forbidden_actions.remove(pattern);
        }
        for pattern in &diff.add_forbidden {
            self.forbidden_actions.insert(pattern.clone());
        }
    }
}

/// Exact or trailing-wildcard pattern match.
pub fn pattern_matches(pattern: &str, action: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => action.starts_with(prefix),
        None => pattern == action,
    }
}

/// Capabilities granted to holders (parties or external agents).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityManifest {
    pub grants: BTreeMap<String, BTreeSet<String>>,
}

impl CapabilityManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grant(mut self, holder: impl Into<String>, capability: impl Into<String>) -> Self {
        self.grants
            .entry(holder.into())
            .or_default()
            .insert(capability.into());
        self
    }

    pub fn has_capability(&self, holder: &str, capability: &str) -> bool {
        self.grants
            .get(holder)
            .is_some_and(|caps| caps.contains(capability))
    }

    /// Apply an executed capability diff. Revocations run before grants.
    pub fn apply(&mut self, diff: &CmDiff) {
        for grant in &diff.revoke {
            if let Some(caps) = self.grants.get_mut(&grant.holder) {
                caps.remove(&grant.capability);
                if caps.is_empty() {
                    self.grants.remove(&grant.holder);
                }
            }
        }
        for grant in &diff.grant {
            self.grants
                .entry(grant.holder.clone())
                .or_default()
                .insert(grant.capability.clone());
        }
    }
}

/// A governed change to the [`ConstraintSet`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsDiff {
    #[serde(default)]
    pub add_forbidden: Vec<String>,
    #[serde(default)]
    pub remove_forbidden: Vec<String>,
    /// Permanent diffs are banned while an emergency is active.
    #[serde(default)]
    pub permanent: bool,
}

/// A single capability grant or revocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityGrant {
    pub holder: String,
    pub capability: String,
}

impl CapabilityGrant {
    pub fn new(holder: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            capability: capability.into(),
        }
    }
}

/// A governed change to the [`CapabilityManifest`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmDiff {
    #[serde(default)]
    pub grant: Vec<CapabilityGrant>,
    #[serde(default)]
    pub revoke: Vec<CapabilityGrant>,
    #[serde(default)]
    pub permanent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_wildcard_patterns() {
        assert!(pattern_matches("net.raw_socket", "net.raw_socket"));
        assert!(!pattern_matches("net.raw_socket", "net.raw_socket2"));
        assert!(pattern_matches("foo.*", "foo.bar"));
        assert!(pattern_matches("foo.*", "foo.bar.baz"));
        assert!(!pattern_matches("foo.*", "food.bar"));
        assert!(!pattern_matches("foo.*", "foo"));
    }

    #[test]
    fn constraint_diff_applies() {
        let mut cs = ConstraintSet::new().with_forbidden("fs.delete");
        cs.apply(&CsDiff {
            add_forbidden: vec!["net.*".into()],
            remove_forbidden: vec!["fs.delete".into()],
            permanent: true,
        });
        assert!(!cs.is_forbidden("fs.delete"));
        assert_eq!(cs.matching_pattern("net.connect"), Some("net.*"));
    }

    #[test]
    fn capability_diff_revokes_then_grants() {
        let mut cm = CapabilityManifest::new().with_grant("agent-1", "read");
        cm.apply(&CmDiff {
            grant: vec![CapabilityGrant::new("agent-2", "write")],
            revoke: vec![CapabilityGrant::new("agent-1", "read")],
            permanent: false,
        });
        assert!(!cm.has_capability("agent-1", "read"));
        assert!(!cm.grants.contains_key("agent-1"));
        assert!(cm.has_capability("agent-2", "write"));
    }
}
