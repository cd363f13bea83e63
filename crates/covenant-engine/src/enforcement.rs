//! Action enforcement.
//!
//! Every registered [`EnforcementInterface`] and the engine's forbidden
//! action patterns are consulted for each action. Any single deny vetoes.

use std::collections::BTreeMap;
use std::fmt;

use covenant_types::{pattern_matches, ConstraintSet};
use serde::{Deserialize, Serialize};

/// Who is acting, plus free-form attributes for backends that want them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
    pub actor_id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl ActionContext {
    pub fn actor(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: Some(actor_id.into()),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementVerdict {
    pub allowed: bool,
    pub reason: String,
}

impl EnforcementVerdict {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// A backend that can authorize or refuse an action.
pub trait EnforcementInterface: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn check_action_allowed(&self, action: &str, context: &ActionContext) -> EnforcementVerdict;
}

/// Confines sandboxed actors to an allow-list of action patterns.
/// Actors outside the sandbox are not restricted.
#[derive(Debug, Clone, Default)]
pub struct SandboxEnforcer {
    sandboxed: Vec<String>,
    allowed_patterns: Vec<String>,
}

impl SandboxEnforcer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sandbox(mut self, actor_id: impl Into<String>) -> Self {
        self.sandboxed.push(actor_id.into());
        self
    }

    pub fn allow(mut self, pattern: impl Into<String>) -> Self {
        self.allowed_patterns.push(pattern.into());
        self
    }

    fn is_sandboxed(&self, actor_id: &str) -> bool {
        self.sandboxed.iter().any(|a| a == actor_id)
    }
}

impl EnforcementInterface for SandboxEnforcer {
    fn name(&self) -> &str {
        "sandbox"
    }

    fn check_action_allowed(&self, action: &str, context: &ActionContext) -> EnforcementVerdict {
        let Some(actor) = context.actor_id.as_deref() else {
            return EnforcementVerdict::allow("no actor");
        };
        if !self.is_sandboxed(actor) {
            return EnforcementVerdict::allow("actor not sandboxed");
        }
        match self
            .allowed_patterns
            .iter()
            .find(|p| pattern_matches(p, action))
        {
            Some(pattern) => EnforcementVerdict::allow(format!("sandbox permits {pattern}")),
            None => EnforcementVerdict::deny(format!(
                "sandboxed actor {actor} may not perform {action}"
            )),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SanctionLevel {
    #[default]
    None,
    Warning,
    Restricted,
    Suspended,
}

/// Graduated per-actor sanctions.
#[derive(Debug, Clone, Default)]
pub struct SanctionsLadder {
    levels: BTreeMap<String, SanctionLevel>,
    restricted_patterns: Vec<String>,
}

impl SanctionsLadder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions denied to actors at [`SanctionLevel::Restricted`].
    pub fn restrict(mut self, pattern: impl Into<String>) -> Self {
        self.restricted_patterns.push(pattern.into());
        self
    }

    pub fn with_sanction(mut self, actor_id: impl Into<String>, level: SanctionLevel) -> Self {
        self.sanction(actor_id, level);
        self
    }

    pub fn sanction(&mut self, actor_id: impl Into<String>, level: SanctionLevel) {
        self.levels.insert(actor_id.into(), level);
    }

    /// Move an actor one rung up the ladder. Returns the new level.
    pub fn escalate(&mut self, actor_id: &str) -> SanctionLevel {
        let next = match self.level_of(actor_id) {
            SanctionLevel::None => SanctionLevel::Warning,
            SanctionLevel::Warning => SanctionLevel::Restricted,
            SanctionLevel::Restricted | SanctionLevel::Suspended => SanctionLevel::Suspended,
        };
        self.levels.insert(actor_id.to_string(), next);
        next
    }

    pub fn level_of(&self, actor_id: &str) -> SanctionLevel {
        self.levels.get(actor_id).copied().unwrap_or_default()
    }
}

impl EnforcementInterface for SanctionsLadder {
    fn name(&self) -> &str {
        "sanctions"
    }

    fn check_action_allowed(&self, action: &str, context: &ActionContext) -> EnforcementVerdict {
        let Some(actor) = context.actor_id.as_deref() else {
            return EnforcementVerdict::allow("no actor");
        };
        match self.level_of(actor) {
            SanctionLevel::Suspended => {
                EnforcementVerdict::deny(format!("actor {actor} is suspended"))
            }
            SanctionLevel::Restricted
                if self
                    .restricted_patterns
                    .iter()
                    .any(|p| pattern_matches(p, action)) =>
            {
                EnforcementVerdict::deny(format!("actor {actor} is restricted from {action}"))
            }
            level => EnforcementVerdict::allow(format!("sanction level {level:?}")),
        }
    }
}

/// Combined outcome of the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub allowed: bool,
    /// Deny reasons, one per vetoing source.
    pub denials: Vec<String>,
}

impl GateVerdict {
    /// Add a vetoing source evaluated outside the gate.
    pub fn deny(&mut self, reason: impl Into<String>) {
        self.denials.push(reason.into());
        self.allowed = false;
    }

    pub fn reason(&self, action: &str) -> String {
        if self.allowed {
            format!("action {action} allowed")
        } else {
            format!("action {action} denied: {}", self.denials.join("; "))
        }
    }
}

/// Runs an action past every enforcer and the forbidden-action patterns.
#[derive(Debug, Default)]
pub struct EnforcementGate {
    enforcers: Vec<Box<dyn EnforcementInterface>>,
}

impl EnforcementGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, enforcer: Box<dyn EnforcementInterface>) {
        self.enforcers.push(enforcer);
    }

    pub fn enforcer_names(&self) -> Vec<String> {
        self.enforcers.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn evaluate(
        &self,
        action: &str,
        context: &ActionContext,
        constraints: &ConstraintSet,
    ) -> GateVerdict {
        let mut denials: Vec<String> = self
            .enforcers
            .iter()
            .filter_map(|enforcer| {
                let verdict = enforcer.check_action_allowed(action, context);
                (!verdict.allowed).then(|| format!("{}: {}", enforcer.name(), verdict.reason))
            })
            .collect();

        if let Some(pattern) = constraints.matching_pattern(action) {
            denials.push(format!("constraints: forbidden by {pattern}"));
        }

        GateVerdict {
            allowed: denials.is_empty(),
            denials,
        }
    }
}
