//! Emergency circuit breaker.
//!
//! One live [`EmergencyState`] at a time. Entering, renewing, exiting and
//! expiring all supersede the live state with a new value; the superseded
//! one moves to history unchanged.

use chrono::{DateTime, Utc};
use covenant_types::{pattern_matches, Decision, DecisionId, DecisionProposal, VoteRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::EmergencyConfig;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmergencyError {
    #[error("emergency already active")]
    AlreadyActive,

    #[error("no active emergency")]
    NotActive,

    #[error("emergency requires at least {required} voters, got {got}")]
    InsufficientVoters { got: usize, required: u32 },

    #[error("emergency approval {ratio:.3} below required {required:.3}")]
    ThresholdNotMet { ratio: f64, required: f64 },

    #[error("permanent constraint or capability changes are banned during an emergency")]
    PermanentChangeBanned,

    #[error("irreversible decision {0} cannot execute during an emergency")]
    IrreversibleBanned(DecisionId),

    #[error("renewal {next} would not raise the bar above {required:.3}; exit or re-enter the emergency")]
    RenewalLimitReached { next: u32, required: f64 },
}

/// Emergency status. Never mutated in place once published.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmergencyState {
    pub active: bool,
    pub entered_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub renewal_count: u32,
    pub banned_invariants: Vec<String>,
    pub decision_id: Option<DecisionId>,
}

impl EmergencyState {
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.is_some_and(|at| now > at)
    }

    fn deactivated(&self) -> Self {
        Self {
            active: false,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmergencyManager {
    config: EmergencyConfig,
    current: EmergencyState,
    history: Vec<EmergencyState>,
}

impl EmergencyManager {
    pub fn new(config: EmergencyConfig) -> Self {
        Self {
            config,
            current: EmergencyState::inactive(),
            history: Vec::new(),
        }
    }

    /// Rebuild from persisted state.
    pub fn restore(
        config: EmergencyConfig,
        current: EmergencyState,
        history: Vec<EmergencyState>,
    ) -> Self {
        Self {
            config,
            current,
            history,
        }
    }

    pub fn state(&self) -> &EmergencyState {
        &self.current
    }

    pub fn history(&self) -> &[EmergencyState] {
        &self.history
    }

    pub fn is_active(&self) -> bool {
        self.current.active
    }

    /// Required approval ratio for the next renewal.
    pub fn required_renewal_ratio(&self) -> f64 {
        self.config
            .renewal_threshold(self.current.renewal_count.saturating_add(1))
    }

    pub fn enter(
        &mut self,
        votes: &[VoteRecord],
        decision_id: Option<DecisionId>,
        banned_invariants: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<EmergencyState, EmergencyError> {
        if self.current.active {
            return Err(EmergencyError::AlreadyActive);
        }
        self.check_ballots(votes, self.config.entry_threshold)?;

        let next = EmergencyState {
            active: true,
            entered_at: Some(now),
            expires_at: Some(self.expiry_from(now)),
            renewal_count: 0,
            banned_invariants,
            decision_id,
        };
        info!(
            expires_at = ?next.expires_at,
            invariants = next.banned_invariants.len(),
            "Emergency entered"
        );
        self.supersede(next.clone());
        Ok(next)
    }

    pub fn renew(
        &mut self,
        votes: &[VoteRecord],
        now: DateTime<Utc>,
    ) -> Result<EmergencyState, EmergencyError> {
        if !self.current.active {
            return Err(EmergencyError::NotActive);
        }
        // the bar saturates at unanimity once decay^n underflows
        let next = self.current.renewal_count.saturating_add(1);
        let required = self.required_renewal_ratio();
        if required <= self.config.renewal_threshold(next - 1) {
            return Err(EmergencyError::RenewalLimitReached { next, required });
        }
        self.check_ballots(votes, required)?;

        let next = EmergencyState {
            expires_at: Some(self.expiry_from(now)),
            renewal_count: self.current.renewal_count + 1,
            ..self.current.clone()
        };
        info!(
            renewal_count = next.renewal_count,
            expires_at = ?next.expires_at,
            "Emergency renewed"
        );
        self.supersede(next.clone());
        Ok(next)
    }

    /// Leave the emergency. Returns the state that was active.
    pub fn exit(&mut self) -> Result<EmergencyState, EmergencyError> {
        if !self.current.active {
            return Err(EmergencyError::NotActive);
        }
        let previous = self.current.clone();
        self.supersede(previous.deactivated());
        info!(renewal_count = previous.renewal_count, "Emergency exited");
        Ok(previous)
    }

    /// Deactivate if the live emergency has passed its expiry. Returns the
    /// expired state when that happened.
    pub fn check_auto_expiry(&mut self, now: DateTime<Utc>) -> Option<EmergencyState> {
        if !self.current.is_expired(now) {
            return None;
        }
        let expired = self.current.clone();
        self.supersede(expired.deactivated());
        warn!(expires_at = ?expired.expires_at, "Emergency expired");
        Some(expired)
    }

    pub fn check_permanent_change_ban(
        &self,
        proposal: &DecisionProposal,
    ) -> Result<(), EmergencyError> {
        if self.current.active && proposal.has_permanent_change() {
            return Err(EmergencyError::PermanentChangeBanned);
        }
        Ok(())
    }

    pub fn check_irreversibility_ban(&self, decision: &Decision) -> Result<(), EmergencyError> {
        if self.current.active && decision.irreversible {
            return Err(EmergencyError::IrreversibleBanned(decision.id.clone()));
        }
        Ok(())
    }

    /// The banned invariant an action falls under while the emergency is
    /// active.
    pub fn banned_invariant_for(&self, action: &str) -> Option<&str> {
        if !self.current.active {
            return None;
        }
        self.current
            .banned_invariants
            .iter()
            .find(|pattern| pattern_matches(pattern, action))
            .map(String::as_str)
    }

    fn check_ballots(&self, votes: &[VoteRecord], required: f64) -> Result<(), EmergencyError> {
        if votes.len() < self.config.min_voters as usize {
            return Err(EmergencyError::InsufficientVoters {
                got: votes.len(),
                required: self.config.min_voters,
            });
        }
        let approvals = votes.iter().filter(|v| v.approve).count();
        let ratio = approvals as f64 / votes.len() as f64;
        if ratio < required {
            return Err(EmergencyError::ThresholdNotMet { ratio, required });
        }
        Ok(())
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.config.duration())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn supersede(&mut self, next: EmergencyState) {
        let previous = std::mem::replace(&mut self.current, next);
        self.history.push(previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use covenant_types::{CsDiff, DecisionType, PartyClass, PartyId};

    fn ballots(approve: usize, reject: usize) -> Vec<VoteRecord> {
        (0..approve + reject)
            .map(|i| VoteRecord {
                party_id: PartyId::new(format!("p{i}")),
                party_class: PartyClass::new("H"),
                approve: i < approve,
                signature: String::new(),
                cast_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn enter_requires_voters_and_threshold() {
        let mut manager = EmergencyManager::default();
        let now = Utc::now();
        assert!(matches!(
            manager.enter(&ballots(1, 0), None, vec![], now),
            Err(EmergencyError::InsufficientVoters { got: 1, required: 2 })
        ));
        assert!(matches!(
            manager.enter(&ballots(2, 1), None, vec![], now),
            Err(EmergencyError::ThresholdNotMet { .. })
        ));
        let state = manager
            .enter(&ballots(3, 1), None, vec!["no-deploy".into()], now)
            .unwrap();
        assert!(state.active);
        assert_eq!(state.expires_at, Some(now + Duration::seconds(86_400)));
        assert_eq!(manager.history().len(), 1);
        assert!(!manager.history()[0].active);
    }

    #[test]
    fn cannot_enter_twice() {
        let mut manager = EmergencyManager::default();
        manager.enter(&ballots(2, 0), None, vec![], Utc::now()).unwrap();
        assert_eq!(
            manager.enter(&ballots(2, 0), None, vec![], Utc::now()),
            Err(EmergencyError::AlreadyActive)
        );
    }

    #[test]
    fn renewal_escalates() {
        let mut manager = EmergencyManager::default();
        let now = Utc::now();
        manager.enter(&ballots(3, 1), None, vec![], now).unwrap();
        assert!((manager.required_renewal_ratio() - 0.875).abs() < 1e-12);

        // 3/4 met entry but not the first renewal
        assert!(matches!(
            manager.renew(&ballots(3, 1), now),
            Err(EmergencyError::ThresholdNotMet { .. })
        ));
        let renewed = manager.renew(&ballots(7, 1), now).unwrap();
        assert_eq!(renewed.renewal_count, 1);
        assert!((manager.required_renewal_ratio() - 0.9375).abs() < 1e-12);

        // 7/8 met the first renewal but not the second
        assert!(manager.renew(&ballots(7, 1), now).is_err());
        assert_eq!(manager.renew(&ballots(4, 0), now).unwrap().renewal_count, 2);
    }

    #[test]
    fn renewal_stops_once_the_bar_saturates() {
        let config = EmergencyConfig::default();
        assert_eq!(config.renewal_threshold(60), 1.0);
        assert_eq!(config.renewal_threshold(61), 1.0);

        let now = Utc::now();
        let live = EmergencyState {
            active: true,
            entered_at: Some(now),
            expires_at: Some(now + Duration::hours(1)),
            renewal_count: 60,
            banned_invariants: vec![],
            decision_id: None,
        };
        let mut manager = EmergencyManager::restore(config, live, vec![]);
        assert!(matches!(
            manager.renew(&ballots(4, 0), now),
            Err(EmergencyError::RenewalLimitReached { next: 61, .. })
        ));
        assert_eq!(manager.state().renewal_count, 60);
    }

    #[test]
    fn banned_invariants_match_only_while_active() {
        let mut manager = EmergencyManager::default();
        assert_eq!(manager.banned_invariant_for("deploy.prod"), None);

        let now = Utc::now();
        manager
            .enter(&ballots(2, 0), None, vec!["deploy.*".into()], now)
            .unwrap();
        assert_eq!(manager.banned_invariant_for("deploy.prod"), Some("deploy.*"));
        assert_eq!(manager.banned_invariant_for("docs.read"), None);

        manager.exit().unwrap();
        assert_eq!(manager.banned_invariant_for("deploy.prod"), None);
    }

    #[test]
    fn exit_and_expiry() {
        let mut manager = EmergencyManager::default();
        assert_eq!(manager.exit(), Err(EmergencyError::NotActive));

        let now = Utc::now();
        manager.enter(&ballots(2, 0), None, vec![], now).unwrap();
        assert!(manager.check_auto_expiry(now + Duration::seconds(86_400)).is_none());
        let expired = manager
            .check_auto_expiry(now + Duration::seconds(86_401))
            .unwrap();
        assert!(expired.active);
        assert!(!manager.is_active());
        assert_eq!(manager.exit(), Err(EmergencyError::NotActive));
    }

    #[test]
    fn bans_apply_only_while_active() {
        let mut manager = EmergencyManager::default();
        let permanent = DecisionProposal::new("alice", DecisionType::D3, serde_json::Value::Null)
            .cs_diff(CsDiff {
                permanent: true,
                ..CsDiff::default()
            });
        let decision = Decision::open(
            DecisionProposal::new("alice", DecisionType::D2, serde_json::Value::Null).irreversible(),
            Utc::now(),
        );

        assert!(manager.check_permanent_change_ban(&permanent).is_ok());
        assert!(manager.check_irreversibility_ban(&decision).is_ok());

        manager.enter(&ballots(2, 0), None, vec![], Utc::now()).unwrap();
        assert_eq!(
            manager.check_permanent_change_ban(&permanent),
            Err(EmergencyError::PermanentChangeBanned)
        );
        assert!(matches!(
            manager.check_irreversibility_ban(&decision),
            Err(EmergencyError::IrreversibleBanned(_))
        ));
    }
}
