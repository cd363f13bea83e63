//! Configuration for the governance engine

use std::collections::BTreeMap;
use std::path::Path;

use covenant_types::{DecisionType, PartyClass, PartyId};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Quorum policy
    #[serde(default)]
    pub quorum: QuorumConfig,

    /// Per-type approval thresholds and class assent
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Emergency circuit breaker
    #[serde(default)]
    pub emergency: EmergencyConfig,

    /// Objection and appeal bonds
    #[serde(default)]
    pub bonds: BondConfig,

    /// Party registry policy
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl GovernanceConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quorum.validate()?;
        self.thresholds.validate()?;
        self.emergency.validate()?;
        Ok(())
    }
}

/// Quorum configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuorumConfig {
    /// Distinct voters required regardless of class
    #[serde(default = "default_min_total_voters")]
    pub min_total_voters: u32,

    /// Per-class minimum distinct voters
    #[serde(default)]
    pub class_minimums: BTreeMap<PartyClass, u32>,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            min_total_voters: default_min_total_voters(),
            class_minimums: BTreeMap::new(),
        }
    }
}

impl QuorumConfig {
    pub fn with_class_minimum(mut self, class: impl Into<PartyClass>, minimum: u32) -> Self {
        self.class_minimums.insert(class.into(), minimum);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_total_voters == 0 {
            return Err(ConfigError::Invalid(
                "quorum.min_total_voters must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Approval thresholds per decision type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_d1")]
    pub d1: f64,

    #[serde(default = "default_d2")]
    pub d2: f64,

    #[serde(default = "default_d3")]
    pub d3: f64,

    #[serde(default = "default_d4")]
    pub d4: f64,

    /// Approval ratio a class needs within itself to count as assenting
    #[serde(default = "default_class_assent_ratio")]
    pub class_assent_ratio: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            d1: default_d1(),
            d2: default_d2(),
            d3: default_d3(),
            d4: default_d4(),
            class_assent_ratio: default_class_assent_ratio(),
        }
    }
}

impl ThresholdConfig {
    /// Required approval ratio. D0 is pre-authorized and needs none.
    pub fn required_for(&self, decision_type: DecisionType) -> f64 {
        match decision_type {
            DecisionType::D0 => 0.0,
            DecisionType::D1 => self.d1,
            DecisionType::D2 => self.d2,
            DecisionType::D3 => self.d3,
            DecisionType::D4 => self.d4,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ladder = [
            ("d1", self.d1),
            ("d2", self.d2),
            ("d3", self.d3),
            ("d4", self.d4),
            ("class_assent_ratio", self.class_assent_ratio),
        ];
        for (name, value) in ladder {
            check_ratio(&format!("thresholds.{name}"), value)?;
        }
        for pair in ladder[..4].windows(2) {
            let (lower_name, lower) = pair[0];
            let (upper_name, upper) = pair[1];
            if upper <= lower {
                return Err(ConfigError::NonIncreasingThresholds {
                    lower: lower_name.into(),
                    lower_value: lower,
                    upper: upper_name.into(),
                    upper_value: upper,
                });
            }
        }
        Ok(())
    }
}

/// Emergency circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyConfig {
    /// Approval ratio required to enter an emergency
    #[serde(default = "default_entry_threshold")]
    pub entry_threshold: f64,

    /// Fraction of the remaining gap to unanimity kept per renewal
    #[serde(default = "default_renewal_decay")]
    pub renewal_decay: f64,

    /// Lifetime of an emergency (and of each renewal) in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Minimum ballots for entry or renewal
    #[serde(default = "default_emergency_min_voters")]
    pub min_voters: u32,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            entry_threshold: default_entry_threshold(),
            renewal_decay: default_renewal_decay(),
            duration_secs: default_duration_secs(),
            min_voters: default_emergency_min_voters(),
        }
    }
}

impl EmergencyConfig {
    /// Approval ratio required for renewal number `n` (the first renewal
    /// is `n = 1`; `n = 0` is entry): `1 - (1 - entry) * decay^n`.
    ///
    /// Strictly increasing in `n` until the float result reaches 1.0
    /// (unanimity); from there every later `n` yields 1.0 and
    /// [`EmergencyManager::renew`](crate::EmergencyManager::renew) refuses.
    pub fn renewal_threshold(&self, n: u32) -> f64 {
        let exponent = i32::try_from(n).unwrap_or(i32::MAX);
        1.0 - (1.0 - self.entry_threshold) * self.renewal_decay.powi(exponent)
    }

    pub fn duration(&self) -> chrono::Duration {
        // chrono caps durations at i64::MAX milliseconds
        let secs = i64::try_from(self.duration_secs).unwrap_or(i64::MAX);
        chrono::Duration::seconds(secs.min(i64::MAX / 1_000))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.entry_threshold) {
            return Err(ConfigError::Invalid(format!(
                "emergency.entry_threshold must be in [0, 1), got {}",
                self.entry_threshold
            )));
        }
        if !(self.renewal_decay > 0.0 && self.renewal_decay < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "emergency.renewal_decay must be in (0, 1), got {}",
                self.renewal_decay
            )));
        }
        if self.duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "emergency.duration_secs must be positive".into(),
            ));
        }
        if self.min_voters == 0 {
            return Err(ConfigError::Invalid(
                "emergency.min_voters must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Bond amounts per decision type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondConfig {
    #[serde(default)]
    pub d0: u64,

    #[serde(default)]
    pub d1: u64,

    #[serde(default)]
    pub d2: u64,

    #[serde(default = "default_d3_bond")]
    pub d3: u64,

    #[serde(default = "default_d4_bond")]
    pub d4: u64,
}

impl Default for BondConfig {
    fn default() -> Self {
        Self {
            d0: 0,
            d1: 0,
            d2: 0,
            d3: default_d3_bond(),
            d4: default_d4_bond(),
        }
    }
}

impl BondConfig {
    pub fn amount_for(&self, decision_type: DecisionType) -> u64 {
        match decision_type {
            DecisionType::D0 => self.d0,
            DecisionType::D1 => self.d1,
            DecisionType::D2 => self.d2,
            DecisionType::D3 => self.d3,
            DecisionType::D4 => self.d4,
        }
    }
}

/// Party registry configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Parties allowed to remove other parties
    #[serde(default)]
    pub admins: Vec<PartyId>,
}

impl RegistryConfig {
    pub fn is_admin(&self, party_id: &PartyId) -> bool {
        self.admins.contains(party_id)
    }
}

fn check_ratio(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RatioOutOfRange {
            name: name.to_string(),
            value,
        })
    }
}

// Default value functions
fn default_min_total_voters() -> u32 {
    2
}

fn default_d1() -> f64 {
    0.5
}

fn default_d2() -> f64 {
    0.66
}

fn default_d3() -> f64 {
    0.75
}

fn default_d4() -> f64 {
    0.9
}

fn default_class_assent_ratio() -> f64 {
    0.5
}

fn default_entry_threshold() -> f64 {
    0.75
}

fn default_renewal_decay() -> f64 {
    0.5
}

fn default_duration_secs() -> u64 {
    86_400
}

fn default_emergency_min_voters() -> u32 {
    2
}

fn default_d3_bond() -> u64 {
    100
}

fn default_d4_bond() -> u64 {
    500
}
