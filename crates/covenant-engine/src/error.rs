use thiserror::Error;

/// Configuration errors, raised when loading or validating a
/// [`GovernanceConfig`](crate::GovernanceConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config as TOML: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("{name} must be within [0, 1], got {value}")]
    RatioOutOfRange { name: String, value: f64 },

    #[error(
        "thresholds must strictly increase: {upper} ({upper_value}) is not above {lower} ({lower_value})"
    )]
    NonIncreasingThresholds {
        lower: String,
        lower_value: f64,
        upper: String,
        upper_value: f64,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors from constructing, snapshotting or restoring an engine.
/// Governance outcomes are never errors; they are
/// [`GovernanceResult`](covenant_types::GovernanceResult)s.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    SnapshotVersion { found: u32, expected: u32 },

    #[error("snapshot registry is inconsistent: {0}")]
    InconsistentSnapshot(String),
}
