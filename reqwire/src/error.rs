//! Errors raised while assembling a requestor.

use smol_str::SmolStr;

/// Error looking up a base requestor in a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Nothing was injected under the key.
    #[error("no base requestor registered under `{0}`")]
    NotRegistered(SmolStr),
}

/// Error turning a [`PipelineConfig`](crate::config::PipelineConfig) into a
/// requestor.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("invalid pipeline configuration: {0}")]
    Format(#[from] serde_json::Error),

    /// A duration that must be positive is zero.
    #[error("`{0}` must be greater than zero")]
    ZeroDuration(&'static str),
}
