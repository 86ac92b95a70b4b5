use crate::config::ConfigError;
use mixnode_protocol::SphinxError;
use thiserror::Error;

/// Failures internal to decoy generation.
///
/// These never cross the [`Decoy`](crate::Decoy) entry points: a failed
/// cycle is logged and abandoned. Only construction reports them.
#[derive(Debug, Error)]
pub enum DecoyError {
    #[error("Failed to find suitable provider")]
    NoSuitableProvider,

    #[error("Max path selection attempts exceeded")]
    MaxAttempts,

    #[error("Provider generated decoy traffic is not supported")]
    ProviderUnsupported,

    #[error("Sphinx error: {0}")]
    Sphinx(#[from] SphinxError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Entropy source failed: {0}")]
    Entropy(#[from] getrandom::Error),
}

pub type Result<T> = std::result::Result<T, DecoyError>;
