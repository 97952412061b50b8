use thiserror::Error;

/// Errors raised while building configuration from the environment.
///
/// Any of these is fatal at startup: the process refuses to run with an
/// incomplete configuration rather than limping along with defaults.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required environment variable {0} has not been set")]
    Missing(String),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}
