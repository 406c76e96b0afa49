use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Provider unreachable, malformed payload, or missing coarse batch.
    /// Fatal to one instrument's pipeline run.
    #[error("Fetch failed for {instrument}: {reason}")]
    Fetch { instrument: String, reason: String },

    /// Settings file unreadable. Fatal to one recommendation run.
    #[error("Settings file '{file}' unreadable: {reason}")]
    Parse { file: String, reason: String },

    /// Not enough aligned rows, or no fitted model. Fatal to one training step.
    #[error("Training failed for {instrument}: {reason}")]
    Training { instrument: String, reason: String },

    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn fetch(instrument: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Fetch {
            instrument: instrument.into(),
            reason: reason.into(),
        }
    }

    pub fn training(instrument: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Training {
            instrument: instrument.into(),
            reason: reason.into(),
        }
    }

    /// True for transport-level failures a provider may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Http(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
