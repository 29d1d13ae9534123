use std::path::PathBuf;

use backfill_api::BrokerError;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("unknown source kind: '{0}'")]
    UnknownKind(String),

    #[error("{kind} source does not support filters (got '{filter}')")]
    FilterNotSupported { kind: &'static str, filter: String },

    #[error("invalid glob pattern '{pattern}': {detail}")]
    Pattern { pattern: String, detail: String },

    #[error("scan {}: {source}", path.display())]
    Scan { path: PathBuf, source: std::io::Error },
}

impl From<SourceError> for BrokerError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Scan { .. } => BrokerError::io(e.to_string()),
            _ => BrokerError::config(e.to_string()),
        }
    }
}
