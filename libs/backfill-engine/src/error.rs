use std::path::PathBuf;

use backfill_api::{BrokerError, TriggerError};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("manifest {}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    #[error("invalid backfill request: {0}")]
    Validation(String),

    #[error("topic setup: {0}")]
    Topic(BrokerError),

    #[error("trigger '{spec}': {source}")]
    Trigger { spec: String, source: TriggerError },

    #[error("publish: {0}")]
    Publish(BrokerError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Неудачный backfill. `manifest` указывает на записанный recovery
/// manifest — `None`, если ничего не было записано.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct BackfillFailure {
    #[source]
    pub error: BackfillError,
    pub manifest: Option<PathBuf>,
}

impl BackfillFailure {
    pub(crate) fn unrecorded(error: BackfillError) -> Self {
        Self { error, manifest: None }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("cleanup incomplete: {failed} of {total} deletions failed")]
    Incomplete { failed: usize, total: usize },
}
