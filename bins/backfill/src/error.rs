use std::path::PathBuf;

use backfill_engine::{BackfillFailure, CleanupError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{failure}{}", manifest_hint(.failure.manifest.as_ref()))]
    Backfill { failure: BackfillFailure },

    #[error("{0}")]
    Cleanup(#[from] CleanupError),
}

impl From<BackfillFailure> for CliError {
    fn from(failure: BackfillFailure) -> Self {
        Self::Backfill { failure }
    }
}

fn manifest_hint(manifest: Option<&PathBuf>) -> String {
    match manifest {
        Some(path) => format!(" (recovery manifest: {})", path.display()),
        None => String::new(),
    }
}
