mod cleanup;
mod driver;
pub mod error;
mod manifest;
mod orchestrator;

pub use cleanup::{CleanupReport, clean_backfill};
pub use driver::publish_all;
pub use error::{BackfillError, BackfillFailure, CleanupError, ManifestError};
pub use manifest::RecoveryManifest;
pub use orchestrator::{
    Backfill, BackfillOutcome, BackfillRequest, default_manifest_path, new_backfill_id,
    temporary_topic_name,
};
