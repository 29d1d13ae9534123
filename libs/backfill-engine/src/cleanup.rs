use std::path::Path;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};

use backfill_api::{TopicOps, TriggerOps};

use crate::{CleanupError, RecoveryManifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
}

/// Удалить всё, что перечислено в recovery manifest'е.
///
/// Все удаления запускаются конкурентно и не отменяют друг друга;
/// каждая ошибка логируется на месте. Если хоть одно удаление не
/// удалось — одна агрегированная ошибка после завершения всех.
pub async fn clean_backfill(
    manifest_path: &Path,
    topics: &dyn TopicOps,
    triggers: &dyn TriggerOps,
) -> Result<CleanupReport, CleanupError> {
    let manifest = RecoveryManifest::read(manifest_path).await?;
    tracing::info!(
        manifest = %manifest_path.display(),
        resources = manifest.resource_count(),
        "cleaning backfill"
    );

    let mut deletions: Vec<BoxFuture<'_, bool>> = manifest
        .temporary_trigger_resource_ids
        .iter()
        .map(|id| delete_trigger_resource(triggers, id).boxed())
        .collect();
    if let Some(topic_id) = manifest.temporary_topic_id.as_deref() {
        deletions.push(delete_topic(topics, topic_id).boxed());
    }

    let total = deletions.len();
    let failed = join_all(deletions).await.into_iter().filter(|ok| !ok).count();

    if failed > 0 {
        return Err(CleanupError::Incomplete { failed, total });
    }
    tracing::info!(deleted = total, "backfill cleaned");
    Ok(CleanupReport { deleted: total })
}

async fn delete_trigger_resource(triggers: &dyn TriggerOps, resource_id: &str) -> bool {
    match triggers.delete_trigger_resource(resource_id).await {
        Ok(()) => {
            tracing::info!(resource = %resource_id, "deleted trigger resource");
            true
        }
        Err(e) if e.is_not_found() => {
            tracing::info!(resource = %resource_id, "trigger resource already gone");
            true
        }
        Err(e) => {
            tracing::error!(resource = %resource_id, error = %e, "failed to delete trigger resource");
            false
        }
    }
}

async fn delete_topic(topics: &dyn TopicOps, topic_id: &str) -> bool {
    match topics.delete_topic(topic_id).await {
        Ok(()) => {
            tracing::info!(topic_id = %topic_id, "deleted temporary topic");
            true
        }
        Err(e) if e.is_not_found() => {
            tracing::info!(topic_id = %topic_id, "temporary topic already gone");
            true
        }
        Err(e) => {
            tracing::error!(topic_id = %topic_id, error = %e, "failed to delete temporary topic");
            false
        }
    }
}
