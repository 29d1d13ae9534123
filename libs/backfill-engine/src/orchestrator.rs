use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use rand::Rng;
use rand::distr::Alphanumeric;

use backfill_api::{BackfillPublisher, PublishRequest, TopicOps, TriggerOps};

use crate::{BackfillError, BackfillFailure, ManifestError, RecoveryManifest};

const BACKFILL_ID_LEN: usize = 8;

// ═══════════════════════════════════════════════════════════════
//  Request / outcome
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct BackfillRequest {
    /// Логическое имя event-topic'а.
    pub topic: String,
    /// Спецификации временных trigger'ов.
    pub triggers: Vec<String>,
    /// Создать временный topic вместо существующего.
    pub temporary_topic: bool,
    pub source: Option<String>,
    pub filter: Option<String>,
    /// Куда писать recovery manifest. `None` = `backfill-<id>.json`.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct BackfillOutcome {
    pub backfill_id: String,
    pub manifest_path: PathBuf,
    pub events: u64,
}

/// Короткий случайный ID backfill'а: `[a-z0-9]{8}`.
pub fn new_backfill_id() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(BACKFILL_ID_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

pub fn temporary_topic_name(backfill_id: &str) -> String {
    format!("backfill-{backfill_id}")
}

pub fn default_manifest_path(backfill_id: &str) -> PathBuf {
    PathBuf::from(format!("backfill-{backfill_id}.json"))
}

// ═══════════════════════════════════════════════════════════════
//  ManifestGuard — manifest пишется на любом выходе
// ═══════════════════════════════════════════════════════════════

/// Владеет manifest'ом на время provisioning + publish. `commit()`
/// пишет его асинхронно; если guard уронили без commit (panic,
/// отмена future), manifest пишется блокирующе в `Drop`.
struct ManifestGuard {
    path: PathBuf,
    manifest: RecoveryManifest,
    committed: bool,
}

impl ManifestGuard {
    fn new(path: PathBuf, manifest: RecoveryManifest) -> Self {
        Self { path, manifest, committed: false }
    }

    async fn commit(mut self) -> Result<(), ManifestError> {
        self.committed = true;
        self.manifest.write(&self.path).await
    }
}

impl Drop for ManifestGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match self.manifest.write_blocking(&self.path) {
            Ok(()) => tracing::warn!(manifest = %self.path.display(), "backfill interrupted, recovery manifest written"),
            Err(e) => tracing::error!(
                manifest = ?self.manifest,
                error = %e,
                "backfill interrupted, failed to write recovery manifest"
            ),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Backfill orchestrator
// ═══════════════════════════════════════════════════════════════

/// Backfill: topic → triggers → publish, с гарантированной записью
/// recovery manifest'а после того, как topic известен.
pub struct Backfill {
    topics: Arc<dyn TopicOps>,
    triggers: Arc<dyn TriggerOps>,
    publisher: Arc<dyn BackfillPublisher>,
}

impl Backfill {
    pub fn new(
        topics: Arc<dyn TopicOps>,
        triggers: Arc<dyn TriggerOps>,
        publisher: Arc<dyn BackfillPublisher>,
    ) -> Self {
        Self { topics, triggers, publisher }
    }

    pub async fn run(&self, request: &BackfillRequest) -> Result<BackfillOutcome, BackfillFailure> {
        self.run_with_id(&new_backfill_id(), request).await
    }

    pub async fn run_with_id(
        &self,
        backfill_id: &str,
        request: &BackfillRequest,
    ) -> Result<BackfillOutcome, BackfillFailure> {
        validate(request).map_err(BackfillFailure::unrecorded)?;
        self.publisher
            .validate_source(request.source.as_deref(), request.filter.as_deref())
            .await
            .map_err(|e| BackfillFailure::unrecorded(BackfillError::Validation(e.to_string())))?;
        tracing::info!(
            backfill_id,
            topic = %request.topic,
            triggers = request.triggers.len(),
            temporary_topic = request.temporary_topic,
            "starting backfill"
        );

        let mut manifest = RecoveryManifest::default();
        let topic_id = self
            .setup_topic(backfill_id, request, &mut manifest)
            .await
            .map_err(BackfillFailure::unrecorded)?;

        let path = request
            .output
            .clone()
            .unwrap_or_else(|| default_manifest_path(backfill_id));
        let mut guard = ManifestGuard::new(path.clone(), manifest);

        let result = self
            .provision_and_publish(backfill_id, &topic_id, request, &mut guard.manifest)
            .await;
        let written = guard.commit().await;

        finish(backfill_id, &path, result, written)
    }

    async fn setup_topic(
        &self,
        backfill_id: &str,
        request: &BackfillRequest,
        manifest: &mut RecoveryManifest,
    ) -> Result<String, BackfillError> {
        if request.temporary_topic {
            let name = temporary_topic_name(backfill_id);
            let topic_id = self.topics.create_topic(&name).await.map_err(BackfillError::Topic)?;
            tracing::info!(backfill_id, topic_id = %topic_id, "created temporary topic");
            manifest.temporary_topic_id = Some(topic_id.clone());
            Ok(topic_id)
        } else {
            let topic_id = self
                .topics
                .resolve_topic(&request.topic)
                .await
                .map_err(BackfillError::Topic)?;
            tracing::info!(backfill_id, topic = %request.topic, topic_id = %topic_id, "using existing topic");
            manifest.temporary_topic_id = None;
            Ok(topic_id)
        }
    }

    async fn provision_and_publish(
        &self,
        backfill_id: &str,
        topic_id: &str,
        request: &BackfillRequest,
        manifest: &mut RecoveryManifest,
    ) -> Result<u64, BackfillError> {
        self.create_triggers(backfill_id, topic_id, &request.triggers, manifest)
            .await?;

        let publish = PublishRequest {
            topic_id: topic_id.to_string(),
            topic_name: request.topic.clone(),
            source: request.source.clone(),
            filter: request.filter.clone(),
        };
        self.publisher.publish(&publish).await.map_err(BackfillError::Publish)
    }

    /// Все trigger'ы создаются конкурентно. Результаты разбираются в
    /// порядке завершения; ID ресурсов (включая частичные при ошибке)
    /// попадают в manifest до того, как решается судьба всего шага.
    /// Первая ошибка по порядку завершения возвращается после того,
    /// как завершились все попытки.
    async fn create_triggers(
        &self,
        backfill_id: &str,
        topic_id: &str,
        specs: &[String],
        manifest: &mut RecoveryManifest,
    ) -> Result<(), BackfillError> {
        let mut attempts: FuturesUnordered<_> = specs
            .iter()
            .map(|spec| async move {
                let result = self.triggers.create_trigger(backfill_id, topic_id, spec).await;
                (spec, result)
            })
            .collect();

        let mut first_error = None;
        while let Some((spec, result)) = attempts.next().await {
            match result {
                Ok(resource_ids) => {
                    tracing::info!(backfill_id, trigger = %spec, resources = resource_ids.len(), "created trigger");
                    manifest.temporary_trigger_resource_ids.extend(resource_ids);
                }
                Err(e) => {
                    tracing::error!(
                        backfill_id,
                        trigger = %spec,
                        partial = e.resource_ids.len(),
                        error = %e.error,
                        "trigger creation failed"
                    );
                    manifest
                        .temporary_trigger_resource_ids
                        .extend(e.resource_ids.iter().cloned());
                    if first_error.is_none() {
                        first_error = Some(BackfillError::Trigger { spec: spec.clone(), source: e });
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn validate(request: &BackfillRequest) -> Result<(), BackfillError> {
    if request.topic.trim().is_empty() {
        return Err(BackfillError::Validation("topic name must not be empty".into()));
    }
    if request.temporary_topic && request.triggers.is_empty() {
        return Err(BackfillError::Validation(
            "a temporary topic requires at least one trigger".into(),
        ));
    }
    Ok(())
}

fn finish(
    backfill_id: &str,
    path: &Path,
    result: Result<u64, BackfillError>,
    written: Result<(), ManifestError>,
) -> Result<BackfillOutcome, BackfillFailure> {
    match (result, written) {
        (Ok(events), Ok(())) => {
            tracing::info!(backfill_id, events, manifest = %path.display(), "backfill complete");
            Ok(BackfillOutcome {
                backfill_id: backfill_id.to_string(),
                manifest_path: path.to_path_buf(),
                events,
            })
        }
        (Ok(_), Err(e)) => {
            tracing::error!(backfill_id, error = %e, "failed to write recovery manifest");
            Err(BackfillFailure::unrecorded(e.into()))
        }
        (Err(error), Ok(())) => {
            tracing::error!(backfill_id, error = %error, manifest = %path.display(), "backfill failed");
            Err(BackfillFailure { error, manifest: Some(path.to_path_buf()) })
        }
        (Err(error), Err(e)) => {
            tracing::error!(backfill_id, error = %e, "failed to write recovery manifest");
            tracing::error!(backfill_id, error = %error, "backfill failed");
            Err(BackfillFailure::unrecorded(error))
        }
    }
}
