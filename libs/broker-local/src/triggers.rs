use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use backfill_api::{BrokerError, TriggerError, TriggerOps};

use crate::{DELIVERIES_DIR, LocalBroker, SUBSCRIPTIONS_DIR, is_valid_name};

/// Содержимое `subscriptions/<name>.json`.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Subscription {
    pub topic: String,
    pub consumer: String,
    pub backfill: String,
    /// ID delivery-ресурса, куда пишутся события.
    pub delivery: String,
}

impl LocalBroker {
    /// Trigger = два ресурса: подписка и delivery-файл. Если delivery
    /// создать не удалось, ошибка несёт ID уже созданной подписки.
    async fn do_create_trigger(
        &self,
        backfill_id: &str,
        topic_id: &str,
        spec: &str,
    ) -> Result<Vec<String>, TriggerError> {
        if !is_valid_name(spec, false) {
            return Err(TriggerError::new(BrokerError::config(format!("invalid trigger spec '{spec}'"))));
        }
        if !self.topic_exists(topic_id).await? {
            return Err(TriggerError::new(BrokerError::not_found(format!("topic '{topic_id}' not found"))));
        }

        let name = format!("backfill-{backfill_id}-{spec}");
        let subscription_id = format!("{SUBSCRIPTIONS_DIR}/{name}.json");
        let delivery_id = format!("{DELIVERIES_DIR}/{name}.jsonl");

        let subscription = Subscription {
            topic: topic_id.to_string(),
            consumer: spec.to_string(),
            backfill: backfill_id.to_string(),
            delivery: delivery_id.clone(),
        };
        let body = serde_json::to_vec_pretty(&subscription).map_err(BrokerError::from)?;
        self.create_new(&subscription_id, &body).await?;

        if let Err(e) = self.create_new(&delivery_id, b"").await {
            return Err(TriggerError::partial(e, vec![subscription_id]));
        }

        tracing::debug!(trigger = %spec, topic_id = %topic_id, "trigger created");
        Ok(vec![subscription_id, delivery_id])
    }

    /// Создать файл ресурса; существующий файл — ошибка.
    async fn create_new(&self, resource_id: &str, body: &[u8]) -> Result<(), BrokerError> {
        let path = self.resource_path(resource_id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BrokerError::from_io(format!("mkdir {}", parent.display()), e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| BrokerError::from_io(format!("create {}", path.display()), e))?;
        file.write_all(body)
            .await
            .map_err(|e| BrokerError::from_io(format!("write {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| BrokerError::from_io(format!("write {}", path.display()), e))
    }

    async fn do_delete_trigger_resource(&self, resource_id: &str) -> Result<(), BrokerError> {
        let path = self.resource_path(resource_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = BrokerError::from_io(format!("remove {}", path.display()), e);
                if err.is_not_found() {
                    tracing::debug!(resource = %resource_id, "trigger resource already gone");
                    return Ok(());
                }
                Err(err)
            }
        }
    }

    /// Delivery-ресурсы всех подписок на topic.
    pub(crate) async fn delivery_targets(&self, topic_id: &str) -> Result<Vec<String>, BrokerError> {
        let dir = self.root.join(SUBSCRIPTIONS_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BrokerError::io(format!("list {}: {e}", dir.display()))),
        };

        let mut targets = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BrokerError::io(format!("list {}: {e}", dir.display())))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_subscription(&path).await {
                Ok(sub) if sub.topic == topic_id => targets.push(sub.delivery),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "bad subscription, skipping");
                }
            }
        }
        targets.sort();
        Ok(targets)
    }
}

async fn read_subscription(path: &Path) -> Result<Subscription, BrokerError> {
    let content = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&content)?)
}

impl TriggerOps for LocalBroker {
    fn create_trigger(
        &self,
        backfill_id: &str,
        topic_id: &str,
        spec: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, TriggerError>> + Send + '_>> {
        let backfill_id = backfill_id.to_string();
        let topic_id = topic_id.to_string();
        let spec = spec.to_string();
        Box::pin(async move { self.do_create_trigger(&backfill_id, &topic_id, &spec).await })
    }

    fn delete_trigger_resource(&self, resource_id: &str)
        -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + '_>>
    {
        let resource_id = resource_id.to_string();
        Box::pin(async move { self.do_delete_trigger_resource(&resource_id).await })
    }
}

#[cfg(test)]
mod tests {
    use backfill_api::TopicOps;

    use crate::LocalBrokerConfig;

    use super::*;

    async fn broker_with_topic(root: &Path) -> LocalBroker {
        let broker = LocalBroker::new(&LocalBrokerConfig {
            root: root.display().to_string(),
            ..Default::default()
        });
        broker.create_topic("orders").await.unwrap();
        broker
    }

    #[tokio::test]
    async fn trigger_creates_subscription_and_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker_with_topic(dir.path()).await;

        let ids = broker.create_trigger("b1", "orders", "billing").await.unwrap();

        assert_eq!(
            ids,
            vec!["subscriptions/backfill-b1-billing.json", "deliveries/backfill-b1-billing.jsonl"]
        );
        for id in &ids {
            assert!(dir.path().join(id).exists());
        }
        assert_eq!(
            broker.delivery_targets("orders").await.unwrap(),
            vec!["deliveries/backfill-b1-billing.jsonl"]
        );
        assert!(broker.delivery_targets("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_collision_reports_partial_subscription() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker_with_topic(dir.path()).await;
        std::fs::create_dir_all(dir.path().join("deliveries")).unwrap();
        std::fs::write(dir.path().join("deliveries/backfill-b1-audit.jsonl"), "").unwrap();

        let err = broker.create_trigger("b1", "orders", "audit").await.unwrap_err();

        assert_eq!(err.resource_ids, vec!["subscriptions/backfill-b1-audit.json"]);
        assert_eq!(err.error.kind(), backfill_api::ErrorKind::AlreadyExists);
        assert!(dir.path().join("subscriptions/backfill-b1-audit.json").exists());
    }

    #[tokio::test]
    async fn invalid_spec_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker_with_topic(dir.path()).await;

        let err = broker.create_trigger("b1", "orders", "../x").await.unwrap_err();

        assert!(err.resource_ids.is_empty());
        assert!(!dir.path().join("subscriptions").exists());
    }

    #[tokio::test]
    async fn trigger_on_missing_topic_fails() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker_with_topic(dir.path()).await;
        let err = broker.create_trigger("b1", "missing", "svc").await.unwrap_err();
        assert!(err.resource_ids.is_empty());
        assert!(err.error.is_not_found());
    }

    #[tokio::test]
    async fn deletes_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker_with_topic(dir.path()).await;
        let ids = broker.create_trigger("b1", "orders", "svc").await.unwrap();

        for _ in 0..2 {
            for id in &ids {
                broker.delete_trigger_resource(id).await.unwrap();
            }
        }
        assert!(!dir.path().join(&ids[0]).exists());
        assert!(broker.delete_trigger_resource("../outside").await.is_err());
    }
}
