use std::future::Future;
use std::pin::Pin;

use backfill_api::{BrokerError, TopicOps};

use crate::{LocalBroker, TOPICS_DIR};

impl LocalBroker {
    async fn do_create_topic(&self, name: &str) -> Result<String, BrokerError> {
        let dir = self.topic_dir(name)?;
        let parent = self.root.join(TOPICS_DIR);
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| BrokerError::from_io(format!("mkdir {}", parent.display()), e))?;

        tokio::fs::create_dir(&dir).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => BrokerError::already_exists(format!("topic '{name}' already exists")),
            _ => BrokerError::from_io(format!("mkdir {}", dir.display()), e),
        })?;
        tracing::debug!(topic = %name, "topic created");
        Ok(name.to_string())
    }

    async fn do_resolve_topic(&self, name: &str) -> Result<String, BrokerError> {
        if self.topic_exists(name).await? {
            Ok(name.to_string())
        } else {
            Err(BrokerError::not_found(format!("topic '{name}' not found")))
        }
    }

    /// Есть ли директория topic'а.
    pub(crate) async fn topic_exists(&self, topic_id: &str) -> Result<bool, BrokerError> {
        let dir = self.topic_dir(topic_id)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BrokerError::from_io(format!("stat {}", dir.display()), e)),
        }
    }

    async fn do_delete_topic(&self, topic_id: &str) -> Result<(), BrokerError> {
        let dir = self.topic_dir(topic_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = BrokerError::from_io(format!("remove {}", dir.display()), e);
                if err.is_not_found() {
                    tracing::debug!(topic_id = %topic_id, "topic already gone");
                    return Ok(());
                }
                Err(err)
            }
        }
    }
}

impl TopicOps for LocalBroker {
    fn create_topic(&self, name: &str) -> Pin<Box<dyn Future<Output = Result<String, BrokerError>> + Send + '_>> {
        let name = name.to_string();
        Box::pin(async move { self.do_create_topic(&name).await })
    }

    fn resolve_topic(&self, name: &str) -> Pin<Box<dyn Future<Output = Result<String, BrokerError>> + Send + '_>> {
        let name = name.to_string();
        Box::pin(async move { self.do_resolve_topic(&name).await })
    }

    fn delete_topic(&self, topic_id: &str) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + '_>> {
        let topic_id = topic_id.to_string();
        Box::pin(async move { self.do_delete_topic(&topic_id).await })
    }
}

#[cfg(test)]
mod tests {
    use crate::LocalBrokerConfig;

    use super::*;

    fn broker(root: &std::path::Path) -> LocalBroker {
        LocalBroker::new(&LocalBrokerConfig {
            root: root.display().to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn create_resolve_delete() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker(dir.path());

        let id = broker.create_topic("orders").await.unwrap();
        assert_eq!(id, "orders");
        assert_eq!(broker.resolve_topic("orders").await.unwrap(), "orders");

        broker.delete_topic(&id).await.unwrap();
        let err = broker.resolve_topic("orders").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn duplicate_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker(dir.path());

        broker.create_topic("orders").await.unwrap();
        let err = broker.create_topic("orders").await.unwrap_err();
        assert_eq!(err.kind(), backfill_api::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn deleting_missing_topic_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker(dir.path());
        broker.delete_topic("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn invalid_names_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker(dir.path());
        let err = broker.create_topic("../escape").await.unwrap_err();
        assert_eq!(err.kind(), backfill_api::ErrorKind::Config);
    }
}
