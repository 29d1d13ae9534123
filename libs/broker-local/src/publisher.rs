use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use backfill_api::{BackfillPublisher, BrokerError, Event, EventSink, Publish, PublishRequest};
use backfill_engine::publish_all;
use event_source::open_source;

use crate::{EVENTS_FILE, LocalBroker, StoredEvent};

// ═══════════════════════════════════════════════════════════════
//  TopicSink — EventSink → writer task → topic + deliveries
// ═══════════════════════════════════════════════════════════════

/// Sink, который отдаёт события writer task'у через bounded канал.
///
/// `try_send` успешен → `Publish::Accepted`. Канал полон →
/// `Publish::Pending` с отложенным `send().await` (back-pressure).
pub struct TopicSink {
    tx: Option<mpsc::Sender<Event>>,
    writer: Option<JoinHandle<Result<u64, BrokerError>>>,
}

impl TopicSink {
    /// Открыть (append) все выходные файлы и запустить writer.
    pub async fn open(outputs: Vec<PathBuf>, buffer: usize) -> Result<Self, BrokerError> {
        let mut writers = Vec::with_capacity(outputs.len());
        for path in outputs {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| BrokerError::from_io(format!("open {}", path.display()), e))?;
            writers.push((path, BufWriter::new(file)));
        }

        let (tx, rx) = mpsc::channel(buffer.max(1));
        let writer = tokio::spawn(write_events(rx, writers));
        Ok(Self { tx: Some(tx), writer: Some(writer) })
    }
}

impl EventSink for TopicSink {
    fn publish_event(&mut self, event: Event) -> Result<Publish, BrokerError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| BrokerError::state("sink already flushed"))?;
        match tx.try_send(event) {
            Ok(()) => Ok(Publish::Accepted),
            Err(mpsc::error::TrySendError::Full(event)) => {
                let tx = tx.clone();
                Ok(Publish::Pending(Box::pin(async move {
                    tx.send(event)
                        .await
                        .map_err(|_| BrokerError::io("topic writer stopped"))
                })))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(BrokerError::io("topic writer stopped")),
        }
    }

    fn flush(&mut self) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + '_>> {
        Box::pin(async move {
            // закрыть канал → writer дописывает очередь и делает flush
            self.tx.take();
            let Some(writer) = self.writer.take() else {
                return Ok(());
            };
            let written = writer
                .await
                .map_err(|e| BrokerError::io(format!("topic writer: {e}")))??;
            tracing::debug!(written, "topic sink flushed");
            Ok(())
        })
    }
}

async fn write_events(
    mut rx: mpsc::Receiver<Event>,
    mut outputs: Vec<(PathBuf, BufWriter<tokio::fs::File>)>,
) -> Result<u64, BrokerError> {
    let mut written: u64 = 0;
    let mut line = Vec::with_capacity(512);

    while let Some(event) = rx.recv().await {
        line.clear();
        serde_json::to_writer(&mut line, &StoredEvent::encode(&event))?;
        line.push(b'\n');
        for (path, out) in outputs.iter_mut() {
            if let Err(e) = out.write_all(&line).await {
                tracing::error!(path = %path.display(), error = %e, "write error");
                return Err(BrokerError::from_io(format!("write {}", path.display()), e));
            }
        }
        written += 1;
    }

    for (path, out) in outputs.iter_mut() {
        out.flush()
            .await
            .map_err(|e| BrokerError::from_io(format!("flush {}", path.display()), e))?;
    }
    Ok(written)
}

// ═══════════════════════════════════════════════════════════════
//  BackfillPublisher
// ═══════════════════════════════════════════════════════════════

impl LocalBroker {
    /// `--source`, иначе `default_source` из конфига.
    fn source_descriptor<'a>(&'a self, source: Option<&'a str>) -> Result<&'a str, BrokerError> {
        source
            .or(self.default_source.as_deref())
            .ok_or_else(|| BrokerError::config("no source given and no default_source configured"))
    }

    async fn do_validate_source(&self, source: Option<&str>, filter: Option<&str>) -> Result<(), BrokerError> {
        let descriptor = self.source_descriptor(source)?;
        // source открывается лениво: reader стартует на первом get_batch
        let mut source = open_source(descriptor, filter, &self.source_options)?;
        source.dispose().await;
        Ok(())
    }

    async fn do_publish(&self, request: &PublishRequest) -> Result<u64, BrokerError> {
        let descriptor = self.source_descriptor(request.source.as_deref())?;

        if !self.topic_exists(&request.topic_id).await? {
            return Err(BrokerError::not_found(format!("topic '{}' not found", request.topic_id)));
        }
        let topic_dir = self.topic_dir(&request.topic_id)?;

        let mut source = open_source(descriptor, request.filter.as_deref(), &self.source_options)?;

        let deliveries = self.delivery_targets(&request.topic_id).await?;
        let mut outputs = vec![topic_dir.join(EVENTS_FILE)];
        for id in &deliveries {
            outputs.push(self.resource_path(id)?);
        }
        let mut sink = TopicSink::open(outputs, self.publish_buffer).await?;

        tracing::info!(
            topic = %request.topic_name,
            topic_id = %request.topic_id,
            source = %descriptor,
            deliveries = deliveries.len(),
            "publishing"
        );
        publish_all(source.as_mut(), &mut sink).await
    }
}

impl BackfillPublisher for LocalBroker {
    fn validate_source(
        &self,
        source: Option<&str>,
        filter: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + '_>> {
        let source = source.map(str::to_string);
        let filter = filter.map(str::to_string);
        Box::pin(async move { self.do_validate_source(source.as_deref(), filter.as_deref()).await })
    }

    fn publish(&self, request: &PublishRequest) -> Pin<Box<dyn Future<Output = Result<u64, BrokerError>> + Send + '_>> {
        let request = request.clone();
        Box::pin(async move { self.do_publish(&request).await })
    }
}

#[cfg(test)]
mod tests {
    use backfill_api::TopicOps;

    use crate::LocalBrokerConfig;

    use super::*;

    #[tokio::test]
    async fn full_channel_returns_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut sink = TopicSink::open(vec![path.clone()], 1).await.unwrap();

        let first = sink.publish_event(Event::new("a")).unwrap();
        assert!(matches!(first, Publish::Accepted));
        let second = sink.publish_event(Event::new("b")).unwrap();
        let Publish::Pending(ready) = second else {
            panic!("expected backpressure, got {second:?}");
        };
        ready.await.unwrap();

        sink.flush().await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn publish_after_flush_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = TopicSink::open(vec![dir.path().join("out.jsonl")], 4).await.unwrap();
        sink.flush().await.unwrap();
        assert!(sink.publish_event(Event::new("late")).is_err());
    }

    #[tokio::test]
    async fn publishes_source_into_topic() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("1.jsonl"), "{\"data\":\"x\"}\n{\"data\":\"y\"}\n").unwrap();

        let broker = LocalBroker::new(&LocalBrokerConfig {
            root: dir.path().join("broker").display().to_string(),
            publish_buffer: 1,
            ..Default::default()
        });
        broker.create_topic("orders").await.unwrap();

        let request = PublishRequest {
            topic_id: "orders".into(),
            topic_name: "orders".into(),
            source: Some(format!("json://{}/*.jsonl", data.display())),
            filter: None,
        };
        assert_eq!(broker.publish(&request).await.unwrap(), 2);

        let events = broker.read_topic("orders").await.unwrap();
        let payloads: Vec<&[u8]> = events.iter().map(|e| e.data.as_slice()).collect();
        assert_eq!(payloads, vec![b"x".as_slice(), b"y".as_slice()]);
    }

    #[tokio::test]
    async fn missing_source_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let broker = LocalBroker::new(&LocalBrokerConfig {
            root: dir.path().display().to_string(),
            ..Default::default()
        });
        broker.create_topic("orders").await.unwrap();

        let request = PublishRequest { topic_id: "orders".into(), topic_name: "orders".into(), ..Default::default() };
        let err = broker.publish(&request).await.unwrap_err();
        assert_eq!(err.kind(), backfill_api::ErrorKind::Config);
    }

    #[tokio::test]
    async fn validation_checks_source_kind_and_filter() {
        let dir = tempfile::tempdir().unwrap();
        let broker = LocalBroker::new(&LocalBrokerConfig {
            root: dir.path().display().to_string(),
            default_source: Some(format!("json://{}/*.jsonl", dir.path().display())),
            ..Default::default()
        });

        broker.validate_source(None, None).await.unwrap();
        broker.validate_source(None, Some("  ")).await.unwrap();

        let err = broker.validate_source(None, Some("n > 1")).await.unwrap_err();
        assert_eq!(err.kind(), backfill_api::ErrorKind::Config);
        assert!(err.message().contains("does not support filters"));

        let err = broker.validate_source(Some("kafka://orders"), None).await.unwrap_err();
        assert!(err.message().contains("unknown source kind"));
        assert!(!dir.path().join("topics").exists());
    }

    #[tokio::test]
    async fn filter_on_json_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let broker = LocalBroker::new(&LocalBrokerConfig {
            root: dir.path().display().to_string(),
            default_source: Some(format!("json://{}/*.jsonl", dir.path().display())),
            ..Default::default()
        });
        broker.create_topic("orders").await.unwrap();

        let request = PublishRequest {
            topic_id: "orders".into(),
            topic_name: "orders".into(),
            filter: Some("type = 'created'".into()),
            ..Default::default()
        };
        let err = broker.publish(&request).await.unwrap_err();
        assert!(err.message().contains("does not support filters"));
    }
}
