use backfill_api::{BatchedEventSource, BrokerError, EventSink, Publish};

// ═══════════════════════════════════════════════════════════════
//  Publishing driver — source.get_batch() → sink.publish_event()
// ═══════════════════════════════════════════════════════════════

/// Прогнать source до конца в sink с учётом backpressure.
///
/// События внутри batch'а отправляются по одному; если sink вернул
/// `Publish::Pending`, следующее событие ждёт этот сигнал. `dispose()`
/// вызывается всегда, `flush()` — только при успешном проходе: на
/// ошибке ожидание уже принятых событий остаётся на вызывающем.
///
/// Возвращает число опубликованных событий.
pub async fn publish_all(
    source: &mut dyn BatchedEventSource,
    sink: &mut dyn EventSink,
) -> Result<u64, BrokerError> {
    let result = drain(source, sink).await;
    source.dispose().await;

    let published = result?;
    sink.flush().await?;
    tracing::info!(events = published, "publish complete");
    Ok(published)
}

async fn drain(
    source: &mut dyn BatchedEventSource,
    sink: &mut dyn EventSink,
) -> Result<u64, BrokerError> {
    let mut published: u64 = 0;
    let mut batches: u64 = 0;

    while let Some(batch) = source.get_batch().await? {
        if batch.is_empty() {
            continue;
        }
        batches += 1;
        let size = batch.len();
        for event in batch {
            if let Publish::Pending(ready) = sink.publish_event(event)? {
                ready.await?;
            }
            published += 1;
        }
        tracing::debug!(batch = batches, size, published, "batch published");
    }

    Ok(published)
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::sync::oneshot;

    use backfill_api::{Batch, Event};

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    struct ScriptedSource {
        batches: VecDeque<Result<Batch, BrokerError>>,
        disposed: Arc<AtomicBool>,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Result<Batch, BrokerError>>) -> (Self, Arc<AtomicBool>) {
            let disposed = Arc::new(AtomicBool::new(false));
            let source = Self { batches: batches.into(), disposed: disposed.clone() };
            (source, disposed)
        }
    }

    impl BatchedEventSource for ScriptedSource {
        fn get_batch(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<Batch>, BrokerError>> + Send + '_>> {
            let next = if self.disposed.load(Ordering::SeqCst) { None } else { self.batches.pop_front() };
            Box::pin(async move { next.transpose() })
        }

        fn dispose(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            self.disposed.store(true, Ordering::SeqCst);
            Box::pin(async {})
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        log: Log,
        gates: HashMap<String, oneshot::Receiver<()>>,
        fail_on: Option<String>,
        flushes: Arc<AtomicUsize>,
    }

    impl EventSink for RecordingSink {
        fn publish_event(&mut self, event: Event) -> Result<Publish, BrokerError> {
            let name = String::from_utf8(event.data).unwrap();
            self.log.lock().unwrap().push(format!("publish:{name}"));
            if self.fail_on.as_deref() == Some(name.as_str()) {
                return Err(BrokerError::io(format!("rejected {name}")));
            }
            match self.gates.remove(&name) {
                Some(gate) => {
                    let log = self.log.clone();
                    Ok(Publish::Pending(Box::pin(async move {
                        gate.await.map_err(|_| BrokerError::io("gate dropped"))?;
                        log.lock().unwrap().push(format!("released:{name}"));
                        Ok::<(), BrokerError>(())
                    })))
                }
                None => Ok(Publish::Accepted),
            }
        }

        fn flush(&mut self) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + '_>> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    fn batch(names: &[&str]) -> Batch {
        names.iter().map(|n| Event::new(n.as_bytes().to_vec())).collect()
    }

    #[tokio::test]
    async fn publishes_everything_then_disposes_and_flushes_once() {
        let (mut source, disposed) = ScriptedSource::new(vec![
            Ok(batch(&["a", "b"])),
            Ok(Vec::new()),
            Ok(batch(&["c"])),
        ]);
        let mut sink = RecordingSink::default();

        let count = publish_all(&mut source, &mut sink).await.unwrap();

        assert_eq!(count, 3);
        assert!(disposed.load(Ordering::SeqCst));
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);
        assert_eq!(*sink.log.lock().unwrap(), vec!["publish:a", "publish:b", "publish:c"]);
    }

    #[tokio::test]
    async fn pending_signal_gates_the_next_event() {
        let (source, _) = ScriptedSource::new(vec![Ok(batch(&["e0", "e1", "e2"]))]);
        let (release, gate) = oneshot::channel();
        let mut sink = RecordingSink::default();
        sink.gates.insert("e1".to_string(), gate);
        let log = sink.log.clone();

        let handle = tokio::spawn(async move {
            let mut source = source;
            let mut sink = sink;
            publish_all(&mut source, &mut sink).await
        });

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(*log.lock().unwrap(), vec!["publish:e0", "publish:e1"]);

        release.send(()).unwrap();
        assert_eq!(handle.await.unwrap().unwrap(), 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["publish:e0", "publish:e1", "released:e1", "publish:e2"]
        );
    }

    #[tokio::test]
    async fn source_error_disposes_without_flush() {
        let (mut source, disposed) = ScriptedSource::new(vec![
            Ok(batch(&["a"])),
            Err(BrokerError::io("disk gone")),
            Ok(batch(&["never"])),
        ]);
        let mut sink = RecordingSink::default();

        let err = publish_all(&mut source, &mut sink).await.unwrap_err();

        assert_eq!(err.message(), "disk gone");
        assert!(disposed.load(Ordering::SeqCst));
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 0);
        assert_eq!(*sink.log.lock().unwrap(), vec!["publish:a"]);
    }

    #[tokio::test]
    async fn sink_error_aborts_the_loop() {
        let (mut source, disposed) = ScriptedSource::new(vec![Ok(batch(&["a", "bad", "c"]))]);
        let mut sink = RecordingSink { fail_on: Some("bad".into()), ..Default::default() };

        assert!(publish_all(&mut source, &mut sink).await.is_err());
        assert!(disposed.load(Ordering::SeqCst));
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 0);
        assert_eq!(*sink.log.lock().unwrap(), vec!["publish:a", "publish:bad"]);
    }

    #[tokio::test]
    async fn failed_pending_signal_aborts_the_loop() {
        let (mut source, disposed) = ScriptedSource::new(vec![Ok(batch(&["a", "b"]))]);
        let (release, gate) = oneshot::channel::<()>();
        drop(release);
        let mut sink = RecordingSink::default();
        sink.gates.insert("a".to_string(), gate);

        let err = publish_all(&mut source, &mut sink).await.unwrap_err();
        assert_eq!(err.message(), "gate dropped");
        assert!(disposed.load(Ordering::SeqCst));
        assert_eq!(*sink.log.lock().unwrap(), vec!["publish:a"]);
    }
}
