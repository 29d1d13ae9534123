use std::future::Future;
use std::pin::Pin;

use crate::{BrokerError, Event};

/// Сигнал завершения, который sink отдаёт при переполнении.
pub type PendingPublish = Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'static>>;

/// Результат `EventSink::publish_event`.
pub enum Publish {
    /// Принято — можно сразу отправлять следующее событие.
    Accepted,
    /// Sink на пределе ёмкости: дождаться сигнала до следующей отправки.
    Pending(PendingPublish),
}

impl std::fmt::Debug for Publish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Publish::Accepted => f.write_str("Accepted"),
            Publish::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Broker-specific приёмник событий для publishing driver'а.
pub trait EventSink: Send {
    fn publish_event(&mut self, event: Event) -> Result<Publish, BrokerError>;

    /// Завершается, когда все ранее принятые события надёжно отправлены.
    fn flush(&mut self) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + '_>>;
}
