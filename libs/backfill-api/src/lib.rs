mod broker;
mod error;
mod event;
mod sink;
mod source;

pub use broker::{BackfillPublisher, PublishRequest, TopicOps, TriggerOps};
pub use error::{BrokerError, ErrorKind, TriggerError};
pub use event::{Batch, Event};
pub use sink::{EventSink, PendingPublish, Publish};
pub use source::BatchedEventSource;
