pub mod config;
mod publisher;
mod topics;
mod triggers;

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};

use backfill_api::{BrokerError, Event};
use event_source::SourceOptions;

pub use config::LocalBrokerConfig;
pub use publisher::TopicSink;

const TOPICS_DIR: &str = "topics";
const SUBSCRIPTIONS_DIR: &str = "subscriptions";
const DELIVERIES_DIR: &str = "deliveries";
const EVENTS_FILE: &str = "events.jsonl";

// ════════════════════════════════════════════════════════════════
//  LocalBroker
// ════════════════════════════════════════════════════════════════

/// Брокер поверх локальной директории.
///
/// ```text
/// <root>/topics/<topic-id>/events.jsonl       опубликованные события
/// <root>/subscriptions/<name>.json             trigger: подписка на topic
/// <root>/deliveries/<name>.jsonl               trigger: доставленные события
/// ```
///
/// ID topic'а = его имя. ID ресурса trigger'а = путь относительно root.
/// Удаления идемпотентны: отсутствующий ресурс = успех.
#[derive(Debug, Clone)]
pub struct LocalBroker {
    root: PathBuf,
    source_options: SourceOptions,
    publish_buffer: usize,
    default_source: Option<String>,
}

impl LocalBroker {
    pub fn new(config: &LocalBrokerConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root),
            source_options: SourceOptions {
                read_ahead: config.read_ahead,
                ..SourceOptions::with_batch_size(config.batch_size)
            },
            publish_buffer: config.publish_buffer.max(1),
            default_source: config.default_source.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn topic_dir(&self, topic_id: &str) -> Result<PathBuf, BrokerError> {
        if !is_valid_name(topic_id, true) {
            return Err(BrokerError::config(format!("invalid topic name '{topic_id}'")));
        }
        Ok(self.root.join(TOPICS_DIR).join(topic_id))
    }

    /// Прочитать все опубликованные в topic события (по порядку).
    pub async fn read_topic(&self, topic_id: &str) -> Result<Vec<Event>, BrokerError> {
        let path = self.topic_dir(topic_id)?.join(EVENTS_FILE);
        read_events(&path).await
    }

    /// Прочитать события, доставленные в delivery-ресурс trigger'а.
    pub async fn read_delivery(&self, resource_id: &str) -> Result<Vec<Event>, BrokerError> {
        let path = self.resource_path(resource_id)?;
        read_events(&path).await
    }

    /// Проверить ID ресурса: относительный путь внутри subscriptions/ или deliveries/.
    fn resource_path(&self, resource_id: &str) -> Result<PathBuf, BrokerError> {
        let rel = Path::new(resource_id);
        let components: Vec<_> = rel.components().collect();
        let valid = components.len() == 2
            && components.iter().all(|c| matches!(c, Component::Normal(_)))
            && matches!(
                components[0],
                Component::Normal(dir) if dir == SUBSCRIPTIONS_DIR || dir == DELIVERIES_DIR
            );
        if !valid {
            return Err(BrokerError::config(format!("invalid trigger resource id '{resource_id}'")));
        }
        Ok(self.root.join(rel))
    }
}

/// Имя topic'а / trigger'а: `[A-Za-z0-9_-]` (+ `.` для topic'ов).
fn is_valid_name(name: &str, allow_dot: bool) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || (allow_dot && c == '.'))
}

// ════════════════════════════════════════════════════════════════
//  StoredEvent — формат строки на диске
// ════════════════════════════════════════════════════════════════

/// Событие на диске: `data` в base64, остальное как есть.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEvent {
    data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
}

impl StoredEvent {
    fn encode(event: &Event) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(&event.data),
            attributes: event.attributes.clone(),
            key: event.key.clone(),
        }
    }

    fn decode(self) -> Result<Event, BrokerError> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| BrokerError::format_err(format!("base64: {e}")))?;
        Ok(Event { data, attributes: self.attributes, key: self.key })
    }
}

async fn read_events(path: &Path) -> Result<Vec<Event>, BrokerError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BrokerError::from_io(format!("read {}", path.display()), e)),
    };
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<StoredEvent>(l)?.decode())
        .collect()
}
