use serde::Deserialize;

use event_source::DEFAULT_BATCH_SIZE;

fn default_root() -> String {
    "./broker".into()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_publish_buffer() -> usize {
    1024
}

/// Конфигурация локального брокера.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalBrokerConfig {
    /// Корневая директория брокера (topics/, subscriptions/, deliveries/).
    #[serde(default = "default_root")]
    pub root: String,
    /// Целевой размер batch'а при чтении source'а.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Ёмкость канала reader → batch. `None` = `min(batch_size, 1024)`.
    #[serde(default)]
    pub read_ahead: Option<usize>,
    /// Ёмкость канала sink → writer. Переполнение = backpressure.
    #[serde(default = "default_publish_buffer")]
    pub publish_buffer: usize,
    /// Source, если backfill запущен без `--source`.
    #[serde(default)]
    pub default_source: Option<String>,
}

impl Default for LocalBrokerConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            batch_size: default_batch_size(),
            read_ahead: None,
            publish_buffer: default_publish_buffer(),
            default_source: None,
        }
    }
}
