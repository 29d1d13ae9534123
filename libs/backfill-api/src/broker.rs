use std::future::Future;
use std::pin::Pin;

use crate::{BrokerError, TriggerError};

// ════════════════════════════════════════════════════════════════
//  Broker boundary collaborators
// ════════════════════════════════════════════════════════════════

/// Операции над topic'ами брокера. Вызовы одного вида могут
/// выполняться конкурентно.
pub trait TopicOps: Send + Sync {
    /// Создать topic, вернуть его ID.
    fn create_topic(&self, name: &str) -> Pin<Box<dyn Future<Output = Result<String, BrokerError>> + Send + '_>>;

    /// Найти ID уже существующего topic'а по логическому имени.
    fn resolve_topic(&self, name: &str) -> Pin<Box<dyn Future<Output = Result<String, BrokerError>> + Send + '_>>;

    /// Удалить topic. "Not found" должен считаться успехом.
    fn delete_topic(&self, topic_id: &str) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + '_>>;
}

/// Операции над trigger'ами (подписками потребителей на topic).
pub trait TriggerOps: Send + Sync {
    /// Создать trigger. Возвращает ID всех созданных ресурсов; при сбое
    /// `TriggerError` несёт ID ресурсов, созданных до ошибки.
    fn create_trigger(
        &self,
        backfill_id: &str,
        topic_id: &str,
        spec: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, TriggerError>> + Send + '_>>;

    /// Удалить один ресурс trigger'а. "Not found" должен считаться успехом.
    fn delete_trigger_resource(&self, resource_id: &str)
        -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + '_>>;
}

/// Параметры publish шага backfill'а.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    pub topic_id: String,
    pub topic_name: String,
    pub source: Option<String>,
    pub filter: Option<String>,
}

/// Broker-specific publish: прочитать события из именованного
/// источника и опубликовать их в topic. Возвращает число событий.
pub trait BackfillPublisher: Send + Sync {
    /// Проверить source и filter до любых изменений в брокере:
    /// вид source'а известен, filter им поддерживается. Ничего не читает.
    fn validate_source(
        &self,
        source: Option<&str>,
        filter: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + '_>>;

    fn publish(&self, request: &PublishRequest) -> Pin<Box<dyn Future<Output = Result<u64, BrokerError>> + Send + '_>>;
}
