use std::collections::BTreeMap;

use serde::Deserialize;

use crate::BrokerError;

// ════════════════════════════════════════════════════════════════
//  Event
// ════════════════════════════════════════════════════════════════

/// Одно событие для replay: непрозрачные байты + опциональные
/// атрибуты и ordering key.
///
/// Создаётся source'ом, потребляется sink'ом ровно один раз
/// (ownership переходит в `EventSink::publish_event`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
    pub data: Vec<u8>,
    pub attributes: Option<BTreeMap<String, String>>,
    pub key: Option<String>,
}

/// Упорядоченная группа событий, ограниченная по размеру.
/// Граница batch'а ничего не значит кроме ограничения памяти.
pub type Batch = Vec<Event>;

#[derive(Deserialize)]
struct JsonEvent {
    data: serde_json::Value,
    #[serde(default)]
    attributes: Option<BTreeMap<String, String>>,
    #[serde(default, alias = "orderingKey")]
    key: Option<String>,
}

impl Event {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into(), attributes: None, key: None }
    }

    /// Разобрать одну строку newline-delimited JSON.
    ///
    /// `data`: строка → её UTF-8 байты, любое другое JSON значение →
    /// компактная JSON сериализация. Ошибки имеют kind `Format`.
    pub fn from_json_line(line: &str) -> Result<Self, BrokerError> {
        let raw: JsonEvent = serde_json::from_str(line)?;
        let data = match raw.data {
            serde_json::Value::String(s) => s.into_bytes(),
            serde_json::Value::Null => {
                return Err(BrokerError::format_err("event 'data' must not be null"));
            }
            other => serde_json::to_vec(&other)?,
        };
        Ok(Self { data, attributes: raw.attributes, key: raw.key })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.as_ref()?.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn string_data_becomes_utf8_bytes() {
        let ev = Event::from_json_line(r#"{"data":"hello","attributes":{"id":"7"},"key":"k1"}"#).unwrap();
        assert_eq!(ev.data, b"hello");
        assert_eq!(ev.attribute("id"), Some("7"));
        assert_eq!(ev.key.as_deref(), Some("k1"));
    }

    #[test]
    fn object_data_is_serialized_compactly() {
        let ev = Event::from_json_line(r#"{"data": {"a": 1, "b": [true]}}"#).unwrap();
        assert_eq!(ev.data, br#"{"a":1,"b":[true]}"#);
        assert!(ev.attributes.is_none());
        assert!(ev.key.is_none());
    }

    #[test]
    fn ordering_key_alias() {
        let ev = Event::from_json_line(r#"{"data":"x","orderingKey":"shard-3"}"#).unwrap();
        assert_eq!(ev.key.as_deref(), Some("shard-3"));
    }

    #[test]
    fn missing_or_null_data_is_format_error() {
        let err = Event::from_json_line(r#"{"attributes":{}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        let err = Event::from_json_line(r#"{"data":null}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn non_string_attribute_values_are_rejected() {
        assert!(Event::from_json_line(r#"{"data":"x","attributes":{"n":1}}"#).is_err());
        assert!(Event::from_json_line("not json").is_err());
    }
}
