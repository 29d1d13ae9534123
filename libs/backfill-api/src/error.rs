use std::fmt;

/// Категория ошибки брокера или source'а.
///
/// `NotFound` / `AlreadyExists` выделены отдельно: удаление
/// отсутствующего ресурса — успех, повторное создание — нет.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Невалидный запрос или конфигурация, до любых изменений в брокере.
    Config,
    /// I/O или сеть.
    Io,
    /// Не разбирается входная строка/запись.
    Format,
    /// Ресурс (topic, subscription, файл) не существует.
    NotFound,
    /// Ресурс с таким именем уже есть.
    AlreadyExists,
    /// Операция в неподходящем состоянии (sink уже закрыт и т.п.).
    State,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Format => "format",
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::State => "state",
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  BrokerError
// ═══════════════════════════════════════════════════════════════

/// Ошибка любого collaborator'а: source, sink, topic/trigger операции,
/// publisher. `kind` решает судьбу ошибки, `message` — для людей.
#[derive(Clone)]
pub struct BrokerError {
    kind: ErrorKind,
    message: String,
}

impl BrokerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn format_err(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::NotFound, message: msg.into() }
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::AlreadyExists, message: msg.into() }
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::State, message: msg.into() }
    }

    /// I/O ошибка с контекстом (обычно путь). `NotFound` и
    /// `AlreadyExists` сохраняют свой kind.
    pub fn from_io(context: impl fmt::Display, e: std::io::Error) -> Self {
        Self { kind: io_kind(&e), message: format!("{context}: {e}") }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

fn io_kind(e: &std::io::Error) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound,
        std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
        _ => ErrorKind::Io,
    }
}

impl fmt::Debug for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BrokerError {}

impl From<std::io::Error> for BrokerError {
    fn from(e: std::io::Error) -> Self {
        Self { kind: io_kind(&e), message: e.to_string() }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(e: serde_json::Error) -> Self {
        Self { kind: ErrorKind::Format, message: e.to_string() }
    }
}

// ═══════════════════════════════════════════════════════════════
//  TriggerError — ошибка с частично созданными ресурсами
// ═══════════════════════════════════════════════════════════════

/// Ошибка создания trigger'а. Несёт ID ресурсов, которые успели
/// создаться до сбоя — orchestrator обязан занести их в manifest.
#[derive(Debug, Clone)]
pub struct TriggerError {
    pub error: BrokerError,
    pub resource_ids: Vec<String>,
}

impl TriggerError {
    /// Сбой до создания каких-либо ресурсов.
    pub fn new(error: impl Into<BrokerError>) -> Self {
        Self { error: error.into(), resource_ids: Vec::new() }
    }

    /// Сбой после частичного provisioning'а.
    pub fn partial(error: impl Into<BrokerError>, resource_ids: Vec<String>) -> Self {
        Self { error: error.into(), resource_ids }
    }
}

impl fmt::Display for TriggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.resource_ids.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "{} (partially created: {})", self.error, self.resource_ids.join(", "))
        }
    }
}

impl std::error::Error for TriggerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<BrokerError> for TriggerError {
    fn from(error: BrokerError) -> Self {
        Self::new(error)
    }
}
