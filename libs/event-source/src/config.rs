/// Целевой размер batch'а по умолчанию (приблизительный).
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Потолок read-ahead канала по умолчанию.
pub const DEFAULT_READ_AHEAD: usize = 1024;

/// Параметры чтения, общие для всех видов source'ов.
///
/// В памяти одновременно не больше одного batch'а плюс `read_ahead`
/// событий в канале reader → accumulator.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Сколько событий копить до возврата batch'а.
    pub batch_size: usize,
    /// Ёмкость канала reader → accumulator. `None` = `min(batch_size, 1024)`.
    pub read_ahead: Option<usize>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE, read_ahead: None }
    }
}

impl SourceOptions {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self { batch_size, ..Self::default() }
    }

    pub(crate) fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub(crate) fn read_ahead(&self) -> usize {
        self.read_ahead
            .unwrap_or_else(|| self.batch_size().min(DEFAULT_READ_AHEAD))
            .max(1)
    }
}
