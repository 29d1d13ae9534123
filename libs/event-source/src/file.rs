use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use backfill_api::{Batch, BatchedEventSource, BrokerError, Event};

use crate::{SourceError, SourceOptions};

const SCHEME: &str = "json://";

// ═══════════════════════════════════════════════════════════════
//  Reader state
// ═══════════════════════════════════════════════════════════════

/// Текущий открытый файл: reader task пишет разобранные события
/// в bounded канал. Полный канал = reader на паузе, чтение из канала
/// = resume. Закрытый канал = файл прочитан до конца.
struct OpenFile {
    path: PathBuf,
    rx: mpsc::Receiver<Event>,
    reader: JoinHandle<Result<(), BrokerError>>,
}

enum ReaderState {
    /// Нет открытого файла — следующий `get_batch` откроет очередной.
    Idle,
    Open(OpenFile),
}

// ═══════════════════════════════════════════════════════════════
//  FileEventSource
// ═══════════════════════════════════════════════════════════════

/// Source `json://<glob>`: newline-delimited JSON из упорядоченного
/// набора локальных файлов.
///
/// Файлы резолвятся один раз при создании: только обычные файлы
/// (symlink'и исключаются), сортировка лексикографически по пути.
/// В памяти держится не больше одного batch'а плюс read-ahead канала,
/// независимо от размера файлов.
pub struct FileEventSource {
    files: Vec<PathBuf>,
    cursor: usize,
    batch_size: usize,
    read_ahead: usize,
    state: ReaderState,
    stats: Arc<ReadStats>,
}

/// Счётчики reader task'ов: прочитанные строки и выброшенные из них.
#[derive(Debug, Default)]
struct ReadStats {
    lines: AtomicU64,
    skipped: AtomicU64,
}

impl FileEventSource {
    /// Создать source из дескриптора.
    ///
    /// `Ok(None)` — дескриптор не `json://` (пусть попробует другой вид
    /// source'а). Фильтры для этого вида не поддерживаются: непустой
    /// `filter` — ошибка.
    pub fn from_descriptor(
        descriptor: &str,
        filter: Option<&str>,
        options: &SourceOptions,
    ) -> Result<Option<Self>, SourceError> {
        let Some(pattern) = descriptor.strip_prefix(SCHEME) else {
            return Ok(None);
        };

        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            return Err(SourceError::FilterNotSupported {
                kind: "json",
                filter: filter.to_string(),
            });
        }

        let files = resolve_files(pattern)?;
        tracing::info!(pattern = %pattern, files = files.len(), "resolved json source");

        Ok(Some(Self {
            files,
            cursor: 0,
            batch_size: options.batch_size(),
            read_ahead: options.read_ahead(),
            state: ReaderState::Idle,
            stats: Arc::new(ReadStats::default()),
        }))
    }

    /// Отсортированный список файлов, которые будут прочитаны.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Сколько строк было выброшено из-за ошибок разбора.
    pub fn skipped_lines(&self) -> u64 {
        self.stats.skipped.load(Ordering::Relaxed)
    }

    async fn open_next(&mut self) -> Result<bool, BrokerError> {
        let Some(path) = self.files.get(self.cursor).cloned() else {
            return Ok(false);
        };
        self.cursor += 1;

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| BrokerError::from_io(format!("open {}", path.display()), e))?;
        tracing::debug!(file = %path.display(), "opened source file");

        let (tx, rx) = mpsc::channel(self.read_ahead);
        let reader = tokio::spawn(read_lines(path.clone(), file, tx, self.stats.clone()));
        self.state = ReaderState::Open(OpenFile { path, rx, reader });
        Ok(true)
    }

    async fn next_batch(&mut self) -> Result<Option<Batch>, BrokerError> {
        if matches!(self.state, ReaderState::Idle) && !self.open_next().await? {
            return Ok(None);
        }
        let ReaderState::Open(file) = &mut self.state else {
            return Ok(None);
        };

        // Кто первый: порог batch'а или закрытие файла. В обоих случаях
        // отдаём то, что накопилось (возможно пусто).
        let mut batch = Vec::with_capacity(self.batch_size.min(1024));
        let closed = loop {
            match file.rx.recv().await {
                Some(event) => {
                    batch.push(event);
                    if batch.len() >= self.batch_size {
                        break false;
                    }
                }
                None => break true,
            }
        };

        if closed {
            if let ReaderState::Open(file) = std::mem::replace(&mut self.state, ReaderState::Idle) {
                finish_reader(file).await?;
                tracing::debug!(
                    lines = self.stats.lines.load(Ordering::Relaxed),
                    skipped = self.skipped_lines(),
                    remaining_files = self.files.len().saturating_sub(self.cursor),
                    "source progress"
                );
            }
        }

        Ok(Some(batch))
    }

    fn close(&mut self) {
        if let ReaderState::Open(file) = std::mem::replace(&mut self.state, ReaderState::Idle) {
            file.reader.abort();
            tracing::debug!(file = %file.path.display(), "closed source file");
        }
        self.cursor = self.files.len();
    }
}

impl BatchedEventSource for FileEventSource {
    fn get_batch(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<Batch>, BrokerError>> + Send + '_>> {
        Box::pin(self.next_batch())
    }

    fn dispose(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.close();
        Box::pin(async {})
    }
}

impl Drop for FileEventSource {
    fn drop(&mut self) {
        self.close();
    }
}

// ═══════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════

async fn finish_reader(file: OpenFile) -> Result<(), BrokerError> {
    match file.reader.await {
        Ok(result) => {
            tracing::debug!(file = %file.path.display(), "source file consumed");
            result
        }
        Err(e) => Err(BrokerError::io(format!("reader {}: {e}", file.path.display()))),
    }
}

/// Reader task: строки → события → канал. `send().await` на полном
/// канале и есть пауза. Строка, которая не UTF-8 или не разбирается
/// как событие, логируется и выбрасывается.
async fn read_lines(
    path: PathBuf,
    file: tokio::fs::File,
    tx: mpsc::Sender<Event>,
    stats: Arc<ReadStats>,
) -> Result<(), BrokerError> {
    let mut reader = BufReader::new(file);
    let mut buf = Vec::with_capacity(1024);
    let mut line_no: u64 = 0;

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| BrokerError::from_io(format!("read {}", path.display()), e))?;
        if n == 0 {
            return Ok(());
        }
        line_no += 1;
        stats.lines.fetch_add(1, Ordering::Relaxed);

        let raw = trim_line_end(&buf);
        match parse_line(raw) {
            Ok(None) => {}
            Ok(Some(event)) => {
                if tx.send(event).await.is_err() {
                    // consumer disposed
                    return Ok(());
                }
            }
            Err(e) => {
                stats.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    file = %path.display(),
                    line = line_no,
                    raw = %String::from_utf8_lossy(raw),
                    error = %e,
                    "bad event line, skipping"
                );
            }
        }
    }
}

/// `Ok(None)` — пустая строка.
fn parse_line(raw: &[u8]) -> Result<Option<Event>, BrokerError> {
    let line = std::str::from_utf8(raw).map_err(|e| BrokerError::format_err(format!("invalid UTF-8: {e}")))?;
    if line.trim().is_empty() {
        return Ok(None);
    }
    Event::from_json_line(line).map(Some)
}

fn trim_line_end(buf: &[u8]) -> &[u8] {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Glob → обычные файлы без symlink'ов, лексикографически по пути.
fn resolve_files(pattern: &str) -> Result<Vec<PathBuf>, SourceError> {
    let entries = glob::glob(pattern).map_err(|e| SourceError::Pattern {
        pattern: pattern.to_string(),
        detail: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| SourceError::Scan {
            path: e.path().to_path_buf(),
            source: e.into_error(),
        })?;
        if is_regular_file(&path)? {
            files.push(path);
        } else {
            tracing::debug!(path = %path.display(), "skipping non-regular path");
        }
    }

    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(files)
}

fn is_regular_file(path: &Path) -> Result<bool, SourceError> {
    let meta = std::fs::symlink_metadata(path).map_err(|e| SourceError::Scan {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(meta.file_type().is_file())
}
