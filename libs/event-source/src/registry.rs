use backfill_api::BatchedEventSource;

use crate::{FileEventSource, SourceError, SourceOptions};

/// Открыть source по дескриптору, перебирая известные виды по порядку.
///
/// Каждый вид возвращает `Ok(None)` на чужую схему; если ни один не
/// подошёл — `SourceError::UnknownKind`.
pub fn open_source(
    descriptor: &str,
    filter: Option<&str>,
    options: &SourceOptions,
) -> Result<Box<dyn BatchedEventSource>, SourceError> {
    if let Some(source) = FileEventSource::from_descriptor(descriptor, filter, options)? {
        return Ok(Box::new(source));
    }
    Err(SourceError::UnknownKind(descriptor.to_string()))
}
