use std::future::Future;
use std::pin::Pin;

use crate::{Batch, BrokerError};

/// Pull-based источник событий с ограниченным потреблением памяти.
///
/// Контракт `get_batch`:
/// - `Ok(Some(batch))` — очередная порция (может быть пустой: источник
///   ещё открыт, но ничего не готово — вызывающий продолжает опрос);
/// - `Ok(None)` — источник исчерпан. После первого `None` все
///   последующие вызовы тоже возвращают `None`.
///
/// Ошибки разбора отдельных элементов не пробрасываются — источник
/// логирует их и выкидывает элемент.
pub trait BatchedEventSource: Send {
    fn get_batch(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<Batch>, BrokerError>> + Send + '_>>;

    /// Освободить ресурсы (file handles и т.д.). Идемпотентно, не падает;
    /// после вызова `get_batch` возвращает `None`.
    fn dispose(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
