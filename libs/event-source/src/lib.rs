pub mod config;
pub mod error;
mod file;
mod registry;

pub use config::{DEFAULT_BATCH_SIZE, DEFAULT_READ_AHEAD, SourceOptions};
pub use error::SourceError;
pub use file::FileEventSource;
pub use registry::open_source;
