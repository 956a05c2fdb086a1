pub mod container;
pub mod converter;
pub mod descriptor;
pub mod error;
pub mod notifier;
pub mod registry;
pub mod repacker;
pub mod sink;
pub mod unpacker;

// Re-exports for easy access
pub use container::{Container, Entry};
pub use converter::{
    convert, verify, CancelToken, ConversionReport, ConvertOptions, Mode, Pipeline, VerifyReport,
};
pub use error::{Error, Result};
pub use notifier::Notifier;
pub use registry::EntryKind;
pub use repacker::{repack, RepackOptions, RepackReport};
pub use sink::{EventLevel, MemorySink, NullSink, ProgressSink};
pub use unpacker::{unpack, UnpackOptions, UnpackReport};
