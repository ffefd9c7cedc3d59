// bsig signal container
// Main library entry point

pub mod core;

// Re-export main types
pub use crate::core::bpl::{BatchPlayList, BplEntry, Section};
pub use crate::core::constants::FormatVersion;
pub use crate::core::data_handle::{handle_ws_fetch, load_series, SignalSource};
pub use crate::core::delimited::{CsvOptions, CsvReader, CsvWriter};
pub use crate::core::dtype::{DType, Element};
pub use crate::core::error::{BsigError, Result};
pub use crate::core::format::{SignalArray, SignalDescriptor, TimeSeries, Values};
pub use crate::core::reader::{BsigReader, ReaderOptions};
pub use crate::core::signal_file::{FileKind, SignalReader, SignalWriter};
pub use crate::core::writer::{BsigWriter, WriterConfig};
