pub mod bpl;
pub mod codec;
pub mod constants;
pub mod data_handle;
pub mod delimited;
pub mod dtype;
pub mod error;
pub mod format;
pub mod reader;
pub mod signal_file;
pub mod writer;
