// Error handling for the bsig codec

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BsigError>;

#[derive(Error, Debug)]
pub enum BsigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid writer configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid signal name: {0:?}")]
    InvalidSignalName(String),

    #[error("Signal already written: {0}")]
    DuplicateSignal(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDtype(String),

    #[error("Invalid signal shape: {0}")]
    InvalidShape(String),

    #[error("Value {value} does not fit into {dtype}")]
    ValueOutOfRange { dtype: &'static str, value: i64 },

    #[error("Offset {0} does not fit into a v2 offset table")]
    OffsetOverflow(u64),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Not a bsig file: {0}")]
    NotABsigFile(String),

    #[error("Unsupported compression type: {0}")]
    UnsupportedCompression(u8),

    #[error("Truncated file: {0}")]
    TruncatedFile(String),

    #[error("Corrupt block: {0}")]
    CorruptBlock(String),

    #[error("Corrupt data in signal {signal}, block {block}: {reason}")]
    CorruptSignalData {
        signal: String,
        block: usize,
        reason: String,
    },

    #[error("Signal not found: {0}")]
    UnknownSignal(String),

    #[error("Range {offset}+{count} out of bounds for signal {signal} with {len} samples")]
    RangeOutOfBounds {
        signal: String,
        offset: i64,
        count: usize,
        len: usize,
    },

    #[error("Writer already closed")]
    WriterClosed,

    #[error("Invalid UTF-8 string")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}
