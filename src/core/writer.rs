// Streaming bsig writer

use crate::core::codec::{compress_block, pack_chars, write_offset, write_u16, write_u32};
use crate::core::constants::*;
use crate::core::error::{BsigError, Result};
use crate::core::format::{BlockRef, SignalArray};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Settings fixed for the lifetime of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    pub format_version: FormatVersion,
    /// Uncompressed bytes per block, a power of two in `256..=65536`.
    pub block_size: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            format_version: FormatVersion::V3,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl WriterConfig {
    pub fn new(format_version: u8, block_size: u32) -> Result<Self> {
        let config = Self {
            format_version: FormatVersion::try_from(format_version)?,
            block_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_version(mut self, format_version: FormatVersion) -> Self {
        self.format_version = format_version;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.block_size.is_power_of_two()
            || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size)
        {
            return Err(BsigError::InvalidConfig(format!(
                "block size must be a power of two between {} and {}, got {}",
                MIN_BLOCK_SIZE, MAX_BLOCK_SIZE, self.block_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Appending,
    Closed,
}

#[derive(Debug)]
struct PendingSignal {
    name: String,
    type_code: u32,
    array_length: u32,
    sample_count: u32,
    blocks: Vec<BlockRef>,
}

/// Writes signals into a bsig container.
///
/// Blocks go to the sink as soon as a signal is appended; the offset table,
/// descriptor table and footer follow on [`close`](Self::close).
///
/// ```no_run
/// use bsig::{BsigWriter, WriterConfig};
///
/// let mut writer = BsigWriter::create("out.bsig", WriterConfig::default()).unwrap();
/// writer.append("Time stamp", vec![0i64, 1, 2, 3]).unwrap();
/// writer.close().unwrap();
/// ```
pub struct BsigWriter<W: Write> {
    sink: Option<W>,
    config: WriterConfig,
    position: u64,
    signals: Vec<PendingSignal>,
    names: HashSet<String>,
    state: WriterState,
}

impl BsigWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, config: WriterConfig) -> Result<Self> {
        config.validate()?;
        let file = File::create(path.as_ref())?;
        debug!("Creating bsig file {}", path.as_ref().display());
        Self::new(BufWriter::new(file), config)
    }
}

impl<W: Write> BsigWriter<W> {
    /// Validates `config` and writes the file header to `sink`.
    ///
    /// Offsets are counted from the first byte written here, so `sink` should
    /// be positioned at the start of the file.
    pub fn new(mut sink: W, config: WriterConfig) -> Result<Self> {
        config.validate()?;

        let mut header = Vec::with_capacity(HEADER_SIZE);
        pack_chars(&mut header, MAGIC);
        header.extend_from_slice(&[config.format_version as u8, 0, 0, 0]);
        sink.write_all(&header)?;

        Ok(Self {
            sink: Some(sink),
            config,
            position: HEADER_SIZE as u64,
            signals: Vec::new(),
            names: HashSet::new(),
            state: WriterState::Open,
        })
    }

    pub fn config(&self) -> WriterConfig {
        self.config
    }

    pub fn is_closed(&self) -> bool {
        self.state == WriterState::Closed
    }

    /// Names appended so far, in append order.
    pub fn signal_names(&self) -> Vec<&str> {
        self.signals.iter().map(|s| s.name.as_str()).collect()
    }

    /// Bytes written to the sink so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Compresses `signal` block by block and writes it to the sink.
    pub fn append(&mut self, name: &str, signal: impl Into<SignalArray>) -> Result<()> {
        let signal = signal.into();
        self.append_signal(name, &signal)
    }

    pub fn append_signal(&mut self, name: &str, signal: &SignalArray) -> Result<()> {
        if self.state == WriterState::Closed {
            return Err(BsigError::WriterClosed);
        }
        if name.is_empty() || name.len() > u16::MAX as usize {
            return Err(BsigError::InvalidSignalName(name.to_string()));
        }
        if self.names.contains(name) {
            return Err(BsigError::DuplicateSignal(name.to_string()));
        }

        let sample_count = u32::try_from(signal.sample_count()).map_err(|_| {
            BsigError::InvalidShape(format!("{} has more than u32::MAX samples", name))
        })?;
        let array_length = u32::try_from(signal.array_length()).map_err(|_| {
            BsigError::InvalidShape(format!("{} has more than u32::MAX slots", name))
        })?;

        let dtype = signal.dtype();
        let values = signal.values();
        let per_block = self.config.block_size as usize / dtype.item_size();

        let mut blocks = Vec::with_capacity(values.len().div_ceil(per_block));
        let mut start = 0;
        while start < values.len() {
            let end = (start + per_block).min(values.len());
            let raw = values.le_bytes(start, end);
            // a partly written signal leaves the sink unusable
            let block = self.write_block(&raw).inspect_err(|_| self.poison())?;
            blocks.push(block);
            start = end;
        }

        debug!(
            "Appended {} ({}, {} x {}) in {} blocks, {} bytes compressed",
            name,
            dtype,
            sample_count,
            array_length,
            blocks.len(),
            blocks.iter().map(|b| b.compressed_len as u64).sum::<u64>()
        );

        self.names.insert(name.to_string());
        self.signals.push(PendingSignal {
            name: name.to_string(),
            type_code: dtype.type_code(),
            array_length,
            sample_count,
            blocks,
        });
        self.state = WriterState::Appending;
        Ok(())
    }

    /// Appends several signals in iteration order.
    pub fn append_many<'a, I>(&mut self, signals: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, SignalArray)>,
    {
        for (name, signal) in signals {
            self.append_signal(name, &signal)?;
        }
        Ok(())
    }

    fn write_block(&mut self, raw: &[u8]) -> Result<BlockRef> {
        let compressed = compress_block(raw)?;
        let compressed_len = u32::try_from(compressed.len())
            .map_err(|_| BsigError::CorruptBlock("compressed block exceeds u32".to_string()))?;

        let offset = self.position;
        let sink = self.sink.as_mut().ok_or(BsigError::WriterClosed)?;
        sink.write_all(&compressed_len.to_le_bytes())?;
        sink.write_all(&compressed)?;
        self.position += (BLOCK_PREFIX_SIZE + compressed.len()) as u64;

        Ok(BlockRef {
            offset,
            compressed_len,
        })
    }

    fn offset_table(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for signal in &self.signals {
            write_u32(&mut out, signal.blocks.len() as u32);
            write_u32(&mut out, signal.sample_count);
            for block in &signal.blocks {
                write_offset(&mut out, self.config.format_version, block.offset)?;
            }
        }
        Ok(out)
    }

    fn descriptor_table(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for signal in &self.signals {
            write_u16(&mut out, signal.name.len() as u16);
            pack_chars(&mut out, signal.name.as_bytes());
            write_u32(&mut out, signal.array_length);
            write_u32(&mut out, signal.type_code);
        }
        out
    }

    /// Writes the tables and footer. The file is complete afterwards.
    pub fn close(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Err(BsigError::WriterClosed);
        }

        let offsets = self.offset_table()?;
        let descriptors = self.descriptor_table();

        let mut footer = Vec::with_capacity(FOOTER_SIZE);
        write_u32(&mut footer, self.signals.len() as u32);
        write_u32(&mut footer, self.config.block_size);
        write_u32(&mut footer, descriptors.len() as u32);
        write_u32(&mut footer, offsets.len() as u32);
        footer.extend_from_slice(&[0, 0, 0, CompressionType::Zlib as u8]);
        pack_chars(&mut footer, FOOTER_MAGIC);

        // no second attempt after a failed write, the sink holds partial tables
        self.state = WriterState::Closed;
        let sink = self.sink.as_mut().ok_or(BsigError::WriterClosed)?;
        sink.write_all(&offsets)?;
        sink.write_all(&descriptors)?;
        sink.write_all(&footer)?;
        sink.flush()?;

        self.position += (offsets.len() + descriptors.len() + footer.len()) as u64;
        info!(
            "Closed bsig v{} with {} signals, {} bytes",
            self.config.format_version as u8,
            self.signals.len(),
            self.position
        );
        Ok(())
    }

    fn poison(&mut self) {
        warn!("bsig write failed, writer closed without tables");
        self.state = WriterState::Closed;
    }

    /// Closes the file if still open and hands back the sink.
    pub fn finish(mut self) -> Result<W> {
        if self.state != WriterState::Closed {
            self.close()?;
        }
        self.sink.take().ok_or(BsigError::WriterClosed)
    }
}

impl<W: Write> Drop for BsigWriter<W> {
    fn drop(&mut self) {
        if self.sink.is_some() && self.state != WriterState::Closed {
            warn!(
                "bsig writer dropped before close, {} signals left without tables",
                self.signals.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_writer(config: WriterConfig) -> BsigWriter<Vec<u8>> {
        BsigWriter::new(Vec::new(), config).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(WriterConfig::new(3, 4096).is_ok());
        assert!(WriterConfig::new(2, 256).is_ok());
        assert!(WriterConfig::new(3, 65536).is_ok());
        for bad in [0, 128, 1000, 4097, 131072] {
            assert!(matches!(
                WriterConfig::new(3, bad),
                Err(BsigError::InvalidConfig(_))
            ));
        }
        assert!(matches!(
            WriterConfig::new(4, 4096),
            Err(BsigError::InvalidConfig(_))
        ));
        assert!(matches!(
            BsigWriter::new(Vec::new(), WriterConfig::default().with_block_size(100)),
            Err(BsigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_header_written_on_open() {
        let writer = new_writer(WriterConfig::default().with_version(FormatVersion::V2));
        assert_eq!(writer.position(), 8);
        let bytes = writer.sink.as_ref().unwrap().clone();
        assert_eq!(bytes, b"BSIG\x02\x00\x00\x00".to_vec());
    }

    #[test]
    fn test_empty_file_layout() {
        let bytes = new_writer(WriterConfig::default()).finish().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + FOOTER_SIZE);
        let footer = &bytes[HEADER_SIZE..];
        assert_eq!(&footer[0..4], &0u32.to_le_bytes());
        assert_eq!(&footer[4..8], &4096u32.to_le_bytes());
        assert_eq!(&footer[16..20], &[0, 0, 0, 1]);
        assert_eq!(&footer[20..24], b"BIN\0");
    }

    #[test]
    fn test_blocks_split_by_block_size() {
        let mut writer = new_writer(WriterConfig::default().with_block_size(256));
        // 100 x i64 = 800 bytes -> 32 + 32 + 32 + 4 items
        writer.append("counter", (0..100i64).collect::<Vec<_>>()).unwrap();
        let blocks = &writer.signals[0].blocks;
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].offset, HEADER_SIZE as u64);
        for pair in blocks.windows(2) {
            assert_eq!(
                pair[1].offset,
                pair[0].offset + BLOCK_PREFIX_SIZE as u64 + pair[0].compressed_len as u64
            );
        }
    }

    #[test]
    fn test_duplicate_and_invalid_names() {
        let mut writer = new_writer(WriterConfig::default());
        writer.append("a", vec![1u8]).unwrap();
        assert!(matches!(
            writer.append("a", vec![2u8]),
            Err(BsigError::DuplicateSignal(_))
        ));
        assert!(matches!(
            writer.append("", vec![2u8]),
            Err(BsigError::InvalidSignalName(_))
        ));
        let long = "x".repeat(70_000);
        assert!(matches!(
            writer.append(&long, vec![2u8]),
            Err(BsigError::InvalidSignalName(_))
        ));
        assert_eq!(writer.signal_names(), vec!["a"]);
    }

    #[test]
    fn test_append_after_close() {
        let mut writer = new_writer(WriterConfig::default());
        writer.append("a", vec![1.0f64]).unwrap();
        writer.close().unwrap();
        assert!(writer.is_closed());
        assert!(matches!(
            writer.append("b", vec![1.0f64]),
            Err(BsigError::WriterClosed)
        ));
        assert!(matches!(writer.close(), Err(BsigError::WriterClosed)));
    }

    #[test]
    fn test_zero_length_signal_has_no_blocks() {
        let mut writer = new_writer(WriterConfig::default());
        writer.append("empty", Vec::<i32>::new()).unwrap();
        assert!(writer.signals[0].blocks.is_empty());
        assert_eq!(writer.signals[0].array_length, 0);
        assert_eq!(writer.signals[0].sample_count, 0);
    }

    #[test]
    fn test_tables_and_footer_bytes() {
        for (version, offset_bytes) in [
            (FormatVersion::V3, 8u64.to_le_bytes().to_vec()),
            (FormatVersion::V2, 8u32.to_le_bytes().to_vec()),
        ] {
            let mut writer = new_writer(WriterConfig::default().with_version(version));
            writer.append("speed", vec![1u16, 2, 3]).unwrap();
            let bytes = writer.finish().unwrap();

            let clen = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
            let data_end = HEADER_SIZE + BLOCK_PREFIX_SIZE + clen;

            let mut offsets = Vec::new();
            offsets.extend_from_slice(&1u32.to_le_bytes());
            offsets.extend_from_slice(&3u32.to_le_bytes());
            offsets.extend_from_slice(&offset_bytes);

            let mut descriptors = Vec::new();
            descriptors.extend_from_slice(&5u16.to_le_bytes());
            descriptors.extend_from_slice(b"speed");
            descriptors.extend_from_slice(&1u32.to_le_bytes());
            descriptors.extend_from_slice(&0x0010u32.to_le_bytes());
            assert_eq!(descriptors.len(), 15);

            let mut expected = offsets.clone();
            expected.extend_from_slice(&descriptors);
            expected.extend_from_slice(&1u32.to_le_bytes());
            expected.extend_from_slice(&4096u32.to_le_bytes());
            expected.extend_from_slice(&(descriptors.len() as u32).to_le_bytes());
            expected.extend_from_slice(&(offsets.len() as u32).to_le_bytes());
            expected.extend_from_slice(&[0, 0, 0, 1]);
            expected.extend_from_slice(b"BIN\0");

            assert_eq!(&bytes[data_end..], expected.as_slice(), "{:?}", version);
        }
    }

    /// Accepts `limit` bytes, then fails every write.
    struct FailingSink {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.written.len() + buf.len() > self.limit {
                return Err(std::io::Error::other("disk full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_close_closes_writer() {
        let sink = FailingSink {
            written: Vec::new(),
            limit: 1024,
        };
        let mut writer = BsigWriter::new(sink, WriterConfig::default()).unwrap();
        writer.append("a", vec![1u8, 2, 3]).unwrap();
        // lets the block through, the tables no longer fit
        writer.sink.as_mut().unwrap().limit = writer.position() as usize;

        assert!(matches!(writer.close(), Err(BsigError::Io(_))));
        assert!(writer.is_closed());
        assert!(matches!(writer.close(), Err(BsigError::WriterClosed)));
        assert!(matches!(
            writer.append("b", vec![1u8]),
            Err(BsigError::WriterClosed)
        ));
    }

    #[test]
    fn test_failed_append_closes_writer() {
        let sink = FailingSink {
            written: Vec::new(),
            limit: HEADER_SIZE + 16,
        };
        let mut writer = BsigWriter::new(sink, WriterConfig::default().with_block_size(256)).unwrap();
        let noisy: Vec<u64> = (0..1000u64).map(|i| i.wrapping_mul(0x9E37_79B9_7F4A_7C15)).collect();

        assert!(matches!(writer.append("noisy", noisy), Err(BsigError::Io(_))));
        assert!(writer.is_closed());
        assert!(writer.signal_names().is_empty());
        assert!(matches!(
            writer.append("b", vec![1u8]),
            Err(BsigError::WriterClosed)
        ));
        assert!(matches!(writer.close(), Err(BsigError::WriterClosed)));
    }
}
