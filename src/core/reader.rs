// Main bsig reader implementation - Thread-safe version

use crate::core::bpl::Section;
use crate::core::codec::{decompress_block, ByteCursor};
use crate::core::constants::*;
use crate::core::dtype::DType;
use crate::core::error::{BsigError, Result};
use crate::core::format::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Match signal names exactly (`true`) or ignoring ASCII case.
    pub case_sensitive: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
        }
    }
}

pub struct BsigReader<R> {
    source: Mutex<R>,
    options: ReaderOptions,
    header: FileHeader,
    footer: FileFooter,
    /// End of the block stream, i.e. start of the offset table.
    data_end: u64,
    signals: Vec<SignalDescriptor>,
    lookup: HashMap<String, usize>,
}

impl BsigReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ReaderOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!("Opening bsig file {}", path.as_ref().display());
        Self::from_reader(BufReader::new(file), options)
    }
}

impl<R: Read + Seek> BsigReader<R> {
    /// Parses header, footer and both tables; no sample data is touched.
    pub fn from_reader(mut source: R, options: ReaderOptions) -> Result<Self> {
        let header = Self::read_header(&mut source)?;

        let file_size = source.seek(SeekFrom::End(0))?;
        if file_size < (HEADER_SIZE + FOOTER_SIZE) as u64 {
            return Err(BsigError::TruncatedFile(format!(
                "{} bytes is too short for header and footer",
                file_size
            )));
        }

        let footer = Self::read_footer(&mut source, file_size)?;

        let footer_start = file_size - FOOTER_SIZE as u64;
        let tables_len = footer.descriptor_table_len as u64 + footer.offset_table_len as u64;
        if tables_len > footer_start - HEADER_SIZE as u64 {
            return Err(BsigError::TruncatedFile(format!(
                "tables of {} bytes do not fit before the footer at {}",
                tables_len, footer_start
            )));
        }
        let descriptor_start = footer_start - footer.descriptor_table_len as u64;
        let data_end = descriptor_start - footer.offset_table_len as u64;

        let descriptor_bytes = Self::read_region(
            &mut source,
            descriptor_start,
            footer.descriptor_table_len as usize,
        )?;
        let offset_bytes =
            Self::read_region(&mut source, data_end, footer.offset_table_len as usize)?;

        let mut signals = Self::parse_descriptors(&descriptor_bytes, footer.signal_count)?;
        Self::parse_offsets(&offset_bytes, header.version, data_end, &mut signals)?;

        let mut lookup = HashMap::with_capacity(signals.len());
        for (idx, sig) in signals.iter().enumerate() {
            lookup
                .entry(Self::lookup_key(&options, &sig.name))
                .or_insert(idx);
        }

        debug!(
            "bsig v{}: {} signals, block size {}, compression {:?}",
            header.version as u8,
            signals.len(),
            footer.block_size,
            footer.compression
        );

        Ok(Self {
            source: Mutex::new(source),
            options,
            header,
            footer,
            data_end,
            signals,
            lookup,
        })
    }

    fn read_header(source: &mut R) -> Result<FileHeader> {
        let mut prefix = [0u8; HEADER_SIZE];
        source.seek(SeekFrom::Start(0))?;
        source.read_exact(&mut prefix).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                BsigError::NotABsigFile("shorter than the 8 byte header".to_string())
            }
            _ => e.into(),
        })?;

        if &prefix[0..4] != MAGIC {
            return Err(BsigError::NotABsigFile(format!(
                "expected magic {:?}, got {:?}",
                MAGIC,
                &prefix[0..4]
            )));
        }

        let version = FormatVersion::from_u8(prefix[4]).ok_or_else(|| {
            BsigError::NotABsigFile(format!("unknown format version {}", prefix[4]))
        })?;
        Ok(FileHeader { version })
    }

    fn read_footer(source: &mut R, file_size: u64) -> Result<FileFooter> {
        source.seek(SeekFrom::Start(file_size - FOOTER_SIZE as u64))?;
        let mut raw = [0u8; FOOTER_SIZE];
        source.read_exact(&mut raw)?;

        if &raw[20..24] != FOOTER_MAGIC {
            return Err(BsigError::TruncatedFile(format!(
                "expected footer magic {:?}, got {:?}",
                FOOTER_MAGIC,
                &raw[20..24]
            )));
        }

        let mut cursor = ByteCursor::new(&raw, "footer");
        let signal_count = cursor.read_u32()?;
        let block_size = cursor.read_u32()?;
        let descriptor_table_len = cursor.read_u32()?;
        let offset_table_len = cursor.read_u32()?;
        let flag = raw[19];
        let compression =
            CompressionType::from_u8(flag).ok_or(BsigError::UnsupportedCompression(flag))?;

        if block_size == 0 {
            return Err(BsigError::TruncatedFile("footer block size is zero".to_string()));
        }

        Ok(FileFooter {
            signal_count,
            block_size,
            descriptor_table_len,
            offset_table_len,
            compression,
        })
    }

    fn read_region(source: &mut R, start: u64, len: usize) -> Result<Vec<u8>> {
        source.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; len];
        source.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn parse_descriptors(buf: &[u8], count: u32) -> Result<Vec<SignalDescriptor>> {
        let mut cursor = ByteCursor::new(buf, "descriptor table");
        let mut signals = Vec::with_capacity(count.min(1 << 16) as usize);
        for _ in 0..count {
            let name_len = cursor.read_u16()? as usize;
            let name = String::from_utf8(cursor.read_bytes(name_len)?.to_vec())?;
            let array_length = cursor.read_u32()?;
            let type_code = cursor.read_u32()?;
            let dtype = DType::from_type_code(type_code).ok_or_else(|| {
                BsigError::UnsupportedDtype(format!("type code {:#06x} of {}", type_code, name))
            })?;
            signals.push(SignalDescriptor {
                name,
                dtype,
                array_length,
                sample_count: 0,
                block_offsets: Vec::new(),
            });
        }
        Ok(signals)
    }

    fn parse_offsets(
        buf: &[u8],
        version: FormatVersion,
        data_end: u64,
        signals: &mut [SignalDescriptor],
    ) -> Result<()> {
        let mut cursor = ByteCursor::new(buf, "offset table");
        for sig in signals.iter_mut() {
            let block_count = cursor.read_u32()? as usize;
            sig.sample_count = cursor.read_u32()?;
            if block_count * version.offset_width() > cursor.remaining() {
                return Err(BsigError::TruncatedFile(format!(
                    "offset table too short for {} blocks of {}",
                    block_count, sig.name
                )));
            }
            let mut offsets = Vec::with_capacity(block_count);
            for _ in 0..block_count {
                let offset = cursor.read_offset(version)?;
                if offset < HEADER_SIZE as u64 || offset >= data_end {
                    return Err(BsigError::TruncatedFile(format!(
                        "block offset {} of {} lies outside the block stream",
                        offset, sig.name
                    )));
                }
                offsets.push(offset);
            }
            sig.block_offsets = offsets;
        }
        Ok(())
    }

    fn lookup_key(options: &ReaderOptions, name: &str) -> String {
        if options.case_sensitive {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        }
    }
}

impl<R> BsigReader<R> {
    pub fn version(&self) -> FormatVersion {
        self.header.version
    }

    pub fn block_size(&self) -> u32 {
        self.footer.block_size
    }

    pub fn is_compressed(&self) -> bool {
        self.footer.compression == CompressionType::Zlib
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Signal names in the order they were written.
    pub fn list_signal_names(&self) -> Vec<&str> {
        self.signals.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn signals(&self) -> &[SignalDescriptor] {
        &self.signals
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptor(name).is_some()
    }

    pub fn descriptor(&self, name: &str) -> Option<&SignalDescriptor> {
        let key = if self.options.case_sensitive {
            self.lookup.get(name)
        } else {
            self.lookup.get(&name.to_ascii_lowercase())
        };
        key.map(|&idx| &self.signals[idx])
    }

    /// Number of samples (rows) of a signal.
    pub fn signal_length(&self, name: &str) -> Result<usize> {
        Ok(self.require(name)?.sample_count as usize)
    }

    /// Replaces every pattern containing `*` by the matching names in file
    /// order; other entries are passed through unchanged.
    pub fn expand_names(&self, patterns: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        for pattern in patterns {
            if pattern.contains('*') {
                out.extend(
                    self.signals
                        .iter()
                        .filter(|s| wildcard_match(pattern, &s.name, self.options.case_sensitive))
                        .map(|s| s.name.clone()),
                );
            } else {
                out.push(pattern.to_string());
            }
        }
        out
    }

    fn require(&self, name: &str) -> Result<&SignalDescriptor> {
        self.descriptor(name)
            .ok_or_else(|| BsigError::UnknownSignal(name.to_string()))
    }
}

impl<R: Read + Seek> BsigReader<R> {
    /// Reads and decompresses the whole signal.
    pub fn read(&self, name: &str) -> Result<SignalArray> {
        let sig = self.require(name)?;
        self.read_samples(sig, 0, sig.sample_count as usize)
    }

    pub fn read_index(&self, idx: usize) -> Result<SignalArray> {
        let sig = self
            .signals
            .get(idx)
            .ok_or_else(|| BsigError::UnknownSignal(format!("#{}", idx)))?;
        self.read_samples(sig, 0, sig.sample_count as usize)
    }

    pub fn read_many(&self, names: &[&str]) -> Result<Vec<SignalArray>> {
        names.iter().map(|name| self.read(name)).collect()
    }

    /// Reads `count` samples starting at `offset`; a negative offset counts
    /// from the end and `None` reads to the end. Only the covering blocks
    /// are decompressed.
    pub fn read_range(&self, name: &str, offset: i64, count: Option<usize>) -> Result<SignalArray> {
        let sig = self.require(name)?;
        let window = sample_window(&sig.name, offset, count, sig.sample_count as usize)?;
        self.read_samples(sig, window.start, window.end)
    }

    /// Pairs a scalar signal with `time_signal` and keeps samples whose
    /// timestamp lies in `start..=end`.
    pub fn read_time_range(
        &self,
        name: &str,
        time_signal: &str,
        start: f64,
        end: f64,
    ) -> Result<TimeSeries> {
        let (timestamps, values) = self.read_with_time(name, time_signal)?;
        Ok(filter_time_range(timestamps, values, start, end))
    }

    /// Like [`read_time_range`](Self::read_time_range) with bounds taken from
    /// a play-list section; relative bounds count from the first timestamp.
    pub fn read_section(&self, name: &str, time_signal: &str, section: &Section) -> Result<TimeSeries> {
        let (timestamps, values) = self.read_with_time(name, time_signal)?;
        let first_ts = timestamps.first().copied().unwrap_or(0.0);
        let (start, end) = section.resolve(first_ts);
        Ok(filter_time_range(timestamps, values, start, end))
    }

    fn read_with_time(&self, name: &str, time_signal: &str) -> Result<(Vec<f64>, Vec<f64>)> {
        let sig = self.require(name)?;
        if sig.array_length > 1 {
            return Err(BsigError::InvalidShape(format!(
                "{} is an array signal with {} slots",
                sig.name, sig.array_length
            )));
        }
        let values = self.read(name)?.values().to_f64_vec();
        let timestamps = self.read(time_signal)?.values().to_f64_vec();
        if timestamps.len() != values.len() {
            return Err(BsigError::InvalidShape(format!(
                "{} has {} samples but {} has {}",
                name,
                values.len(),
                time_signal,
                timestamps.len()
            )));
        }
        Ok((timestamps, values))
    }

    fn read_samples(&self, sig: &SignalDescriptor, start: usize, end: usize) -> Result<SignalArray> {
        let width = sig.array_length as usize;
        if start == end || width == 0 {
            return Ok(SignalArray::empty(sig.dtype));
        }

        let item_size = sig.dtype.item_size();
        let per_block = (self.footer.block_size as usize / item_size).max(1);
        let total = sig.element_count();
        let expected_blocks = total.div_ceil(per_block);
        if sig.block_offsets.len() != expected_blocks {
            return Err(self.corrupt(
                sig,
                sig.block_offsets.len().min(expected_blocks),
                format!(
                    "{} elements need {} blocks, table lists {}",
                    total,
                    expected_blocks,
                    sig.block_offsets.len()
                ),
            ));
        }

        let first_elem = start * width;
        let end_elem = end * width;
        let first_block = first_elem / per_block;
        let last_block = end_elem.div_ceil(per_block);

        let mut parts = Vec::with_capacity(last_block - first_block);
        for block in first_block..last_block {
            let items = per_block.min(total - block * per_block);
            let raw = self.read_block(sig, block, items * item_size)?;
            parts.push(Values::from_le_bytes(sig.dtype, &raw)?);
        }

        let values = concat(sig.dtype, parts)?;
        let skip = first_elem - first_block * per_block;
        let wanted = values.slice(skip, skip + (end - start) * width);
        Ok(SignalArray::from_parts(wanted, width))
    }

    fn read_block(&self, sig: &SignalDescriptor, block: usize, expected_len: usize) -> Result<Vec<u8>> {
        let offset = sig.block_offsets[block];
        let mut source = self.source.lock().unwrap_or_else(|e| e.into_inner());
        source.seek(SeekFrom::Start(offset))?;

        let raw = match self.footer.compression {
            CompressionType::Zlib => {
                let mut len_buf = [0u8; BLOCK_PREFIX_SIZE];
                source.read_exact(&mut len_buf)?;
                let compressed_len = u32::from_le_bytes(len_buf) as u64;
                if offset + BLOCK_PREFIX_SIZE as u64 + compressed_len > self.data_end {
                    return Err(BsigError::TruncatedFile(format!(
                        "block {} of {} ({} bytes at {}) runs past the block stream",
                        block, sig.name, compressed_len, offset
                    )));
                }
                let mut compressed = vec![0u8; compressed_len as usize];
                source.read_exact(&mut compressed)?;
                decompress_block(&compressed, expected_len)
                    .map_err(|e| self.corrupt(sig, block, e.to_string()))?
            }
            CompressionType::None => {
                if offset + expected_len as u64 > self.data_end {
                    return Err(BsigError::TruncatedFile(format!(
                        "block {} of {} ({} bytes at {}) runs past the block stream",
                        block, sig.name, expected_len, offset
                    )));
                }
                let mut raw = vec![0u8; expected_len];
                source.read_exact(&mut raw)?;
                raw
            }
        };

        if raw.len() != expected_len {
            return Err(self.corrupt(
                sig,
                block,
                format!("expected {} bytes, got {}", expected_len, raw.len()),
            ));
        }
        Ok(raw)
    }

    fn corrupt(&self, sig: &SignalDescriptor, block: usize, reason: String) -> BsigError {
        BsigError::CorruptSignalData {
            signal: sig.name.clone(),
            block,
            reason,
        }
    }
}

fn filter_time_range(timestamps: Vec<f64>, values: Vec<f64>, start: f64, end: f64) -> TimeSeries {
    let mut result = TimeSeries::with_capacity(timestamps.len());
    for (ts, val) in timestamps.into_iter().zip(values) {
        if ts >= start && ts <= end {
            result.timestamps.push(ts);
            result.values.push(val);
        }
    }
    result
}

fn wildcard_match(pattern: &str, name: &str, case_sensitive: bool) -> bool {
    let (pattern, name) = if case_sensitive {
        (pattern.to_string(), name.to_string())
    } else {
        (pattern.to_ascii_lowercase(), name.to_ascii_lowercase())
    };

    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return name.is_empty(),
    };
    if !name.starts_with(first) {
        return false;
    }
    let mut remaining = &name[first.len()..];
    let last = rest.len().saturating_sub(1);
    for (i, part) in rest.iter().enumerate() {
        if i == last {
            return remaining.len() >= part.len() && remaining.ends_with(part);
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }
    remaining.is_empty()
}

/// Resolves `offset`/`count` against a signal of `len` samples. A negative
/// offset counts from the end, `None` runs to the end.
pub(crate) fn sample_window(
    name: &str,
    offset: i64,
    count: Option<usize>,
    len: usize,
) -> Result<Range<usize>> {
    let out_of_bounds = || BsigError::RangeOutOfBounds {
        signal: name.to_string(),
        offset,
        count: count.unwrap_or(0),
        len,
    };

    let start = if offset < 0 {
        len.checked_sub(offset.unsigned_abs() as usize)
            .ok_or_else(out_of_bounds)?
    } else {
        offset as usize
    };
    if start > len {
        return Err(out_of_bounds());
    }
    let end = match count {
        Some(n) => start.checked_add(n).filter(|&e| e <= len).ok_or_else(out_of_bounds)?,
        None => len,
    };
    Ok(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::writer::{BsigWriter, WriterConfig};
    use std::io::Cursor;

    fn write_file(config: WriterConfig, signals: Vec<(&str, SignalArray)>) -> Vec<u8> {
        let mut writer = BsigWriter::new(Vec::new(), config).unwrap();
        writer.append_many(signals).unwrap();
        writer.finish().unwrap()
    }

    fn open(bytes: Vec<u8>) -> BsigReader<Cursor<Vec<u8>>> {
        BsigReader::from_reader(Cursor::new(bytes), ReaderOptions::default()).unwrap()
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("MTS.*", "MTS.Package.TimeStamp", true));
        assert!(wildcard_match("*Stamp", "MTS.Package.TimeStamp", true));
        assert!(wildcard_match("MTS.*.Time*", "MTS.Package.TimeStamp", true));
        assert!(wildcard_match("*", "anything", true));
        assert!(!wildcard_match("mts.*", "MTS.Package", true));
        assert!(wildcard_match("mts.*", "MTS.Package", false));
        assert!(!wildcard_match("a*b", "ab_c", true));
        assert!(!wildcard_match("ab*ab", "ab", true));
    }

    #[test]
    fn test_open_reads_tables_only() {
        let bytes = write_file(
            WriterConfig::default().with_block_size(256),
            vec![
                ("a", SignalArray::scalar((0..1000u32).collect::<Vec<_>>())),
                ("b", SignalArray::from_rows(&[vec![1i8, 2], vec![3, 4]]).unwrap()),
            ],
        );
        let reader = open(bytes);
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.block_size(), 256);
        assert!(reader.is_compressed());
        let a = reader.descriptor("a").unwrap();
        assert_eq!(a.sample_count, 1000);
        assert_eq!(a.array_length, 1);
        assert_eq!(a.dtype, DType::U32);
        assert_eq!(a.block_offsets.len(), 16);
        let b = reader.descriptor("b").unwrap();
        assert_eq!((b.sample_count, b.array_length), (2, 2));
    }

    #[test]
    fn test_read_range_crosses_blocks() {
        let data: Vec<i16> = (0..1000).collect();
        let bytes = write_file(
            WriterConfig::default().with_block_size(256),
            vec![("ramp", SignalArray::scalar(data.clone()))],
        );
        let reader = open(bytes);

        let mid = reader.read_range("ramp", 120, Some(300)).unwrap();
        assert_eq!(mid.as_slice::<i16>().unwrap(), &data[120..420]);

        let tail = reader.read_range("ramp", -5, None).unwrap();
        assert_eq!(tail.as_slice::<i16>().unwrap(), &data[995..]);

        let none = reader.read_range("ramp", 1000, None).unwrap();
        assert!(none.is_empty());

        assert!(matches!(
            reader.read_range("ramp", 990, Some(20)),
            Err(BsigError::RangeOutOfBounds { .. })
        ));
        assert!(matches!(
            reader.read_range("ramp", -1001, None),
            Err(BsigError::RangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_read_range_of_array_signal() {
        let rows: Vec<Vec<u16>> = (0..200u16).map(|i| vec![i, i + 1000, i + 2000]).collect();
        let bytes = write_file(
            WriterConfig::default().with_block_size(256),
            vec![("objects", SignalArray::from_rows(&rows).unwrap())],
        );
        let reader = open(bytes);
        let part = reader.read_range("objects", 50, Some(3)).unwrap();
        assert_eq!(part.shape(), (3, 3));
        assert_eq!(
            part.as_slice::<u16>().unwrap(),
            &[50, 1050, 2050, 51, 1051, 2051, 52, 1052, 2052]
        );
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let bytes = write_file(
            WriterConfig::default(),
            vec![("MTS.Package.TimeStamp", SignalArray::scalar(vec![1u64, 2]))],
        );
        let strict = open(bytes.clone());
        assert!(strict.read("mts.package.timestamp").is_err());

        let relaxed = BsigReader::from_reader(
            Cursor::new(bytes),
            ReaderOptions {
                case_sensitive: false,
            },
        )
        .unwrap();
        let ts = relaxed.read("mts.package.timestamp").unwrap();
        assert_eq!(ts.as_slice::<u64>().unwrap(), &[1, 2]);
        assert_eq!(relaxed.expand_names(&["mts.*"]), vec!["MTS.Package.TimeStamp"]);
    }

    #[test]
    fn test_read_index_and_many() {
        let bytes = write_file(
            WriterConfig::default(),
            vec![
                ("x", SignalArray::scalar(vec![1.5f32])),
                ("y", SignalArray::scalar(vec![2.5f64])),
            ],
        );
        let reader = open(bytes);
        assert_eq!(reader.read_index(1).unwrap().as_slice::<f64>().unwrap(), &[2.5]);
        assert!(matches!(reader.read_index(2), Err(BsigError::UnknownSignal(_))));
        let both = reader.read_many(&["y", "x"]).unwrap();
        assert_eq!(both[0].dtype(), DType::F64);
        assert_eq!(both[1].dtype(), DType::F32);
        assert_eq!(reader.signal_length("x").unwrap(), 1);
        assert!(matches!(
            reader.signal_length("z"),
            Err(BsigError::UnknownSignal(_))
        ));
    }

    #[test]
    fn test_uncompressed_blocks() {
        // Hand-built v2 file with compression flag 0: one u16 signal of 3 samples
        let mut bytes = b"BSIG\x02\x00\x00\x00".to_vec();
        for v in [10u16, 20, 30] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut offsets = Vec::new();
        offsets.extend_from_slice(&1u32.to_le_bytes());
        offsets.extend_from_slice(&3u32.to_le_bytes());
        offsets.extend_from_slice(&8u32.to_le_bytes());
        let mut desc = Vec::new();
        desc.extend_from_slice(&3u16.to_le_bytes());
        desc.extend_from_slice(b"raw");
        desc.extend_from_slice(&1u32.to_le_bytes());
        desc.extend_from_slice(&DType::U16.type_code().to_le_bytes());
        bytes.extend_from_slice(&offsets);
        bytes.extend_from_slice(&desc);
        for field in [1u32, 256, desc.len() as u32, offsets.len() as u32] {
            bytes.extend_from_slice(&field.to_le_bytes());
        }
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"BIN\0");

        let reader = open(bytes);
        assert!(!reader.is_compressed());
        assert_eq!(reader.version(), FormatVersion::V2);
        assert_eq!(reader.read("raw").unwrap().as_slice::<u16>().unwrap(), &[10, 20, 30]);
    }

    // v3, block size 256, written field by field with Python's struct and
    // zlib.compress: "speed" int16 [1, -2, 300, -32768] in one block and
    // "Time stamp" int64 [0, 1000, .., 39000] in two blocks.
    const LEGACY_V3_FILE: [u8; 298] = [
        0x42, 0x53, 0x49, 0x47, 0x03, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x78, 0x9c, 0x63,
        0x64, 0xf8, 0xf7, 0x5f, 0x87, 0x91, 0xa1, 0x01, 0x00, 0x0c, 0x32, 0x02, 0xac, 0x7d, 0x00,
        0x00, 0x00, 0x78, 0x9c, 0x63, 0x60, 0x80, 0x80, 0x17, 0xcc, 0x10, 0xfa, 0x02, 0x3b, 0x84,
        0xde, 0xc1, 0x0d, 0xa1, 0x17, 0xf0, 0x43, 0xe8, 0x0e, 0x61, 0x08, 0x5d, 0x20, 0x0e, 0xa1,
        0x23, 0xa4, 0x21, 0xb4, 0x83, 0x3c, 0x84, 0xd6, 0x50, 0x86, 0xd0, 0x02, 0xea, 0x10, 0xfa,
        0x87, 0x16, 0x84, 0x7e, 0xa0, 0x07, 0xa1, 0x4f, 0x18, 0x41, 0xe8, 0x0d, 0x66, 0x10, 0x7a,
        0x86, 0x15, 0x84, 0x6e, 0xb0, 0x83, 0xd0, 0x19, 0x4e, 0x10, 0x3a, 0xc0, 0x0d, 0x42, 0x5b,
        0x78, 0x41, 0x68, 0x05, 0x3f, 0x08, 0xcd, 0x11, 0x04, 0xa1, 0x3f, 0x84, 0x42, 0xe8, 0x1b,
        0x91, 0x10, 0xfa, 0x40, 0x2c, 0x84, 0x5e, 0x91, 0x08, 0xa1, 0x27, 0xa4, 0x42, 0xe8, 0x8a,
        0x4c, 0x08, 0x9d, 0x90, 0x0b, 0xa1, 0x3d, 0x0a, 0x21, 0xb4, 0x41, 0x29, 0x84, 0x96, 0xa8,
        0x84, 0xd0, 0x00, 0xff, 0xa4, 0x17, 0x03, 0x26, 0x00, 0x00, 0x00, 0x78, 0x9c, 0x63, 0xa8,
        0x65, 0x00, 0x83, 0x17, 0x0d, 0x10, 0xfa, 0x42, 0x0b, 0x84, 0xde, 0xd1, 0x01, 0xa1, 0x17,
        0xf4, 0x40, 0xe8, 0x8e, 0x09, 0x10, 0xba, 0x60, 0x0a, 0x84, 0x8e, 0x98, 0x01, 0xa1, 0x01,
        0x33, 0x3e, 0x08, 0xb2, 0x01, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00, 0x1c, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x9d, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05,
        0x00, 0x73, 0x70, 0x65, 0x65, 0x64, 0x01, 0x00, 0x00, 0x00, 0x10, 0x80, 0x00, 0x00, 0x0a,
        0x00, 0x54, 0x69, 0x6d, 0x65, 0x20, 0x73, 0x74, 0x61, 0x6d, 0x70, 0x01, 0x00, 0x00, 0x00,
        0x40, 0x80, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x23, 0x00, 0x00,
        0x00, 0x28, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x42, 0x49, 0x4e, 0x00,
    ];

    #[test]
    fn test_reads_legacy_zlib_file() {
        let reader = open(LEGACY_V3_FILE.to_vec());
        assert!(reader.is_compressed());
        assert_eq!(reader.version(), FormatVersion::V3);
        assert_eq!(reader.block_size(), 256);
        assert_eq!(reader.list_signal_names(), vec!["speed", "Time stamp"]);

        let speed = reader.read("speed").unwrap();
        assert_eq!(speed.dtype(), DType::I16);
        assert_eq!(speed.as_slice::<i16>().unwrap(), &[1, -2, 300, -32768]);

        let ts = reader.descriptor("Time stamp").unwrap();
        assert_eq!(ts.block_offsets, vec![28, 157]);
        assert_eq!(ts.sample_count, 40);
        let expected: Vec<i64> = (0..40).map(|i| i * 1000).collect();
        let all = reader.read("Time stamp").unwrap();
        assert_eq!(all.as_slice::<i64>().unwrap(), expected.as_slice());

        let tail = reader.read_range("Time stamp", 30, Some(4)).unwrap();
        assert_eq!(tail.as_slice::<i64>().unwrap(), &[30_000, 31_000, 32_000, 33_000]);
    }

    #[test]
    fn test_offset_outside_stream_rejected() {
        let mut bytes = write_file(
            WriterConfig::default(),
            vec![("a", SignalArray::scalar(vec![1u8, 2, 3]))],
        );
        let len = bytes.len();
        let desc_len = 2 + 1 + 4 + 4;
        let offset_table = len - FOOTER_SIZE - desc_len - 16;
        // first block offset of signal "a"
        bytes[offset_table + 8..offset_table + 16].copy_from_slice(&(len as u64).to_le_bytes());
        let err = BsigReader::from_reader(Cursor::new(bytes), ReaderOptions::default()).err();
        assert!(matches!(err, Some(BsigError::TruncatedFile(_))));
    }
}
