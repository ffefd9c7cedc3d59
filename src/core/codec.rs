// Block codec: primitive packing and zlib block compression

use crate::core::constants::FormatVersion;
use crate::core::dtype::Element;
use crate::core::error::{BsigError, Result};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

/// Packs values as little-endian fixed-width primitives.
///
/// Values are already of their declared type here, so there is nothing to
/// range-check; narrowing from untyped input happens in `Values::try_from_i64`.
pub fn pack_values<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::DTYPE.item_size());
    for v in values {
        v.write_le(&mut out);
    }
    out
}

/// Raw character data (magics, names) is written verbatim.
pub fn pack_chars(out: &mut Vec<u8>, chars: &[u8]) {
    out.extend_from_slice(chars);
}

pub fn unpack_values<T: Element>(bytes: &[u8]) -> Result<Vec<T>> {
    let size = T::DTYPE.item_size();
    if bytes.len() % size != 0 {
        return Err(BsigError::CorruptBlock(format!(
            "{} bytes is not a multiple of the {} item size",
            bytes.len(),
            T::DTYPE
        )));
    }
    Ok(bytes.chunks_exact(size).map(T::read_le).collect())
}

pub fn compress_block(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

/// Inflates one zlib stream that must decode to exactly `expected_len` bytes.
///
/// The output never grows past `expected_len + 1` bytes, so a hostile block
/// cannot inflate beyond its declared size. The stream must be complete and
/// checksum-valid.
pub fn decompress_block(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(expected_len + 1);

    loop {
        let (before_in, before_out) = (inflater.total_in(), inflater.total_out());
        let consumed = before_in as usize;

        let status = inflater
            .decompress_vec(&data[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| BsigError::CorruptBlock(format!("Zlib: {}", e)))?;

        if out.len() > expected_len {
            return Err(BsigError::CorruptBlock(format!(
                "Zlib: inflates past the expected {} bytes",
                expected_len
            )));
        }
        if status == Status::StreamEnd {
            break;
        }
        if inflater.total_in() == before_in && inflater.total_out() == before_out {
            return Err(BsigError::CorruptBlock(
                "Zlib: stream ends before its final block".to_string(),
            ));
        }
    }

    if out.len() != expected_len {
        return Err(BsigError::CorruptBlock(format!(
            "Zlib: expected {} bytes, got {}",
            expected_len,
            out.len()
        )));
    }
    Ok(out)
}

pub fn write_u16(out: &mut Vec<u8>, val: u16) {
    out.extend_from_slice(&val.to_le_bytes());
}

pub fn write_u32(out: &mut Vec<u8>, val: u32) {
    out.extend_from_slice(&val.to_le_bytes());
}

/// The only place where the offset width of a format version matters on write.
pub fn write_offset(out: &mut Vec<u8>, version: FormatVersion, offset: u64) -> Result<()> {
    match version {
        FormatVersion::V2 => {
            let narrow = u32::try_from(offset).map_err(|_| BsigError::OffsetOverflow(offset))?;
            write_u32(out, narrow);
        }
        FormatVersion::V3 => out.extend_from_slice(&offset.to_le_bytes()),
    }
    Ok(())
}

/// Bounds-checked little-endian reader over an in-memory table.
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, pos: 0, what }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(BsigError::TruncatedFile(format!(
                "{} ends after {} bytes, needed {} more",
                self.what,
                self.pos,
                n
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.read_bytes(N)?);
        Ok(arr)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Counterpart of [`write_offset`].
    pub fn read_offset(&mut self, version: FormatVersion) -> Result<u64> {
        match version {
            FormatVersion::V2 => self.read_u32().map(u64::from),
            FormatVersion::V3 => self.read_u64(),
        }
    }
}
