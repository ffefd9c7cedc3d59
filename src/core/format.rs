// Data structures for the bsig format

use crate::core::codec::{pack_values, unpack_values};
use crate::core::constants::{CompressionType, FormatVersion};
use crate::core::dtype::{DType, Element};
use crate::core::error::{BsigError, Result};

/// Flat, typed storage for the elements of one signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Runs `$body` with `$v` bound to the inner `Vec` of whatever variant `$values` is.
macro_rules! with_values {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            Values::U8($v) => $body,
            Values::I8($v) => $body,
            Values::U16($v) => $body,
            Values::I16($v) => $body,
            Values::U32($v) => $body,
            Values::I32($v) => $body,
            Values::U64($v) => $body,
            Values::I64($v) => $body,
            Values::F32($v) => $body,
            Values::F64($v) => $body,
        }
    };
}

pub(crate) use with_values;

// 2^63, the first f64 above every i64
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// `v` as a float only when converting back gives `v` again.
fn exact_f64(v: i64) -> Option<f64> {
    let f = v as f64;
    (f < I64_LIMIT && f as i64 == v).then_some(f)
}

fn exact_f32(v: i64) -> Option<f32> {
    let f = v as f32;
    ((f as f64) < I64_LIMIT && f as i64 == v).then_some(f)
}

fn checked<T, F>(dtype: DType, values: &[i64], convert: F) -> Result<Vec<T>>
where
    F: Fn(i64) -> Option<T>,
{
    values
        .iter()
        .map(|&v| {
            convert(v).ok_or(BsigError::ValueOutOfRange {
                dtype: dtype.name(),
                value: v,
            })
        })
        .collect()
}

impl Values {
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::U8 => Values::U8(Vec::new()),
            DType::I8 => Values::I8(Vec::new()),
            DType::U16 => Values::U16(Vec::new()),
            DType::I16 => Values::I16(Vec::new()),
            DType::U32 => Values::U32(Vec::new()),
            DType::I32 => Values::I32(Vec::new()),
            DType::U64 => Values::U64(Vec::new()),
            DType::I64 => Values::I64(Vec::new()),
            DType::F32 => Values::F32(Vec::new()),
            DType::F64 => Values::F64(Vec::new()),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Values::U8(_) => DType::U8,
            Values::I8(_) => DType::I8,
            Values::U16(_) => DType::U16,
            Values::I16(_) => DType::I16,
            Values::U32(_) => DType::U32,
            Values::I32(_) => DType::I32,
            Values::U64(_) => DType::U64,
            Values::I64(_) => DType::I64,
            Values::F32(_) => DType::F32,
            Values::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        with_values!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice_of(self)
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        with_values!(self, v => v.iter().map(|x| x.to_f64()).collect())
    }

    /// Little-endian bytes of the elements in `start..end`.
    pub fn le_bytes(&self, start: usize, end: usize) -> Vec<u8> {
        with_values!(self, v => pack_values(&v[start..end]))
    }

    /// Decodes little-endian bytes; a length that is not a whole number of
    /// elements fails with `CorruptBlock`.
    pub fn from_le_bytes(dtype: DType, bytes: &[u8]) -> Result<Self> {
        Ok(match dtype {
            DType::U8 => Values::U8(unpack_values(bytes)?),
            DType::I8 => Values::I8(unpack_values(bytes)?),
            DType::U16 => Values::U16(unpack_values(bytes)?),
            DType::I16 => Values::I16(unpack_values(bytes)?),
            DType::U32 => Values::U32(unpack_values(bytes)?),
            DType::I32 => Values::I32(unpack_values(bytes)?),
            DType::U64 => Values::U64(unpack_values(bytes)?),
            DType::I64 => Values::I64(unpack_values(bytes)?),
            DType::F32 => Values::F32(unpack_values(bytes)?),
            DType::F64 => Values::F64(unpack_values(bytes)?),
        })
    }

    /// Builds values of `dtype` from untyped integers, rejecting anything the
    /// target type cannot represent exactly. Floats reject integers they
    /// would round.
    pub fn try_from_i64(dtype: DType, values: &[i64]) -> Result<Self> {
        Ok(match dtype {
            DType::U8 => Values::U8(checked(dtype, values, |v| u8::try_from(v).ok())?),
            DType::I8 => Values::I8(checked(dtype, values, |v| i8::try_from(v).ok())?),
            DType::U16 => Values::U16(checked(dtype, values, |v| u16::try_from(v).ok())?),
            DType::I16 => Values::I16(checked(dtype, values, |v| i16::try_from(v).ok())?),
            DType::U32 => Values::U32(checked(dtype, values, |v| u32::try_from(v).ok())?),
            DType::I32 => Values::I32(checked(dtype, values, |v| i32::try_from(v).ok())?),
            DType::U64 => Values::U64(checked(dtype, values, |v| u64::try_from(v).ok())?),
            DType::I64 => Values::I64(values.to_vec()),
            DType::F32 => Values::F32(checked(dtype, values, exact_f32)?),
            DType::F64 => Values::F64(checked(dtype, values, exact_f64)?),
        })
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> Values {
        with_values!(self, v => Values::from(v[start..end].to_vec()))
    }

    fn extend_from(&mut self, other: Values) -> Result<()> {
        let dtype = self.dtype();
        match (self, other) {
            (Values::U8(a), Values::U8(b)) => a.extend(b),
            (Values::I8(a), Values::I8(b)) => a.extend(b),
            (Values::U16(a), Values::U16(b)) => a.extend(b),
            (Values::I16(a), Values::I16(b)) => a.extend(b),
            (Values::U32(a), Values::U32(b)) => a.extend(b),
            (Values::I32(a), Values::I32(b)) => a.extend(b),
            (Values::U64(a), Values::U64(b)) => a.extend(b),
            (Values::I64(a), Values::I64(b)) => a.extend(b),
            (Values::F32(a), Values::F32(b)) => a.extend(b),
            (Values::F64(a), Values::F64(b)) => a.extend(b),
            (_, b) => {
                return Err(BsigError::InvalidShape(format!(
                    "cannot append {} values to {} values",
                    b.dtype(),
                    dtype
                )))
            }
        }
        Ok(())
    }
}

impl<T: Element> From<Vec<T>> for Values {
    fn from(values: Vec<T>) -> Self {
        T::into_values(values)
    }
}

/// A signal's samples: flat values plus the number of elements per sample.
///
/// Scalar signals have `array_length == 1`, array signals store their rows
/// row-major. A signal without samples has `array_length == 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalArray {
    values: Values,
    array_length: usize,
}

impl SignalArray {
    pub fn scalar(values: impl Into<Values>) -> Self {
        let values = values.into();
        let array_length = usize::from(!values.is_empty());
        Self {
            values,
            array_length,
        }
    }

    pub fn from_flat(values: impl Into<Values>, array_length: usize) -> Result<Self> {
        let values = values.into();
        if values.is_empty() {
            return Ok(Self {
                values,
                array_length: 0,
            });
        }
        if array_length == 0 || values.len() % array_length != 0 {
            return Err(BsigError::InvalidShape(format!(
                "{} elements cannot be split into rows of {}",
                values.len(),
                array_length
            )));
        }
        Ok(Self {
            values,
            array_length,
        })
    }

    pub fn from_rows<T: Element>(rows: &[Vec<T>]) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(BsigError::InvalidShape(format!(
                "row {} has {} elements, expected {}",
                bad,
                rows[bad].len(),
                width
            )));
        }
        if !rows.is_empty() && width == 0 {
            return Err(BsigError::InvalidShape(
                "array samples need at least one element".to_string(),
            ));
        }
        let flat: Vec<T> = rows.iter().flatten().copied().collect();
        Self::from_flat(flat, width)
    }

    pub fn empty(dtype: DType) -> Self {
        Self {
            values: Values::empty(dtype),
            array_length: 0,
        }
    }

    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    pub fn array_length(&self) -> usize {
        self.array_length
    }

    pub fn sample_count(&self) -> usize {
        if self.array_length == 0 {
            0
        } else {
            self.values.len() / self.array_length
        }
    }

    /// `(sample_count, array_length)`
    pub fn shape(&self) -> (usize, usize) {
        (self.sample_count(), self.array_length)
    }

    pub fn is_array(&self) -> bool {
        self.array_length > 1
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn into_values(self) -> Values {
        self.values
    }

    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        self.values.as_slice()
    }

    pub fn rows<T: Element>(&self) -> Option<std::slice::ChunksExact<'_, T>> {
        let width = self.array_length.max(1);
        self.as_slice::<T>().map(|s| s.chunks_exact(width))
    }

    /// One array slot across all samples, widened to f64.
    pub fn column_f64(&self, slot: usize) -> Option<Vec<f64>> {
        if slot >= self.array_length {
            return None;
        }
        let width = self.array_length;
        Some(with_values!(&self.values, v => v
            .iter()
            .skip(slot)
            .step_by(width)
            .map(|x| x.to_f64())
            .collect()))
    }

    pub(crate) fn from_parts(values: Values, array_length: usize) -> Self {
        Self {
            values,
            array_length,
        }
    }
}

impl<T: Element> From<Vec<T>> for SignalArray {
    fn from(values: Vec<T>) -> Self {
        SignalArray::scalar(values)
    }
}

impl<T: Element> From<&[T]> for SignalArray {
    fn from(values: &[T]) -> Self {
        SignalArray::scalar(values.to_vec())
    }
}

/// Physical placement of one compressed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub offset: u64,
    pub compressed_len: u32,
}

/// Everything the tables say about one signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDescriptor {
    pub name: String,
    pub dtype: DType,
    pub array_length: u32,
    pub sample_count: u32,
    pub block_offsets: Vec<u64>,
}

impl SignalDescriptor {
    pub fn element_count(&self) -> usize {
        self.sample_count as usize * self.array_length as usize
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFooter {
    pub signal_count: u32,
    pub block_size: u32,
    pub descriptor_table_len: u32,
    pub offset_table_len: u32,
    pub compression: CompressionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: FormatVersion,
}

/// Scalar signal paired with its timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub timestamps: Vec<f64>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(cap),
            values: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

pub(crate) fn concat(dtype: DType, parts: Vec<Values>) -> Result<Values> {
    let mut out = Values::empty(dtype);
    for part in parts {
        out.extend_from(part)?;
    }
    Ok(out)
}
