// Element types and their on-disk type codes

use crate::core::format::Values;
use std::fmt;

/// Primitive element type of a signal.
///
/// The discriminants are the type codes found in the descriptor table.
/// Bit 15 marks signed values and bit 12 floats. For integers the low byte
/// is the bit width; the float codes carry 16 and 32 there instead.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    U8 = 0x0008,
    I8 = 0x8008,
    U16 = 0x0010,
    I16 = 0x8010,
    U32 = 0x0020,
    I32 = 0x8020,
    U64 = 0x0040,
    I64 = 0x8040,
    F32 = 0x9010,
    F64 = 0x9020,
}

impl DType {
    pub const ALL: [DType; 10] = [
        DType::U8,
        DType::I8,
        DType::U16,
        DType::I16,
        DType::U32,
        DType::I32,
        DType::U64,
        DType::I64,
        DType::F32,
        DType::F64,
    ];

    pub fn type_code(self) -> u32 {
        self as u32
    }

    pub fn from_type_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.type_code() == code)
    }

    pub fn item_size(self) -> usize {
        match self {
            DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::U8 => "uint8",
            DType::I8 => "int8",
            DType::U16 => "uint16",
            DType::I16 => "int16",
            DType::U32 => "uint32",
            DType::I32 => "int32",
            DType::U64 => "uint64",
            DType::I64 => "int64",
            DType::F32 => "float32",
            DType::F64 => "float64",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A primitive that can be stored in a bsig signal.
pub trait Element:
    Copy + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static + sealed::Sealed
{
    const DTYPE: DType;

    fn write_le(self, out: &mut Vec<u8>);

    /// Decodes one element, `bytes` must be exactly `DTYPE.item_size()` long.
    fn read_le(bytes: &[u8]) -> Self;

    fn to_f64(self) -> f64;

    fn into_values(values: Vec<Self>) -> Values;

    fn slice_of(values: &Values) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident) => {
        impl sealed::Sealed for $t {}

        impl Element for $t {
            const DTYPE: DType = DType::$variant;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn into_values(values: Vec<Self>) -> Values {
                Values::$variant(values)
            }

            fn slice_of(values: &Values) -> Option<&[Self]> {
                match values {
                    Values::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(u8, U8);
impl_element!(i8, I8);
impl_element!(u16, U16);
impl_element!(i16, I16);
impl_element!(u32, U32);
impl_element!(i32, I32);
impl_element!(u64, U64);
impl_element!(i64, I64);
impl_element!(f32, F32);
impl_element!(f64, F64);
