use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::primitives::codec::PrimitiveFamily;
use crate::primitives::extension::{ExtensionRegistry, ExtensionTypeId};
use crate::varint::VarintError;

/// Element type of array and matrix primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    Single,
    Double,
    DateTime,
    String,
}

impl ElementKind {
    pub const ALL: [ElementKind; 12] = [
        ElementKind::U8,
        ElementKind::I8,
        ElementKind::U16,
        ElementKind::I16,
        ElementKind::U32,
        ElementKind::I32,
        ElementKind::U64,
        ElementKind::I64,
        ElementKind::Single,
        ElementKind::Double,
        ElementKind::DateTime,
        ElementKind::String,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ElementKind::U8 => "u8",
            ElementKind::I8 => "i8",
            ElementKind::U16 => "u16",
            ElementKind::I16 => "i16",
            ElementKind::U32 => "u32",
            ElementKind::I32 => "i32",
            ElementKind::U64 => "u64",
            ElementKind::I64 => "i64",
            ElementKind::Single => "single",
            ElementKind::Double => "double",
            ElementKind::DateTime => "datetime",
            ElementKind::String => "string",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Encoded width of one element, `None` for variable-width strings.
    pub const fn width(self) -> Option<usize> {
        match self {
            ElementKind::U8 | ElementKind::I8 => Some(1),
            ElementKind::U16 | ElementKind::I16 => Some(2),
            ElementKind::U32 | ElementKind::I32 | ElementKind::Single => Some(4),
            ElementKind::U64 | ElementKind::I64 | ElementKind::Double | ElementKind::DateTime => Some(8),
            ElementKind::String => None,
        }
    }
}

/// Closed set of primitive types a Name may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Int,
    UInt,
    Single,
    Double,
    Decimal,
    DateTime,
    String,
    Array(ElementKind),
    Matrix(ElementKind),
    Extension(ExtensionTypeId),
}

impl PrimitiveKind {
    /// Family that must be declared before this kind may be read or written.
    pub const fn family(&self) -> PrimitiveFamily {
        match self {
            PrimitiveKind::Bool
            | PrimitiveKind::Int
            | PrimitiveKind::UInt
            | PrimitiveKind::String
            | PrimitiveKind::Array(ElementKind::U8) => PrimitiveFamily::Base,
            PrimitiveKind::Single
            | PrimitiveKind::Double
            | PrimitiveKind::Decimal
            | PrimitiveKind::DateTime => PrimitiveFamily::Common,
            PrimitiveKind::Array(_) | PrimitiveKind::Matrix(_) => PrimitiveFamily::Arrays,
            PrimitiveKind::Extension(_) => PrimitiveFamily::Extension,
        }
    }

    /// Canonical type string; extension ids are rendered by registered name when known.
    pub fn type_str(&self, extensions: &ExtensionRegistry) -> String {
        match self {
            PrimitiveKind::Extension(id) => match extensions.name_of(*id) {
                Some(name) => format!("ext:{}", name),
                None => self.to_string(),
            },
            _ => self.to_string(),
        }
    }

    /// Parse a primitive type string; extension names are probed in `extensions`.
    pub fn parse(s: &str, extensions: &ExtensionRegistry) -> Result<Self, PrimitiveError> {
        let kind = match s {
            "bool" => PrimitiveKind::Bool,
            "int" => PrimitiveKind::Int,
            "uint" => PrimitiveKind::UInt,
            "single" => PrimitiveKind::Single,
            "double" => PrimitiveKind::Double,
            "decimal" => PrimitiveKind::Decimal,
            "datetime" => PrimitiveKind::DateTime,
            "string" => PrimitiveKind::String,
            _ => {
                if let Some(e) = s.strip_prefix("array-") {
                    PrimitiveKind::Array(ElementKind::parse(e).ok_or_else(|| PrimitiveError::UnknownType(s.into()))?)
                } else if let Some(e) = s.strip_prefix("matrix-") {
                    PrimitiveKind::Matrix(ElementKind::parse(e).ok_or_else(|| PrimitiveError::UnknownType(s.into()))?)
                } else if let Some(ext) = s.strip_prefix("ext:") {
                    let id = match ext.strip_prefix('#') {
                        Some(raw) => raw.parse::<ExtensionTypeId>().ok(),
                        None => extensions.probe(ext),
                    };
                    PrimitiveKind::Extension(id.ok_or_else(|| PrimitiveError::UnknownExtension(ext.into()))?)
                } else {
                    return Err(PrimitiveError::UnknownType(s.into()));
                }
            }
        };
        Ok(kind)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveKind::Bool => f.write_str("bool"),
            PrimitiveKind::Int => f.write_str("int"),
            PrimitiveKind::UInt => f.write_str("uint"),
            PrimitiveKind::Single => f.write_str("single"),
            PrimitiveKind::Double => f.write_str("double"),
            PrimitiveKind::Decimal => f.write_str("decimal"),
            PrimitiveKind::DateTime => f.write_str("datetime"),
            PrimitiveKind::String => f.write_str("string"),
            PrimitiveKind::Array(e) => write!(f, "array-{}", e.as_str()),
            PrimitiveKind::Matrix(e) => write!(f, "matrix-{}", e.as_str()),
            PrimitiveKind::Extension(id) => write!(f, "ext:#{}", id),
        }
    }
}

/// 96-bit scaled decimal (mantissa * 10^-scale), sign carried separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    pub lo: u32,
    pub mid: u32,
    pub hi: u32,
    pub scale: u8,
    pub negative: bool,
}

impl Decimal {
    pub const MAX_SCALE: u8 = 28;
    pub const MAX_MANTISSA: u128 = (1u128 << 96) - 1;

    pub fn new(mantissa: u128, scale: u8, negative: bool) -> Result<Self, PrimitiveError> {
        if mantissa > Self::MAX_MANTISSA {
            return Err(PrimitiveError::InvalidDecimal("mantissa exceeds 96 bits".into()));
        }
        if scale > Self::MAX_SCALE {
            return Err(PrimitiveError::InvalidDecimal(format!("scale {} > {}", scale, Self::MAX_SCALE)));
        }
        Ok(Self {
            lo: mantissa as u32,
            mid: (mantissa >> 32) as u32,
            hi: (mantissa >> 64) as u32,
            scale,
            negative,
        })
    }

    pub fn mantissa(&self) -> u128 {
        u128::from(self.lo) | (u128::from(self.mid) << 32) | (u128::from(self.hi) << 64)
    }

    /// Flags word: scale in bits 16..24, sign in bit 31.
    pub fn flags(&self) -> u32 {
        (u32::from(self.scale) << 16) | if self.negative { 0x8000_0000 } else { 0 }
    }

    pub fn from_parts(lo: u32, mid: u32, hi: u32, flags: u32) -> Result<Self, PrimitiveError> {
        if flags & 0x7F00_FFFF != 0 {
            return Err(PrimitiveError::InvalidDecimal(format!("reserved flag bits set: 0x{:08x}", flags)));
        }
        let scale = ((flags >> 16) & 0xFF) as u8;
        if scale > Self::MAX_SCALE {
            return Err(PrimitiveError::InvalidDecimal(format!("scale {} > {}", scale, Self::MAX_SCALE)));
        }
        Ok(Self { lo, mid, hi, scale, negative: flags & 0x8000_0000 != 0 })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa().to_string();
        let scale = self.scale as usize;
        let sign = if self.negative && self.mantissa() != 0 { "-" } else { "" };
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, int, frac)
    }
}

/// Homogeneous element storage for arrays and matrices.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    Single(Vec<f32>),
    Double(Vec<f64>),
    DateTime(Vec<DateTime<Utc>>),
    String(Vec<String>),
}

impl ArrayValue {
    pub fn element_kind(&self) -> ElementKind {
        match self {
            ArrayValue::U8(_) => ElementKind::U8,
            ArrayValue::I8(_) => ElementKind::I8,
            ArrayValue::U16(_) => ElementKind::U16,
            ArrayValue::I16(_) => ElementKind::I16,
            ArrayValue::U32(_) => ElementKind::U32,
            ArrayValue::I32(_) => ElementKind::I32,
            ArrayValue::U64(_) => ElementKind::U64,
            ArrayValue::I64(_) => ElementKind::I64,
            ArrayValue::Single(_) => ElementKind::Single,
            ArrayValue::Double(_) => ElementKind::Double,
            ArrayValue::DateTime(_) => ElementKind::DateTime,
            ArrayValue::String(_) => ElementKind::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayValue::U8(v) => v.len(),
            ArrayValue::I8(v) => v.len(),
            ArrayValue::U16(v) => v.len(),
            ArrayValue::I16(v) => v.len(),
            ArrayValue::U32(v) => v.len(),
            ArrayValue::I32(v) => v.len(),
            ArrayValue::U64(v) => v.len(),
            ArrayValue::I64(v) => v.len(),
            ArrayValue::Single(v) => v.len(),
            ArrayValue::Double(v) => v.len(),
            ArrayValue::DateTime(v) => v.len(),
            ArrayValue::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Row-major matrix; `data.len() == rows * cols`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixValue {
    rows: u64,
    cols: u64,
    data: ArrayValue,
}

impl MatrixValue {
    pub fn new(rows: u64, cols: u64, data: ArrayValue) -> Result<Self, PrimitiveError> {
        let expected = rows.checked_mul(cols).ok_or(PrimitiveError::MatrixShape {
            rows,
            cols,
            elements: data.len(),
        })?;
        if expected != data.len() as u64 {
            return Err(PrimitiveError::MatrixShape { rows, cols, elements: data.len() });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn cols(&self) -> u64 {
        self.cols
    }

    pub fn data(&self) -> &ArrayValue {
        &self.data
    }
}

/// Undecoded extension payload (no handler registered for its type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionValue {
    pub type_id: ExtensionTypeId,
    pub payload: Vec<u8>,
}

/// A decoded primitive value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    DateTime(DateTime<Utc>),
    String(String),
    Array(ArrayValue),
    Matrix(MatrixValue),
    Extension(ExtensionValue),
}

impl Value {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Value::Bool(_) => PrimitiveKind::Bool,
            Value::Int(_) => PrimitiveKind::Int,
            Value::UInt(_) => PrimitiveKind::UInt,
            Value::Single(_) => PrimitiveKind::Single,
            Value::Double(_) => PrimitiveKind::Double,
            Value::Decimal(_) => PrimitiveKind::Decimal,
            Value::DateTime(_) => PrimitiveKind::DateTime,
            Value::String(_) => PrimitiveKind::String,
            Value::Array(a) => PrimitiveKind::Array(a.element_kind()),
            Value::Matrix(m) => PrimitiveKind::Matrix(m.data.element_kind()),
            Value::Extension(e) => PrimitiveKind::Extension(e.type_id),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Array(ArrayValue::U8(b)) => Some(b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Array(ArrayValue::U8(v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// Multi-byte kind used before its primitive set was declared.
    #[error("codec not selected: primitive set '{family}' has not been declared")]
    CodecNotSelected { family: PrimitiveFamily },

    #[error("unsupported codec '{codec}' for primitive set '{set}'")]
    UnsupportedCodec { set: String, codec: String },

    #[error("unknown primitive set '{0}'")]
    UnknownPrimitiveSet(String),

    #[error("primitive set '{set}' already declared with codec '{existing}'")]
    ConflictingCodec { set: String, existing: String },

    #[error("payload of {len} byte(s) is invalid for type {kind}")]
    LengthMismatch { kind: PrimitiveKind, len: usize },

    #[error("invalid bool byte 0x{0:02x}")]
    InvalidBool(u8),

    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),

    #[error("date-time out of the representable nanosecond range")]
    DateTimeOutOfRange,

    #[error("matrix shape {rows}x{cols} does not match {elements} element(s)")]
    MatrixShape { rows: u64, cols: u64, elements: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: PrimitiveKind, found: PrimitiveKind },

    #[error("unknown primitive type '{0}'")]
    UnknownType(String),

    #[error("unknown extension type '{0}'")]
    UnknownExtension(String),

    #[error("extension '{name}' failed: {msg}")]
    ExtensionFailed { name: String, msg: String },

    #[error(transparent)]
    Varint(#[from] VarintError),
}
