use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};

use crate::primitives::codec::{ByteOrderCodec, PrimitiveSets};
use crate::primitives::extension::ExtensionRegistry;
use crate::primitives::types::{
    ArrayValue, Decimal, ElementKind, ExtensionValue, MatrixValue, PrimitiveError, PrimitiveKind, Value,
};
use crate::varint::{decode_i64, decode_u64};

/// Decode a primitive payload (length prefix already stripped) as `kind`.
///
/// Extension payloads are handed to the registered handler; without one the
/// raw bytes are kept as `Value::Extension`.
pub fn decode_value(
    kind: &PrimitiveKind,
    payload: &[u8],
    sets: &PrimitiveSets,
    extensions: &ExtensionRegistry,
) -> Result<Value, PrimitiveError> {
    if let PrimitiveKind::Extension(type_id) = kind {
        return match extensions.get(*type_id) {
            Some(handler) => (handler.decode)(payload),
            None => Ok(Value::Extension(ExtensionValue { type_id: *type_id, payload: payload.to_vec() })),
        };
    }
    match sets.require(kind.family())? {
        Some(ByteOrderCodec::BigEndian) => decode_with::<BigEndian>(kind, payload),
        Some(ByteOrderCodec::LittleEndian) | None => decode_with::<LittleEndian>(kind, payload),
    }
}

fn exact<'a>(kind: &PrimitiveKind, payload: &'a [u8], width: usize) -> Result<&'a [u8], PrimitiveError> {
    if payload.len() != width {
        return Err(PrimitiveError::LengthMismatch { kind: *kind, len: payload.len() });
    }
    Ok(payload)
}

fn nanos_to_datetime(nanos: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_nanos(nanos)
}

fn decode_with<B: ByteOrder>(kind: &PrimitiveKind, payload: &[u8]) -> Result<Value, PrimitiveError> {
    let value = match kind {
        PrimitiveKind::Bool => match exact(kind, payload, 1)?[0] {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => return Err(PrimitiveError::InvalidBool(other)),
        },
        PrimitiveKind::Int => {
            let (v, used) = decode_i64(payload)?;
            exact(kind, payload, used)?;
            Value::Int(v)
        }
        PrimitiveKind::UInt => {
            let (v, used) = decode_u64(payload)?;
            exact(kind, payload, used)?;
            Value::UInt(v)
        }
        PrimitiveKind::Single => Value::Single(B::read_f32(exact(kind, payload, 4)?)),
        PrimitiveKind::Double => Value::Double(B::read_f64(exact(kind, payload, 8)?)),
        PrimitiveKind::Decimal => {
            let b = exact(kind, payload, 16)?;
            Value::Decimal(Decimal::from_parts(
                B::read_u32(&b[0..4]),
                B::read_u32(&b[4..8]),
                B::read_u32(&b[8..12]),
                B::read_u32(&b[12..16]),
            )?)
        }
        PrimitiveKind::DateTime => Value::DateTime(nanos_to_datetime(B::read_i64(exact(kind, payload, 8)?))),
        PrimitiveKind::String => Value::String(utf8(payload)?),
        PrimitiveKind::Array(e) => Value::Array(take_elements::<B>(kind, *e, payload)?),
        PrimitiveKind::Matrix(e) => {
            let (rows, a) = decode_u64(payload)?;
            let (cols, b) = decode_u64(&payload[a..])?;
            let data = take_elements::<B>(kind, *e, &payload[a + b..])?;
            Value::Matrix(MatrixValue::new(rows, cols, data)?)
        }
        PrimitiveKind::Extension(_) => return Err(PrimitiveError::UnknownType(kind.to_string())),
    };
    Ok(value)
}

fn utf8(bytes: &[u8]) -> Result<String, PrimitiveError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| PrimitiveError::InvalidUtf8)
}

fn take_elements<B: ByteOrder>(
    kind: &PrimitiveKind,
    elem: ElementKind,
    bytes: &[u8],
) -> Result<ArrayValue, PrimitiveError> {
    if let Some(w) = elem.width() {
        if bytes.len() % w != 0 {
            return Err(PrimitiveError::LengthMismatch { kind: *kind, len: bytes.len() });
        }
    }
    let arr = match elem {
        ElementKind::U8 => ArrayValue::U8(bytes.to_vec()),
        ElementKind::I8 => ArrayValue::I8(bytes.iter().map(|b| *b as i8).collect()),
        ElementKind::U16 => ArrayValue::U16(bytes.chunks_exact(2).map(B::read_u16).collect()),
        ElementKind::I16 => ArrayValue::I16(bytes.chunks_exact(2).map(B::read_i16).collect()),
        ElementKind::U32 => ArrayValue::U32(bytes.chunks_exact(4).map(B::read_u32).collect()),
        ElementKind::I32 => ArrayValue::I32(bytes.chunks_exact(4).map(B::read_i32).collect()),
        ElementKind::U64 => ArrayValue::U64(bytes.chunks_exact(8).map(B::read_u64).collect()),
        ElementKind::I64 => ArrayValue::I64(bytes.chunks_exact(8).map(B::read_i64).collect()),
        ElementKind::Single => ArrayValue::Single(bytes.chunks_exact(4).map(B::read_f32).collect()),
        ElementKind::Double => ArrayValue::Double(bytes.chunks_exact(8).map(B::read_f64).collect()),
        ElementKind::DateTime => {
            ArrayValue::DateTime(bytes.chunks_exact(8).map(|c| nanos_to_datetime(B::read_i64(c))).collect())
        }
        ElementKind::String => {
            let mut out = Vec::new();
            let mut rest = bytes;
            while !rest.is_empty() {
                let (len, used) = decode_u64(rest)?;
                let end = usize::try_from(len)
                    .ok()
                    .and_then(|l| used.checked_add(l))
                    .filter(|end| *end <= rest.len())
                    .ok_or(PrimitiveError::LengthMismatch { kind: *kind, len: bytes.len() })?;
                out.push(utf8(&rest[used..end])?);
                rest = &rest[end..];
            }
            ArrayValue::String(out)
        }
    };
    Ok(arr)
}
