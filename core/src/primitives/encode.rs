use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::primitives::codec::{ByteOrderCodec, PrimitiveSets};
use crate::primitives::extension::{ExtensionRegistry, ExtensionTypeId};
use crate::primitives::types::{ArrayValue, PrimitiveError, PrimitiveKind, Value};
use crate::varint::{encode_u64_into, zigzag_encode};

macro_rules! put_fixed {
    ($out:expr, $vals:expr, $width:literal, $write:expr) => {{
        let mut buf = [0u8; $width];
        for v in $vals.iter() {
            $write(&mut buf, *v);
            $out.extend_from_slice(&buf);
        }
    }};
}

/// Encode `value` as the payload of a primitive whose Name declares `kind`.
///
/// The returned bytes exclude the length prefix. Fails with `TypeMismatch`
/// when the value does not carry the declared kind, and with
/// `CodecNotSelected` when the kind's family has not been declared.
pub fn encode_value(
    kind: &PrimitiveKind,
    value: &Value,
    sets: &PrimitiveSets,
    extensions: &ExtensionRegistry,
) -> Result<Vec<u8>, PrimitiveError> {
    if let PrimitiveKind::Extension(type_id) = kind {
        return encode_extension(*type_id, value, extensions);
    }
    let found = value.kind();
    if found != *kind {
        return Err(PrimitiveError::TypeMismatch { expected: *kind, found });
    }
    let mut out = Vec::new();
    match sets.require(kind.family())? {
        Some(ByteOrderCodec::BigEndian) => encode_into::<BigEndian>(value, &mut out)?,
        Some(ByteOrderCodec::LittleEndian) | None => encode_into::<LittleEndian>(value, &mut out)?,
    }
    Ok(out)
}

fn encode_extension(
    type_id: ExtensionTypeId,
    value: &Value,
    extensions: &ExtensionRegistry,
) -> Result<Vec<u8>, PrimitiveError> {
    match value {
        Value::Extension(raw) if raw.type_id == type_id => Ok(raw.payload.clone()),
        Value::Extension(raw) => Err(PrimitiveError::TypeMismatch {
            expected: PrimitiveKind::Extension(type_id),
            found: PrimitiveKind::Extension(raw.type_id),
        }),
        other => {
            let handler = extensions
                .get(type_id)
                .ok_or_else(|| PrimitiveError::UnknownExtension(format!("#{}", type_id)))?;
            (handler.encode)(other)
        }
    }
}

fn encode_into<B: ByteOrder>(value: &Value, out: &mut Vec<u8>) -> Result<(), PrimitiveError> {
    match value {
        Value::Bool(b) => out.push(u8::from(*b)),
        Value::Int(v) => encode_u64_into(zigzag_encode(*v), out),
        Value::UInt(v) => encode_u64_into(*v, out),
        Value::Single(v) => put_fixed!(out, [*v], 4, B::write_f32),
        Value::Double(v) => put_fixed!(out, [*v], 8, B::write_f64),
        Value::Decimal(d) => put_fixed!(out, [d.lo, d.mid, d.hi, d.flags()], 4, B::write_u32),
        Value::DateTime(dt) => {
            let nanos = dt.timestamp_nanos_opt().ok_or(PrimitiveError::DateTimeOutOfRange)?;
            put_fixed!(out, [nanos], 8, B::write_i64);
        }
        Value::String(s) => out.extend_from_slice(s.as_bytes()),
        Value::Array(a) => put_elements::<B>(a, out)?,
        Value::Matrix(m) => {
            encode_u64_into(m.rows(), out);
            encode_u64_into(m.cols(), out);
            put_elements::<B>(m.data(), out)?;
        }
        Value::Extension(raw) => out.extend_from_slice(&raw.payload),
    }
    Ok(())
}

fn put_elements<B: ByteOrder>(arr: &ArrayValue, out: &mut Vec<u8>) -> Result<(), PrimitiveError> {
    match arr {
        ArrayValue::U8(v) => out.extend_from_slice(v),
        ArrayValue::I8(v) => out.extend(v.iter().map(|b| *b as u8)),
        ArrayValue::U16(v) => put_fixed!(out, v, 2, B::write_u16),
        ArrayValue::I16(v) => put_fixed!(out, v, 2, B::write_i16),
        ArrayValue::U32(v) => put_fixed!(out, v, 4, B::write_u32),
        ArrayValue::I32(v) => put_fixed!(out, v, 4, B::write_i32),
        ArrayValue::U64(v) => put_fixed!(out, v, 8, B::write_u64),
        ArrayValue::I64(v) => put_fixed!(out, v, 8, B::write_i64),
        ArrayValue::Single(v) => put_fixed!(out, v, 4, B::write_f32),
        ArrayValue::Double(v) => put_fixed!(out, v, 8, B::write_f64),
        ArrayValue::DateTime(v) => {
            let nanos = v
                .iter()
                .map(|dt| dt.timestamp_nanos_opt().ok_or(PrimitiveError::DateTimeOutOfRange))
                .collect::<Result<Vec<i64>, _>>()?;
            put_fixed!(out, nanos, 8, B::write_i64);
        }
        ArrayValue::String(v) => {
            for s in v {
                encode_u64_into(s.len() as u64, out);
                out.extend_from_slice(s.as_bytes());
            }
        }
    }
    Ok(())
}
