use std::fmt;

use num_enum::TryFromPrimitive;

use crate::constants::DmlId;

pub fn enum_name_or_hex<T>(raw: T::Primitive) -> String
where
    T: TryFromPrimitive + fmt::Debug,
    T::Primitive: fmt::LowerHex,
{
    match T::try_from_primitive(raw) {
        Ok(variant) => format!("{:?}", variant),
        Err(_) => format!("0x{:x}", raw),
    }
}

pub fn fmt_id(id: DmlId) -> String {
    format!("0x{:04x}", id)
}

/// Printable preview of a payload for trace output.
pub fn fmt_bytes(b: &[u8]) -> String {
    const PREVIEW: usize = 32;
    let shown = &b[..b.len().min(PREVIEW)];
    let ellipsis = if b.len() > PREVIEW { "..." } else { "" };
    if shown.iter().all(|&c| c.is_ascii_graphic() || c == b' ') {
        format!("b\"{}{}\"", String::from_utf8_lossy(shown), ellipsis)
    } else {
        format!("0x{}{}", hex::encode(shown), ellipsis)
    }
}
