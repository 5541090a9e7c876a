//! LEB128 varints with zigzag for signed values.

use crate::{Error, Result};
use bytes::BufMut;

pub(crate) fn put_uvarint(buf: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub(crate) fn put_varint(buf: &mut impl BufMut, value: i64) {
    put_uvarint(buf, ((value << 1) ^ (value >> 63)) as u64);
}

/// Reads a varint from `input` starting at `*pos`, advancing `pos`.
pub(crate) fn read_uvarint(input: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *input
            .get(*pos)
            .ok_or_else(|| Error::Serialization("truncated varint".to_string()))?;
        *pos += 1;
        if shift == 63 && byte > 1 {
            return Err(Error::Serialization("varint overflows u64".to_string()));
        }
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(Error::Serialization("varint overflows u64".to_string()));
        }
    }
}

pub(crate) fn read_varint(input: &[u8], pos: &mut usize) -> Result<i64> {
    let raw = read_uvarint(input, pos)?;
    Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
}
