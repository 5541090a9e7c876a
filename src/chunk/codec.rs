//! Binary chunk format.
//!
//! ```text
//! 0   4  magic "CHNK"
//! 4   1  format version
//! 5   4  crc32 of bytes [0..5] and [9..]
//! 9   1  encoding tag
//! 10  8  fingerprint
//! 18  8  from
//! 26  8  through
//! 34  2+ user id (u16 length prefixed)
//! ..  4+ labels (u32 count, then u16-prefixed name/value pairs)
//! ..  4+ body (u32 length prefixed)
//! ```
//!
//! All integers are little endian. The checksum covers every byte except
//! its own field, magic and version included, so any flipped byte fails
//! verification before the header is even interpreted.

use super::{Chunk, Descriptor};
use crate::encoding::{ChunkData, Encoding};
use crate::model::{Fingerprint, Metric, Time};
use crate::{Error, Result};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc32fast::Hasher;
use std::io::Read;

const MAGIC: &[u8; 4] = b"CHNK";
const VERSION: u8 = 1;
const CHECKSUM_OFFSET: usize = 5;
const CHECKSUMMED_OFFSET: usize = 9;
const FIXED_HEADER_LEN: usize = 34;

impl Chunk {
    /// Serialize the chunk and fix the descriptor's checksum.
    ///
    /// Output is byte-identical for identical chunks. After the first
    /// successful call `descriptor().external_key()` returns the current,
    /// checksummed key form.
    pub fn encode(&mut self) -> Result<Bytes> {
        self.descriptor.validate()?;
        let body = self.data.marshal();
        let buf = encode_parts(&self.descriptor, self.data.encoding(), &body)?;

        let checksum = u32::from_le_bytes(
            buf[CHECKSUM_OFFSET..CHECKSUMMED_OFFSET]
                .try_into()
                .map_err(|_| Error::Internal("checksum slice".to_string()))?,
        );
        self.descriptor.checksum = checksum;
        self.descriptor.checksum_set = true;
        self.descriptor.encoding = self.data.encoding();
        Ok(buf)
    }
}

fn encode_parts(desc: &Descriptor, encoding: Encoding, body: &[u8]) -> Result<Bytes> {
    let user_id = desc.user_id.as_bytes();
    let mut buf = BytesMut::with_capacity(FIXED_HEADER_LEN + user_id.len() + body.len() + 64);
    buf.put_slice(MAGIC);
    buf.put_u8(VERSION);
    buf.put_u32_le(0);

    buf.put_u8(encoding.tag());
    buf.put_u64_le(desc.fingerprint.0);
    buf.put_i64_le(desc.from.0);
    buf.put_i64_le(desc.through.0);
    put_str(&mut buf, &desc.user_id, "user id")?;
    buf.put_u32_le(desc.metric.len() as u32);
    for (name, value) in desc.metric.iter() {
        put_str(&mut buf, name, "label name")?;
        put_str(&mut buf, value, "label value")?;
    }
    let body_len = u32::try_from(body.len())
        .map_err(|_| Error::Serialization(format!("chunk body of {} bytes", body.len())))?;
    buf.put_u32_le(body_len);
    buf.put_slice(body);

    let checksum = frame_checksum(&buf);
    buf[CHECKSUM_OFFSET..CHECKSUMMED_OFFSET].copy_from_slice(&checksum.to_le_bytes());
    Ok(buf.freeze())
}

/// Read an encoded chunk and validate it against `expected`.
///
/// Fails with [`Error::InvalidChecksum`] when the payload does not match its
/// embedded checksum or the checksum carried by `expected`, and with
/// [`Error::WrongMetadata`] when the decoded identity differs from
/// `expected`. The body is only handed to the sample decoder once both
/// checks pass.
pub fn decode(expected: &Descriptor, mut reader: impl Read) -> Result<Chunk> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    decode_bytes(expected, &buf)
}

/// [`decode`] over an in-memory buffer.
pub fn decode_bytes(expected: &Descriptor, buf: &[u8]) -> Result<Chunk> {
    if buf.len() < FIXED_HEADER_LEN {
        return Err(Error::Serialization(format!(
            "chunk of {} bytes is shorter than its header",
            buf.len()
        )));
    }

    let mut header = &buf[CHECKSUM_OFFSET..CHECKSUMMED_OFFSET];
    let stored = header.get_u32_le();
    let actual = frame_checksum(buf);
    if stored != actual || (expected.checksum_set && expected.checksum != actual) {
        return Err(Error::InvalidChecksum);
    }

    if &buf[0..4] != MAGIC {
        return Err(Error::Serialization("invalid chunk magic".to_string()));
    }
    if buf[4] != VERSION {
        return Err(Error::Serialization(format!(
            "unsupported chunk format version {}",
            buf[4]
        )));
    }

    let mut rest = &buf[CHECKSUMMED_OFFSET..];
    let tag = rest.get_u8();
    let fingerprint = Fingerprint(rest.get_u64_le());
    let from = Time(rest.get_i64_le());
    let through = Time(rest.get_i64_le());
    let user_id = get_str(&mut rest, "user id")?;

    let label_count = get_u32(&mut rest, "label count")? as usize;
    let mut labels = Vec::with_capacity(label_count.min(rest.len() / 4));
    for _ in 0..label_count {
        let name = get_str(&mut rest, "label name")?;
        let value = get_str(&mut rest, "label value")?;
        labels.push((name, value));
    }
    let metric: Metric = labels.into_iter().collect();

    let body_len = get_u32(&mut rest, "body length")? as usize;
    if rest.len() != body_len {
        return Err(Error::Serialization(format!(
            "chunk body length {} does not match remaining {} bytes",
            body_len,
            rest.len()
        )));
    }

    let descriptor = Descriptor {
        user_id,
        fingerprint,
        metric,
        from,
        through,
        encoding: Encoding::try_from(tag)?,
        checksum: actual,
        checksum_set: true,
    };
    if !descriptor.same_identity(expected) {
        return Err(Error::WrongMetadata);
    }

    let data = ChunkData::unmarshal(descriptor.encoding, rest)?;
    Ok(Chunk { descriptor, data })
}

/// CRC32 over the whole frame minus the checksum field itself.
fn frame_checksum(frame: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&frame[..CHECKSUM_OFFSET]);
    hasher.update(&frame[CHECKSUMMED_OFFSET..]);
    hasher.finalize()
}

fn put_str(buf: &mut BytesMut, s: &str, what: &str) -> Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| Error::Serialization(format!("{} of {} bytes is too long", what, s.len())))?;
    buf.put_u16_le(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn get_u32(buf: &mut &[u8], what: &str) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(Error::Serialization(format!("truncated {}", what)));
    }
    Ok(buf.get_u32_le())
}

fn get_str(buf: &mut &[u8], what: &str) -> Result<String> {
    if buf.remaining() < 2 {
        return Err(Error::Serialization(format!("truncated {} length", what)));
    }
    let len = buf.get_u16_le() as usize;
    if buf.remaining() < len {
        return Err(Error::Serialization(format!("truncated {}", what)));
    }
    let s = std::str::from_utf8(&buf[..len])
        .map_err(|e| Error::Serialization(format!("{} is not utf-8: {}", what, e)))?
        .to_string();
    buf.advance(len);
    Ok(s)
}
