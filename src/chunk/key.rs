//! External key format.
//!
//! ```text
//! legacy:  FPDEC ":" FROMDEC ":" THROUGHDEC
//! current: USERID "/" FPHEX ":" FROMHEX ":" THROUGHHEX ":" CHECKSUMHEX
//! ```
//!
//! Legacy keys predate checksums and carry no tenant; they are still parsed
//! so chunks written under them stay readable. Hex fields are lowercase and
//! unpadded.

use super::Descriptor;
use crate::model::{Fingerprint, Time};
use crate::{Error, Result};

use std::fmt::Write as _;

impl Descriptor {
    /// Canonical cache/store key for this chunk.
    pub fn external_key(&self) -> String {
        if !self.checksum_set {
            return format!(
                "{}:{}:{}",
                self.fingerprint.0, self.from.0, self.through.0
            );
        }
        let mut key = String::with_capacity(self.user_id.len() + 48);
        key.push_str(&self.user_id);
        key.push('/');
        let _ = write!(key, "{:x}:", self.fingerprint.0);
        push_signed_hex(&mut key, self.from.0);
        key.push(':');
        push_signed_hex(&mut key, self.through.0);
        let _ = write!(key, ":{:x}", self.checksum);
        key
    }
}

/// Parse an external key produced for `expected_user_id`.
///
/// Legacy keys inherit `expected_user_id`; a current-form key naming any
/// other tenant is rejected with [`Error::WrongMetadata`]. Keys that would
/// not be produced by [`Descriptor::external_key`] (inverted time range,
/// padded or uppercase fields, `-0`) are [`Error::MalformedKey`].
pub fn parse_external_key(expected_user_id: &str, key: &str) -> Result<Descriptor> {
    // Hex fields never contain '/', so the last one ends the tenant
    let desc = match key.rsplit_once('/') {
        None => parse_legacy_key(expected_user_id, key)?,
        Some((user_id, rest)) => {
            if user_id != expected_user_id {
                return Err(Error::WrongMetadata);
            }
            parse_current_key(user_id, rest)?
        }
    };
    if desc.from > desc.through {
        return Err(Error::MalformedKey(format!(
            "from {} is after through {} in '{}'",
            desc.from, desc.through, key
        )));
    }
    if desc.external_key() != key {
        return Err(Error::MalformedKey(format!("non-canonical key '{}'", key)));
    }
    Ok(desc)
}

fn parse_legacy_key(user_id: &str, key: &str) -> Result<Descriptor> {
    let parts = split_fields::<3>(key)?;
    Ok(Descriptor {
        user_id: user_id.to_string(),
        fingerprint: Fingerprint(parse_field(parts[0], "fingerprint", |s| s.parse::<u64>())?),
        from: Time(parse_field(parts[1], "from", |s| s.parse::<i64>())?),
        through: Time(parse_field(parts[2], "through", |s| s.parse::<i64>())?),
        ..Default::default()
    })
}

fn parse_current_key(user_id: &str, rest: &str) -> Result<Descriptor> {
    let parts = split_fields::<4>(rest)?;
    Ok(Descriptor {
        user_id: user_id.to_string(),
        fingerprint: Fingerprint(parse_field(parts[0], "fingerprint", |s| {
            u64::from_str_radix(s, 16)
        })?),
        from: Time(parse_field(parts[1], "from", |s| i64::from_str_radix(s, 16))?),
        through: Time(parse_field(parts[2], "through", |s| i64::from_str_radix(s, 16))?),
        checksum: parse_field(parts[3], "checksum", |s| u32::from_str_radix(s, 16))?,
        checksum_set: true,
        ..Default::default()
    })
}

fn split_fields<const N: usize>(s: &str) -> Result<[&str; N]> {
    let mut parts = [""; N];
    let mut count = 0;
    for part in s.split(':') {
        if count == N {
            count += 1;
            break;
        }
        parts[count] = part;
        count += 1;
    }
    if count != N {
        return Err(Error::MalformedKey(format!(
            "expected {} ':'-separated fields in '{}'",
            N, s
        )));
    }
    Ok(parts)
}

fn parse_field<T, E: std::fmt::Display>(
    raw: &str,
    field: &str,
    parse: impl FnOnce(&str) -> std::result::Result<T, E>,
) -> Result<T> {
    // from_str_radix tolerates a leading '+', which we never write
    if raw.starts_with('+') {
        return Err(Error::MalformedKey(format!("invalid {} '{}'", field, raw)));
    }
    parse(raw).map_err(|e| Error::MalformedKey(format!("invalid {} '{}': {}", field, raw, e)))
}

/// Signed hex: `-` followed by the magnitude for negative values, matching
/// what `i64::from_str_radix(_, 16)` accepts.
fn push_signed_hex(out: &mut String, value: i64) {
    if value < 0 {
        let _ = write!(out, "-{:x}", value.unsigned_abs());
    } else {
        let _ = write!(out, "{:x}", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_ID: &str = "userID";

    #[test]
    fn test_parse_legacy_key() {
        let desc = parse_external_key(USER_ID, "2:1484661279394:1484664879394").unwrap();
        assert_eq!(
            desc,
            Descriptor {
                user_id: USER_ID.to_string(),
                fingerprint: Fingerprint(2),
                from: Time(1484661279394),
                through: Time(1484664879394),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_parse_current_key() {
        let desc = parse_external_key(USER_ID, "userID/2:270d8f00:270d8f00:f84c5745").unwrap();
        assert_eq!(
            desc,
            Descriptor {
                user_id: USER_ID.to_string(),
                fingerprint: Fingerprint(2),
                from: Time(655200000),
                through: Time(655200000),
                checksum: 4165752645,
                checksum_set: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_parse_rejects_foreign_tenant() {
        let err = parse_external_key(USER_ID, "invalidUserID/2:270d8f00:270d8f00:f84c5745")
            .unwrap_err();
        assert!(matches!(err, Error::WrongMetadata));
    }

    #[test]
    fn test_parse_malformed_keys() {
        for key in [
            "",
            "2:3",
            "2:3:4:5",
            "x:1:2",
            "userID/2:3:4",
            "userID/2:3:4:5:6",
            "userID/zz:3:4:5",
            "userID/2:3:4:100000000",
            "userID/+2:3:4:5",
        ] {
            let err = parse_external_key(USER_ID, key).unwrap_err();
            assert!(matches!(err, Error::MalformedKey(_)), "{key}: {err}");
        }
    }

    #[test]
    fn test_format_both_forms() {
        let desc = Descriptor {
            user_id: USER_ID.to_string(),
            fingerprint: Fingerprint(2),
            from: Time(655200000),
            through: Time(655200000),
            ..Default::default()
        };
        assert_eq!(desc.external_key(), "2:655200000:655200000");

        let desc = desc.with_checksum(4165752645);
        assert_eq!(desc.external_key(), "userID/2:270d8f00:270d8f00:f84c5745");
    }

    #[test]
    fn test_negative_times_roundtrip() {
        let desc = Descriptor {
            user_id: USER_ID.to_string(),
            fingerprint: Fingerprint(u64::MAX),
            from: Time(i64::MIN),
            through: Time(-1),
            ..Default::default()
        }
        .with_checksum(u32::MAX);

        let key = desc.external_key();
        assert_eq!(key, "userID/ffffffffffffffff:-8000000000000000:-1:ffffffff");
        assert_eq!(parse_external_key(USER_ID, &key).unwrap(), desc);
    }

    #[test]
    fn test_tenant_with_slash_roundtrip() {
        let desc = Descriptor {
            user_id: "org/team".to_string(),
            fingerprint: Fingerprint(0x774299c1572da3aa),
            from: Time(1),
            through: Time(1),
            ..Default::default()
        }
        .with_checksum(0x78672c02);

        let key = desc.external_key();
        assert_eq!(key, "org/team/774299c1572da3aa:1:1:78672c02");
        assert_eq!(parse_external_key("org/team", &key).unwrap(), desc);

        let err = parse_external_key("org", &key).unwrap_err();
        assert!(matches!(err, Error::WrongMetadata));
    }

    #[test]
    fn test_parse_rejects_non_canonical_keys() {
        for key in [
            "2:5:4",
            "userID/2:5:4:0",
            "2:-0:1",
            "2:01:1",
            "userID/2:-0:1:0",
            "userID/02:1:1:0",
            "userID/2:1:1:0A",
            "userID/2:a:A:0",
        ] {
            let err = parse_external_key(USER_ID, key).unwrap_err();
            assert!(matches!(err, Error::MalformedKey(_)), "{key}: {err}");
        }
    }
}
