//! Canonical CBOR encoding for signed key requests.
//!
//! Requests are encoded as CBOR (RFC 8949) with deterministic rules:
//! - Map keys: text keys, sorted by their encoded bytes
//! - Integers: smallest valid encoding
//! - Lengths: definite only
//!
//! The signed message is `SIGN_PREFIX || domain_separator || request_bytes`,
//! where the domain separator binds the registry name, version and address.
//! Changing any of these invalidates every outstanding signature.

use ciborium::value::Value;

use crate::crypto::Blake3Hash;
use crate::error::{CoreError, Result};
use crate::types::Address;

/// Prefix for every signed key request message.
pub const SIGN_PREFIX: &[u8] = b"omnikey/key-request/v1";

/// Derive-key context for domain separators.
const DOMAIN_CONTEXT: &str = "omnikey 2024 request domain";

/// CBOR map key names.
mod keys {
    pub const NAME: &str = "name";
    pub const VERSION: &str = "version";
    pub const REGISTRY: &str = "registry";
    pub const SUBJECT: &str = "subject";
    pub const REQUESTER: &str = "requester";
    pub const EXPIRY: &str = "expiry";
}

/// Hash of the signing domain (registry name, version, address).
pub fn domain_separator(name: &str, version: &str, registry: &Address) -> Result<Blake3Hash> {
    let value = Value::Map(vec![
        (Value::Text(keys::NAME.into()), Value::Text(name.into())),
        (Value::Text(keys::VERSION.into()), Value::Text(version.into())),
        (
            Value::Text(keys::REGISTRY.into()),
            Value::Bytes(registry.as_bytes().to_vec()),
        ),
    ]);
    let bytes = encode_canonical(&value)?;
    Ok(Blake3Hash::derive(DOMAIN_CONTEXT, &[&bytes]))
}

/// Canonical bytes of a `{subject, requester, expiry}` tuple.
pub fn request_bytes(subject: &[u8], requester: &Address, expiry: i64) -> Result<Vec<u8>> {
    let value = Value::Map(vec![
        (Value::Text(keys::SUBJECT.into()), Value::Bytes(subject.to_vec())),
        (
            Value::Text(keys::REQUESTER.into()),
            Value::Bytes(requester.as_bytes().to_vec()),
        ),
        (Value::Text(keys::EXPIRY.into()), Value::Integer(expiry.into())),
    ]);
    encode_canonical(&value)
}

/// Build the message to sign (with domain separation).
pub fn sign_message(domain: &Blake3Hash, request_bytes: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(SIGN_PREFIX.len() + 32 + request_bytes.len());
    msg.extend_from_slice(SIGN_PREFIX);
    msg.extend_from_slice(domain.as_bytes());
    msg.extend_from_slice(request_bytes);
    msg
}

/// Encode a CBOR value to canonical bytes. Only integers, byte strings,
/// text and maps of those are accepted.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i)?,
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        other => {
            return Err(CoreError::Encoding(format!(
                "unsupported value in canonical encoding: {:?}",
                other
            )))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) -> Result<()> {
    let n: i128 = i.into();
    if n >= 0 {
        let n = u64::try_from(n).map_err(|_| CoreError::Encoding("integer overflow".into()))?;
        encode_uint(buf, 0, n);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = u64::try_from(-1 - n)
            .map_err(|_| CoreError::Encoding("integer overflow".into()))?;
        encode_uint(buf, 1, abs);
    }
    Ok(())
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}
