//! Reversible encoding of bytes as a string of decimal digits, the densest
//! alphabet of QR codes.
//!
//! The first digit names the format: `1` for a raw payload, `3` for a zstd
//! compressed one. The remaining digits are the payload, prefixed with a 0x01
//! byte so leading zero bytes survive, read as one big-endian integer.

use crate::chunks;
use crate::config::Config;
use crate::error::TransportError;
use num_bigint::BigUint;
use tracing::debug;

const RAW: char = '1';
const COMPRESSED: char = '3';

/// Decimal digits of a big-endian integer.
fn to_decimal(bytes: &[u8]) -> String {
    BigUint::from_bytes_be(bytes).to_str_radix(10)
}

/// Big-endian bytes of a decimal integer, without leading zero bytes.
fn from_decimal(digits: &str) -> Result<Vec<u8>, TransportError> {
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_digit()) {
        return Err(TransportError::InvalidDigit(bad));
    }
    let Some(value) = BigUint::parse_bytes(digits.as_bytes(), 10) else {
        return Ok(Vec::new());
    };
    if value.bits() == 0 {
        return Ok(Vec::new());
    }
    Ok(value.to_bytes_be())
}

fn with_sentinel(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 1);
    framed.push(1);
    framed.extend_from_slice(payload);
    framed
}

/// Encodes `payload`, compressing it when asked and when that makes it
/// shorter.
pub fn encode(payload: &[u8], compress: bool) -> Result<String, TransportError> {
    let (format, body) = if compress {
        let packed = zstd::encode_all(payload, 0)?;
        if packed.len() < payload.len() {
            debug!(raw = payload.len(), packed = packed.len(), "compressed payload");
            (COMPRESSED, packed)
        } else {
            (RAW, payload.to_vec())
        }
    } else {
        (RAW, payload.to_vec())
    };
    let mut out = String::new();
    out.push(format);
    out.push_str(&to_decimal(&with_sentinel(&body)));
    Ok(out)
}

pub fn decode(text: &str) -> Result<Vec<u8>, TransportError> {
    let mut chars = text.chars();
    let format = chars.next().ok_or(TransportError::Empty)?;
    if format != RAW && format != COMPRESSED {
        return Err(if format.is_ascii_digit() {
            TransportError::UnknownFormat(format)
        } else {
            TransportError::InvalidDigit(format)
        });
    }
    let framed = from_decimal(chars.as_str())?;
    let body = match framed.split_first() {
        Some((1, body)) => body,
        _ => return Err(TransportError::MissingSentinel),
    };
    if format == COMPRESSED {
        return Ok(zstd::decode_all(body)?);
    }
    Ok(body.to_vec())
}

/// Splits `payload` into chunks of at most `max_payload` bytes and encodes
/// each one.
pub fn encode_chunked(
    payload: &[u8],
    max_payload: usize,
    compress: bool,
) -> Result<Vec<String>, TransportError> {
    chunks::split(payload, max_payload)?
        .iter()
        .map(|chunk| encode(chunk, compress))
        .collect()
}

/// Decodes and reassembles the strings produced by [`encode_chunked`], in
/// any order.
pub fn decode_chunked<S: AsRef<str>>(texts: &[S]) -> Result<Vec<u8>, TransportError> {
    let decoded = texts
        .iter()
        .map(|text| decode(text.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(chunks::reassemble(&decoded)?)
}

/// [`encode_chunked`] with the chunk size and compression from `config`.
pub fn encode_with(config: &Config, payload: &[u8]) -> Result<Vec<String>, TransportError> {
    encode_chunked(payload, config.chunk_payload, config.compress)
}
