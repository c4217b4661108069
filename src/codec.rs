//! Key and value codecs. A namespace node runs every key and value through
//! its codecs before touching the ordered index, so the index only ever sees
//! `Bytes`. Key codecs must produce bytes whose order matches the comparator.

use std::{fmt, marker::PhantomData};

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::{Errors, Result};

pub trait Codec<T>: Send + Sync {
  fn encode(&self, item: &T) -> Result<Bytes>;

  fn decode(&self, raw: &Bytes) -> Result<T>;

  /// Format label, e.g. `utf-8` or `json`.
  fn name(&self) -> &'static str;
}

/// Byte passthrough.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Codec<Bytes> for Identity {
  fn encode(&self, item: &Bytes) -> Result<Bytes> {
    Ok(item.clone())
  }

  fn decode(&self, raw: &Bytes) -> Result<Bytes> {
    Ok(raw.clone())
  }

  fn name(&self) -> &'static str {
    "binary"
  }
}

impl Codec<Vec<u8>> for Identity {
  fn encode(&self, item: &Vec<u8>) -> Result<Bytes> {
    Ok(Bytes::copy_from_slice(item))
  }

  fn decode(&self, raw: &Bytes) -> Result<Vec<u8>> {
    Ok(raw.to_vec())
  }

  fn name(&self) -> &'static str {
    "binary"
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

impl Codec<String> for Utf8 {
  fn encode(&self, item: &String) -> Result<Bytes> {
    Ok(Bytes::copy_from_slice(item.as_bytes()))
  }

  fn decode(&self, raw: &Bytes) -> Result<String> {
    String::from_utf8(raw.to_vec()).map_err(|e| Errors::DecodeFailed(e.to_string()))
  }

  fn name(&self) -> &'static str {
    "utf-8"
  }
}

/// Order-preserving integer keys, rendered as lowercase hex.
///
/// Values below 251 take a single byte. Larger values store `n - 251` in
/// 1 to 4 big-endian bytes behind a tier byte of 251 to 254, and anything
/// past the 4-byte tier uses tier 255 with 8 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexInt;

const LEXINT_TIER: u64 = 251;

impl LexInt {
  pub fn pack(n: u64) -> Vec<u8> {
    if n < LEXINT_TIER {
      return vec![n as u8];
    }
    let x = n - LEXINT_TIER;
    let width = match x {
      0..=0xff => 1,
      0x100..=0xffff => 2,
      0x1_0000..=0xff_ffff => 3,
      0x100_0000..=0xffff_ffff => 4,
      _ => 8,
    };
    let tier = if width == 8 { 255 } else { 250 + width as u8 };
    let mut out = Vec::with_capacity(width + 1);
    out.push(tier);
    out.extend_from_slice(&x.to_be_bytes()[8 - width..]);
    out
  }

  pub fn unpack(bytes: &[u8]) -> Result<u64> {
    let (&tier, rest) = bytes.split_first().ok_or(Errors::MalformedLexInt)?;
    if (tier as u64) < LEXINT_TIER {
      if !rest.is_empty() {
        return Err(Errors::MalformedLexInt);
      }
      return Ok(tier as u64);
    }
    let width = match tier {
      255 => 8,
      t => (t - 250) as usize,
    };
    if rest.len() != width {
      return Err(Errors::MalformedLexInt);
    }
    let x = rest.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
    x.checked_add(LEXINT_TIER).ok_or(Errors::MalformedLexInt)
  }
}

impl Codec<u64> for LexInt {
  fn encode(&self, item: &u64) -> Result<Bytes> {
    Ok(Bytes::from(hex::encode(Self::pack(*item))))
  }

  fn decode(&self, raw: &Bytes) -> Result<u64> {
    let bytes = hex::decode(raw).map_err(|_| Errors::MalformedLexInt)?;
    Self::unpack(&bytes)
  }

  fn name(&self) -> &'static str {
    "lexicographic-integer/hex"
  }
}

pub struct Json<T>(PhantomData<fn() -> T>);

impl<T> Default for Json<T> {
  fn default() -> Self {
    Self(PhantomData)
  }
}

impl<T> fmt::Debug for Json<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Json")
  }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for Json<T> {
  fn encode(&self, item: &T) -> Result<Bytes> {
    serde_json::to_vec(item)
      .map(Bytes::from)
      .map_err(|e| Errors::EncodeFailed(e.to_string()))
  }

  fn decode(&self, raw: &Bytes) -> Result<T> {
    serde_json::from_slice(raw).map_err(|e| Errors::DecodeFailed(e.to_string()))
  }

  fn name(&self) -> &'static str {
    "json"
  }
}

/// MessagePack values; the default value format.
pub struct MsgPack<T>(PhantomData<fn() -> T>);

impl<T> Default for MsgPack<T> {
  fn default() -> Self {
    Self(PhantomData)
  }
}

impl<T> fmt::Debug for MsgPack<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("MsgPack")
  }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for MsgPack<T> {
  fn encode(&self, item: &T) -> Result<Bytes> {
    rmp_serde::to_vec(item)
      .map(Bytes::from)
      .map_err(|e| Errors::EncodeFailed(e.to_string()))
  }

  fn decode(&self, raw: &Bytes) -> Result<T> {
    rmp_serde::from_slice(raw).map_err(|e| Errors::DecodeFailed(e.to_string()))
  }

  fn name(&self) -> &'static str {
    "binary"
  }
}

/// Codec assembled from a pair of functions.
pub struct FnCodec<E, D> {
  name: &'static str,
  encode: E,
  decode: D,
}

pub fn from_fn<T, E, D>(name: &'static str, encode: E, decode: D) -> FnCodec<E, D>
where
  E: Fn(&T) -> Result<Bytes> + Send + Sync,
  D: Fn(&Bytes) -> Result<T> + Send + Sync,
{
  FnCodec {
    name,
    encode,
    decode,
  }
}

impl<T, E, D> Codec<T> for FnCodec<E, D>
where
  E: Fn(&T) -> Result<Bytes> + Send + Sync,
  D: Fn(&Bytes) -> Result<T> + Send + Sync,
{
  fn encode(&self, item: &T) -> Result<Bytes> {
    (self.encode)(item)
  }

  fn decode(&self, raw: &Bytes) -> Result<T> {
    (self.decode)(raw)
  }

  fn name(&self) -> &'static str {
    self.name
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_lexint_preserves_order() {
    let samples = [
      0u64,
      1,
      250,
      251,
      252,
      506,
      507,
      65_786,
      65_787,
      16_777_466,
      16_777_467,
      4_294_967_546,
      4_294_967_547,
      u64::MAX - LEXINT_TIER,
      u64::MAX,
    ];
    let encoded: Vec<Bytes> = samples.iter().map(|n| LexInt.encode(n).unwrap()).collect();
    for pair in encoded.windows(2) {
      assert!(pair[0] < pair[1], "{:?} !< {:?}", pair[0], pair[1]);
    }
    for (n, raw) in samples.iter().zip(encoded.iter()) {
      assert_eq!(LexInt.decode(raw).unwrap(), *n);
    }
  }

  #[test]
  fn test_lexint_layout() {
    assert_eq!(LexInt::pack(7), vec![7]);
    assert_eq!(LexInt::pack(251), vec![251, 0]);
    assert_eq!(LexInt::pack(251 + 0x1234), vec![252, 0x12, 0x34]);
    assert_eq!(LexInt.encode(&255).unwrap(), Bytes::from("fb04"));
  }

  #[test]
  fn test_lexint_rejects_malformed() {
    assert_eq!(LexInt::unpack(&[]), Err(Errors::MalformedLexInt));
    assert_eq!(LexInt::unpack(&[3, 1]), Err(Errors::MalformedLexInt));
    assert_eq!(LexInt::unpack(&[252, 1]), Err(Errors::MalformedLexInt));
    assert_eq!(
      LexInt.decode(&Bytes::from("zz")),
      Err(Errors::MalformedLexInt)
    );
  }

  #[test]
  fn test_utf8_rejects_invalid_bytes() {
    let res = Utf8.decode(&Bytes::from_static(&[0xff, 0xfe]));
    assert!(matches!(res, Err(Errors::DecodeFailed(_))));
  }

  #[test]
  fn test_structured_codecs() {
    let value = serde_json::json!({ "name": "plain", "tags": [1, 2, 3] });

    let json = Json::<serde_json::Value>::default();
    let raw = json.encode(&value).unwrap();
    assert_eq!(json.decode(&raw).unwrap(), value);

    let msgpack = MsgPack::<serde_json::Value>::default();
    let raw = msgpack.encode(&value).unwrap();
    assert_eq!(msgpack.decode(&raw).unwrap(), value);

    let res = json.decode(&Bytes::from("{not json"));
    assert!(matches!(res, Err(Errors::DecodeFailed(_))));
  }

  #[test]
  fn test_fn_codec() {
    let upper = from_fn(
      "upper",
      |s: &String| Ok(Bytes::from(s.to_uppercase())),
      |raw: &Bytes| Utf8.decode(raw),
    );
    assert_eq!(upper.encode(&"abc".to_string()).unwrap(), Bytes::from("ABC"));
    assert_eq!(Codec::<String>::name(&upper), "upper");
  }
}
