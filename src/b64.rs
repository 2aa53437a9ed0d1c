//! Base64url codec
//!
//! All JOSE wire segments use the URL-safe alphabet without padding
//! ([RFC7515][] section 2). Padded or out-of-alphabet input is rejected.
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515

use std::{error::Error, fmt};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The data contained was not valid unpadded base64url
#[derive(Debug)]
pub struct InvalidBase64Data {
    source: base64::DecodeError,
}

impl fmt::Display for InvalidBase64Data {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid base64url data")
    }
}

impl Error for InvalidBase64Data {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Encodes bytes with the unpadded URL-safe alphabet
#[must_use]
pub fn encode(raw: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(raw.as_ref())
}

/// Decodes unpadded URL-safe base64 text
///
/// # Errors
///
/// Returns an error if the input contains characters outside the
/// base64url alphabet, including `=` padding.
pub fn decode(enc: impl AsRef<[u8]>) -> Result<Vec<u8>, InvalidBase64Data> {
    URL_SAFE_NO_PAD
        .decode(enc.as_ref())
        .map_err(|source| InvalidBase64Data { source })
}

/// An owned byte buffer that displays and serializes as unpadded base64url
///
/// The raw bytes are held in memory; the encoded form is produced on
/// demand. `Debug` output keeps the encoded form behind a `b64!` marker so
/// logs make the encoding obvious.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
#[must_use]
pub struct Base64Url(Vec<u8>);

impl Base64Url {
    /// Constructs the buffer from already-decoded raw bytes
    pub fn from_raw(raw: impl Into<Vec<u8>>) -> Self {
        Self(raw.into())
    }

    /// Decodes an encoded segment into a new buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is not valid unpadded base64url.
    pub fn from_encoded(enc: impl AsRef<[u8]>) -> Result<Self, InvalidBase64Data> {
        decode(enc).map(Self)
    }

    /// The raw bytes
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// A mutable view of the raw bytes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// Unwraps the raw bytes
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    /// The number of raw bytes held
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The length of the encoded form of `len` raw bytes
    #[must_use]
    pub const fn calc_encoded_len(len: usize) -> usize {
        (len * 4 + 2) / 3
    }

    /// The length of this buffer's encoded form
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        Self::calc_encoded_len(self.0.len())
    }
}

impl From<Vec<u8>> for Base64Url {
    fn from(raw: Vec<u8>) -> Self {
        Self(raw)
    }
}

impl From<&'_ [u8]> for Base64Url {
    fn from(raw: &[u8]) -> Self {
        Self(raw.to_vec())
    }
}

impl From<Base64Url> for Vec<u8> {
    fn from(b: Base64Url) -> Self {
        b.0
    }
}

impl AsRef<[u8]> for Base64Url {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Base64Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&encode(&self.0))
    }
}

impl fmt::Debug for Base64Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "b64!{{{}}}", self)
    }
}

impl Serialize for Base64Url {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Base64Url {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let enc = std::borrow::Cow::<str>::deserialize(deserializer)?;
        Self::from_encoded(enc.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = b"\x00\x01\xfe\xffsigil";
        let enc = encode(data);
        assert_eq!(decode(&enc).unwrap(), data);
    }

    #[test]
    fn rejects_padding() {
        assert!(decode("AQAB=").is_err());
        assert!(decode("AA==").is_err());
    }

    #[test]
    fn rejects_standard_alphabet() {
        assert!(decode("a+b/").is_err());
    }

    #[test]
    fn empty_is_valid() {
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
        assert_eq!(encode([]), "");
    }

    #[test]
    fn display_is_encoded_form() {
        let b = Base64Url::from_raw(&b"hello"[..]);
        assert_eq!(b.to_string(), "aGVsbG8");
        assert_eq!(b.encoded_len(), 7);
    }

    #[test]
    fn serde_round_trip() {
        let b = Base64Url::from_raw(&b"\x01\x02\x03"[..]);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "\"AQID\"");
        let back: Base64Url = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }
}
