//! Algorithm identifiers for JWE key management and content encryption

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error;

/// AES and RSA key wrapping algorithms
///
/// This list may be expanded in the future.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyWrap {
    /// AES Key Wrap with a 128-bit key
    Aes128,
    /// AES Key Wrap with a 192-bit key
    Aes192,
    /// AES Key Wrap with a 256-bit key
    Aes256,
    /// AES-GCM key encryption with a 128-bit key
    Aes128Gcm,
    /// AES-GCM key encryption with a 256-bit key
    Aes256Gcm,
    /// RSAES-PKCS1-v1_5 key encryption
    Rsa1_5,
    /// RSAES-OAEP key encryption using SHA-1
    RsaOaep,
    /// RSAES-OAEP key encryption using SHA-256
    RsaOaep256,
}

impl KeyWrap {
    /// The required AES key size in bytes, for the AES-based wraps
    #[must_use]
    pub const fn aes_key_len(self) -> Option<usize> {
        match self {
            Self::Aes128 | Self::Aes128Gcm => Some(16),
            Self::Aes192 => Some(24),
            Self::Aes256 | Self::Aes256Gcm => Some(32),
            Self::Rsa1_5 | Self::RsaOaep | Self::RsaOaep256 => None,
        }
    }
}

/// ECDH-ES key agreement algorithms
///
/// This list may be expanded in the future.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyAgreement {
    /// Direct key agreement: the derived key is the CEK
    EcdhEs,
    /// Key agreement producing a 128-bit AES Key Wrap key
    EcdhEsA128Kw,
    /// Key agreement producing a 256-bit AES Key Wrap key
    EcdhEsA256Kw,
}

impl KeyAgreement {
    /// The derived wrapping key length in bytes, or `None` for direct
    /// agreement
    #[must_use]
    pub const fn wrap_key_len(self) -> Option<usize> {
        match self {
            Self::EcdhEs => None,
            Self::EcdhEsA128Kw => Some(16),
            Self::EcdhEsA256Kw => Some(32),
        }
    }
}

/// PBES2 password-based key management algorithms
///
/// This list may be expanded in the future.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum Pbes2 {
    /// PBKDF2 with HMAC-SHA-256 deriving a 128-bit AES Key Wrap key
    Hs256A128Kw,
    /// PBKDF2 with HMAC-SHA-384 deriving a 192-bit AES Key Wrap key
    Hs384A192Kw,
    /// PBKDF2 with HMAC-SHA-512 deriving a 256-bit AES Key Wrap key
    Hs512A256Kw,
}

impl Pbes2 {
    /// The derived wrapping key length in bytes
    #[must_use]
    pub const fn wrap_key_len(self) -> usize {
        match self {
            Self::Hs256A128Kw => 16,
            Self::Hs384A192Kw => 24,
            Self::Hs512A256Kw => 32,
        }
    }
}

/// A JWE key management algorithm, grouped by family
///
/// Each family is a distinct code path in the JWE engine: the family of
/// the `alg` header parameter determines how the content encryption key is
/// established.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyManagement {
    /// The provided symmetric key is used directly as the CEK (`dir`)
    Direct,
    /// A fresh CEK is wrapped with the provided key
    KeyWrap(KeyWrap),
    /// The CEK (or a wrapping key) is derived by ECDH with an ephemeral key
    KeyAgreement(KeyAgreement),
    /// A wrapping key is derived from a password via PBKDF2
    PasswordBased(Pbes2),
}

impl KeyManagement {
    /// The JOSE identifier for this algorithm
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Direct => "dir",
            Self::KeyWrap(KeyWrap::Aes128) => "A128KW",
            Self::KeyWrap(KeyWrap::Aes192) => "A192KW",
            Self::KeyWrap(KeyWrap::Aes256) => "A256KW",
            Self::KeyWrap(KeyWrap::Aes128Gcm) => "A128GCMKW",
            Self::KeyWrap(KeyWrap::Aes256Gcm) => "A256GCMKW",
            Self::KeyWrap(KeyWrap::Rsa1_5) => "RSA1_5",
            Self::KeyWrap(KeyWrap::RsaOaep) => "RSA-OAEP",
            Self::KeyWrap(KeyWrap::RsaOaep256) => "RSA-OAEP-256",
            Self::KeyAgreement(KeyAgreement::EcdhEs) => "ECDH-ES",
            Self::KeyAgreement(KeyAgreement::EcdhEsA128Kw) => "ECDH-ES+A128KW",
            Self::KeyAgreement(KeyAgreement::EcdhEsA256Kw) => "ECDH-ES+A256KW",
            Self::PasswordBased(Pbes2::Hs256A128Kw) => "PBES2-HS256+A128KW",
            Self::PasswordBased(Pbes2::Hs384A192Kw) => "PBES2-HS384+A192KW",
            Self::PasswordBased(Pbes2::Hs512A256Kw) => "PBES2-HS512+A256KW",
        }
    }

    /// Whether the serialization carries an encrypted key segment
    ///
    /// Direct encryption and direct key agreement establish the CEK
    /// without transporting it.
    #[must_use]
    pub const fn produces_encrypted_key(self) -> bool {
        !matches!(self, Self::Direct | Self::KeyAgreement(KeyAgreement::EcdhEs))
    }
}

impl FromStr for KeyManagement {
    type Err = error::UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let alg = match s {
            "dir" => Self::Direct,
            "A128KW" => Self::KeyWrap(KeyWrap::Aes128),
            "A192KW" => Self::KeyWrap(KeyWrap::Aes192),
            "A256KW" => Self::KeyWrap(KeyWrap::Aes256),
            "A128GCMKW" => Self::KeyWrap(KeyWrap::Aes128Gcm),
            "A256GCMKW" => Self::KeyWrap(KeyWrap::Aes256Gcm),
            "RSA1_5" => Self::KeyWrap(KeyWrap::Rsa1_5),
            "RSA-OAEP" => Self::KeyWrap(KeyWrap::RsaOaep),
            "RSA-OAEP-256" => Self::KeyWrap(KeyWrap::RsaOaep256),
            "ECDH-ES" => Self::KeyAgreement(KeyAgreement::EcdhEs),
            "ECDH-ES+A128KW" => Self::KeyAgreement(KeyAgreement::EcdhEsA128Kw),
            "ECDH-ES+A256KW" => Self::KeyAgreement(KeyAgreement::EcdhEsA256Kw),
            "PBES2-HS256+A128KW" => Self::PasswordBased(Pbes2::Hs256A128Kw),
            "PBES2-HS384+A192KW" => Self::PasswordBased(Pbes2::Hs384A192Kw),
            "PBES2-HS512+A256KW" => Self::PasswordBased(Pbes2::Hs512A256Kw),
            other => return Err(error::unknown_algorithm(other)),
        };
        Ok(alg)
    }
}

impl fmt::Display for KeyManagement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for KeyManagement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for KeyManagement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = <&str>::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// A JWE content encryption algorithm
///
/// Selects the AEAD primitive that protects the payload. The CEK, IV, and
/// tag lengths are fixed per algorithm.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ContentEncryption {
    /// AES-GCM with a 128-bit key
    #[serde(rename = "A128GCM")]
    A128Gcm,
    /// AES-GCM with a 256-bit key
    #[serde(rename = "A256GCM")]
    A256Gcm,
    /// AES-128-CBC with HMAC-SHA-256, composed per RFC 7518 §5.2
    #[serde(rename = "A128CBC-HS256")]
    A128CbcHs256,
    /// AES-256-CBC with HMAC-SHA-512, composed per RFC 7518 §5.2
    #[serde(rename = "A256CBC-HS512")]
    A256CbcHs512,
}

impl ContentEncryption {
    /// The JOSE identifier for this algorithm
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A128Gcm => "A128GCM",
            Self::A256Gcm => "A256GCM",
            Self::A128CbcHs256 => "A128CBC-HS256",
            Self::A256CbcHs512 => "A256CBC-HS512",
        }
    }

    /// The required CEK length in bytes
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::A128Gcm => 16,
            Self::A256Gcm => 32,
            Self::A128CbcHs256 => 32,
            Self::A256CbcHs512 => 64,
        }
    }

    /// The required IV length in bytes
    #[must_use]
    pub const fn iv_len(self) -> usize {
        match self {
            Self::A128Gcm | Self::A256Gcm => 12,
            Self::A128CbcHs256 | Self::A256CbcHs512 => 16,
        }
    }

    /// The authentication tag length in bytes
    #[must_use]
    pub const fn tag_len(self) -> usize {
        match self {
            Self::A128Gcm | Self::A256Gcm | Self::A128CbcHs256 => 16,
            Self::A256CbcHs512 => 32,
        }
    }
}

impl FromStr for ContentEncryption {
    type Err = error::UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A128GCM" => Ok(Self::A128Gcm),
            "A256GCM" => Ok(Self::A256Gcm),
            "A128CBC-HS256" => Ok(Self::A128CbcHs256),
            "A256CBC-HS512" => Ok(Self::A256CbcHs512),
            other => Err(error::unknown_algorithm(other)),
        }
    }
}

impl fmt::Display for ContentEncryption {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_management_names_round_trip() {
        let algs = [
            "dir",
            "A128KW",
            "A192KW",
            "A256KW",
            "A128GCMKW",
            "A256GCMKW",
            "RSA1_5",
            "RSA-OAEP",
            "RSA-OAEP-256",
            "ECDH-ES",
            "ECDH-ES+A128KW",
            "ECDH-ES+A256KW",
            "PBES2-HS256+A128KW",
            "PBES2-HS384+A192KW",
            "PBES2-HS512+A256KW",
        ];
        for name in algs {
            let alg: KeyManagement = name.parse().unwrap();
            assert_eq!(alg.name(), name);
        }
    }

    #[test]
    fn unknown_name_rejected() {
        assert!("none".parse::<KeyManagement>().is_err());
        assert!("A384GCM".parse::<ContentEncryption>().is_err());
    }

    #[test]
    fn serde_uses_jose_names() {
        let alg = KeyManagement::KeyAgreement(KeyAgreement::EcdhEsA128Kw);
        assert_eq!(serde_json::to_string(&alg).unwrap(), "\"ECDH-ES+A128KW\"");
        let enc: ContentEncryption = serde_json::from_str("\"A128CBC-HS256\"").unwrap();
        assert_eq!(enc, ContentEncryption::A128CbcHs256);
    }
}
