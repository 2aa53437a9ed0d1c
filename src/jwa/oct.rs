//! Symmetric (octet sequence) JSON Web Algorithm implementations
//!
//! An `oct` key serves double duty: HMAC signatures for JWS and raw key
//! material for the symmetric JWE key management algorithms.

use std::{convert::TryFrom, fmt};

use ring::rand::SecureRandom;
use serde::{Deserialize, Serialize};

use crate::{b64::Base64Url, error, jws};

/// A symmetric secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Oct {
    #[serde(rename = "k")]
    secret: Base64Url,
}

impl fmt::Debug for Oct {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Oct { secret }")
    }
}

impl Oct {
    /// A symmetric key using the provided secret
    pub fn new(secret: impl Into<Base64Url>) -> Self {
        let secret = secret.into();
        Self { secret }
    }

    /// Generates a new secret of `len` bytes
    ///
    /// # Errors
    ///
    /// Unable to generate a new secret.
    pub fn generate(len: usize) -> Result<Self, error::Unexpected> {
        Self::generate_with_rng(len, &ring::rand::SystemRandom::new())
    }

    /// Generates a new secret using the provided source of randomness
    ///
    /// # Errors
    ///
    /// Unable to generate a new secret from the provided RNG.
    pub fn generate_with_rng(
        len: usize,
        rng: &dyn SecureRandom,
    ) -> Result<Self, error::Unexpected> {
        let mut secret = Base64Url::from_raw(vec![0; len]);

        rng.fill(secret.as_mut_slice())
            .map_err(|_| error::unexpected("random number generator failure"))?;

        Ok(Self { secret })
    }

    /// The secret's length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.secret.len()
    }

    /// Whether the secret is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    pub(crate) fn secret(&self) -> &[u8] {
        self.secret.as_slice()
    }
}

/// HMAC signing algorithms
///
/// This list may be expanded in the future.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(clippy::upper_case_acronyms)]
#[non_exhaustive]
pub enum SigningAlgorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
}

impl SigningAlgorithm {
    /// Recommended key size in bytes for an HMAC secret
    #[must_use]
    pub fn recommended_key_size(self) -> usize {
        match self {
            Self::HS256 => 256 / 8,
            Self::HS384 => 384 / 8,
            Self::HS512 => 512 / 8,
        }
    }

    /// The size in bytes of an HMAC signature
    #[must_use]
    pub fn signature_size(self) -> usize {
        self.recommended_key_size()
    }

    fn into_ring_algorithm(self) -> ring::hmac::Algorithm {
        match self {
            SigningAlgorithm::HS256 => ring::hmac::HMAC_SHA256,
            SigningAlgorithm::HS384 => ring::hmac::HMAC_SHA384,
            SigningAlgorithm::HS512 => ring::hmac::HMAC_SHA512,
        }
    }
}

impl From<SigningAlgorithm> for jws::Algorithm {
    fn from(alg: SigningAlgorithm) -> Self {
        Self::Hmac(alg)
    }
}

impl TryFrom<jws::Algorithm> for SigningAlgorithm {
    type Error = error::IncompatibleKey;

    fn try_from(alg: jws::Algorithm) -> Result<Self, Self::Error> {
        match alg {
            jws::Algorithm::Hmac(alg) => Ok(alg),
            _ => Err(error::incompatible_key(alg.to_string())),
        }
    }
}

impl jws::Signer for Oct {
    type Algorithm = SigningAlgorithm;
    type Error = std::convert::Infallible;

    fn can_sign(&self, _alg: Self::Algorithm) -> bool {
        true
    }

    fn sign(&self, alg: Self::Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
        let key = ring::hmac::Key::new(alg.into_ring_algorithm(), self.secret.as_slice());
        let digest = ring::hmac::sign(&key, data);
        Ok(digest.as_ref().to_owned())
    }
}

impl jws::Verifier for Oct {
    type Algorithm = SigningAlgorithm;
    type Error = error::CryptoOperationFailed;

    fn can_verify(&self, _alg: Self::Algorithm) -> bool {
        true
    }

    fn verify(
        &self,
        alg: Self::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        let key = ring::hmac::Key::new(alg.into_ring_algorithm(), self.secret.as_slice());
        ring::hmac::verify(&key, data, signature).map_err(|_| error::crypto_failed())
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        };

        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use jws::{Signer, Verifier};

    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let key = Oct::generate(32).unwrap();
        let sig = key.sign(SigningAlgorithm::HS256, b"payload").unwrap();
        assert_eq!(sig.len(), 32);
        key.verify(SigningAlgorithm::HS256, b"payload", &sig)
            .unwrap();
    }

    #[test]
    fn tampered_data_fails() {
        let key = Oct::generate(32).unwrap();
        let sig = key.sign(SigningAlgorithm::HS512, b"payload").unwrap();
        let err = key.verify(SigningAlgorithm::HS512, b"payloae", &sig);
        assert!(err.is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let key = Oct::new(Base64Url::from_raw(&b"super secret"[..]));
        assert_eq!(format!("{key:?}"), "Oct { secret }");
    }

    #[test]
    fn serde_uses_k_member() {
        let key = Oct::new(Base64Url::from_raw(&b"\x01\x02"[..]));
        assert_eq!(serde_json::to_string(&key).unwrap(), r#"{"k":"AQI"}"#);
    }
}
