//! The algorithm registry
//!
//! A single table mapping every supported JOSE algorithm name to what the
//! engine knows about it: whether it signs or encrypts, which typed
//! identifier it parses to, and what shape of key it demands. Header
//! processing resolves names through this table so that an unknown or
//! misapplied `alg` is rejected before any key material is touched.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::{
    error,
    jwa::{
        ec::Curve, okp::OkpCurve, ContentEncryption, KeyAgreement, KeyManagement, KeyWrap, Pbes2,
        Usage,
    },
    jwk::Key,
    jws,
};

/// The typed identifier an algorithm name resolves to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum AlgorithmId {
    /// A JWS signing algorithm
    Signing(jws::Algorithm),
    /// A JWE key management algorithm
    KeyManagement(KeyManagement),
    /// A JWE content encryption algorithm
    ContentEncryption(ContentEncryption),
}

/// The shape of key an algorithm demands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyRequirement {
    /// An RSA key
    Rsa,
    /// A key on the given NIST curve
    EllipticCurve(Curve),
    /// Any key agreement key: a NIST curve key or an X25519 key
    AgreementKey,
    /// An Ed25519 key
    Ed25519,
    /// A symmetric key of at least the given length in bytes
    SymmetricAtLeast(usize),
    /// A symmetric key of exactly the given length in bytes
    SymmetricExactly(usize),
    /// Any symmetric key
    AnySymmetric,
    /// Keyed by the content encryption key rather than a stored key
    ContentKey,
}

impl KeyRequirement {
    /// Whether the given key satisfies this requirement
    #[must_use]
    pub fn satisfied_by(self, key: &Key) -> bool {
        match (self, key) {
            (Self::Rsa, Key::Rsa(_)) => true,
            (Self::EllipticCurve(c), Key::EllipticCurve(k)) => k.curve() == c,
            (Self::AgreementKey, Key::EllipticCurve(_)) => true,
            (Self::AgreementKey, Key::Okp(k)) => k.curve() == OkpCurve::X25519,
            (Self::Ed25519, Key::Okp(k)) => k.curve() == OkpCurve::Ed25519,
            (Self::SymmetricAtLeast(n), Key::Oct(k)) => k.len() >= n,
            (Self::SymmetricExactly(n), Key::Oct(k)) => k.len() == n,
            (Self::AnySymmetric, Key::Oct(_)) => true,
            _ => false,
        }
    }
}

/// Everything the engine knows about one registered algorithm
#[derive(Clone, Copy, Debug)]
#[must_use]
pub struct Descriptor {
    /// The JOSE name
    pub name: &'static str,
    /// Whether the algorithm signs or encrypts
    pub usage: Usage,
    /// The typed identifier
    pub id: AlgorithmId,
    /// The key shape the algorithm demands
    pub key: KeyRequirement,
}

impl Descriptor {
    /// Requires that the given key fits this algorithm
    ///
    /// # Errors
    ///
    /// Returns an error naming the algorithm if the key does not fit.
    pub fn check_key(&self, key: &Key) -> Result<(), error::IncompatibleKey> {
        if self.key.satisfied_by(key) {
            Ok(())
        } else {
            Err(error::incompatible_key(self.name))
        }
    }
}

static REGISTRY: Lazy<HashMap<&'static str, Descriptor>> = Lazy::new(|| {
    use crate::jwa::{ec, oct, okp, rsa};

    let signing = |name, id, key| Descriptor {
        name,
        usage: Usage::Signing,
        id: AlgorithmId::Signing(id),
        key,
    };
    let key_mgmt = |name, id, key| Descriptor {
        name,
        usage: Usage::Encryption,
        id: AlgorithmId::KeyManagement(id),
        key,
    };
    let content = |name, id| Descriptor {
        name,
        usage: Usage::Encryption,
        id: AlgorithmId::ContentEncryption(id),
        key: KeyRequirement::ContentKey,
    };

    let descriptors = [
        signing(
            "HS256",
            jws::Algorithm::Hmac(oct::SigningAlgorithm::HS256),
            KeyRequirement::SymmetricAtLeast(32),
        ),
        signing(
            "HS384",
            jws::Algorithm::Hmac(oct::SigningAlgorithm::HS384),
            KeyRequirement::SymmetricAtLeast(48),
        ),
        signing(
            "HS512",
            jws::Algorithm::Hmac(oct::SigningAlgorithm::HS512),
            KeyRequirement::SymmetricAtLeast(64),
        ),
        signing(
            "RS256",
            jws::Algorithm::Rsa(rsa::SigningAlgorithm::RS256),
            KeyRequirement::Rsa,
        ),
        signing(
            "RS384",
            jws::Algorithm::Rsa(rsa::SigningAlgorithm::RS384),
            KeyRequirement::Rsa,
        ),
        signing(
            "RS512",
            jws::Algorithm::Rsa(rsa::SigningAlgorithm::RS512),
            KeyRequirement::Rsa,
        ),
        signing(
            "PS256",
            jws::Algorithm::Rsa(rsa::SigningAlgorithm::PS256),
            KeyRequirement::Rsa,
        ),
        signing(
            "PS384",
            jws::Algorithm::Rsa(rsa::SigningAlgorithm::PS384),
            KeyRequirement::Rsa,
        ),
        signing(
            "PS512",
            jws::Algorithm::Rsa(rsa::SigningAlgorithm::PS512),
            KeyRequirement::Rsa,
        ),
        signing(
            "ES256",
            jws::Algorithm::EllipticCurve(ec::SigningAlgorithm::ES256),
            KeyRequirement::EllipticCurve(Curve::P256),
        ),
        signing(
            "ES384",
            jws::Algorithm::EllipticCurve(ec::SigningAlgorithm::ES384),
            KeyRequirement::EllipticCurve(Curve::P384),
        ),
        signing(
            "EdDSA",
            jws::Algorithm::Okp(okp::SigningAlgorithm::EdDSA),
            KeyRequirement::Ed25519,
        ),
        key_mgmt("dir", KeyManagement::Direct, KeyRequirement::AnySymmetric),
        key_mgmt(
            "A128KW",
            KeyManagement::KeyWrap(KeyWrap::Aes128),
            KeyRequirement::SymmetricExactly(16),
        ),
        key_mgmt(
            "A192KW",
            KeyManagement::KeyWrap(KeyWrap::Aes192),
            KeyRequirement::SymmetricExactly(24),
        ),
        key_mgmt(
            "A256KW",
            KeyManagement::KeyWrap(KeyWrap::Aes256),
            KeyRequirement::SymmetricExactly(32),
        ),
        key_mgmt(
            "A128GCMKW",
            KeyManagement::KeyWrap(KeyWrap::Aes128Gcm),
            KeyRequirement::SymmetricExactly(16),
        ),
        key_mgmt(
            "A256GCMKW",
            KeyManagement::KeyWrap(KeyWrap::Aes256Gcm),
            KeyRequirement::SymmetricExactly(32),
        ),
        key_mgmt(
            "RSA1_5",
            KeyManagement::KeyWrap(KeyWrap::Rsa1_5),
            KeyRequirement::Rsa,
        ),
        key_mgmt(
            "RSA-OAEP",
            KeyManagement::KeyWrap(KeyWrap::RsaOaep),
            KeyRequirement::Rsa,
        ),
        key_mgmt(
            "RSA-OAEP-256",
            KeyManagement::KeyWrap(KeyWrap::RsaOaep256),
            KeyRequirement::Rsa,
        ),
        key_mgmt(
            "ECDH-ES",
            KeyManagement::KeyAgreement(KeyAgreement::EcdhEs),
            KeyRequirement::AgreementKey,
        ),
        key_mgmt(
            "ECDH-ES+A128KW",
            KeyManagement::KeyAgreement(KeyAgreement::EcdhEsA128Kw),
            KeyRequirement::AgreementKey,
        ),
        key_mgmt(
            "ECDH-ES+A256KW",
            KeyManagement::KeyAgreement(KeyAgreement::EcdhEsA256Kw),
            KeyRequirement::AgreementKey,
        ),
        key_mgmt(
            "PBES2-HS256+A128KW",
            KeyManagement::PasswordBased(Pbes2::Hs256A128Kw),
            KeyRequirement::AnySymmetric,
        ),
        key_mgmt(
            "PBES2-HS384+A192KW",
            KeyManagement::PasswordBased(Pbes2::Hs384A192Kw),
            KeyRequirement::AnySymmetric,
        ),
        key_mgmt(
            "PBES2-HS512+A256KW",
            KeyManagement::PasswordBased(Pbes2::Hs512A256Kw),
            KeyRequirement::AnySymmetric,
        ),
        content("A128GCM", ContentEncryption::A128Gcm),
        content("A256GCM", ContentEncryption::A256Gcm),
        content("A128CBC-HS256", ContentEncryption::A128CbcHs256),
        content("A256CBC-HS512", ContentEncryption::A256CbcHs512),
    ];

    descriptors.into_iter().map(|d| (d.name, d)).collect()
});

/// Looks up an algorithm by its JOSE name
///
/// # Errors
///
/// Returns an error if the name is not registered.
pub fn resolve(name: &str) -> Result<&'static Descriptor, error::UnknownAlgorithm> {
    REGISTRY
        .get(name)
        .ok_or_else(|| error::unknown_algorithm(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwa::Oct;

    #[test]
    fn unknown_name_rejected() {
        assert!(resolve("none").is_err());
        assert!(resolve("ES512").is_err());
        assert!(resolve("hs256").is_err());
    }

    #[test]
    fn signing_and_encryption_usage_split() {
        assert_eq!(resolve("RS256").unwrap().usage, Usage::Signing);
        assert_eq!(resolve("RSA-OAEP").unwrap().usage, Usage::Encryption);
        assert_eq!(resolve("A128GCM").unwrap().usage, Usage::Encryption);
    }

    #[test]
    fn hmac_requires_minimum_key_length() {
        let desc = resolve("HS256").unwrap();
        let short = Key::from(Oct::generate(16).unwrap());
        let exact = Key::from(Oct::generate(32).unwrap());

        assert!(desc.check_key(&short).is_err());
        assert!(desc.check_key(&exact).is_ok());
    }

    #[test]
    fn wrap_requires_exact_key_length() {
        let desc = resolve("A128KW").unwrap();
        assert!(desc.check_key(&Key::from(Oct::generate(16).unwrap())).is_ok());
        assert!(desc.check_key(&Key::from(Oct::generate(32).unwrap())).is_err());
    }

    #[test]
    fn rsa_key_rejected_for_hmac() {
        let desc = resolve("HS256").unwrap();
        let key = Key::from(crate::jwa::Rsa::generate().unwrap());
        assert!(desc.check_key(&key).is_err());
    }

    #[test]
    fn curve_must_match_signing_algorithm() {
        let desc = resolve("ES256").unwrap();
        let p384 = Key::from(crate::jwa::EllipticCurve::generate(Curve::P384).unwrap());
        assert!(desc.check_key(&p384).is_err());

        let agree = resolve("ECDH-ES").unwrap();
        assert!(agree.check_key(&p384).is_ok());
    }
}
