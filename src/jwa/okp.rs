//! Octet key pair (OKP) JSON Web Algorithm implementations
//!
//! Keys per [RFC8037][]: Ed25519 for `EdDSA` signatures and X25519 for the
//! ECDH-ES key agreement family.
//!
//! [RFC8037]: https://tools.ietf.org/html/rfc8037

use std::{convert::TryFrom, fmt};

use openssl::{
    derive::Deriver,
    pkey::{Id, PKey},
};
use serde::{Deserialize, Serialize};

use crate::{b64::Base64Url, error, jws};

const KEY_LEN: usize = 32;

/// A named OKP curve
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum OkpCurve {
    /// Ed25519, used for signing
    Ed25519,
    /// X25519, used for key agreement
    X25519,
}

impl OkpCurve {
    /// The JOSE name of the curve
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ed25519 => "Ed25519",
            Self::X25519 => "X25519",
        }
    }

    /// The DER content octets of the curve's object identifier
    pub(crate) const fn oid(self) -> &'static [u8] {
        match self {
            Self::Ed25519 => &[0x2B, 0x65, 0x70],
            Self::X25519 => &[0x2B, 0x65, 0x6E],
        }
    }

    pub(crate) fn from_oid(oid: &[u8]) -> Option<Self> {
        [Self::Ed25519, Self::X25519]
            .into_iter()
            .find(|c| c.oid() == oid)
    }

    fn openssl_id(self) -> Id {
        match self {
            Self::Ed25519 => Id::ED25519,
            Self::X25519 => Id::X25519,
        }
    }
}

impl fmt::Display for OkpCurve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// OKP public key parameters
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PublicKeyDto", into = "PublicKeyDto")]
#[must_use]
pub struct PublicKey {
    curve: OkpCurve,
    x: Base64Url,
}

impl PublicKey {
    /// Constructs a public key from its encoded point
    ///
    /// # Errors
    ///
    /// The point is not the correct length for the curve.
    pub fn from_point(curve: OkpCurve, x: impl Into<Base64Url>) -> Result<Self, error::KeyRejected> {
        let x = x.into();

        if x.len() != KEY_LEN {
            return Err(error::key_rejected("public key must be 32 bytes"));
        }

        Ok(Self { curve, x })
    }

    /// The key's curve
    #[must_use]
    pub fn curve(&self) -> OkpCurve {
        self.curve
    }

    /// The encoded public point
    #[must_use]
    pub fn x(&self) -> &[u8] {
        self.x.as_slice()
    }
}

impl jws::Verifier for PublicKey {
    type Algorithm = SigningAlgorithm;
    type Error = error::CryptoOperationFailed;

    fn can_verify(&self, _alg: Self::Algorithm) -> bool {
        self.curve == OkpCurve::Ed25519
    }

    fn verify(
        &self,
        alg: Self::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        if !self.can_verify(alg) {
            return Err(error::crypto_failed());
        }

        let key = ring::signature::UnparsedPublicKey::new(
            &ring::signature::ED25519,
            self.x.as_slice(),
        );

        key.verify(data, signature).map_err(|_| error::crypto_failed())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
struct PublicKeyDto {
    #[serde(rename = "crv")]
    curve: OkpCurve,
    x: Base64Url,
}

impl TryFrom<PublicKeyDto> for PublicKey {
    type Error = error::KeyRejected;

    fn try_from(dto: PublicKeyDto) -> Result<Self, Self::Error> {
        Self::from_point(dto.curve, dto.x)
    }
}

impl From<PublicKey> for PublicKeyDto {
    fn from(pk: PublicKey) -> Self {
        Self {
            curve: pk.curve,
            x: pk.x,
        }
    }
}

/// OKP private key parameters
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PrivateKeyDto", into = "PrivateKeyDto")]
#[must_use]
pub struct PrivateKey {
    public_key: PublicKey,
    d: Base64Url,
}

impl PrivateKey {
    /// Generates a new key pair on the specified curve
    ///
    /// # Errors
    ///
    /// Unable to generate a private key.
    pub fn generate(curve: OkpCurve) -> Result<Self, error::Unexpected> {
        let pkey = match curve {
            OkpCurve::Ed25519 => PKey::generate_ed25519(),
            OkpCurve::X25519 => PKey::generate_x25519(),
        }
        .map_err(error::unexpected)?;

        let x = pkey.raw_public_key().map_err(error::unexpected)?;
        let d = pkey.raw_private_key().map_err(error::unexpected)?;

        let public_key = PublicKey::from_point(curve, x).map_err(error::unexpected)?;

        Ok(Self {
            public_key,
            d: Base64Url::from_raw(d),
        })
    }

    /// Constructs a private key from its seed alone
    ///
    /// The public point is recomputed from the seed.
    ///
    /// # Errors
    ///
    /// The seed is the wrong length for the curve.
    pub fn from_seed(curve: OkpCurve, d: impl Into<Base64Url>) -> Result<Self, error::KeyRejected> {
        let d = d.into();

        if d.len() != KEY_LEN {
            return Err(error::key_rejected("private key must be 32 bytes"));
        }

        let pkey = PKey::private_key_from_raw_bytes(d.as_slice(), curve.openssl_id())
            .map_err(error::key_rejected)?;
        let x = pkey.raw_public_key().map_err(error::key_rejected)?;
        let public_key = PublicKey::from_point(curve, x)?;

        Ok(Self { public_key, d })
    }

    /// Constructs a private key from its seed and public point
    ///
    /// # Errors
    ///
    /// The parameters are inconsistent or the wrong length.
    pub fn from_components(
        public_key: PublicKey,
        d: impl Into<Base64Url>,
    ) -> Result<Self, error::KeyRejected> {
        let d = d.into();

        if d.len() != KEY_LEN {
            return Err(error::key_rejected("private key must be 32 bytes"));
        }

        let pkey = PKey::private_key_from_raw_bytes(d.as_slice(), public_key.curve.openssl_id())
            .map_err(error::key_rejected)?;
        let x = pkey.raw_public_key().map_err(error::key_rejected)?;
        if x != public_key.x.as_slice() {
            return Err(error::key_rejected("public key does not match private key"));
        }

        Ok(Self { public_key, d })
    }

    /// Provides access to the public key parameters
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Extracts the public key
    pub fn into_public_key(self) -> PublicKey {
        self.public_key
    }

    pub(crate) fn d(&self) -> &[u8] {
        self.d.as_slice()
    }

    /// Derives the X25519 shared secret with the peer's public key
    pub(crate) fn agree(&self, peer: &PublicKey) -> Result<Vec<u8>, error::CryptoOperationFailed> {
        if self.public_key.curve != OkpCurve::X25519 || peer.curve != OkpCurve::X25519 {
            return Err(error::crypto_failed());
        }

        let ecdh = || {
            let private = PKey::private_key_from_raw_bytes(self.d.as_slice(), Id::X25519)?;
            let peer = PKey::public_key_from_raw_bytes(peer.x.as_slice(), Id::X25519)?;

            let mut deriver = Deriver::new(&private)?;
            deriver.set_peer(&peer)?;
            deriver.derive_to_vec()
        };

        ecdh().map_err(|_: openssl::error::ErrorStack| error::crypto_failed())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl jws::Signer for PrivateKey {
    type Algorithm = SigningAlgorithm;
    type Error = error::KeyOpError;

    fn can_sign(&self, _alg: Self::Algorithm) -> bool {
        self.public_key.curve == OkpCurve::Ed25519
    }

    fn sign(&self, alg: Self::Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
        if !self.can_sign(alg) {
            return Err(error::incompatible_key(alg.to_string()).into());
        }

        let pair = ring::signature::Ed25519KeyPair::from_seed_and_public_key(
            self.d.as_slice(),
            self.public_key.x.as_slice(),
        )
        .map_err(|e| error::unexpected(e.to_string()))?;

        Ok(pair.sign(data).as_ref().to_owned())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
struct PrivateKeyDto {
    #[serde(rename = "d")]
    key: Base64Url,

    #[serde(flatten)]
    public_key: PublicKeyDto,
}

impl From<PrivateKey> for PrivateKeyDto {
    fn from(pk: PrivateKey) -> Self {
        Self {
            key: pk.d,
            public_key: PublicKeyDto::from(pk.public_key),
        }
    }
}

impl TryFrom<PrivateKeyDto> for PrivateKey {
    type Error = error::KeyRejected;

    fn try_from(dto: PrivateKeyDto) -> Result<Self, Self::Error> {
        let public_key = PublicKey::try_from(dto.public_key)?;
        PrivateKey::from_components(public_key, dto.key)
    }
}

/// Octet key pair key
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use]
pub struct Okp {
    key: MaybePrivate,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum MaybePrivate {
    PublicAndPrivate(PrivateKey),
    PublicOnly(PublicKey),
}

impl Okp {
    /// Generates a newly minted key pair on the specified curve
    ///
    /// # Errors
    ///
    /// Unable to generate a key pair.
    pub fn generate(curve: OkpCurve) -> Result<Self, error::Unexpected> {
        let private_key = PrivateKey::generate(curve)?;
        Ok(Self::from(private_key))
    }

    /// The key's curve
    #[must_use]
    pub fn curve(&self) -> OkpCurve {
        self.public_key().curve()
    }

    pub(crate) fn private_key(&self) -> Option<&PrivateKey> {
        match &self.key {
            MaybePrivate::PublicAndPrivate(p) => Some(p),
            MaybePrivate::PublicOnly(_) => None,
        }
    }

    pub(crate) fn public_key(&self) -> &PublicKey {
        match &self.key {
            MaybePrivate::PublicAndPrivate(p) => p.public_key(),
            MaybePrivate::PublicOnly(p) => p,
        }
    }

    /// Removes the private key components
    pub fn public_only(self) -> Self {
        match self.key {
            MaybePrivate::PublicAndPrivate(p) => Self::from(p.into_public_key()),
            _ => self,
        }
    }
}

impl From<PublicKey> for Okp {
    fn from(key: PublicKey) -> Self {
        Self {
            key: MaybePrivate::PublicOnly(key),
        }
    }
}

impl From<PrivateKey> for Okp {
    fn from(key: PrivateKey) -> Self {
        Self {
            key: MaybePrivate::PublicAndPrivate(key),
        }
    }
}

/// OKP signing algorithms
///
/// This list may be expanded in the future.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SigningAlgorithm {
    /// Edwards-curve digital signatures using Ed25519
    EdDSA,
}

impl From<SigningAlgorithm> for jws::Algorithm {
    fn from(alg: SigningAlgorithm) -> Self {
        Self::Okp(alg)
    }
}

impl TryFrom<jws::Algorithm> for SigningAlgorithm {
    type Error = error::IncompatibleKey;

    fn try_from(alg: jws::Algorithm) -> Result<Self, Self::Error> {
        match alg {
            jws::Algorithm::Okp(alg) => Ok(alg),
            _ => Err(error::incompatible_key(alg.to_string())),
        }
    }
}

impl jws::Verifier for Okp {
    type Algorithm = SigningAlgorithm;
    type Error = error::CryptoOperationFailed;

    fn can_verify(&self, alg: Self::Algorithm) -> bool {
        self.public_key().can_verify(alg)
    }

    fn verify(
        &self,
        alg: Self::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        self.public_key().verify(alg, data, signature)
    }
}

impl jws::Signer for Okp {
    type Algorithm = SigningAlgorithm;
    type Error = error::KeyOpError;

    fn can_sign(&self, alg: Self::Algorithm) -> bool {
        if let Some(p) = self.private_key() {
            p.can_sign(alg)
        } else {
            false
        }
    }

    fn sign(&self, alg: Self::Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
        if let Some(p) = self.private_key() {
            p.sign(alg, data)
        } else {
            Err(error::missing_private_key().into())
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("EdDSA")
    }
}
