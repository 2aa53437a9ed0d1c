//! ECC JSON Web Algorithm implementations
//!
//! Keys on the NIST curves serve ECDSA signing (`ES256`, `ES384`) and the
//! ECDH-ES key agreement family. `ES512` is not offered because the
//! underlying provider does not implement ECDSA over P-521; P-521 keys may
//! still be used for key agreement.

use std::{convert::TryFrom, fmt};

use once_cell::sync::Lazy;
use openssl::{
    bn::{BigNum, BigNumContext},
    derive::Deriver,
    ec::{EcGroup, EcGroupRef, EcKey, EcPoint},
    nid::Nid,
    pkey::PKey,
};
use serde::{Deserialize, Serialize};

use crate::{b64::Base64Url, error, jws};

static P256: Lazy<EcGroup> =
    Lazy::new(|| EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap());
static P384: Lazy<EcGroup> = Lazy::new(|| EcGroup::from_curve_name(Nid::SECP384R1).unwrap());
static P521: Lazy<EcGroup> = Lazy::new(|| EcGroup::from_curve_name(Nid::SECP521R1).unwrap());

/// A named ECC curve
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Curve {
    /// The P-256 curve (prime256v1/secp256r1)
    #[serde(rename = "P-256")]
    P256,

    /// The P-384 curve (secp384r1)
    #[serde(rename = "P-384")]
    P384,

    /// The P-521 curve (secp521r1)
    #[serde(rename = "P-521")]
    P521,
}

impl Curve {
    /// The JOSE name of the curve
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// The byte length of a field element on this curve
    #[must_use]
    pub const fn field_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    /// The DER content octets of the curve's object identifier
    pub(crate) const fn oid(self) -> &'static [u8] {
        match self {
            Self::P256 => &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07],
            Self::P384 => &[0x2B, 0x81, 0x04, 0x00, 0x22],
            Self::P521 => &[0x2B, 0x81, 0x04, 0x00, 0x23],
        }
    }

    pub(crate) fn from_oid(oid: &[u8]) -> Option<Self> {
        [Self::P256, Self::P384, Self::P521]
            .into_iter()
            .find(|c| c.oid() == oid)
    }

    fn to_group(self) -> &'static EcGroupRef {
        match self {
            Curve::P256 => &P256,
            Curve::P384 => &P384,
            Curve::P521 => &P521,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// ECC public key parameters
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PublicKeyDto", into = "PublicKeyDto")]
#[must_use]
pub struct PublicKey {
    curve: Curve,
    x: Base64Url,
    y: Base64Url,
}

impl PublicKey {
    /// Constructs a public key from its affine coordinates
    ///
    /// # Errors
    ///
    /// The coordinates do not name a point on the curve.
    pub fn from_coordinates(
        curve: Curve,
        x: impl Into<Base64Url>,
        y: impl Into<Base64Url>,
    ) -> Result<Self, error::KeyRejected> {
        let x = x.into();
        let y = y.into();

        if x.len() != curve.field_len() || y.len() != curve.field_len() {
            return Err(error::key_rejected("coordinate length does not match curve"));
        }

        let key = EcKey::from_public_key_affine_coordinates(
            curve.to_group(),
            &*BigNum::from_slice(x.as_slice()).map_err(error::key_rejected)?,
            &*BigNum::from_slice(y.as_slice()).map_err(error::key_rejected)?,
        )
        .map_err(error::key_rejected)?;
        key.check_key().map_err(error::key_rejected)?;

        Ok(Self { curve, x, y })
    }

    /// The key's curve
    #[must_use]
    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// The x-coordinate of the public point
    #[must_use]
    pub fn x(&self) -> &[u8] {
        self.x.as_slice()
    }

    /// The y-coordinate of the public point
    #[must_use]
    pub fn y(&self) -> &[u8] {
        self.y.as_slice()
    }

    /// The public point in uncompressed SEC 1 form
    #[must_use]
    pub fn uncompressed_point(&self) -> Vec<u8> {
        let mut point = Vec::with_capacity(1 + 2 * self.curve.field_len());
        point.push(0x04);
        point.extend_from_slice(self.x.as_slice());
        point.extend_from_slice(self.y.as_slice());
        point
    }

    fn to_openssl_key(&self) -> Result<EcKey<openssl::pkey::Public>, openssl::error::ErrorStack> {
        EcKey::from_public_key_affine_coordinates(
            self.curve.to_group(),
            &*BigNum::from_slice(self.x.as_slice())?,
            &*BigNum::from_slice(self.y.as_slice())?,
        )
    }
}

impl jws::Verifier for PublicKey {
    type Algorithm = SigningAlgorithm;
    type Error = error::CryptoOperationFailed;

    fn can_verify(&self, alg: Self::Algorithm) -> bool {
        self.curve == alg.curve()
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
            alg.verification_algorithm(),
            self.uncompressed_point(),
        );

        key.verify(data, signature).map_err(|_| error::crypto_failed())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
struct PublicKeyDto {
    #[serde(rename = "crv")]
    curve: Curve,
    x: Base64Url,
    y: Base64Url,
}

impl TryFrom<PublicKeyDto> for PublicKey {
    type Error = error::KeyRejected;

    fn try_from(dto: PublicKeyDto) -> Result<Self, Self::Error> {
        Self::from_coordinates(dto.curve, dto.x, dto.y)
    }
}

impl From<PublicKey> for PublicKeyDto {
    fn from(pk: PublicKey) -> Self {
        Self {
            curve: pk.curve,
            x: pk.x,
            y: pk.y,
        }
    }
}

/// ECC private key parameters
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PrivateKeyDto", into = "PrivateKeyDto")]
#[must_use]
pub struct PrivateKey {
    public_key: PublicKey,
    d: Base64Url,
}

impl PrivateKey {
    /// Generates a new ECC key pair using the specified curve
    ///
    /// # Errors
    ///
    /// Unable to generate a private key.
    pub fn generate(curve: Curve) -> Result<Self, error::Unexpected> {
        let key = EcKey::generate(curve.to_group()).map_err(error::unexpected)?;
        Self::from_openssl_eckey(curve, &key).map_err(error::unexpected)
    }

    fn from_openssl_eckey(
        curve: Curve,
        key: &EcKey<openssl::pkey::Private>,
    ) -> Result<Self, error::KeyRejected> {
        let len = i32::try_from(curve.field_len()).map_err(error::key_rejected)?;

        let ctx = &mut BigNumContext::new().map_err(error::key_rejected)?;
        let mut x = BigNum::new().map_err(error::key_rejected)?;
        let mut y = BigNum::new().map_err(error::key_rejected)?;
        key.public_key()
            .affine_coordinates_gfp(curve.to_group(), &mut x, &mut y, ctx)
            .map_err(error::key_rejected)?;

        let public_key = PublicKey::from_coordinates(
            curve,
            x.to_vec_padded(len).map_err(error::key_rejected)?,
            y.to_vec_padded(len).map_err(error::key_rejected)?,
        )?;

        let d = Base64Url::from_raw(
            key.private_key()
                .to_vec_padded(len)
                .map_err(error::key_rejected)?,
        );

        Ok(Self { public_key, d })
    }

    /// Constructs a private key from its scalar alone
    ///
    /// The public point is recomputed from the scalar.
    ///
    /// # Errors
    ///
    /// The scalar is the wrong length or out of range for the curve.
    pub fn from_scalar(curve: Curve, d: impl Into<Base64Url>) -> Result<Self, error::KeyRejected> {
        let d = d.into();

        if d.len() != curve.field_len() {
            return Err(error::key_rejected("private scalar length does not match curve"));
        }

        let group = curve.to_group();
        let scalar = BigNum::from_slice(d.as_slice()).map_err(error::key_rejected)?;
        let ctx = BigNumContext::new().map_err(error::key_rejected)?;
        let mut point = EcPoint::new(group).map_err(error::key_rejected)?;
        point
            .mul_generator(group, &scalar, &ctx)
            .map_err(error::key_rejected)?;

        let key =
            EcKey::from_private_components(group, &scalar, &point).map_err(error::key_rejected)?;
        key.check_key().map_err(error::key_rejected)?;

        Self::from_openssl_eckey(curve, &key)
    }

    /// Constructs a private key from its scalar and public coordinates
    ///
    /// # Errors
    ///
    /// The parameters are inconsistent or do not lie on the curve.
    pub fn from_components(
        public_key: PublicKey,
        d: impl Into<Base64Url>,
    ) -> Result<Self, error::KeyRejected> {
        let d = d.into();

        if d.len() != public_key.curve.field_len() {
            return Err(error::key_rejected("private scalar length does not match curve"));
        }

        let group = public_key.curve.to_group();
        let public = public_key.to_openssl_key().map_err(error::key_rejected)?;
        let scalar = BigNum::from_slice(d.as_slice()).map_err(error::key_rejected)?;
        let key = EcKey::from_private_components(group, &scalar, public.public_key())
            .map_err(error::key_rejected)?;
        key.check_key().map_err(error::key_rejected)?;

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

    fn to_openssl_pkey(
        &self,
    ) -> Result<PKey<openssl::pkey::Private>, openssl::error::ErrorStack> {
        let group = self.public_key.curve.to_group();
        let public = self.public_key.to_openssl_key()?;
        let scalar = BigNum::from_slice(self.d.as_slice())?;
        let key = EcKey::from_private_components(group, &scalar, public.public_key())?;
        PKey::from_ec_key(key)
    }

    /// Derives the ECDH shared secret with the peer's public key
    ///
    /// The result is the x-coordinate of the shared point, one field
    /// element long.
    pub(crate) fn agree(&self, peer: &PublicKey) -> Result<Vec<u8>, error::CryptoOperationFailed> {
        if self.public_key.curve != peer.curve {
            return Err(error::crypto_failed());
        }

        let ecdh = || {
            let private = self.to_openssl_pkey()?;
            let peer = PKey::from_ec_key(peer.to_openssl_key()?)?;

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

    fn can_sign(&self, alg: Self::Algorithm) -> bool {
        self.public_key.curve == alg.curve()
    }

    fn sign(&self, alg: Self::Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
        if !self.can_sign(alg) {
            return Err(error::incompatible_key(alg.to_string()).into());
        }

        let rng = ring::rand::SystemRandom::new();
        let pair = ring::signature::EcdsaKeyPair::from_private_key_and_public_key(
            alg.signing_algorithm(),
            self.d.as_slice(),
            &self.public_key.uncompressed_point(),
            &rng,
        )
        .map_err(|e| error::unexpected(e.to_string()))?;

        let signature = pair
            .sign(&rng, data)
            .map_err(|e| error::unexpected(e.to_string()))?;

        Ok(signature.as_ref().to_owned())
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

/// Elliptic curve cryptography key
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use]
pub struct EllipticCurve {
    key: MaybePrivate,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum MaybePrivate {
    PublicAndPrivate(PrivateKey),
    PublicOnly(PublicKey),
}

impl EllipticCurve {
    /// Generates a newly minted key pair using the specified curve
    ///
    /// # Errors
    ///
    /// Unable to generate a key pair.
    pub fn generate(curve: Curve) -> Result<Self, error::Unexpected> {
        let private_key = PrivateKey::generate(curve)?;
        Ok(Self::from(private_key))
    }

    /// The key's curve
    #[must_use]
    pub fn curve(&self) -> Curve {
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

impl From<PublicKey> for EllipticCurve {
    fn from(key: PublicKey) -> Self {
        Self {
            key: MaybePrivate::PublicOnly(key),
        }
    }
}

impl From<PrivateKey> for EllipticCurve {
    fn from(key: PrivateKey) -> Self {
        Self {
            key: MaybePrivate::PublicAndPrivate(key),
        }
    }
}

/// Elliptic curve cryptography signing algorithms
///
/// This list may be expanded in the future.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum SigningAlgorithm {
    /// Elliptic curve cryptography using the P-256 curve and SHA-256
    ES256,
    /// Elliptic curve cryptography using the P-384 curve and SHA-384
    ES384,
}

impl SigningAlgorithm {
    /// The curve this algorithm signs on
    #[must_use]
    pub fn curve(self) -> Curve {
        match self {
            Self::ES256 => Curve::P256,
            Self::ES384 => Curve::P384,
        }
    }

    /// Size in bytes of an ECDSA signature
    #[must_use]
    pub fn signature_size(self) -> usize {
        match self {
            Self::ES256 => 64,
            Self::ES384 => 96,
        }
    }

    fn verification_algorithm(self) -> &'static ring::signature::EcdsaVerificationAlgorithm {
        match self {
            Self::ES256 => &ring::signature::ECDSA_P256_SHA256_FIXED,
            Self::ES384 => &ring::signature::ECDSA_P384_SHA384_FIXED,
        }
    }

    fn signing_algorithm(self) -> &'static ring::signature::EcdsaSigningAlgorithm {
        match self {
            Self::ES256 => &ring::signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            Self::ES384 => &ring::signature::ECDSA_P384_SHA384_FIXED_SIGNING,
        }
    }
}

impl From<SigningAlgorithm> for jws::Algorithm {
    fn from(alg: SigningAlgorithm) -> Self {
        Self::EllipticCurve(alg)
    }
}

impl TryFrom<jws::Algorithm> for SigningAlgorithm {
    type Error = error::IncompatibleKey;

    fn try_from(alg: jws::Algorithm) -> Result<Self, Self::Error> {
        match alg {
            jws::Algorithm::EllipticCurve(alg) => Ok(alg),
            _ => Err(error::incompatible_key(alg.to_string())),
        }
    }
}

impl jws::Verifier for EllipticCurve {
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

impl jws::Signer for EllipticCurve {
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
        let s = match self {
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
        };

        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use jws::{Signer, Verifier};

    use super::*;

    #[test]
    fn generated_key_signs_and_verifies() {
        let key = EllipticCurve::generate(Curve::P256).unwrap();
        let sig = key.sign(SigningAlgorithm::ES256, b"data").unwrap();
        assert_eq!(sig.len(), 64);
        key.verify(SigningAlgorithm::ES256, b"data", &sig).unwrap();
    }

    #[test]
    fn curve_mismatch_cannot_sign() {
        let key = EllipticCurve::generate(Curve::P384).unwrap();
        assert!(!key.can_sign(SigningAlgorithm::ES256));
        assert!(key.sign(SigningAlgorithm::ES256, b"data").is_err());
    }

    #[test]
    fn public_only_key_cannot_sign() {
        let key = EllipticCurve::generate(Curve::P256).unwrap().public_only();
        assert!(!key.can_sign(SigningAlgorithm::ES256));
    }

    #[test]
    fn tampered_signature_fails() {
        let key = EllipticCurve::generate(Curve::P256).unwrap();
        let mut sig = key.sign(SigningAlgorithm::ES256, b"data").unwrap();
        sig[10] ^= 0x40;
        assert!(key.verify(SigningAlgorithm::ES256, b"data", &sig).is_err());
    }

    #[test]
    fn agreement_is_symmetric() {
        let a = PrivateKey::generate(Curve::P256).unwrap();
        let b = PrivateKey::generate(Curve::P256).unwrap();

        let z1 = a.agree(b.public_key()).unwrap();
        let z2 = b.agree(a.public_key()).unwrap();

        assert_eq!(z1, z2);
        assert_eq!(z1.len(), Curve::P256.field_len());
    }

    #[test]
    fn serde_round_trip_retains_private_key() {
        let key = EllipticCurve::generate(Curve::P384).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        let back: EllipticCurve = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(back.private_key().is_some());
    }

    #[test]
    fn rejects_short_coordinate() {
        let json = r#"{"crv":"P-256","x":"AQI","y":"AQI"}"#;
        let res: Result<PublicKey, _> = serde_json::from_str(json);
        assert!(res.is_err());
    }
}
