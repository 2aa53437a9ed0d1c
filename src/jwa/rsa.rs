//! RSA JSON Web Algorithm implementations
//!
//! RSA keys serve the PKCS#1 v1.5 and PSS signature algorithms for JWS and
//! the RSA key encryption algorithms for JWE.

use std::{convert::TryFrom, fmt, sync::Arc};

use openssl::{
    bn::BigNum,
    encrypt::{Decrypter, Encrypter},
    pkey::PKey,
    rsa::Rsa as OpensslRsa,
};
use ring::signature::RsaKeyPair;
use serde::{Deserialize, Serialize};

use crate::{asn1, b64::Base64Url, error, jws};

/// RSA public key components
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PublicKeyDto", into = "PublicKeyDto")]
#[must_use]
pub struct PublicKey {
    modulus: Base64Url,
    exponent: Base64Url,
}

impl PublicKey {
    /// Constructs a public key from the modulus and exponent
    ///
    /// # Errors
    ///
    /// The modulus is smaller than 2048 bits.
    pub fn from_components(
        modulus: impl Into<Base64Url>,
        exponent: impl Into<Base64Url>,
    ) -> Result<Self, error::KeyRejected> {
        let modulus = modulus.into();
        let exponent = exponent.into();

        if modulus.len() < 256 {
            return Err(error::key_rejected("key modulus must be at least 2048 bits"));
        }

        Ok(Self { modulus, exponent })
    }

    /// The public key's modulus
    #[must_use]
    pub fn modulus(&self) -> &[u8] {
        self.modulus.as_slice()
    }

    /// The public key's exponent
    #[must_use]
    pub fn exponent(&self) -> &[u8] {
        self.exponent.as_slice()
    }

    fn to_openssl_pkey(
        &self,
    ) -> Result<PKey<openssl::pkey::Public>, openssl::error::ErrorStack> {
        let rsa = OpensslRsa::from_public_components(
            BigNum::from_slice(self.modulus.as_slice())?,
            BigNum::from_slice(self.exponent.as_slice())?,
        )?;
        PKey::from_rsa(rsa)
    }

    /// Encrypts a content encryption key under this public key
    pub(crate) fn wrap_cek(
        &self,
        padding: EncryptionPadding,
        cek: &[u8],
    ) -> Result<Vec<u8>, error::CryptoOperationFailed> {
        let encrypt = || {
            let pkey = self.to_openssl_pkey()?;
            let mut encrypter = Encrypter::new(&pkey)?;
            padding.configure(
                &mut encrypter,
                |e, p| e.set_rsa_padding(p),
                |e, md| e.set_rsa_oaep_md(md),
            )?;

            let mut out = vec![0; encrypter.encrypt_len(cek)?];
            let len = encrypter.encrypt(cek, &mut out)?;
            out.truncate(len);
            Ok::<_, openssl::error::ErrorStack>(out)
        };

        encrypt().map_err(|_| error::crypto_failed())
    }
}

impl jws::Verifier for PublicKey {
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
        let pk = ring::signature::RsaPublicKeyComponents {
            n: self.modulus.as_slice(),
            e: self.exponent.as_slice(),
        };

        pk.verify(alg.into_verification_params(), data, signature)
            .map_err(|_| error::crypto_failed())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
struct PublicKeyDto {
    #[serde(rename = "n")]
    modulus: Base64Url,

    #[serde(rename = "e")]
    exponent: Base64Url,
}

impl TryFrom<PublicKeyDto> for PublicKey {
    type Error = error::KeyRejected;

    fn try_from(dto: PublicKeyDto) -> Result<Self, Self::Error> {
        Self::from_components(dto.modulus, dto.exponent)
    }
}

impl From<PublicKey> for PublicKeyDto {
    fn from(pk: PublicKey) -> Self {
        Self {
            modulus: pk.modulus,
            exponent: pk.exponent,
        }
    }
}

/// The private factors and CRT parameters of an RSA key
#[derive(Clone, Eq, PartialEq)]
struct PrivateComponents {
    d: Base64Url,
    p: Base64Url,
    q: Base64Url,
    dp: Base64Url,
    dq: Base64Url,
    qi: Base64Url,
}

/// RSA private key components
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "PrivateKeyDto", into = "PrivateKeyDto")]
#[must_use]
pub struct PrivateKey {
    public_key: PublicKey,
    components: PrivateComponents,
    ring_cache: Arc<RsaKeyPair>,
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key && self.components == other.components
    }
}

impl Eq for PrivateKey {}

impl PrivateKey {
    /// Generates a new 2048-bit RSA key pair
    ///
    /// # Errors
    ///
    /// Unable to generate a private key.
    pub fn generate() -> Result<Self, error::Unexpected> {
        let rsa = OpensslRsa::generate(2048).map_err(error::unexpected)?;
        Self::from_openssl_key(&rsa).map_err(error::unexpected)
    }

    fn from_openssl_key(
        rsa: &OpensslRsa<openssl::pkey::Private>,
    ) -> Result<Self, error::KeyRejected> {
        let crt = |v: Option<&openssl::bn::BigNumRef>| {
            v.map(|b| Base64Url::from_raw(b.to_vec()))
                .ok_or_else(|| error::key_rejected("key is missing CRT parameters"))
        };

        let public_key = PublicKey::from_components(rsa.n().to_vec(), rsa.e().to_vec())?;
        let components = PrivateComponents {
            d: Base64Url::from_raw(rsa.d().to_vec()),
            p: crt(rsa.p())?,
            q: crt(rsa.q())?,
            dp: crt(rsa.dmp1())?,
            dq: crt(rsa.dmq1())?,
            qi: crt(rsa.iqmp())?,
        };

        Self::from_parts(public_key, components)
    }

    fn from_parts(
        public_key: PublicKey,
        components: PrivateComponents,
    ) -> Result<Self, error::KeyRejected> {
        let der = pkcs1_der(&public_key, &components);
        let ring_cache =
            Arc::new(RsaKeyPair::from_der(&der).map_err(|e| error::key_rejected(e.to_string()))?);

        Ok(Self {
            public_key,
            components,
            ring_cache,
        })
    }

    /// Provides access to the public key parameters
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Extracts the public key
    pub fn into_public_key(self) -> PublicKey {
        self.public_key
    }

    /// Constructs a private key from its full set of components
    ///
    /// # Errors
    ///
    /// The components do not form a valid key pair.
    pub fn from_components(
        public_key: PublicKey,
        d: impl Into<Base64Url>,
        p: impl Into<Base64Url>,
        q: impl Into<Base64Url>,
        dp: impl Into<Base64Url>,
        dq: impl Into<Base64Url>,
        qi: impl Into<Base64Url>,
    ) -> Result<Self, error::KeyRejected> {
        let components = PrivateComponents {
            d: d.into(),
            p: p.into(),
            q: q.into(),
            dp: dp.into(),
            dq: dq.into(),
            qi: qi.into(),
        };
        Self::from_parts(public_key, components)
    }

    pub(crate) fn d(&self) -> &[u8] {
        self.components.d.as_slice()
    }

    pub(crate) fn p(&self) -> &[u8] {
        self.components.p.as_slice()
    }

    pub(crate) fn q(&self) -> &[u8] {
        self.components.q.as_slice()
    }

    pub(crate) fn dp(&self) -> &[u8] {
        self.components.dp.as_slice()
    }

    pub(crate) fn dq(&self) -> &[u8] {
        self.components.dq.as_slice()
    }

    pub(crate) fn qi(&self) -> &[u8] {
        self.components.qi.as_slice()
    }

    fn to_openssl_pkey(
        &self,
    ) -> Result<PKey<openssl::pkey::Private>, openssl::error::ErrorStack> {
        let bn = |b: &Base64Url| BigNum::from_slice(b.as_slice());
        let rsa = OpensslRsa::from_private_components(
            bn(&self.public_key.modulus)?,
            bn(&self.public_key.exponent)?,
            bn(&self.components.d)?,
            bn(&self.components.p)?,
            bn(&self.components.q)?,
            bn(&self.components.dp)?,
            bn(&self.components.dq)?,
            bn(&self.components.qi)?,
        )?;
        PKey::from_rsa(rsa)
    }

    /// Decrypts a content encryption key encrypted under the public key
    pub(crate) fn unwrap_cek(
        &self,
        padding: EncryptionPadding,
        encrypted: &[u8],
    ) -> Result<Vec<u8>, error::CryptoOperationFailed> {
        let decrypt = || {
            let pkey = self.to_openssl_pkey()?;
            let mut decrypter = Decrypter::new(&pkey)?;
            padding.configure(
                &mut decrypter,
                |d, p| d.set_rsa_padding(p),
                |d, md| d.set_rsa_oaep_md(md),
            )?;

            let mut out = vec![0; decrypter.decrypt_len(encrypted)?];
            let len = decrypter.decrypt(encrypted, &mut out)?;
            out.truncate(len);
            Ok::<_, openssl::error::ErrorStack>(out)
        };

        decrypt().map_err(|_| error::crypto_failed())
    }
}

fn pkcs1_der(public_key: &PublicKey, components: &PrivateComponents) -> Vec<u8> {
    let mut w = asn1::Writer::new();
    w.write_sequence(|w| {
        w.write_uint(&[0]);
        w.write_uint(public_key.modulus.as_slice());
        w.write_uint(public_key.exponent.as_slice());
        w.write_uint(components.d.as_slice());
        w.write_uint(components.p.as_slice());
        w.write_uint(components.q.as_slice());
        w.write_uint(components.dp.as_slice());
        w.write_uint(components.dq.as_slice());
        w.write_uint(components.qi.as_slice());
    });
    w.into_vec()
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
        true
    }

    fn sign(&self, alg: Self::Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
        let mut buf = vec![0; self.ring_cache.public().modulus_len()];
        self.ring_cache
            .sign(
                alg.into_signing_params(),
                &ring::rand::SystemRandom::new(),
                data,
                &mut buf,
            )
            .map_err(|e| error::unexpected(e.to_string()))?;

        Ok(buf)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
struct PrivateKeyDto {
    d: Base64Url,
    p: Base64Url,
    q: Base64Url,
    dp: Base64Url,
    dq: Base64Url,
    qi: Base64Url,

    #[serde(flatten)]
    public_key: PublicKeyDto,
}

impl From<PrivateKey> for PrivateKeyDto {
    fn from(pk: PrivateKey) -> Self {
        Self {
            d: pk.components.d,
            p: pk.components.p,
            q: pk.components.q,
            dp: pk.components.dp,
            dq: pk.components.dq,
            qi: pk.components.qi,
            public_key: PublicKeyDto::from(pk.public_key),
        }
    }
}

impl TryFrom<PrivateKeyDto> for PrivateKey {
    type Error = error::KeyRejected;

    fn try_from(dto: PrivateKeyDto) -> Result<Self, Self::Error> {
        let public_key = PublicKey::try_from(dto.public_key)?;
        let components = PrivateComponents {
            d: dto.d,
            p: dto.p,
            q: dto.q,
            dp: dto.dp,
            dq: dto.dq,
            qi: dto.qi,
        };

        PrivateKey::from_parts(public_key, components)
    }
}

pub(crate) use padding::EncryptionPadding;

mod padding {
    use openssl::{hash::MessageDigest, rsa::Padding};

    /// The padding mode for RSA key encryption
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) enum EncryptionPadding {
        Pkcs1V15,
        OaepSha1,
        OaepSha256,
    }

    impl EncryptionPadding {
        pub(super) fn configure<T, E>(
            self,
            target: &mut T,
            set_padding: impl FnOnce(&mut T, Padding) -> Result<(), E>,
            set_oaep_md: impl FnOnce(&mut T, MessageDigest) -> Result<(), E>,
        ) -> Result<(), E> {
            match self {
                Self::Pkcs1V15 => set_padding(target, Padding::PKCS1),
                Self::OaepSha1 => {
                    set_padding(target, Padding::PKCS1_OAEP)?;
                    set_oaep_md(target, MessageDigest::sha1())
                }
                Self::OaepSha256 => {
                    set_padding(target, Padding::PKCS1_OAEP)?;
                    set_oaep_md(target, MessageDigest::sha256())
                }
            }
        }
    }
}

/// Rivest-Shamir-Adleman key
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use]
pub struct Rsa {
    key: MaybePrivate,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum MaybePrivate {
    PublicAndPrivate(PrivateKey),
    PublicOnly(PublicKey),
}

impl Rsa {
    /// Generates a newly minted 2048-bit key pair
    ///
    /// # Errors
    ///
    /// Unable to generate a key pair.
    pub fn generate() -> Result<Self, error::Unexpected> {
        let private_key = PrivateKey::generate()?;
        Ok(Self::from(private_key))
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

impl From<PublicKey> for Rsa {
    fn from(key: PublicKey) -> Self {
        Self {
            key: MaybePrivate::PublicOnly(key),
        }
    }
}

impl From<PrivateKey> for Rsa {
    fn from(key: PrivateKey) -> Self {
        Self {
            key: MaybePrivate::PublicAndPrivate(key),
        }
    }
}

/// RSA signing algorithms
///
/// This list may be expanded in the future.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum SigningAlgorithm {
    /// RSA PKCS#1 v1.5 signatures using SHA-256
    RS256,
    /// RSA PKCS#1 v1.5 signatures using SHA-384
    RS384,
    /// RSA PKCS#1 v1.5 signatures using SHA-512
    RS512,
    /// RSA PSS signatures using SHA-256
    PS256,
    /// RSA PSS signatures using SHA-384
    PS384,
    /// RSA PSS signatures using SHA-512
    PS512,
}

impl SigningAlgorithm {
    fn into_verification_params(self) -> &'static ring::signature::RsaParameters {
        match self {
            Self::RS256 => &ring::signature::RSA_PKCS1_2048_8192_SHA256,
            Self::RS384 => &ring::signature::RSA_PKCS1_2048_8192_SHA384,
            Self::RS512 => &ring::signature::RSA_PKCS1_2048_8192_SHA512,
            Self::PS256 => &ring::signature::RSA_PSS_2048_8192_SHA256,
            Self::PS384 => &ring::signature::RSA_PSS_2048_8192_SHA384,
            Self::PS512 => &ring::signature::RSA_PSS_2048_8192_SHA512,
        }
    }

    fn into_signing_params(self) -> &'static dyn ring::signature::RsaEncoding {
        match self {
            Self::RS256 => &ring::signature::RSA_PKCS1_SHA256,
            Self::RS384 => &ring::signature::RSA_PKCS1_SHA384,
            Self::RS512 => &ring::signature::RSA_PKCS1_SHA512,
            Self::PS256 => &ring::signature::RSA_PSS_SHA256,
            Self::PS384 => &ring::signature::RSA_PSS_SHA384,
            Self::PS512 => &ring::signature::RSA_PSS_SHA512,
        }
    }
}

impl From<SigningAlgorithm> for jws::Algorithm {
    fn from(alg: SigningAlgorithm) -> Self {
        Self::Rsa(alg)
    }
}

impl TryFrom<jws::Algorithm> for SigningAlgorithm {
    type Error = error::IncompatibleKey;

    fn try_from(alg: jws::Algorithm) -> Result<Self, Self::Error> {
        match alg {
            jws::Algorithm::Rsa(alg) => Ok(alg),
            _ => Err(error::incompatible_key(alg.to_string())),
        }
    }
}

impl jws::Verifier for Rsa {
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

impl jws::Signer for Rsa {
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
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
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
        let key = Rsa::generate().unwrap();
        for alg in [
            SigningAlgorithm::RS256,
            SigningAlgorithm::RS512,
            SigningAlgorithm::PS256,
        ] {
            let sig = key.sign(alg, b"data").unwrap();
            assert_eq!(sig.len(), 256);
            key.verify(alg, b"data", &sig).unwrap();
        }
    }

    #[test]
    fn tampered_signature_fails() {
        let key = Rsa::generate().unwrap();
        let mut sig = key.sign(SigningAlgorithm::RS256, b"data").unwrap();
        sig[42] ^= 1;
        assert!(key.verify(SigningAlgorithm::RS256, b"data", &sig).is_err());
    }

    #[test]
    fn serde_round_trip_retains_private_key() {
        let key = Rsa::generate().unwrap();
        let json = serde_json::to_string(&key).unwrap();
        let back: Rsa = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(back.private_key().is_some());
    }

    #[test]
    fn oaep_wrap_unwrap_round_trip() {
        let key = PrivateKey::generate().unwrap();
        let cek = [7u8; 32];

        for padding in [
            EncryptionPadding::Pkcs1V15,
            EncryptionPadding::OaepSha1,
            EncryptionPadding::OaepSha256,
        ] {
            let wrapped = key.public_key().wrap_cek(padding, &cek).unwrap();
            assert_eq!(wrapped.len(), 256);
            let unwrapped = key.unwrap_cek(padding, &wrapped).unwrap();
            assert_eq!(unwrapped, cek);
        }
    }

    #[test]
    fn wrong_key_fails_to_unwrap() {
        let a = PrivateKey::generate().unwrap();
        let b = PrivateKey::generate().unwrap();
        let wrapped = a
            .public_key()
            .wrap_cek(EncryptionPadding::OaepSha256, &[7u8; 32])
            .unwrap();
        assert!(b.unwrap_cek(EncryptionPadding::OaepSha256, &wrapped).is_err());
    }

    #[test]
    fn short_modulus_rejected() {
        let res = PublicKey::from_components(vec![0xff; 128], vec![0x01, 0x00, 0x01]);
        assert!(res.is_err());
    }
}
