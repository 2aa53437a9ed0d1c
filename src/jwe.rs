//! Implementations of the JSON Web Encryption (JWE) standard
//!
//! The specifications for this standard can be found in [RFC7516][].
//! Tokens may be produced and consumed in the compact, flattened JSON, and
//! general JSON serializations. Key management dispatches per algorithm
//! family: direct encryption, key wrapping, ECDH key agreement with an
//! ephemeral key, and password-based key derivation ([RFC7518][]).
//!
//! [RFC7516]: https://tools.ietf.org/html/rfc7516
//! [RFC7518]: https://tools.ietf.org/html/rfc7518

use std::num::NonZeroU32;

use openssl::{
    aes::{self, AesKey},
    symm,
};
use ring::{
    aead, constant_time, digest, hmac, pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use serde::{Deserialize, Serialize};

use crate::{
    b64::{self, Base64Url},
    error::{self, JweError},
    header::{self, Header},
    jwa::{
        self, ec, okp, ContentEncryption, KeyAgreement, KeyManagement, KeyWrap, Pbes2, Usage,
    },
    jwk::{Jwk, Key},
    registry::{self, AlgorithmId},
    resolve::{KeyResolver, ResolutionContext},
};

const DEFAULT_PBES2_ITERATIONS: u32 = 2048;
const MAX_PBES2_ITERATIONS: u32 = 100_000;
const PBES2_SALT_LEN: usize = 16;
const GCM_KW_IV_LEN: usize = 12;
const GCM_KW_TAG_LEN: usize = 16;

/// A request to encrypt a payload for a single recipient
#[derive(Debug, Clone)]
#[must_use]
pub struct EncryptionRequest<'a> {
    key: &'a Jwk,
    algorithm: KeyManagement,
    encryption: ContentEncryption,
    protected: Header,
    unprotected: Header,
    aad: Option<Vec<u8>>,
}

impl<'a> EncryptionRequest<'a> {
    /// A request to encrypt under the given key, key management algorithm,
    /// and content encryption algorithm
    ///
    /// The protected header is seeded with `alg`, `enc`, and, when the key
    /// carries one, `kid`.
    pub fn new(key: &'a Jwk, algorithm: KeyManagement, encryption: ContentEncryption) -> Self {
        let mut protected = Header::new()
            .with_param("alg", algorithm.name())
            .with_param("enc", encryption.name());
        if let Some(kid) = key.key_id() {
            protected.insert("kid", kid.as_str());
        }

        Self {
            key,
            algorithm,
            encryption,
            protected,
            unprotected: Header::new(),
            aad: None,
        }
    }

    /// Adds a parameter to the protected header
    pub fn with_protected_param(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.protected.insert(name, value);
        self
    }

    /// Adds a parameter to the unprotected header
    ///
    /// Only the JSON serializations can carry an unprotected header.
    pub fn with_unprotected_param(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.unprotected.insert(name, value);
        self
    }

    /// Attaches additional authenticated data
    ///
    /// The data is integrity-protected but not encrypted, and only the
    /// JSON serializations can carry it.
    pub fn with_aad(mut self, aad: impl Into<Vec<u8>>) -> Self {
        self.aad = Some(aad.into());
        self
    }
}

/// One recipient of a general JSON serialization
#[derive(Debug, Clone)]
#[must_use]
pub struct RecipientRequest<'a> {
    key: &'a Jwk,
    algorithm: KeyManagement,
    header: Header,
}

impl<'a> RecipientRequest<'a> {
    /// A recipient keyed by the given key and key management algorithm
    ///
    /// The per-recipient header is seeded with `alg` and, when the key
    /// carries one, `kid`.
    pub fn new(key: &'a Jwk, algorithm: KeyManagement) -> Self {
        let mut header = Header::new().with_param("alg", algorithm.name());
        if let Some(kid) = key.key_id() {
            header.insert("kid", kid.as_str());
        }

        Self {
            key,
            algorithm,
            header,
        }
    }

    /// Adds a parameter to the per-recipient header
    pub fn with_header_param(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.header.insert(name, value);
        self
    }
}

/// A decrypted JWE, with its plaintext and headers
#[derive(Debug, Clone)]
#[must_use]
pub struct Decrypted {
    plaintext: Vec<u8>,
    protected: Header,
    header: Header,
    aad: Option<Vec<u8>>,
}

impl Decrypted {
    /// The decrypted plaintext bytes
    #[must_use]
    pub fn plaintext(&self) -> &[u8] {
        &self.plaintext
    }

    /// The integrity-protected header
    pub fn protected(&self) -> &Header {
        &self.protected
    }

    /// The merged view of all header sections
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The additional authenticated data, when the token carried any
    #[must_use]
    pub fn aad(&self) -> Option<&[u8]> {
        self.aad.as_deref()
    }

    /// Unwraps the plaintext bytes
    #[must_use]
    pub fn into_plaintext(self) -> Vec<u8> {
        self.plaintext
    }
}

/// Policy applied while consuming a JWE
///
/// The default policy allows no algorithm at all: callers must name the
/// key management and content encryption algorithms they expect, or
/// explicitly opt into every registered one.
#[derive(Debug, Clone)]
#[must_use]
pub struct DecryptionOptions {
    allowed_algorithms: Vec<KeyManagement>,
    allowed_encryption: Vec<ContentEncryption>,
    allow_any_algorithm: bool,
    understood_critical: Vec<String>,
    max_pbes2_iterations: u32,
}

impl Default for DecryptionOptions {
    fn default() -> Self {
        Self {
            allowed_algorithms: Vec::new(),
            allowed_encryption: Vec::new(),
            allow_any_algorithm: false,
            understood_critical: Vec::new(),
            max_pbes2_iterations: MAX_PBES2_ITERATIONS,
        }
    }
}

impl DecryptionOptions {
    /// The default policy: no algorithm allowed, no critical extensions
    /// understood, and a bounded PBES2 iteration count
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key management algorithm to the allowed set
    ///
    /// May be called repeatedly to allow several.
    pub fn allow_algorithm(mut self, alg: KeyManagement) -> Self {
        self.allowed_algorithms.push(alg);
        self
    }

    /// Adds a content encryption algorithm to the allowed set
    pub fn allow_encryption(mut self, enc: ContentEncryption) -> Self {
        self.allowed_encryption.push(enc);
        self
    }

    /// Opts into every registered key management and content encryption
    /// algorithm
    ///
    /// Prefer the explicit allow methods when the expected algorithms are
    /// known.
    pub fn allow_any_algorithm(mut self) -> Self {
        self.allow_any_algorithm = true;
        self
    }

    /// Marks a critical header extension as understood
    pub fn understand_critical(mut self, name: impl Into<String>) -> Self {
        self.understood_critical.push(name.into());
        self
    }

    /// Caps the PBES2 iteration count a token may demand
    ///
    /// An attacker-controlled `p2c` would otherwise pin the CPU.
    pub fn max_pbes2_iterations(mut self, limit: u32) -> Self {
        self.max_pbes2_iterations = limit;
        self
    }

    fn check_algorithm(&self, alg: KeyManagement) -> Result<(), error::DisallowedAlgorithm> {
        if self.allow_any_algorithm || self.allowed_algorithms.contains(&alg) {
            Ok(())
        } else {
            tracing::warn!(alg = alg.name(), "rejecting token keyed with an algorithm outside the allowed set");
            Err(error::disallowed_algorithm(alg.name()))
        }
    }

    fn check_encryption(&self, enc: ContentEncryption) -> Result<(), error::DisallowedAlgorithm> {
        if self.allow_any_algorithm || self.allowed_encryption.contains(&enc) {
            Ok(())
        } else {
            tracing::warn!(enc = enc.name(), "rejecting token encrypted with an algorithm outside the allowed set");
            Err(error::disallowed_algorithm(enc.name()))
        }
    }

    fn understood_critical(&self) -> Vec<&str> {
        self.understood_critical.iter().map(String::as_str).collect()
    }
}

/// The flattened JSON serialization of a JWE
#[derive(Debug, Clone, Serialize, Deserialize)]
#[must_use]
pub struct FlattenedJwe {
    /// The protected header segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected: Option<String>,

    /// The shared unprotected header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unprotected: Option<Header>,

    /// The per-recipient unprotected header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Header>,

    /// The encrypted key segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<String>,

    /// The additional authenticated data segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad: Option<String>,

    /// The initialization vector segment
    pub iv: String,

    /// The ciphertext segment
    pub ciphertext: String,

    /// The authentication tag segment
    pub tag: String,
}

/// The general JSON serialization of a JWE
#[derive(Debug, Clone, Serialize, Deserialize)]
#[must_use]
pub struct GeneralJwe {
    /// The protected header segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected: Option<String>,

    /// The shared unprotected header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unprotected: Option<Header>,

    /// One entry per recipient
    pub recipients: Vec<JweRecipient>,

    /// The additional authenticated data segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad: Option<String>,

    /// The initialization vector segment
    pub iv: String,

    /// The ciphertext segment
    pub ciphertext: String,

    /// The authentication tag segment
    pub tag: String,
}

/// One recipient entry of a general JWE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JweRecipient {
    /// The per-recipient unprotected header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Header>,

    /// The encrypted key segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<String>,
}

fn random_bytes(len: usize) -> Result<Vec<u8>, error::Unexpected> {
    let mut buf = vec![0; len];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| error::unexpected("failed to source randomness"))?;
    Ok(buf)
}

fn check_key_policy(key: &Jwk, alg: KeyManagement) -> Result<(), JweError> {
    if key.usage() == Some(Usage::Signing) {
        return Err(error::incompatible_key(alg.name()).into());
    }
    key.check_bound_algorithm(alg.name())?;
    Ok(())
}

fn symmetric_secret<'a>(key: &'a Jwk, alg: KeyManagement) -> Result<&'a [u8], JweError> {
    key.key()
        .as_oct()
        .map(jwa::Oct::secret)
        .ok_or_else(|| error::incompatible_key(alg.name()).into())
}

// RFC 3394 key wrapping over a derived or provided KEK
fn aes_wrap(kek: &[u8], cek: &[u8]) -> Result<Vec<u8>, error::CryptoOperationFailed> {
    let key = AesKey::new_encrypt(kek).map_err(|_| error::crypto_failed())?;
    let mut out = vec![0; cek.len() + 8];
    let len = aes::wrap_key(&key, None, &mut out, cek).map_err(|_| error::crypto_failed())?;
    out.truncate(len);
    Ok(out)
}

fn aes_unwrap(kek: &[u8], wrapped: &[u8]) -> Result<Vec<u8>, error::CryptoOperationFailed> {
    if wrapped.len() < 16 || wrapped.len() % 8 != 0 {
        return Err(error::crypto_failed());
    }

    let key = AesKey::new_decrypt(kek).map_err(|_| error::crypto_failed())?;
    let mut out = vec![0; wrapped.len() - 8];
    let len = aes::unwrap_key(&key, None, &mut out, wrapped).map_err(|_| error::crypto_failed())?;
    out.truncate(len);
    Ok(out)
}

fn gcm_algorithm(key_len: usize) -> Result<&'static aead::Algorithm, error::CryptoOperationFailed> {
    match key_len {
        16 => Ok(&aead::AES_128_GCM),
        32 => Ok(&aead::AES_256_GCM),
        _ => Err(error::crypto_failed()),
    }
}

fn gcm_seal(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), error::CryptoOperationFailed> {
    let algorithm = gcm_algorithm(key.len())?;
    let key = aead::LessSafeKey::new(
        aead::UnboundKey::new(algorithm, key).map_err(|_| error::crypto_failed())?,
    );
    let nonce = aead::Nonce::try_assume_unique_for_key(iv).map_err(|_| error::crypto_failed())?;

    let mut in_out = plaintext.to_vec();
    let tag = key
        .seal_in_place_separate_tag(nonce, aead::Aad::from(aad), &mut in_out)
        .map_err(|_| error::crypto_failed())?;

    Ok((in_out, tag.as_ref().to_vec()))
}

fn gcm_open(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, error::CryptoOperationFailed> {
    let algorithm = gcm_algorithm(key.len())?;
    let key = aead::LessSafeKey::new(
        aead::UnboundKey::new(algorithm, key).map_err(|_| error::crypto_failed())?,
    );
    let nonce = aead::Nonce::try_assume_unique_for_key(iv).map_err(|_| error::crypto_failed())?;

    let mut in_out = Vec::with_capacity(ciphertext.len() + tag.len());
    in_out.extend_from_slice(ciphertext);
    in_out.extend_from_slice(tag);

    let plaintext = key
        .open_in_place(nonce, aead::Aad::from(aad), &mut in_out)
        .map_err(|_| error::crypto_failed())?;

    Ok(plaintext.to_vec())
}

fn cbc_cipher(enc: ContentEncryption) -> symm::Cipher {
    match enc {
        ContentEncryption::A256CbcHs512 => symm::Cipher::aes_256_cbc(),
        _ => symm::Cipher::aes_128_cbc(),
    }
}

fn cbc_hmac_algorithm(enc: ContentEncryption) -> hmac::Algorithm {
    match enc {
        ContentEncryption::A256CbcHs512 => hmac::HMAC_SHA512,
        _ => hmac::HMAC_SHA256,
    }
}

// RFC 7518 section 5.2: HMAC over AAD || IV || ciphertext || AL, where AL
// is the AAD bit length as a 64-bit big-endian integer
fn cbc_tag(
    enc: ContentEncryption,
    mac_key: &[u8],
    aad: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Vec<u8> {
    let key = hmac::Key::new(cbc_hmac_algorithm(enc), mac_key);
    let mut ctx = hmac::Context::with_key(&key);
    ctx.update(aad);
    ctx.update(iv);
    ctx.update(ciphertext);
    ctx.update(&((aad.len() as u64) * 8).to_be_bytes());

    let full = ctx.sign();
    full.as_ref()[..enc.tag_len()].to_vec()
}

fn cbc_seal(
    enc: ContentEncryption,
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), error::CryptoOperationFailed> {
    let (mac_key, enc_key) = cek.split_at(cek.len() / 2);
    let ciphertext = symm::encrypt(cbc_cipher(enc), enc_key, Some(iv), plaintext)
        .map_err(|_| error::crypto_failed())?;
    let tag = cbc_tag(enc, mac_key, aad, iv, &ciphertext);
    Ok((ciphertext, tag))
}

fn cbc_open(
    enc: ContentEncryption,
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, error::CryptoOperationFailed> {
    let (mac_key, enc_key) = cek.split_at(cek.len() / 2);

    let expected = cbc_tag(enc, mac_key, aad, iv, ciphertext);
    constant_time::verify_slices_are_equal(&expected, tag).map_err(|_| error::crypto_failed())?;

    symm::decrypt(cbc_cipher(enc), enc_key, Some(iv), ciphertext)
        .map_err(|_| error::crypto_failed())
}

fn seal(
    enc: ContentEncryption,
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), error::CryptoOperationFailed> {
    match enc {
        ContentEncryption::A128Gcm | ContentEncryption::A256Gcm => {
            gcm_seal(cek, iv, aad, plaintext)
        }
        ContentEncryption::A128CbcHs256 | ContentEncryption::A256CbcHs512 => {
            cbc_seal(enc, cek, iv, aad, plaintext)
        }
    }
}

fn open(
    enc: ContentEncryption,
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, error::CryptoOperationFailed> {
    match enc {
        ContentEncryption::A128Gcm | ContentEncryption::A256Gcm => {
            gcm_open(cek, iv, aad, ciphertext, tag)
        }
        ContentEncryption::A128CbcHs256 | ContentEncryption::A256CbcHs512 => {
            cbc_open(enc, cek, iv, aad, ciphertext, tag)
        }
    }
}

// NIST SP 800-56A single-step KDF with SHA-256, as profiled by RFC 7518
// section 4.6.2
fn concat_kdf(z: &[u8], algorithm_id: &str, apu: &[u8], apv: &[u8], key_len: usize) -> Vec<u8> {
    let mut derived = Vec::with_capacity(key_len);
    let mut counter: u32 = 1;

    while derived.len() < key_len {
        let mut ctx = digest::Context::new(&digest::SHA256);
        ctx.update(&counter.to_be_bytes());
        ctx.update(z);
        ctx.update(&(algorithm_id.len() as u32).to_be_bytes());
        ctx.update(algorithm_id.as_bytes());
        ctx.update(&(apu.len() as u32).to_be_bytes());
        ctx.update(apu);
        ctx.update(&(apv.len() as u32).to_be_bytes());
        ctx.update(apv);
        ctx.update(&((key_len * 8) as u32).to_be_bytes());

        derived.extend_from_slice(ctx.finish().as_ref());
        counter += 1;
    }

    derived.truncate(key_len);
    derived
}

fn party_info(header: &Header, name: &'static str) -> Result<Vec<u8>, JweError> {
    match header.deserialize_param::<String>(name)? {
        Some(encoded) => Ok(b64::decode(&encoded).map_err(error::malformed_header)?),
        None => Ok(Vec::new()),
    }
}

fn pbes2_algorithm(alg: Pbes2) -> pbkdf2::Algorithm {
    match alg {
        Pbes2::Hs256A128Kw => pbkdf2::PBKDF2_HMAC_SHA256,
        Pbes2::Hs384A192Kw => pbkdf2::PBKDF2_HMAC_SHA384,
        Pbes2::Hs512A256Kw => pbkdf2::PBKDF2_HMAC_SHA512,
    }
}

// RFC 7518 section 4.8.1.1: the PBKDF2 salt is the algorithm name, a zero
// byte, then the p2s value
fn pbes2_kek(
    alg: Pbes2,
    password: &[u8],
    p2s: &[u8],
    p2c: u32,
) -> Result<Vec<u8>, JweError> {
    let name = KeyManagement::PasswordBased(alg).name();
    let mut salt = Vec::with_capacity(name.len() + 1 + p2s.len());
    salt.extend_from_slice(name.as_bytes());
    salt.push(0);
    salt.extend_from_slice(p2s);

    let iterations = NonZeroU32::new(p2c)
        .ok_or_else(|| error::malformed_header("'p2c' must be a positive iteration count"))?;

    let mut kek = vec![0; alg.wrap_key_len()];
    pbkdf2::derive(pbes2_algorithm(alg), iterations, &salt, password, &mut kek);
    Ok(kek)
}

fn ephemeral_agreement(
    key: &Jwk,
    alg: KeyManagement,
) -> Result<(Vec<u8>, serde_json::Value), JweError> {
    match key.key() {
        Key::EllipticCurve(recipient) => {
            let ephemeral = ec::PrivateKey::generate(recipient.curve())?;
            let z = ephemeral.agree(recipient.public_key())?;
            let epk = Key::EllipticCurve(ephemeral.public_key().clone().into());
            let epk = serde_json::to_value(epk).map_err(error::unexpected)?;
            Ok((z, epk))
        }
        Key::Okp(recipient) if recipient.curve() == okp::OkpCurve::X25519 => {
            let ephemeral = okp::PrivateKey::generate(okp::OkpCurve::X25519)?;
            let z = ephemeral.agree(recipient.public_key())?;
            let epk = Key::Okp(ephemeral.public_key().clone().into());
            let epk = serde_json::to_value(epk).map_err(error::unexpected)?;
            Ok((z, epk))
        }
        _ => Err(error::incompatible_key(alg.name()).into()),
    }
}

fn recipient_agreement(key: &Jwk, epk: &Key) -> Result<Vec<u8>, JweError> {
    match (key.key(), epk) {
        (Key::EllipticCurve(recipient), Key::EllipticCurve(ephemeral)) => {
            let private = recipient
                .private_key()
                .ok_or_else(error::missing_private_key)?;
            Ok(private.agree(ephemeral.public_key())?)
        }
        (Key::Okp(recipient), Key::Okp(ephemeral)) => {
            let private = recipient
                .private_key()
                .ok_or_else(error::missing_private_key)?;
            Ok(private.agree(ephemeral.public_key())?)
        }
        _ => Err(error::crypto_failed().into()),
    }
}

fn agreement_kdf_parameters(
    alg: KeyManagement,
    agreement: KeyAgreement,
    enc: ContentEncryption,
) -> (&'static str, usize) {
    match agreement.wrap_key_len() {
        // direct agreement derives the CEK itself, keyed to the enc alg
        None => (enc.name(), enc.key_len()),
        Some(len) => (alg.name(), len),
    }
}

fn rsa_wrap_padding(wrap: KeyWrap) -> jwa::rsa::EncryptionPadding {
    match wrap {
        KeyWrap::Rsa1_5 => jwa::rsa::EncryptionPadding::Pkcs1V15,
        KeyWrap::RsaOaep => jwa::rsa::EncryptionPadding::OaepSha1,
        _ => jwa::rsa::EncryptionPadding::OaepSha256,
    }
}

struct EstablishedCek {
    cek: Vec<u8>,
    encrypted_key: Base64Url,
    params: Header,
}

/// Wraps an already-established CEK for one recipient
///
/// Only key-transporting algorithm families can share a CEK across
/// recipients; direct modes are rejected here.
fn wrap_cek(
    key: &Jwk,
    alg: KeyManagement,
    cek: &[u8],
    context: &Header,
) -> Result<(Base64Url, Header), JweError> {
    match alg {
        KeyManagement::Direct | KeyManagement::KeyAgreement(KeyAgreement::EcdhEs) => {
            Err(error::malformed_header(
                "direct key management cannot share a content encryption key",
            )
            .into())
        }
        KeyManagement::KeyWrap(KeyWrap::Aes128 | KeyWrap::Aes192 | KeyWrap::Aes256) => {
            let kek = symmetric_secret(key, alg)?;
            let wrapped = aes_wrap(kek, cek)?;
            Ok((Base64Url::from_raw(wrapped), Header::new()))
        }
        KeyManagement::KeyWrap(KeyWrap::Aes128Gcm | KeyWrap::Aes256Gcm) => {
            let kek = symmetric_secret(key, alg)?;
            let iv = random_bytes(GCM_KW_IV_LEN)?;
            let (wrapped, tag) = gcm_seal(kek, &iv, b"", cek)?;

            let params = Header::new()
                .with_param("iv", b64::encode(&iv))
                .with_param("tag", b64::encode(&tag));
            Ok((Base64Url::from_raw(wrapped), params))
        }
        KeyManagement::KeyWrap(
            wrap @ (KeyWrap::Rsa1_5 | KeyWrap::RsaOaep | KeyWrap::RsaOaep256),
        ) => {
            let rsa = key
                .key()
                .as_rsa()
                .ok_or_else(|| error::incompatible_key(alg.name()))?;
            let wrapped = rsa.public_key().wrap_cek(rsa_wrap_padding(wrap), cek)?;
            Ok((Base64Url::from_raw(wrapped), Header::new()))
        }
        KeyManagement::KeyAgreement(agreement) => {
            let Some(kek_len) = agreement.wrap_key_len() else {
                return Err(error::unexpected("direct agreement cannot wrap a key").into());
            };

            let (z, epk) = ephemeral_agreement(key, alg)?;
            let apu = party_info(context, "apu")?;
            let apv = party_info(context, "apv")?;
            let kek = concat_kdf(&z, alg.name(), &apu, &apv, kek_len);

            let wrapped = aes_wrap(&kek, cek)?;
            Ok((
                Base64Url::from_raw(wrapped),
                Header::new().with_param("epk", epk),
            ))
        }
        KeyManagement::PasswordBased(pbes2) => {
            let password = symmetric_secret(key, alg)?;
            let p2s = random_bytes(PBES2_SALT_LEN)?;
            let kek = pbes2_kek(pbes2, password, &p2s, DEFAULT_PBES2_ITERATIONS)?;
            let wrapped = aes_wrap(&kek, cek)?;

            let params = Header::new()
                .with_param("p2s", b64::encode(&p2s))
                .with_param("p2c", DEFAULT_PBES2_ITERATIONS);
            Ok((Base64Url::from_raw(wrapped), params))
        }
    }
}

/// Establishes the CEK for a single-recipient token
fn establish_cek(
    key: &Jwk,
    alg: KeyManagement,
    enc: ContentEncryption,
    context: &Header,
) -> Result<EstablishedCek, JweError> {
    match alg {
        KeyManagement::Direct => {
            let secret = symmetric_secret(key, alg)?;
            if secret.len() != enc.key_len() {
                return Err(error::incompatible_key(enc.name()).into());
            }

            Ok(EstablishedCek {
                cek: secret.to_vec(),
                encrypted_key: Base64Url::from_raw(Vec::new()),
                params: Header::new(),
            })
        }
        KeyManagement::KeyAgreement(agreement @ KeyAgreement::EcdhEs) => {
            let (z, epk) = ephemeral_agreement(key, alg)?;
            let (algorithm_id, cek_len) = agreement_kdf_parameters(alg, agreement, enc);

            let apu = party_info(context, "apu")?;
            let apv = party_info(context, "apv")?;
            let cek = concat_kdf(&z, algorithm_id, &apu, &apv, cek_len);

            Ok(EstablishedCek {
                cek,
                encrypted_key: Base64Url::from_raw(Vec::new()),
                params: Header::new().with_param("epk", epk),
            })
        }
        _ => {
            let cek = random_bytes(enc.key_len())?;
            let (encrypted_key, params) = wrap_cek(key, alg, &cek, context)?;
            Ok(EstablishedCek {
                cek,
                encrypted_key,
                params,
            })
        }
    }
}

/// Recovers the CEK for one recipient of a received token
fn recover_cek(
    key: &Jwk,
    alg: KeyManagement,
    enc: ContentEncryption,
    header: &Header,
    encrypted_key: &[u8],
    options: &DecryptionOptions,
) -> Result<Vec<u8>, JweError> {
    if !alg.produces_encrypted_key() && !encrypted_key.is_empty() {
        return Err(error::malformed_payload(
            "direct key management must not carry an encrypted key",
        )
        .into());
    }

    match alg {
        KeyManagement::Direct => Ok(symmetric_secret(key, alg)?.to_vec()),
        KeyManagement::KeyWrap(KeyWrap::Aes128 | KeyWrap::Aes192 | KeyWrap::Aes256) => {
            let kek = symmetric_secret(key, alg)?;
            Ok(aes_unwrap(kek, encrypted_key)?)
        }
        KeyManagement::KeyWrap(KeyWrap::Aes128Gcm | KeyWrap::Aes256Gcm) => {
            let kek = symmetric_secret(key, alg)?;

            let iv = b64::decode(&header.require_param::<String>("iv")?)
                .map_err(error::malformed_header)?;
            let tag = b64::decode(&header.require_param::<String>("tag")?)
                .map_err(error::malformed_header)?;
            if iv.len() != GCM_KW_IV_LEN || tag.len() != GCM_KW_TAG_LEN {
                return Err(error::crypto_failed().into());
            }

            Ok(gcm_open(kek, &iv, b"", encrypted_key, &tag)?)
        }
        KeyManagement::KeyWrap(
            wrap @ (KeyWrap::Rsa1_5 | KeyWrap::RsaOaep | KeyWrap::RsaOaep256),
        ) => {
            let rsa = key
                .key()
                .as_rsa()
                .ok_or_else(|| error::incompatible_key(alg.name()))?;
            let private = rsa
                .private_key()
                .ok_or_else(error::missing_private_key)?;
            Ok(private.unwrap_cek(rsa_wrap_padding(wrap), encrypted_key)?)
        }
        KeyManagement::KeyAgreement(agreement) => {
            let epk: Key = header.require_param("epk")?;
            let z = recipient_agreement(key, &epk)?;

            let (algorithm_id, derived_len) = agreement_kdf_parameters(alg, agreement, enc);
            let apu = party_info(header, "apu")?;
            let apv = party_info(header, "apv")?;
            let derived = concat_kdf(&z, algorithm_id, &apu, &apv, derived_len);

            match agreement.wrap_key_len() {
                None => Ok(derived),
                Some(_) => Ok(aes_unwrap(&derived, encrypted_key)?),
            }
        }
        KeyManagement::PasswordBased(pbes2) => {
            let password = symmetric_secret(key, alg)?;

            let p2s = b64::decode(&header.require_param::<String>("p2s")?)
                .map_err(error::malformed_header)?;
            let p2c: u32 = header.require_param("p2c")?;
            if p2c > options.max_pbes2_iterations {
                return Err(error::malformed_header(
                    "'p2c' iteration count exceeds the configured limit",
                )
                .into());
            }

            let kek = pbes2_kek(pbes2, password, &p2s, p2c)?;
            Ok(aes_unwrap(&kek, encrypted_key)?)
        }
    }
}

fn aad_input(protected_segment: &str, aad_segment: Option<&str>) -> Vec<u8> {
    let mut input = protected_segment.as_bytes().to_vec();
    if let Some(aad) = aad_segment {
        input.push(b'.');
        input.extend_from_slice(aad.as_bytes());
    }
    input
}

fn check_encryption_request(request: &EncryptionRequest<'_>) -> Result<(), JweError> {
    let descriptor = registry::resolve(request.algorithm.name())?;
    descriptor.check_key(request.key.key())?;
    check_key_policy(request.key, request.algorithm)
}

/// Encrypts a payload into the compact serialization
///
/// # Errors
///
/// Returns an error if the key does not fit the key management algorithm,
/// the request carries sections the compact form cannot represent, or a
/// cryptographic step fails.
pub fn encrypt_compact(
    plaintext: &[u8],
    request: &EncryptionRequest<'_>,
) -> Result<String, JweError> {
    if !request.unprotected.is_empty() {
        return Err(error::malformed_header(
            "the compact serialization cannot carry an unprotected header",
        )
        .into());
    }
    if request.aad.is_some() {
        return Err(error::malformed_header(
            "the compact serialization cannot carry additional authenticated data",
        )
        .into());
    }

    check_encryption_request(request)?;

    let established = establish_cek(
        request.key,
        request.algorithm,
        request.encryption,
        &request.protected,
    )?;
    let protected = header::merge([&request.protected, &established.params])?;
    let protected_segment = protected.to_encoded();

    let iv = random_bytes(request.encryption.iv_len())?;
    let aad = aad_input(&protected_segment, None);
    let (ciphertext, tag) = seal(request.encryption, &established.cek, &iv, &aad, plaintext)?;

    Ok(format!(
        "{protected_segment}.{}.{}.{}.{}",
        established.encrypted_key,
        b64::encode(&iv),
        b64::encode(&ciphertext),
        b64::encode(&tag),
    ))
}

/// Encrypts a payload into the flattened JSON serialization
///
/// # Errors
///
/// Returns an error if the headers collide, the key does not fit the
/// algorithm, or a cryptographic step fails.
pub fn encrypt_flattened(
    plaintext: &[u8],
    request: &EncryptionRequest<'_>,
) -> Result<FlattenedJwe, JweError> {
    check_encryption_request(request)?;

    let context = header::merge([&request.protected, &request.unprotected])?;
    let established = establish_cek(
        request.key,
        request.algorithm,
        request.encryption,
        &context,
    )?;
    let protected = header::merge([&request.protected, &established.params])?;
    let _ = header::merge([&protected, &request.unprotected])?;
    let protected_segment = protected.to_encoded();

    let aad_segment = request.aad.as_deref().map(b64::encode);
    let iv = random_bytes(request.encryption.iv_len())?;
    let aad = aad_input(&protected_segment, aad_segment.as_deref());
    let (ciphertext, tag) = seal(request.encryption, &established.cek, &iv, &aad, plaintext)?;

    let encrypted_key = (!established.encrypted_key.as_slice().is_empty())
        .then(|| established.encrypted_key.to_string());

    Ok(FlattenedJwe {
        protected: Some(protected_segment),
        unprotected: (!request.unprotected.is_empty()).then(|| request.unprotected.clone()),
        header: None,
        encrypted_key,
        aad: aad_segment,
        iv: b64::encode(&iv),
        ciphertext: b64::encode(&ciphertext),
        tag: b64::encode(&tag),
    })
}

/// Encrypts a payload for several recipients into the general JSON
/// serialization
///
/// The content is encrypted once under a shared CEK, which is then wrapped
/// per recipient. Direct encryption and direct ECDH-ES establish the CEK
/// rather than transporting it, so they are only usable when they are the
/// sole recipient.
///
/// # Errors
///
/// Returns an error if no recipients are given, a direct-mode recipient is
/// combined with others, a key does not fit its algorithm, or a
/// cryptographic step fails.
pub fn encrypt_general(
    plaintext: &[u8],
    encryption: ContentEncryption,
    recipients: &[RecipientRequest<'_>],
) -> Result<GeneralJwe, JweError> {
    let Some(first) = recipients.first() else {
        return Err(error::unexpected("at least one recipient is required").into());
    };

    for recipient in recipients {
        let descriptor = registry::resolve(recipient.algorithm.name())?;
        descriptor.check_key(recipient.key.key())?;
        check_key_policy(recipient.key, recipient.algorithm)?;

        if recipients.len() > 1 && !recipient.algorithm.produces_encrypted_key() {
            return Err(error::malformed_header(
                "direct key management cannot share a content encryption key",
            )
            .into());
        }
    }

    let protected = Header::new().with_param("enc", encryption.name());
    let protected_segment = protected.to_encoded();

    let mut entries = Vec::with_capacity(recipients.len());
    let cek;

    if recipients.len() == 1 && !first.algorithm.produces_encrypted_key() {
        let established =
            establish_cek(first.key, first.algorithm, encryption, &first.header)?;
        cek = established.cek;

        let recipient_header = header::merge([&first.header, &established.params])?;
        entries.push(JweRecipient {
            header: Some(recipient_header),
            encrypted_key: None,
        });
    } else {
        cek = random_bytes(encryption.key_len())?;
        for recipient in recipients {
            let (encrypted_key, params) =
                wrap_cek(recipient.key, recipient.algorithm, &cek, &recipient.header)?;
            let recipient_header = header::merge([&recipient.header, &params])?;

            entries.push(JweRecipient {
                header: Some(recipient_header),
                encrypted_key: Some(encrypted_key.to_string()),
            });
        }
    }

    let iv = random_bytes(encryption.iv_len())?;
    let aad = aad_input(&protected_segment, None);
    let (ciphertext, tag) = seal(encryption, &cek, &iv, &aad, plaintext)?;

    Ok(GeneralJwe {
        protected: Some(protected_segment),
        unprotected: None,
        recipients: entries,
        aad: None,
        iv: b64::encode(&iv),
        ciphertext: b64::encode(&ciphertext),
        tag: b64::encode(&tag),
    })
}

struct SharedSections<'a> {
    protected_segment: &'a str,
    unprotected: Header,
    aad_segment: Option<&'a str>,
    iv: &'a str,
    ciphertext: &'a str,
    tag: &'a str,
}

struct RecipientCandidate<'a> {
    header: Header,
    encrypted_key: &'a str,
}

fn decrypt_candidate(
    shared: &SharedSections<'_>,
    candidate: &RecipientCandidate<'_>,
    resolver: &dyn KeyResolver,
    options: &DecryptionOptions,
) -> Result<Decrypted, JweError> {
    let protected = if shared.protected_segment.is_empty() {
        Header::new()
    } else {
        Header::from_encoded(shared.protected_segment).map_err(header::HeaderError::from)?
    };

    let merged = header::merge([&protected, &shared.unprotected, &candidate.header])?;
    header::validate_crit(&protected, &merged, &options.understood_critical())?;

    let alg_name = merged.alg().map_err(header::HeaderError::from)?;
    let descriptor = registry::resolve(alg_name)?;
    let AlgorithmId::KeyManagement(alg) = descriptor.id else {
        return Err(error::unknown_algorithm(alg_name).into());
    };
    options.check_algorithm(alg)?;

    let enc: ContentEncryption = merged.enc().map_err(header::HeaderError::from)?.parse()?;
    options.check_encryption(enc)?;

    let context = ResolutionContext::new(&merged, None);
    let key = resolver.resolve(&context)?;
    descriptor.check_key(key.key())?;
    check_key_policy(&key, alg)?;
    tracing::debug!(alg = alg.name(), enc = enc.name(), kid = merged.kid(), "recovering content encryption key");

    let encrypted_key =
        b64::decode(candidate.encrypted_key).map_err(error::malformed_payload)?;
    let cek = recover_cek(&key, alg, enc, &merged, &encrypted_key, options)?;
    if cek.len() != enc.key_len() {
        return Err(error::crypto_failed().into());
    }

    let iv = b64::decode(shared.iv).map_err(error::malformed_payload)?;
    let ciphertext = b64::decode(shared.ciphertext).map_err(error::malformed_payload)?;
    let tag = b64::decode(shared.tag).map_err(error::malformed_payload)?;
    if iv.len() != enc.iv_len() || tag.len() != enc.tag_len() {
        return Err(error::crypto_failed().into());
    }

    let aad = aad_input(shared.protected_segment, shared.aad_segment);
    let plaintext = open(enc, &cek, &iv, &aad, &ciphertext, &tag)?;

    let aad_bytes = shared
        .aad_segment
        .map(|segment| b64::decode(segment).map_err(error::malformed_payload))
        .transpose()?;

    Ok(Decrypted {
        plaintext,
        protected,
        header: merged,
        aad: aad_bytes,
    })
}

/// Decrypts a compact JWE, resolving the key through `resolver`
///
/// # Errors
///
/// Returns an error if the token is malformed, the policy rejects it, no
/// key resolves, or decryption fails. Cryptographic failures are uniform
/// and carry no detail about which step failed.
pub fn decrypt_compact(
    token: &str,
    resolver: &dyn KeyResolver,
    options: &DecryptionOptions,
) -> Result<Decrypted, JweError> {
    let mut sections = token.split('.');
    let (Some(protected), Some(encrypted_key), Some(iv), Some(ciphertext), Some(tag), None) = (
        sections.next(),
        sections.next(),
        sections.next(),
        sections.next(),
        sections.next(),
        sections.next(),
    ) else {
        return Err(error::malformed_token().into());
    };

    let shared = SharedSections {
        protected_segment: protected,
        unprotected: Header::new(),
        aad_segment: None,
        iv,
        ciphertext,
        tag,
    };
    let candidate = RecipientCandidate {
        header: Header::new(),
        encrypted_key,
    };

    decrypt_candidate(&shared, &candidate, resolver, options)
}

/// Decrypts a flattened JSON JWE
///
/// # Errors
///
/// Returns an error if the document is malformed, the policy rejects it,
/// no key resolves, or decryption fails.
pub fn decrypt_flattened(
    jwe: &FlattenedJwe,
    resolver: &dyn KeyResolver,
    options: &DecryptionOptions,
) -> Result<Decrypted, JweError> {
    let shared = SharedSections {
        protected_segment: jwe.protected.as_deref().unwrap_or(""),
        unprotected: jwe.unprotected.clone().unwrap_or_default(),
        aad_segment: jwe.aad.as_deref(),
        iv: &jwe.iv,
        ciphertext: &jwe.ciphertext,
        tag: &jwe.tag,
    };
    let candidate = RecipientCandidate {
        header: jwe.header.clone().unwrap_or_default(),
        encrypted_key: jwe.encrypted_key.as_deref().unwrap_or(""),
    };

    decrypt_candidate(&shared, &candidate, resolver, options)
}

/// Decrypts a general JSON JWE, accepting the first recipient that succeeds
///
/// # Errors
///
/// Returns the last failure if no recipient entry decrypts.
pub fn decrypt_general(
    jwe: &GeneralJwe,
    resolver: &dyn KeyResolver,
    options: &DecryptionOptions,
) -> Result<Decrypted, JweError> {
    let mut last_error = JweError::from(error::malformed_token());

    for entry in &jwe.recipients {
        let shared = SharedSections {
            protected_segment: jwe.protected.as_deref().unwrap_or(""),
            unprotected: jwe.unprotected.clone().unwrap_or_default(),
            aad_segment: jwe.aad.as_deref(),
            iv: &jwe.iv,
            ciphertext: &jwe.ciphertext,
            tag: &jwe.tag,
        };
        let candidate = RecipientCandidate {
            header: entry.header.clone().unwrap_or_default(),
            encrypted_key: entry.encrypted_key.as_deref().unwrap_or(""),
        };

        match decrypt_candidate(&shared, &candidate, resolver, options) {
            Ok(decrypted) => return Ok(decrypted),
            Err(err) => last_error = err,
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwa::Oct;

    // RFC 7516 appendix A.3
    const RFC7516_A3_TOKEN: &str = "eyJhbGciOiJBMTI4S1ciLCJlbmMiOiJBMTI4Q0JDLUhTMjU2In0.6KB707dM9YTIgHtLvtgWQ8mKwboJW3of9locizkDTHzBC2IlrT1oOQ.AxY8DCtDaGlsbGljb3RoZQ.KDlTtXchhZTGufMYmOYGS4HffxPSUrfmqCHXaI9wOGY.U0m_YmjN04DJvceFICbCVQ";
    const RFC7516_A3_KEY: &str = r#"{"kty":"oct","k":"GawgguFyGrWKav7AX4VKUg"}"#;

    fn a3_key() -> Jwk {
        serde_json::from_str(RFC7516_A3_KEY).unwrap()
    }

    fn allow(alg: KeyManagement, enc: ContentEncryption) -> DecryptionOptions {
        DecryptionOptions::new()
            .allow_algorithm(alg)
            .allow_encryption(enc)
    }

    fn a3_options() -> DecryptionOptions {
        allow(
            KeyManagement::KeyWrap(KeyWrap::Aes128),
            ContentEncryption::A128CbcHs256,
        )
    }

    #[test]
    fn decrypts_rfc7516_a3() {
        let decrypted = decrypt_compact(RFC7516_A3_TOKEN, &a3_key(), &a3_options()).unwrap();
        assert_eq!(decrypted.plaintext(), b"Live long and prosper.");
        assert_eq!(decrypted.protected().alg().unwrap(), "A128KW");
    }

    #[test]
    fn default_policy_allows_nothing() {
        let err = decrypt_compact(RFC7516_A3_TOKEN, &a3_key(), &DecryptionOptions::new())
            .unwrap_err();
        assert!(matches!(err, JweError::DisallowedAlgorithm(_)));

        let options = DecryptionOptions::new().allow_any_algorithm();
        let _ = decrypt_compact(RFC7516_A3_TOKEN, &a3_key(), &options).unwrap();
    }

    #[test]
    fn tampered_rfc7516_a3_fails() {
        let mut sections: Vec<String> = RFC7516_A3_TOKEN.split('.').map(str::to_owned).collect();
        let flipped = if sections[3].starts_with('K') { "A" } else { "K" };
        sections[3].replace_range(..1, flipped);
        let token = sections.join(".");

        let err = decrypt_compact(&token, &a3_key(), &a3_options()).unwrap_err();
        assert!(err.is_crypto_failure());

        let mut sections: Vec<String> = RFC7516_A3_TOKEN.split('.').map(str::to_owned).collect();
        let flipped = if sections[4].starts_with('U') { "A" } else { "U" };
        sections[4].replace_range(..1, flipped);
        let token = sections.join(".");

        let err = decrypt_compact(&token, &a3_key(), &a3_options()).unwrap_err();
        assert!(err.is_crypto_failure());
    }

    // RFC 7518 appendix C
    #[test]
    fn concat_kdf_matches_rfc7518_appendix_c() {
        let alice: Key = serde_json::from_str(
            r#"{"kty":"EC","crv":"P-256",
                "x":"gI0GAILBdu7T53akrFmMyGcsF3n5dO7MmwNBHKW5SV0",
                "y":"SLW_xSffzlPWrHEVI30DHM_4egVwt3NQqeUD7nMFpps",
                "d":"0_NxaRPUMQoAJt50Gz8YiTr8gRTwyEaCumd-MToTmIo"}"#,
        )
        .unwrap();
        let bob: Key = serde_json::from_str(
            r#"{"kty":"EC","crv":"P-256",
                "x":"weNJy2HscCSM6AEDTDg04biOvhFhyyWvOHQfeF_PxMQ",
                "y":"e8lnCO-AlStT-NJVX-crhB7QRYhiix03illJOVAOyck",
                "d":"VEmDZpDXXK8p8N0Cndsxs924q6nS1RXFASRl6BfUqdw"}"#,
        )
        .unwrap();

        let (Key::EllipticCurve(alice), Key::EllipticCurve(bob)) = (&alice, &bob) else {
            panic!("expected EC keys");
        };

        let z = alice
            .private_key()
            .unwrap()
            .agree(bob.public_key())
            .unwrap();
        let derived = concat_kdf(&z, "A128GCM", b"Alice", b"Bob", 16);
        assert_eq!(b64::encode(&derived), "VqqN6vgjbSBcIijNcacQGg");
    }

    #[test]
    fn direct_round_trip() {
        let key = Jwk::from(Oct::generate(32).unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::Direct,
            ContentEncryption::A256Gcm,
        );

        let token = encrypt_compact(b"direct payload", &request).unwrap();
        assert!(token.split('.').nth(1).unwrap().is_empty());

        let options = allow(KeyManagement::Direct, ContentEncryption::A256Gcm);
        let decrypted = decrypt_compact(&token, &key, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"direct payload");
    }

    #[test]
    fn direct_key_must_match_enc_length() {
        let key = Jwk::from(Oct::generate(16).unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::Direct,
            ContentEncryption::A256Gcm,
        );
        assert!(encrypt_compact(b"data", &request).is_err());
    }

    #[test]
    fn aes_kw_round_trip() {
        let key = Jwk::from(Oct::generate(32).unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::KeyWrap(KeyWrap::Aes256),
            ContentEncryption::A128CbcHs256,
        );

        let token = encrypt_compact(b"wrapped", &request).unwrap();
        let options = allow(
            KeyManagement::KeyWrap(KeyWrap::Aes256),
            ContentEncryption::A128CbcHs256,
        );
        let decrypted = decrypt_compact(&token, &key, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"wrapped");
    }

    #[test]
    fn aes_gcm_kw_round_trip() {
        let key = Jwk::from(Oct::generate(32).unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::KeyWrap(KeyWrap::Aes256Gcm),
            ContentEncryption::A128Gcm,
        );

        let token = encrypt_compact(b"gcm wrapped", &request).unwrap();
        let options = allow(
            KeyManagement::KeyWrap(KeyWrap::Aes256Gcm),
            ContentEncryption::A128Gcm,
        );
        let decrypted = decrypt_compact(&token, &key, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"gcm wrapped");
        assert!(decrypted.protected().get("iv").is_some());
        assert!(decrypted.protected().get("tag").is_some());
    }

    #[test]
    fn rsa_oaep_round_trip() {
        let key = Jwk::from(crate::jwa::Rsa::generate().unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::KeyWrap(KeyWrap::RsaOaep),
            ContentEncryption::A256Gcm,
        );

        let token = encrypt_compact(b"to the holder of the private key", &request).unwrap();
        let options = allow(
            KeyManagement::KeyWrap(KeyWrap::RsaOaep),
            ContentEncryption::A256Gcm,
        );
        let decrypted = decrypt_compact(&token, &key, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"to the holder of the private key");

        let public = key.clone().public_only();
        assert!(matches!(
            decrypt_compact(&token, &public, &options),
            Err(JweError::MissingPrivateKey(_))
        ));
    }

    #[test]
    fn ecdh_es_round_trip() {
        let key = Jwk::from(crate::jwa::EllipticCurve::generate(ec::Curve::P256).unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::KeyAgreement(KeyAgreement::EcdhEs),
            ContentEncryption::A128CbcHs256,
        );

        let token = encrypt_compact(b"agreed", &request).unwrap();
        assert!(token.split('.').nth(1).unwrap().is_empty());

        let options = allow(
            KeyManagement::KeyAgreement(KeyAgreement::EcdhEs),
            ContentEncryption::A128CbcHs256,
        );
        let decrypted = decrypt_compact(&token, &key, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"agreed");
        assert!(decrypted.protected().get("epk").is_some());
    }

    #[test]
    fn ecdh_es_kw_round_trip_with_party_info() {
        let key = Jwk::from(crate::jwa::EllipticCurve::generate(ec::Curve::P384).unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::KeyAgreement(KeyAgreement::EcdhEsA128Kw),
            ContentEncryption::A256Gcm,
        )
        .with_protected_param("apu", b64::encode(b"Alice"))
        .with_protected_param("apv", b64::encode(b"Bob"));

        let token = encrypt_compact(b"agreed and wrapped", &request).unwrap();
        let options = allow(
            KeyManagement::KeyAgreement(KeyAgreement::EcdhEsA128Kw),
            ContentEncryption::A256Gcm,
        );
        let decrypted = decrypt_compact(&token, &key, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"agreed and wrapped");
    }

    #[test]
    fn ecdh_es_x25519_round_trip() {
        let key = Jwk::from(crate::jwa::Okp::generate(okp::OkpCurve::X25519).unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::KeyAgreement(KeyAgreement::EcdhEsA256Kw),
            ContentEncryption::A256CbcHs512,
        );

        let token = encrypt_compact(b"montgomery", &request).unwrap();
        let options = allow(
            KeyManagement::KeyAgreement(KeyAgreement::EcdhEsA256Kw),
            ContentEncryption::A256CbcHs512,
        );
        let decrypted = decrypt_compact(&token, &key, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"montgomery");
    }

    #[test]
    fn pbes2_round_trip() {
        let key = Jwk::from(Oct::new(&b"correct horse battery staple"[..]));
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::PasswordBased(Pbes2::Hs256A128Kw),
            ContentEncryption::A128CbcHs256,
        );

        let token = encrypt_compact(b"password protected", &request).unwrap();
        let options = allow(
            KeyManagement::PasswordBased(Pbes2::Hs256A128Kw),
            ContentEncryption::A128CbcHs256,
        );
        let decrypted = decrypt_compact(&token, &key, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"password protected");
        assert_eq!(
            decrypted.protected().get("p2c").and_then(|v| v.as_u64()),
            Some(u64::from(DEFAULT_PBES2_ITERATIONS))
        );
    }

    #[test]
    fn pbes2_iteration_count_is_capped() {
        let key = Jwk::from(Oct::new(&b"hunter2"[..]));
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::PasswordBased(Pbes2::Hs512A256Kw),
            ContentEncryption::A256Gcm,
        );

        let token = encrypt_compact(b"data", &request).unwrap();
        let options = allow(
            KeyManagement::PasswordBased(Pbes2::Hs512A256Kw),
            ContentEncryption::A256Gcm,
        )
        .max_pbes2_iterations(1000);
        assert!(matches!(
            decrypt_compact(&token, &key, &options),
            Err(JweError::MalformedHeader(_))
        ));
    }

    #[test]
    fn wrong_key_is_a_uniform_failure() {
        let key = Jwk::from(Oct::generate(32).unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::KeyWrap(KeyWrap::Aes256),
            ContentEncryption::A256Gcm,
        );
        let token = encrypt_compact(b"data", &request).unwrap();

        let other = Jwk::from(Oct::generate(32).unwrap());
        let options = allow(
            KeyManagement::KeyWrap(KeyWrap::Aes256),
            ContentEncryption::A256Gcm,
        );
        let err = decrypt_compact(&token, &other, &options).unwrap_err();
        assert!(err.is_crypto_failure());
    }

    #[test]
    fn disallowed_algorithms_rejected() {
        let key = Jwk::from(Oct::generate(32).unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::Direct,
            ContentEncryption::A256Gcm,
        );
        let token = encrypt_compact(b"data", &request).unwrap();

        let options = allow(
            KeyManagement::KeyWrap(KeyWrap::Aes256),
            ContentEncryption::A256Gcm,
        );
        assert!(matches!(
            decrypt_compact(&token, &key, &options),
            Err(JweError::DisallowedAlgorithm(_))
        ));

        let options = allow(KeyManagement::Direct, ContentEncryption::A128CbcHs256);
        assert!(matches!(
            decrypt_compact(&token, &key, &options),
            Err(JweError::DisallowedAlgorithm(_))
        ));
    }

    #[test]
    fn flattened_round_trip_with_aad() {
        let key = Jwk::from(Oct::generate(32).unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::KeyWrap(KeyWrap::Aes256),
            ContentEncryption::A128Gcm,
        )
        .with_unprotected_param("kid", "side-channel")
        .with_aad(&b"attached metadata"[..]);

        let jwe = encrypt_flattened(b"flattened", &request).unwrap();
        assert!(jwe.aad.is_some());

        let options = allow(
            KeyManagement::KeyWrap(KeyWrap::Aes256),
            ContentEncryption::A128Gcm,
        );
        let decrypted = decrypt_flattened(&jwe, &key, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"flattened");
        assert_eq!(decrypted.aad(), Some(&b"attached metadata"[..]));
        assert_eq!(decrypted.header().kid(), Some("side-channel"));
    }

    #[test]
    fn flattened_aad_is_authenticated() {
        let key = Jwk::from(Oct::generate(32).unwrap());
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::KeyWrap(KeyWrap::Aes256),
            ContentEncryption::A128Gcm,
        )
        .with_aad(&b"original"[..]);

        let mut jwe = encrypt_flattened(b"data", &request).unwrap();
        jwe.aad = Some(b64::encode(b"doctored"));

        let options = allow(
            KeyManagement::KeyWrap(KeyWrap::Aes256),
            ContentEncryption::A128Gcm,
        );
        let err = decrypt_flattened(&jwe, &key, &options).unwrap_err();
        assert!(err.is_crypto_failure());
    }

    #[test]
    fn general_round_trip_two_recipients() {
        let key_a = Jwk::from(Oct::generate(16).unwrap()).with_key_id("a".into());
        let key_b = Jwk::from(crate::jwa::Rsa::generate().unwrap()).with_key_id("b".into());

        let recipients = [
            RecipientRequest::new(&key_a, KeyManagement::KeyWrap(KeyWrap::Aes128)),
            RecipientRequest::new(&key_b, KeyManagement::KeyWrap(KeyWrap::RsaOaep256)),
        ];
        let jwe =
            encrypt_general(b"broadcast", ContentEncryption::A128CbcHs256, &recipients).unwrap();
        assert_eq!(jwe.recipients.len(), 2);

        // either recipient key alone is enough
        let options = DecryptionOptions::new()
            .allow_algorithm(KeyManagement::KeyWrap(KeyWrap::Aes128))
            .allow_algorithm(KeyManagement::KeyWrap(KeyWrap::RsaOaep256))
            .allow_encryption(ContentEncryption::A128CbcHs256);
        let decrypted = decrypt_general(&jwe, &key_b, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"broadcast");
        let decrypted = decrypt_general(&jwe, &key_a, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"broadcast");
    }

    #[test]
    fn general_rejects_shared_direct_mode() {
        let key_a = Jwk::from(Oct::generate(32).unwrap());
        let key_b = Jwk::from(Oct::generate(16).unwrap());

        let recipients = [
            RecipientRequest::new(&key_a, KeyManagement::Direct),
            RecipientRequest::new(&key_b, KeyManagement::KeyWrap(KeyWrap::Aes128)),
        ];
        assert!(encrypt_general(b"data", ContentEncryption::A256Gcm, &recipients).is_err());
    }

    #[test]
    fn general_single_direct_recipient_allowed() {
        let key = Jwk::from(Oct::generate(32).unwrap());
        let recipients = [RecipientRequest::new(&key, KeyManagement::Direct)];
        let jwe = encrypt_general(b"solo", ContentEncryption::A256Gcm, &recipients).unwrap();
        assert!(jwe.recipients[0].encrypted_key.is_none());

        let options = allow(KeyManagement::Direct, ContentEncryption::A256Gcm);
        let decrypted = decrypt_general(&jwe, &key, &options).unwrap();
        assert_eq!(decrypted.plaintext(), b"solo");
    }

    #[test]
    fn signing_key_refused_for_encryption() {
        let key = Jwk::from(Oct::generate(32).unwrap()).with_usage(Usage::Signing);
        let request = EncryptionRequest::new(
            &key,
            KeyManagement::Direct,
            ContentEncryption::A256Gcm,
        );
        assert!(encrypt_compact(b"data", &request).is_err());
    }

    #[test]
    fn malformed_token_rejected() {
        let key = Jwk::from(Oct::generate(32).unwrap());
        let opts = DecryptionOptions::new();
        assert!(matches!(
            decrypt_compact("a.b.c.d", &key, &opts),
            Err(JweError::MalformedToken(_))
        ));
        assert!(matches!(
            decrypt_compact("a.b.c.d.e.f", &key, &opts),
            Err(JweError::MalformedToken(_))
        ));
    }
}
