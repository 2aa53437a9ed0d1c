//! Common errors
//!
//! Failures are grouped by the stage at which they occur: format errors
//! during parsing, header errors before key resolution, key mismatches
//! before any primitive runs, and a deliberately generic cryptographic
//! failure afterwards. Claims errors are specific again, since they can
//! only occur once integrity has been established.

#![allow(missing_copy_implementations)]

use std::error::Error as StdError;

use thiserror::Error;

/// The provided name could not be matched with supported algorithms
#[derive(Debug, Error)]
#[error("'{alg}' does not match supported algorithms")]
pub struct UnknownAlgorithm {
    alg: String,
}

#[inline]
pub(crate) fn unknown_algorithm(alg: impl Into<String>) -> UnknownAlgorithm {
    UnknownAlgorithm { alg: alg.into() }
}

/// The algorithm is supported but not in the caller's allowed set
#[derive(Debug, Error)]
#[error("algorithm '{alg}' is not in the allowed set")]
pub struct DisallowedAlgorithm {
    alg: String,
}

#[inline]
pub(crate) fn disallowed_algorithm(alg: impl Into<String>) -> DisallowedAlgorithm {
    DisallowedAlgorithm { alg: alg.into() }
}

/// The key cannot be used with the requested algorithm
///
/// Covers key type, curve, and symmetric length mismatches. Raised before
/// any primitive operation is attempted.
#[derive(Debug, Error)]
#[error("key incompatible with algorithm '{alg}'")]
pub struct IncompatibleKey {
    alg: String,
}

#[inline]
pub(crate) fn incompatible_key(alg: impl Into<String>) -> IncompatibleKey {
    IncompatibleKey { alg: alg.into() }
}

/// The JWK has a specific usage that disallows this use
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("JWK cannot be used in this way")]
pub struct KeyUsageMismatch {
    _p: (),
}

pub(crate) const fn key_usage_mismatch() -> KeyUsageMismatch {
    KeyUsageMismatch { _p: () }
}

/// The token is malformed and cannot be split into its sections
#[derive(Clone, Copy, Debug, Error)]
#[error("malformed token")]
pub struct MalformedToken {
    _p: (),
}

pub(crate) const fn malformed_token() -> MalformedToken {
    MalformedToken { _p: () }
}

/// The token header section is malformed
#[derive(Debug, Error)]
#[error("malformed token header")]
pub struct MalformedHeader {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn malformed_header(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedHeader {
    MalformedHeader {
        source: source.into(),
    }
}

/// The token payload section is malformed
#[derive(Debug, Error)]
#[error("malformed token payload")]
pub struct MalformedPayload {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn malformed_payload(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedPayload {
    MalformedPayload {
        source: source.into(),
    }
}

/// The token signature section is malformed
#[derive(Debug, Error)]
#[error("malformed token signature")]
pub struct MalformedSignature {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn malformed_signature(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedSignature {
    MalformedSignature {
        source: source.into(),
    }
}

/// A header parameter appeared in more than one header source
#[derive(Debug, Error)]
#[error("header parameter '{name}' appears in more than one header")]
pub struct DuplicateHeaderParameter {
    name: String,
}

#[inline]
pub(crate) fn duplicate_header_parameter(name: impl Into<String>) -> DuplicateHeaderParameter {
    DuplicateHeaderParameter { name: name.into() }
}

/// A required header parameter is absent
#[derive(Debug, Error)]
#[error("required header parameter '{name}' is missing")]
pub struct MissingHeaderParameter {
    name: &'static str,
}

#[inline]
pub(crate) const fn missing_header_parameter(name: &'static str) -> MissingHeaderParameter {
    MissingHeaderParameter { name }
}

/// A critical header extension is not understood by the recipient
#[derive(Debug, Error)]
#[error("critical header extension '{name}' is not understood")]
pub struct UnsupportedCriticalExtension {
    name: String,
}

#[inline]
pub(crate) fn unsupported_critical_extension(
    name: impl Into<String>,
) -> UnsupportedCriticalExtension {
    UnsupportedCriticalExtension { name: name.into() }
}

/// Verification or decryption failed
///
/// Deliberately carries no further detail: distinguishing a wrong key from
/// a corrupted ciphertext or a tampered tag would hand an attacker an
/// oracle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("verification or decryption failed")]
pub struct CryptoOperationFailed {
    _p: (),
}

pub(crate) const fn crypto_failed() -> CryptoOperationFailed {
    CryptoOperationFailed { _p: () }
}

/// The key resolver produced no key for this token
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("no key satisfied the resolution request")]
pub struct KeyNotResolved {
    _p: (),
}

pub(crate) const fn key_not_resolved() -> KeyNotResolved {
    KeyNotResolved { _p: () }
}

/// Missing private key
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("operation requires a private key")]
pub struct MissingPrivateKey {
    _p: (),
}

pub(crate) const fn missing_private_key() -> MissingPrivateKey {
    MissingPrivateKey { _p: () }
}

/// The key was rejected during import or conversion
#[derive(Debug, Error)]
#[error("key rejected")]
pub struct KeyRejected {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn key_rejected(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> KeyRejected {
    KeyRejected {
        source: source.into(),
    }
}

/// Unexpected error (possibly a bug)
#[derive(Debug, Error)]
#[error("unexpected error")]
pub struct Unexpected {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn unexpected(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> Unexpected {
    Unexpected {
        source: source.into(),
    }
}

/// An error occurring while performing an operation with a single key
///
/// This is the error surface of the [`Signer`][crate::jws::Signer] and
/// [`Verifier`][crate::jws::Verifier] implementations on [`Jwk`][crate::Jwk].
#[derive(Debug, Error)]
pub enum KeyOpError {
    /// The key cannot be used with this algorithm
    #[error(transparent)]
    IncompatibleKey(#[from] IncompatibleKey),

    /// The key's declared usage disallows this operation
    #[error(transparent)]
    KeyUsageMismatch(#[from] KeyUsageMismatch),

    /// The key has no private component
    #[error(transparent)]
    MissingPrivateKey(#[from] MissingPrivateKey),

    /// The cryptographic operation failed
    #[error(transparent)]
    CryptoOperationFailed(#[from] CryptoOperationFailed),

    /// An unexpected error
    #[error(transparent)]
    Unexpected(#[from] Unexpected),
}

impl KeyOpError {
    /// Whether the error is a bare cryptographic failure
    #[must_use]
    pub fn is_crypto_failure(&self) -> bool {
        matches!(self, Self::CryptoOperationFailed(_))
    }
}

impl From<std::convert::Infallible> for KeyOpError {
    fn from(_: std::convert::Infallible) -> Self {
        unreachable!("infallible result")
    }
}

/// An error occurring while producing or consuming a JWS
#[derive(Debug, Error)]
pub enum JwsError {
    /// The token could not be split into its sections
    #[error(transparent)]
    MalformedToken(#[from] MalformedToken),

    /// The header section is malformed
    #[error(transparent)]
    MalformedHeader(#[from] MalformedHeader),

    /// The payload section is malformed
    #[error(transparent)]
    MalformedPayload(#[from] MalformedPayload),

    /// The signature section is malformed
    #[error(transparent)]
    MalformedSignature(#[from] MalformedSignature),

    /// A parameter appeared in multiple header sources
    #[error(transparent)]
    DuplicateHeaderParameter(#[from] DuplicateHeaderParameter),

    /// A required header parameter is absent
    #[error(transparent)]
    MissingHeaderParameter(#[from] MissingHeaderParameter),

    /// A critical extension was not understood
    #[error(transparent)]
    UnsupportedCriticalExtension(#[from] UnsupportedCriticalExtension),

    /// The header names an unknown algorithm
    #[error(transparent)]
    UnknownAlgorithm(#[from] UnknownAlgorithm),

    /// The header names an algorithm the caller has not allowed
    #[error(transparent)]
    DisallowedAlgorithm(#[from] DisallowedAlgorithm),

    /// The key does not fit the algorithm
    #[error(transparent)]
    IncompatibleKey(#[from] IncompatibleKey),

    /// The key has no private component
    #[error(transparent)]
    MissingPrivateKey(#[from] MissingPrivateKey),

    /// The key resolver found no key
    #[error(transparent)]
    KeyNotResolved(#[from] KeyNotResolved),

    /// The operation was rejected by the key
    #[error("operation rejected by key")]
    KeyOp(#[from] KeyOpError),

    /// Signature verification failed
    #[error(transparent)]
    CryptoOperationFailed(#[from] CryptoOperationFailed),

    /// An unexpected error
    #[error(transparent)]
    Unexpected(#[from] Unexpected),
}

impl JwsError {
    /// Whether the error is the generic cryptographic failure
    #[must_use]
    pub fn is_crypto_failure(&self) -> bool {
        match self {
            Self::CryptoOperationFailed(_) => true,
            Self::KeyOp(e) => e.is_crypto_failure(),
            _ => false,
        }
    }
}

/// An error occurring while producing or consuming a JWE
#[derive(Debug, Error)]
pub enum JweError {
    /// The token could not be split into its sections
    #[error(transparent)]
    MalformedToken(#[from] MalformedToken),

    /// The header section is malformed
    #[error(transparent)]
    MalformedHeader(#[from] MalformedHeader),

    /// A ciphertext, IV, tag, or encrypted key segment is malformed
    #[error(transparent)]
    MalformedPayload(#[from] MalformedPayload),

    /// A parameter appeared in multiple header sources
    #[error(transparent)]
    DuplicateHeaderParameter(#[from] DuplicateHeaderParameter),

    /// A required header parameter is absent
    #[error(transparent)]
    MissingHeaderParameter(#[from] MissingHeaderParameter),

    /// A critical extension was not understood
    #[error(transparent)]
    UnsupportedCriticalExtension(#[from] UnsupportedCriticalExtension),

    /// The header names an unknown algorithm
    #[error(transparent)]
    UnknownAlgorithm(#[from] UnknownAlgorithm),

    /// The header names an algorithm the caller has not allowed
    #[error(transparent)]
    DisallowedAlgorithm(#[from] DisallowedAlgorithm),

    /// The key does not fit the key management algorithm
    #[error(transparent)]
    IncompatibleKey(#[from] IncompatibleKey),

    /// The key has no private component
    #[error(transparent)]
    MissingPrivateKey(#[from] MissingPrivateKey),

    /// The key resolver found no key
    #[error(transparent)]
    KeyNotResolved(#[from] KeyNotResolved),

    /// Decryption, unwrap, or tag verification failed
    #[error(transparent)]
    CryptoOperationFailed(#[from] CryptoOperationFailed),

    /// An unexpected error
    #[error(transparent)]
    Unexpected(#[from] Unexpected),
}

impl JweError {
    /// Whether the error is the generic cryptographic failure
    #[must_use]
    pub fn is_crypto_failure(&self) -> bool {
        matches!(self, Self::CryptoOperationFailed(_))
    }
}

impl From<KeyOpError> for JweError {
    fn from(err: KeyOpError) -> Self {
        match err {
            KeyOpError::IncompatibleKey(e) => Self::IncompatibleKey(e),
            KeyOpError::KeyUsageMismatch(_) => Self::CryptoOperationFailed(crypto_failed()),
            KeyOpError::MissingPrivateKey(e) => Self::MissingPrivateKey(e),
            KeyOpError::CryptoOperationFailed(e) => Self::CryptoOperationFailed(e),
            KeyOpError::Unexpected(e) => Self::Unexpected(e),
        }
    }
}

/// An error occurring when validating the claims of a JWT
#[derive(Debug, Error)]
pub enum ClaimsRejected {
    /// The token is expired according to the `exp` claim
    #[error("token expired")]
    TokenExpired,

    /// The token is not yet valid according to the `nbf` claim
    #[error("token not yet valid")]
    TokenNotYetValid,

    /// The token is older than the maximum age permits (`iat`)
    #[error("token issued too long ago")]
    TokenTooOld,

    /// The token issuer is not acceptable
    #[error("invalid issuer")]
    InvalidIssuer,

    /// The token audience is not acceptable
    #[error("invalid audience")]
    InvalidAudience,

    /// The token subject is not acceptable
    #[error("invalid subject")]
    InvalidSubject,

    /// A required claim is missing
    #[error("required {_0} claim missing")]
    MissingRequiredClaim(&'static str),

    /// Custom validation error
    #[error(transparent)]
    Custom(Box<dyn StdError + Send + Sync>),
}

/// An error occurring while producing or consuming a JWT
#[derive(Debug, Error)]
pub enum JwtError {
    /// The underlying JWS operation failed
    #[error(transparent)]
    Jws(#[from] JwsError),

    /// The claims section is malformed
    #[error(transparent)]
    MalformedClaims(#[from] MalformedPayload),

    /// The token was rejected by the claims validator
    #[error("token rejected by claims validator")]
    ClaimsRejected(#[from] ClaimsRejected),
}
