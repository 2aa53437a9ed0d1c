//! Implementations of the JSON Web Algorithms (JWA) standard
//!
//! The specifications for these algorithms can be found in [RFC7518][].
//!
//! Key material lives here as one module per key type (`oct`, `rsa`, `ec`,
//! `okp`), each binding the relevant primitives from the platform crypto
//! providers. Algorithm identifiers for encryption live in
//! [`KeyManagement`] and [`ContentEncryption`]; signing identifiers live in
//! [`jws::Algorithm`][crate::jws::Algorithm].
//!
//! [RFC7518]: https://tools.ietf.org/html/rfc7518

pub mod ec;
pub mod oct;
pub mod okp;
pub mod rsa;

#[doc(inline)]
pub use ec::EllipticCurve;
#[doc(inline)]
pub use oct::Oct;
#[doc(inline)]
pub use okp::Okp;
#[doc(inline)]
pub use rsa::Rsa;

mod algorithm;

pub use algorithm::{ContentEncryption, KeyAgreement, KeyManagement, KeyWrap, Pbes2};

use serde::{Deserialize, Serialize};

/// The intended use for a JWA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub enum Usage {
    /// The JWA is intended for signing and verification
    #[serde(rename = "sig")]
    Signing,

    /// The JWA is intended for encryption
    #[serde(rename = "enc")]
    Encryption,
}
