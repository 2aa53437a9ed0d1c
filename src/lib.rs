//! This crate implements the Javascript/JSON Object Signing and Encryption (JOSE)
//! standards, including:
//!
//! * JSON Web Signature (JWS): [RFC7515][]
//! * JSON Web Encryption (JWE): [RFC7516][]
//! * JSON Web Key (JWK): [RFC7517][]
//! * JSON Web Algorithms (JWA): [RFC7518][]
//! * JSON Web Token (JWT): [RFC7519][]
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515
//! [RFC7516]: https://tools.ietf.org/html/rfc7516
//! [RFC7517]: https://tools.ietf.org/html/rfc7517
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! # Example
//!
//! ```
//! use sigil::{jwa, jws, jwt, Jwk, Jwks};
//!
//! let key = Jwk::from(jwa::Oct::generate(32).unwrap())
//!     .with_key_id("test key".into())
//!     .with_algorithm(jws::Algorithm::HS256);
//!
//! let mut keys = Jwks::default();
//! keys.add_key(key.clone());
//!
//! let claims = jwt::Claims::new()
//!     .with_subject("somebody")
//!     .with_audience("my_api")
//!     .with_issuer("authority")
//!     .with_future_expiration(300);
//!
//! let token = jwt::sign(&claims, &jws::SignatureRequest::new(&key, jws::Algorithm::HS256))
//!     .unwrap();
//!
//! let validator = jwt::CoreValidator::default()
//!     .add_allowed_audience(jwt::Audience::from_static("my_api"))
//!     .require_issuer(jwt::Issuer::from_static("authority"));
//!
//! let options = jws::VerificationOptions::new().allow_algorithm(jws::Algorithm::HS256);
//!
//! let validated = jwt::verify(&token, &keys, &options, &validator)
//!     .expect("JWT was invalid");
//! assert_eq!(validated.claims().sub().unwrap().as_str(), "somebody");
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod asn1;
pub mod b64;
pub mod clock;
pub mod error;
pub mod header;
pub mod jwa;
pub mod jwe;
pub mod jwk;
mod jwks;
pub mod jws;
pub mod jwt;
pub mod pki;
pub mod registry;
pub mod resolve;

#[doc(inline)]
pub use jwk::Jwk;
#[doc(inline)]
pub use jwks::Jwks;
