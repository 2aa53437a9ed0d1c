//! Implementations of the JSON Web Tokens (JWT) standard
//!
//! The specifications for this standard can be found in [RFC7519][].
//!
//! A JWT is a claims set carried as the payload of a compact JWS. Claims
//! validation runs strictly after signature verification succeeds, and the
//! first violated claim aborts validation with the offending claim named.
//!
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! ```
//! use sigil::{jwa, jws, jwt, Jwk};
//!
//! let key = Jwk::from(jwa::Oct::generate(32).unwrap())
//!     .with_algorithm(jws::Algorithm::HS256);
//!
//! let claims = jwt::Claims::new()
//!     .with_issuer("authority")
//!     .with_audience("my_api")
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
//! let validated = jwt::verify(&token, &key, &options, &validator).unwrap();
//! assert_eq!(validated.claims().iss().unwrap().as_str(), "authority");
//! ```

use std::time::Duration;

use aliri_braid::braid;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    clock::{Clock, System, UnixTime},
    error::{self, ClaimsRejected, JwtError},
    header::Header,
    jws,
    resolve::KeyResolver,
};

/// An audience
#[braid(serde, ref_doc = "A borrowed reference to an [`Audience`]")]
pub struct Audience;

/// An issuer of JWTs
#[braid(serde, ref_doc = "A borrowed reference to an [`Issuer`]")]
pub struct Issuer;

/// The subject of a JWT
#[braid(serde, ref_doc = "A borrowed reference to a [`Subject`]")]
pub struct Subject;

/// A type representing one or more items, primarily for serialization
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single item
    One(T),

    /// Zero or more items, to be serialized/deserialized as an array
    Many(Vec<T>),
}

/// A set of zero or more [`Audience`]s
///
/// The `aud` claim may be a single string or an array of strings; both
/// forms deserialize into this set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany<Audience>", into = "OneOrMany<Audience>")]
#[repr(transparent)]
#[must_use]
pub struct Audiences(Vec<Audience>);

impl Audiences {
    /// An empty audience set
    #[inline]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// An audience set with a single audience
    #[inline]
    pub fn single(aud: impl Into<Audience>) -> Self {
        Self(vec![aud.into()])
    }

    /// Indicates whether the audience set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates through references to the audiences in the set
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &AudienceRef> {
        self.0.iter().map(AsRef::as_ref)
    }
}

impl From<OneOrMany<Audience>> for Audiences {
    #[inline]
    fn from(vals: OneOrMany<Audience>) -> Self {
        match vals {
            OneOrMany::One(x) => Self(vec![x]),
            OneOrMany::Many(v) => Self(v),
        }
    }
}

impl From<Audiences> for OneOrMany<Audience> {
    #[inline]
    fn from(mut vec: Audiences) -> Self {
        if vec.0.len() == 1 {
            Self::One(vec.0.pop().expect("length was just checked"))
        } else {
            Self::Many(vec.0)
        }
    }
}

impl From<Vec<Audience>> for Audiences {
    #[inline]
    fn from(vals: Vec<Audience>) -> Self {
        Self(vals)
    }
}

impl From<Audience> for Audiences {
    #[inline]
    fn from(aud: Audience) -> Self {
        Self::single(aud)
    }
}

/// The registered claims of a JWT, plus any private claims
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Audiences::is_empty")]
    aud: Audiences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<Issuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nbf: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Claims {
    /// Constructs a new, empty claims set
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `aud` claim
    pub fn with_audience(mut self, aud: impl Into<Audience>) -> Self {
        self.aud = Audiences::single(aud);
        self
    }

    /// Sets the `aud` claim, where multiple audiences are allowed
    pub fn with_audiences(mut self, aud: impl Into<Audiences>) -> Self {
        self.aud = aud.into();
        self
    }

    /// Sets the `iss` claim
    pub fn with_issuer(mut self, iss: impl Into<Issuer>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Sets the `sub` claim
    pub fn with_subject(mut self, sub: impl Into<Subject>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Sets the `exp` claim
    pub fn with_expiration(mut self, time: UnixTime) -> Self {
        self.exp = Some(time);
        self
    }

    /// Sets the `exp` claim to the given number of seconds from now,
    /// using the system clock
    pub fn with_future_expiration(self, secs: u64) -> Self {
        self.with_future_expiration_from_clock(secs, &System)
    }

    /// Sets the `exp` claim to the given number of seconds from now,
    /// using the specified clock
    pub fn with_future_expiration_from_clock<C: Clock>(mut self, secs: u64, clock: &C) -> Self {
        let now = clock.now();
        self.exp = Some(UnixTime(now.0 + secs));
        self
    }

    /// Sets the `nbf` claim
    pub fn with_not_before(mut self, time: UnixTime) -> Self {
        self.nbf = Some(time);
        self
    }

    /// Sets the `iat` claim
    pub fn with_issued_at(mut self, time: UnixTime) -> Self {
        self.iat = Some(time);
        self
    }

    /// Sets the `jti` claim
    pub fn with_token_id(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    /// Adds a private claim
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// The `aud` claim
    pub fn aud(&self) -> &Audiences {
        &self.aud
    }

    /// The `iss` claim
    #[must_use]
    pub fn iss(&self) -> Option<&IssuerRef> {
        self.iss.as_deref()
    }

    /// The `sub` claim
    #[must_use]
    pub fn sub(&self) -> Option<&SubjectRef> {
        self.sub.as_deref()
    }

    /// The `exp` claim
    #[must_use]
    pub fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    /// The `nbf` claim
    #[must_use]
    pub fn nbf(&self) -> Option<UnixTime> {
        self.nbf
    }

    /// The `iat` claim
    #[must_use]
    pub fn iat(&self) -> Option<UnixTime> {
        self.iat
    }

    /// The `jti` claim
    #[must_use]
    pub fn jti(&self) -> Option<&str> {
        self.jti.as_deref()
    }

    /// A private claim, deserialized into a typed value
    #[must_use]
    pub fn claim<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.extra
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[derive(Clone)]
enum SubjectCheck {
    Exact(Subject),
    Pattern(Regex),
}

impl SubjectCheck {
    fn matches(&self, sub: &SubjectRef) -> bool {
        match self {
            Self::Exact(expected) => sub == AsRef::<SubjectRef>::as_ref(expected),
            Self::Pattern(pattern) => pattern.is_match(sub.as_str()),
        }
    }
}

impl std::fmt::Debug for SubjectCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Exact(expected) => f.debug_tuple("Exact").field(expected).finish(),
            Self::Pattern(pattern) => f.debug_tuple("Pattern").field(&pattern.as_str()).finish(),
        }
    }
}

/// A core validator for JWT claims
///
/// The default validator requires an unexpired token (no grace period) and
/// checks nothing else.
#[derive(Clone, Debug)]
#[must_use]
pub struct CoreValidator {
    leeway: Duration,
    validate_exp: bool,
    validate_nbf: bool,
    max_age: Option<Duration>,
    allowed_audiences: Vec<Audience>,
    issuer: Option<Issuer>,
    subject: Option<SubjectCheck>,
    require_token_id: bool,
}

impl Default for CoreValidator {
    #[inline]
    fn default() -> Self {
        Self {
            leeway: Duration::default(),
            validate_exp: true,
            validate_nbf: false,
            max_age: None,
            allowed_audiences: Vec::new(),
            issuer: None,
            subject: None,
            require_token_id: false,
        }
    }
}

impl CoreValidator {
    /// Allows a grace period for token validation
    ///
    /// Applies on either side of the "not before" and "expires" claims.
    #[inline]
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// Allows a grace period (in seconds) for token validation
    #[inline]
    pub fn with_leeway_secs(self, leeway: u64) -> Self {
        Self {
            leeway: Duration::from_secs(leeway),
            ..self
        }
    }

    /// Enforces expiration checks
    #[inline]
    pub fn check_expiration(self) -> Self {
        Self {
            validate_exp: true,
            ..self
        }
    }

    /// Skips expiration checks
    #[inline]
    pub fn ignore_expiration(self) -> Self {
        Self {
            validate_exp: false,
            ..self
        }
    }

    /// Enforces "not valid before" checks
    #[inline]
    pub fn check_not_before(self) -> Self {
        Self {
            validate_nbf: true,
            ..self
        }
    }

    /// Skips "not valid before" checks
    #[inline]
    pub fn ignore_not_before(self) -> Self {
        Self {
            validate_nbf: false,
            ..self
        }
    }

    /// Requires an `iat` claim no older than the given age
    #[inline]
    pub fn with_max_token_age(self, max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            ..self
        }
    }

    /// Adds a single audience to the set of allowed audiences
    #[inline]
    pub fn add_allowed_audience(self, audience: Audience) -> Self {
        let mut this = self;
        this.allowed_audiences.push(audience);
        this
    }

    /// Adds multiple audiences to the set of allowed audiences
    #[inline]
    pub fn extend_allowed_audiences<I: IntoIterator<Item = Audience>>(self, auds: I) -> Self {
        let mut this = self;
        this.allowed_audiences.extend(auds);
        this
    }

    /// Requires that tokens specify a particular issuer
    #[inline]
    pub fn require_issuer(self, issuer: Issuer) -> Self {
        Self {
            issuer: Some(issuer),
            ..self
        }
    }

    /// Requires that the `sub` claim exists and exactly matches
    #[inline]
    pub fn require_subject(self, subject: Subject) -> Self {
        Self {
            subject: Some(SubjectCheck::Exact(subject)),
            ..self
        }
    }

    /// Requires that the `sub` claim exists and matches a particular
    /// regular expression
    #[inline]
    pub fn check_subject(self, sub_regex: Regex) -> Self {
        Self {
            subject: Some(SubjectCheck::Pattern(sub_regex)),
            ..self
        }
    }

    /// Requires that the `jti` claim is present
    ///
    /// Uniqueness tracking is the caller's concern.
    #[inline]
    pub fn require_token_id(self) -> Self {
        Self {
            require_token_id: true,
            ..self
        }
    }

    /// Validates a claims set against the system clock
    ///
    /// # Errors
    ///
    /// Returns an error naming the first violated claim.
    pub fn validate(&self, claims: &Claims) -> Result<(), ClaimsRejected> {
        self.validate_with_clock(claims, &System)
    }

    /// Validates a claims set against the given clock
    ///
    /// # Errors
    ///
    /// Returns an error naming the first violated claim.
    pub fn validate_with_clock<C: Clock>(
        &self,
        claims: &Claims,
        clock: &C,
    ) -> Result<(), ClaimsRejected> {
        let now = clock.now();
        let leeway = self.leeway.as_secs();

        if self.validate_exp {
            let Some(exp) = claims.exp() else {
                return Err(ClaimsRejected::MissingRequiredClaim("exp"));
            };
            if exp.0 < now.0.saturating_sub(leeway) {
                return Err(ClaimsRejected::TokenExpired);
            }
        }

        if self.validate_nbf {
            let Some(nbf) = claims.nbf() else {
                return Err(ClaimsRejected::MissingRequiredClaim("nbf"));
            };
            if nbf.0 > now.0.saturating_add(leeway) {
                return Err(ClaimsRejected::TokenNotYetValid);
            }
        }

        if let Some(max_age) = self.max_age {
            let Some(iat) = claims.iat() else {
                return Err(ClaimsRejected::MissingRequiredClaim("iat"));
            };
            let age = now.0.saturating_sub(iat.0);
            if age > max_age.as_secs().saturating_add(leeway) {
                return Err(ClaimsRejected::TokenTooOld);
            }
        }

        if !self.allowed_audiences.is_empty() {
            if claims.aud().is_empty() {
                return Err(ClaimsRejected::MissingRequiredClaim("aud"));
            }

            let found = claims
                .aud()
                .iter()
                .any(|a| self.allowed_audiences.iter().any(|e| a == e));
            if !found {
                return Err(ClaimsRejected::InvalidAudience);
            }
        }

        if let Some(allowed_iss) = &self.issuer {
            let Some(iss) = claims.iss() else {
                return Err(ClaimsRejected::MissingRequiredClaim("iss"));
            };
            if iss != allowed_iss {
                return Err(ClaimsRejected::InvalidIssuer);
            }
        }

        if let Some(check) = &self.subject {
            let Some(sub) = claims.sub() else {
                return Err(ClaimsRejected::MissingRequiredClaim("sub"));
            };
            if !check.matches(sub) {
                return Err(ClaimsRejected::InvalidSubject);
            }
        }

        if self.require_token_id && claims.jti().is_none() {
            return Err(ClaimsRejected::MissingRequiredClaim("jti"));
        }

        Ok(())
    }
}

/// The validated claims of a JWT
///
/// This type can only be produced by this crate, asserting that the
/// signature has been verified and the claims validated.
#[derive(Debug, Clone)]
#[must_use]
pub struct Validated {
    protected: Header,
    header: Header,
    claims: Claims,
}

impl Validated {
    /// The validated token claims
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// The integrity-protected header
    pub fn protected(&self) -> &Header {
        &self.protected
    }

    /// The merged view of all header sections
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Unwraps the claims
    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

/// Signs a claims set into a compact JWT
///
/// # Errors
///
/// Returns an error if the claims cannot be serialized or the signature
/// cannot be produced.
pub fn sign(
    claims: &Claims,
    request: &jws::SignatureRequest<'_>,
) -> Result<String, JwtError> {
    let payload = serde_json::to_vec(claims).map_err(error::malformed_payload)?;
    Ok(jws::sign_compact(&payload, request)?)
}

/// Verifies a compact JWT and validates its claims
///
/// Claims validation runs strictly after signature verification succeeds.
///
/// # Errors
///
/// Returns an error if signature verification fails, the claims are not
/// valid JSON, or a claim check fails.
pub fn verify(
    token: &str,
    resolver: &dyn KeyResolver,
    options: &jws::VerificationOptions,
    validator: &CoreValidator,
) -> Result<Validated, JwtError> {
    verify_with_clock(token, resolver, options, validator, &System)
}

/// Verifies a compact JWT, evaluating time-based claims against the given
/// clock
///
/// # Errors
///
/// Returns an error if signature verification fails, the claims are not
/// valid JSON, or a claim check fails.
pub fn verify_with_clock<C: Clock>(
    token: &str,
    resolver: &dyn KeyResolver,
    options: &jws::VerificationOptions,
    validator: &CoreValidator,
    clock: &C,
) -> Result<Validated, JwtError> {
    let verified = jws::verify_compact(token, resolver, options)?;

    let claims: Claims =
        serde_json::from_slice(verified.payload()).map_err(error::malformed_payload)?;
    validator.validate_with_clock(&claims, clock)?;

    Ok(Validated {
        protected: verified.protected().clone(),
        header: verified.header().clone(),
        claims,
    })
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;
    use crate::{clock::TestClock, jwa::Oct, Jwk};

    #[test]
    fn deserializes_single_and_many_audiences() -> Result<()> {
        let single: Claims = serde_json::from_str(r#"{"aud":"one"}"#)?;
        assert_eq!(single.aud().iter().count(), 1);

        let many: Claims = serde_json::from_str(r#"{"aud":["one","two"]}"#)?;
        assert_eq!(many.aud().iter().count(), 2);

        let round_trip = serde_json::to_string(&single)?;
        assert_eq!(round_trip, r#"{"aud":"one"}"#);
        Ok(())
    }

    #[test]
    fn expiration_with_leeway() {
        let claims = Claims::new().with_expiration(UnixTime(5));
        let clock = TestClock::new(UnixTime(7));

        let strict = CoreValidator::default();
        assert!(matches!(
            strict.validate_with_clock(&claims, &clock),
            Err(ClaimsRejected::TokenExpired)
        ));

        let lenient = CoreValidator::default().with_leeway_secs(2);
        lenient.validate_with_clock(&claims, &clock).unwrap();
    }

    #[test]
    fn missing_exp_is_required_by_default() {
        let claims = Claims::new();
        let clock = TestClock::new(UnixTime(0));
        assert!(matches!(
            CoreValidator::default().validate_with_clock(&claims, &clock),
            Err(ClaimsRejected::MissingRequiredClaim("exp"))
        ));

        CoreValidator::default()
            .ignore_expiration()
            .validate_with_clock(&claims, &clock)
            .unwrap();
    }

    #[test]
    fn not_before_is_honored() {
        let claims = Claims::new().with_not_before(UnixTime(100));
        let clock = TestClock::new(UnixTime(50));

        let validator = CoreValidator::default()
            .ignore_expiration()
            .check_not_before();
        assert!(matches!(
            validator.validate_with_clock(&claims, &clock),
            Err(ClaimsRejected::TokenNotYetValid)
        ));

        let clock = TestClock::new(UnixTime(100));
        validator.validate_with_clock(&claims, &clock).unwrap();
    }

    #[test]
    fn max_age_checks_issued_at() {
        let validator = CoreValidator::default()
            .ignore_expiration()
            .with_max_token_age(Duration::from_secs(50));

        let claims = Claims::new().with_issued_at(UnixTime(0));
        let clock = TestClock::new(UnixTime(100));
        assert!(matches!(
            validator.validate_with_clock(&claims, &clock),
            Err(ClaimsRejected::TokenTooOld)
        ));

        let clock = TestClock::new(UnixTime(40));
        validator.validate_with_clock(&claims, &clock).unwrap();

        let missing = Claims::new();
        let clock = TestClock::new(UnixTime(0));
        assert!(matches!(
            validator.validate_with_clock(&missing, &clock),
            Err(ClaimsRejected::MissingRequiredClaim("iat"))
        ));
    }

    #[test]
    fn audience_membership() {
        let validator = CoreValidator::default()
            .ignore_expiration()
            .extend_allowed_audiences(vec![
                Audience::from_static("first"),
                Audience::from_static("second"),
            ]);
        let clock = TestClock::new(UnixTime(0));

        let claims = Claims::new().with_audience("second");
        validator.validate_with_clock(&claims, &clock).unwrap();

        let claims = Claims::new().with_audience("third");
        assert!(matches!(
            validator.validate_with_clock(&claims, &clock),
            Err(ClaimsRejected::InvalidAudience)
        ));
    }

    #[test]
    fn issuer_must_match() {
        let validator = CoreValidator::default()
            .ignore_expiration()
            .require_issuer(Issuer::from_static("expected"));
        let clock = TestClock::new(UnixTime(0));

        let claims = Claims::new().with_issuer("expected");
        validator.validate_with_clock(&claims, &clock).unwrap();

        let claims = Claims::new().with_issuer("impostor");
        assert!(matches!(
            validator.validate_with_clock(&claims, &clock),
            Err(ClaimsRejected::InvalidIssuer)
        ));
    }

    #[test]
    fn subject_by_pattern_or_exact() {
        let clock = TestClock::new(UnixTime(0));
        let claims = Claims::new().with_subject("user-42");

        let by_pattern = CoreValidator::default()
            .ignore_expiration()
            .check_subject(Regex::new("^user-[0-9]+$").unwrap());
        by_pattern.validate_with_clock(&claims, &clock).unwrap();

        let exact = CoreValidator::default()
            .ignore_expiration()
            .require_subject(Subject::from_static("user-43"));
        assert!(matches!(
            exact.validate_with_clock(&claims, &clock),
            Err(ClaimsRejected::InvalidSubject)
        ));
    }

    #[test]
    fn token_id_presence() {
        let clock = TestClock::new(UnixTime(0));
        let validator = CoreValidator::default()
            .ignore_expiration()
            .require_token_id();

        let claims = Claims::new().with_token_id("nonce-1");
        validator.validate_with_clock(&claims, &clock).unwrap();

        assert!(matches!(
            validator.validate_with_clock(&Claims::new(), &clock),
            Err(ClaimsRejected::MissingRequiredClaim("jti"))
        ));
    }

    #[test]
    fn sign_verify_round_trip() -> Result<()> {
        let key = Jwk::from(Oct::generate(32)?);
        let claims = Claims::new()
            .with_issuer("authority")
            .with_expiration(UnixTime(1000))
            .with_claim("scope", "read write");

        let token = jwt_sign(&claims, &key)?;

        let validator = CoreValidator::default()
            .require_issuer(Issuer::from_static("authority"));
        let clock = TestClock::new(UnixTime(500));

        let validated = verify_with_clock(
            &token,
            &key,
            &jws::VerificationOptions::new().allow_algorithm(jws::Algorithm::HS256),
            &validator,
            &clock,
        )?;
        assert_eq!(validated.claims(), &claims);
        assert_eq!(
            validated.claims().claim::<String>("scope").as_deref(),
            Some("read write")
        );
        Ok(())
    }

    #[test]
    fn expired_token_rejected_after_verification() -> Result<()> {
        let key = Jwk::from(Oct::generate(32)?);
        let claims = Claims::new().with_expiration(UnixTime(100));
        let token = jwt_sign(&claims, &key)?;

        let clock = TestClock::new(UnixTime(200));
        let result = verify_with_clock(
            &token,
            &key,
            &jws::VerificationOptions::new().allow_algorithm(jws::Algorithm::HS256),
            &CoreValidator::default(),
            &clock,
        );
        assert!(matches!(
            result,
            Err(JwtError::ClaimsRejected(ClaimsRejected::TokenExpired))
        ));
        Ok(())
    }

    #[test]
    fn tampered_token_never_reaches_claims_validation() -> Result<()> {
        let key = Jwk::from(Oct::generate(32)?);
        let claims = Claims::new().with_expiration(UnixTime(100));
        let mut token = jwt_sign(&claims, &key)?;
        token.pop();
        token.push('A');

        let clock = TestClock::new(UnixTime(0));
        let result = verify_with_clock(
            &token,
            &key,
            &jws::VerificationOptions::new().allow_algorithm(jws::Algorithm::HS256),
            &CoreValidator::default(),
            &clock,
        );
        assert!(matches!(result, Err(JwtError::Jws(_))));
        Ok(())
    }

    fn jwt_sign(claims: &Claims, key: &Jwk) -> Result<String, JwtError> {
        sign(
            claims,
            &jws::SignatureRequest::new(key, jws::Algorithm::HS256),
        )
    }
}
