//! JOSE header handling
//!
//! A header is an open JSON object; the engine cares about a handful of
//! registered parameter names and passes the rest through untouched.
//! Multi-section serializations carry up to three header objects, which
//! must be disjoint before use.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{b64, error};

/// Parameters that must not be listed in `crit` ([RFC7515][] section 4.1.11)
///
/// [RFC7515]: https://tools.ietf.org/html/rfc7515
const RESERVED_NAMES: &[&str] = &[
    "alg", "enc", "zip", "jku", "jwk", "kid", "x5u", "x5c", "x5t", "x5t#S256", "typ", "cty",
    "crit",
];

/// Critical extensions the engine itself understands
const BUILTIN_EXTENSIONS: &[&str] = &["b64"];

/// A failure while parsing or validating headers
#[derive(Debug, Error)]
pub enum HeaderError {
    /// A header section is not a valid JSON object or a parameter has the
    /// wrong type
    #[error(transparent)]
    Malformed(#[from] error::MalformedHeader),

    /// A parameter appeared in more than one header section
    #[error(transparent)]
    Duplicate(#[from] error::DuplicateHeaderParameter),

    /// A required parameter is absent
    #[error(transparent)]
    Missing(#[from] error::MissingHeaderParameter),

    /// A critical extension is not understood
    #[error(transparent)]
    UnsupportedCritical(#[from] error::UnsupportedCriticalExtension),
}

impl From<HeaderError> for error::JwsError {
    fn from(err: HeaderError) -> Self {
        match err {
            HeaderError::Malformed(e) => e.into(),
            HeaderError::Duplicate(e) => e.into(),
            HeaderError::Missing(e) => e.into(),
            HeaderError::UnsupportedCritical(e) => e.into(),
        }
    }
}

impl From<HeaderError> for error::JweError {
    fn from(err: HeaderError) -> Self {
        match err {
            HeaderError::Malformed(e) => e.into(),
            HeaderError::Duplicate(e) => e.into(),
            HeaderError::Missing(e) => e.into(),
            HeaderError::UnsupportedCritical(e) => e.into(),
        }
    }
}

/// A JOSE header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use]
pub struct Header {
    params: Map<String, Value>,
}

impl Header {
    /// An empty header
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a header from its base64url-encoded JSON form
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is not base64url or does not hold a
    /// JSON object.
    pub fn from_encoded(segment: &str) -> Result<Self, HeaderError> {
        let raw = b64::decode(segment).map_err(error::malformed_header)?;
        let header = serde_json::from_slice(&raw).map_err(error::malformed_header)?;
        Ok(header)
    }

    /// The header's base64url-encoded JSON form
    #[must_use]
    pub fn to_encoded(&self) -> String {
        let json = serde_json::to_vec(&self.params).expect("header maps serialize infallibly");
        b64::encode(json)
    }

    /// Adds or replaces a parameter, consuming and returning the header
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Adds or replaces a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(name.into(), value.into());
    }

    /// Removes a parameter, returning its value if present
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.params.remove(name)
    }

    /// A parameter's raw value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Whether the header has no parameters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates over the parameter names present
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    fn get_str(&self, name: &'static str) -> Result<Option<&str>, HeaderError> {
        match self.params.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(error::malformed_header(format!(
                "'{name}' parameter must be a string"
            ))
            .into()),
        }
    }

    /// The `alg` parameter
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is absent or not a string.
    pub fn alg(&self) -> Result<&str, HeaderError> {
        self.get_str("alg")?
            .ok_or_else(|| error::missing_header_parameter("alg").into())
    }

    /// The `enc` parameter
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is absent or not a string.
    pub fn enc(&self) -> Result<&str, HeaderError> {
        self.get_str("enc")?
            .ok_or_else(|| error::missing_header_parameter("enc").into())
    }

    /// The `kid` parameter, if present and a string
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.params.get("kid").and_then(Value::as_str)
    }

    /// The `b64` parameter ([RFC7797][]), defaulting to `true`
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is present but not a boolean.
    ///
    /// [RFC7797]: https://tools.ietf.org/html/rfc7797
    pub fn b64(&self) -> Result<bool, HeaderError> {
        match self.params.get("b64") {
            None => Ok(true),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => {
                Err(error::malformed_header("'b64' parameter must be a boolean").into())
            }
        }
    }

    /// The `crit` parameter as a list of names
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is present but not a non-empty
    /// array of strings.
    pub fn crit(&self) -> Result<Option<Vec<&str>>, HeaderError> {
        let malformed =
            || error::malformed_header("'crit' must be a non-empty array of strings").into();

        match self.params.get("crit") {
            None => Ok(None),
            Some(Value::Array(entries)) if !entries.is_empty() => entries
                .iter()
                .map(|v| v.as_str().ok_or_else(malformed))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(malformed()),
        }
    }

    /// Deserializes a parameter into a typed value
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is present but does not fit `T`.
    pub fn deserialize_param<T: DeserializeOwned>(
        &self,
        name: &'static str,
    ) -> Result<Option<T>, HeaderError> {
        match self.params.get(name) {
            None => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| {
                    error::malformed_header(format!("'{name}' parameter is malformed: {e}")).into()
                }),
        }
    }

    /// Requires a typed parameter to be present
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is absent or does not fit `T`.
    pub fn require_param<T: DeserializeOwned>(
        &self,
        name: &'static str,
    ) -> Result<T, HeaderError> {
        self.deserialize_param(name)?
            .ok_or_else(|| error::missing_header_parameter(name).into())
    }
}

impl FromIterator<(String, Value)> for Header {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

/// Joins header sections into one view, requiring disjoint names
///
/// # Errors
///
/// Returns an error naming the first parameter found in more than one
/// section.
pub fn merge<'a>(
    sections: impl IntoIterator<Item = &'a Header>,
) -> Result<Header, error::DuplicateHeaderParameter> {
    let mut merged = Map::new();
    for section in sections {
        for (name, value) in &section.params {
            if merged.insert(name.clone(), value.clone()).is_some() {
                return Err(error::duplicate_header_parameter(name));
            }
        }
    }
    Ok(Header { params: merged })
}

/// Enforces the `crit` rules against a merged header view
///
/// `crit` must live in the protected header, must not name reserved
/// parameters, and every listed name must be present somewhere in the
/// headers and understood by the recipient. The engine always understands
/// `b64`; callers extend the set through `understood`.
///
/// # Errors
///
/// Returns an error if any of those rules is broken.
pub fn validate_crit(
    protected: &Header,
    merged: &Header,
    understood: &[&str],
) -> Result<(), HeaderError> {
    if merged.get("crit").is_some() && protected.get("crit").is_none() {
        return Err(
            error::malformed_header("'crit' must be carried in the protected header").into(),
        );
    }

    let Some(names) = protected.crit()? else {
        return Ok(());
    };

    for name in names {
        if RESERVED_NAMES.contains(&name) {
            return Err(error::malformed_header(format!(
                "'crit' must not list the registered parameter '{name}'"
            ))
            .into());
        }

        if merged.get(name).is_none() {
            return Err(error::missing_header_parameter("crit-listed parameter").into());
        }

        if !BUILTIN_EXTENSIONS.contains(&name) && !understood.contains(&name) {
            tracing::warn!(crit = name, "rejecting token with a critical extension the recipient does not understand");
            return Err(error::unsupported_critical_extension(name).into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn encoded_round_trip() {
        let header = Header::new()
            .with_param("alg", "HS256")
            .with_param("kid", "key-1");
        let enc = header.to_encoded();
        let back = Header::from_encoded(&enc).unwrap();
        assert_eq!(back, header);
        assert_eq!(back.alg().unwrap(), "HS256");
        assert_eq!(back.kid(), Some("key-1"));
    }

    #[test]
    fn missing_alg_reported() {
        let header = Header::new().with_param("kid", "key-1");
        assert!(matches!(header.alg(), Err(HeaderError::Missing(_))));
    }

    #[test]
    fn non_string_alg_rejected() {
        let header = Header::new().with_param("alg", 12);
        assert!(matches!(header.alg(), Err(HeaderError::Malformed(_))));
    }

    #[test]
    fn b64_defaults_to_true() {
        assert!(Header::new().b64().unwrap());
        assert!(!Header::new().with_param("b64", false).b64().unwrap());
        assert!(Header::new().with_param("b64", "no").b64().is_err());
    }

    #[test]
    fn merge_requires_disjoint_sections() {
        let protected = Header::new().with_param("alg", "HS256");
        let unprotected = Header::new().with_param("kid", "key-1");
        let merged = merge([&protected, &unprotected]).unwrap();
        assert_eq!(merged.alg().unwrap(), "HS256");
        assert_eq!(merged.kid(), Some("key-1"));

        let clash = Header::new().with_param("alg", "HS512");
        assert!(merge([&protected, &clash]).is_err());
    }

    #[test]
    fn crit_must_be_protected() {
        let protected = Header::new().with_param("alg", "HS256");
        let unprotected = Header::new()
            .with_param("crit", json!(["exp"]))
            .with_param("exp", 1234);
        let merged = merge([&protected, &unprotected]).unwrap();

        assert!(validate_crit(&protected, &merged, &["exp"]).is_err());
    }

    #[test]
    fn crit_entries_must_be_understood() {
        let protected = Header::new()
            .with_param("alg", "HS256")
            .with_param("crit", json!(["exp"]))
            .with_param("exp", 1234);
        let merged = protected.clone();

        assert!(matches!(
            validate_crit(&protected, &merged, &[]),
            Err(HeaderError::UnsupportedCritical(_))
        ));
        validate_crit(&protected, &merged, &["exp"]).unwrap();
    }

    #[test]
    fn crit_never_lists_reserved_names() {
        let protected = Header::new()
            .with_param("alg", "HS256")
            .with_param("crit", json!(["alg"]));
        assert!(validate_crit(&protected, &protected, &["alg"]).is_err());
    }

    #[test]
    fn b64_is_understood_by_default() {
        let protected = Header::new()
            .with_param("alg", "HS256")
            .with_param("crit", json!(["b64"]))
            .with_param("b64", false);
        validate_crit(&protected, &protected, &[]).unwrap();
    }

    #[test]
    fn empty_crit_rejected() {
        let protected = Header::new()
            .with_param("alg", "HS256")
            .with_param("crit", json!([]));
        assert!(validate_crit(&protected, &protected, &[]).is_err());
    }

    #[test]
    fn crit_listed_parameter_must_exist() {
        let protected = Header::new()
            .with_param("alg", "HS256")
            .with_param("crit", json!(["exp"]));
        assert!(matches!(
            validate_crit(&protected, &protected, &["exp"]),
            Err(HeaderError::Missing(_))
        ));
    }
}
