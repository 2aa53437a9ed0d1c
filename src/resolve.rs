//! Dynamic key resolution
//!
//! Consumers rarely hold a single fixed key: the right key depends on the
//! token being processed. A [`KeyResolver`] is consulted after the header
//! has been parsed and validated but before any cryptographic work, and
//! may pick a key by `kid`, by algorithm, or by inspecting the payload
//! bytes (which are unverified at that point).

use crate::{error, header::Header, jwk::Jwk};

/// What a resolver gets to see when picking a key
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct ResolutionContext<'a> {
    header: &'a Header,
    payload: Option<&'a [u8]>,
}

impl<'a> ResolutionContext<'a> {
    pub(crate) fn new(header: &'a Header, payload: Option<&'a [u8]>) -> Self {
        Self { header, payload }
    }

    /// The merged header view of the token
    pub fn header(&self) -> &'a Header {
        self.header
    }

    /// The token's payload bytes, when already available
    ///
    /// For a JWS this is present but NOT yet verified; never trust it to
    /// decide anything other than which key to try. For a JWE it is absent,
    /// since the payload cannot exist before decryption.
    #[must_use]
    pub fn payload(&self) -> Option<&'a [u8]> {
        self.payload
    }
}

/// Picks the key for a token being consumed
pub trait KeyResolver {
    /// Resolves the key to use for the given token context
    ///
    /// # Errors
    ///
    /// Returns an error when no held key satisfies the context.
    fn resolve(&self, ctx: &ResolutionContext<'_>) -> Result<Jwk, error::KeyNotResolved>;
}

/// A single key answers every resolution request
impl KeyResolver for Jwk {
    fn resolve(&self, _ctx: &ResolutionContext<'_>) -> Result<Jwk, error::KeyNotResolved> {
        Ok(self.clone())
    }
}

impl<F> KeyResolver for F
where
    F: Fn(&ResolutionContext<'_>) -> Result<Jwk, error::KeyNotResolved>,
{
    fn resolve(&self, ctx: &ResolutionContext<'_>) -> Result<Jwk, error::KeyNotResolved> {
        self(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error, jwa::Oct};

    #[test]
    fn closures_resolve_by_kid() {
        let key = Jwk::from(Oct::generate(32).unwrap()).with_key_id("kid-1".into());
        let resolver = |ctx: &ResolutionContext<'_>| {
            if ctx.header().kid() == Some("kid-1") {
                Ok(key.clone())
            } else {
                Err(error::key_not_resolved())
            }
        };

        let matching = Header::new().with_param("kid", "kid-1");
        let ctx = ResolutionContext::new(&matching, None);
        assert!(resolver.resolve(&ctx).is_ok());

        let other = Header::new().with_param("kid", "kid-2");
        let ctx = ResolutionContext::new(&other, None);
        assert!(resolver.resolve(&ctx).is_err());
    }
}
