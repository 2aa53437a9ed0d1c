//! JSON Web Key Sets (JWKS)
//!
//! A key set holds the published keys of an issuer and picks the best
//! match for a token, scoring candidates on key ID, bound algorithm, and
//! declared usage. See [RFC7517, section 5][RFC7517 5].
//!
//! [RFC7517 5]: https://tools.ietf.org/html/rfc7517#section-5

use serde::{Deserialize, Serialize};

use crate::{
    error,
    jwk::{self, KeyAlgorithm},
    resolve::{KeyResolver, ResolutionContext},
    Jwk,
};

/// A JSON Web Key Set (JWKS)
///
/// Keys that cannot be understood (an unknown `kty` or an unsupported
/// `alg`) are dropped during deserialization rather than failing the
/// whole set, since published sets routinely carry keys for algorithms a
/// given consumer does not implement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    #[serde(deserialize_with = "deserialize_keys")]
    keys: Vec<Jwk>,
}

impl Jwks {
    /// Adds a key to the set
    pub fn add_key(&mut self, key: Jwk) {
        self.keys.push(key);
    }

    /// A view of the keys in this set
    #[must_use]
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    /// Gets the best key based on the algorithm requested
    #[must_use]
    pub fn get_key<A: Into<KeyAlgorithm>>(&self, alg: A) -> Option<&Jwk> {
        get_key_impl(self.keys(), alg.into())
    }

    /// Gets the best key based on the key id and algorithm requested
    #[must_use]
    pub fn get_key_by_id<A: Into<KeyAlgorithm>>(
        &self,
        kid: &'_ jwk::KeyIdRef,
        alg: A,
    ) -> Option<&Jwk> {
        get_key_by_id_impl(self.keys(), kid, alg.into())
    }

    /// Gets the best key based on the key id (if provided) and algorithm requested
    #[must_use]
    pub fn get_key_by_opt<A: Into<KeyAlgorithm>>(
        &self,
        kid: Option<&'_ jwk::KeyIdRef>,
        alg: A,
    ) -> Option<&Jwk> {
        match kid {
            Some(kid) => get_key_by_id_impl(self.keys(), kid, alg.into()),
            None => get_key_impl(self.keys(), alg.into()),
        }
    }
}

/// Resolves against the set using the token's `kid` and `alg` members
impl KeyResolver for Jwks {
    fn resolve(&self, ctx: &ResolutionContext<'_>) -> Result<Jwk, error::KeyNotResolved> {
        let alg: KeyAlgorithm = ctx
            .header()
            .alg()
            .map_err(|_| error::key_not_resolved())?
            .parse()
            .map_err(|_| error::key_not_resolved())?;

        let kid = ctx.header().kid().map(jwk::KeyIdRef::from_str);

        self.get_key_by_opt(kid, alg)
            .cloned()
            .ok_or_else(error::key_not_resolved)
    }
}

fn get_key_impl(keys: &[Jwk], alg: KeyAlgorithm) -> Option<&Jwk> {
    let alg_usage = alg.to_usage();

    let best = keys.iter().fold(None, move |best, k| {
        let mut score = 0;

        if !k.is_compatible(alg) {
            return best;
        }

        if let Some(algorithm) = k.algorithm() {
            if algorithm == alg {
                score += 2;
            } else {
                return best;
            }
        }

        if let Some(key_usage) = k.usage() {
            if key_usage == alg_usage {
                score += 1;
            } else {
                return best;
            }
        }

        match best {
            Some((_, best_score)) if best_score < score => Some((k, score)),
            None => Some((k, score)),
            _ => best,
        }
    });

    best.map(|(b, _)| b)
}

fn get_key_by_id_impl<'a>(
    keys: &'a [Jwk],
    kid: &'_ jwk::KeyIdRef,
    alg: KeyAlgorithm,
) -> Option<&'a Jwk> {
    let alg_usage = alg.to_usage();

    let best = keys.iter().fold(None, move |best, k| {
        let mut score = 0;

        if !k.is_compatible(alg) {
            return best;
        }

        if let Some(key_id) = k.key_id() {
            if key_id == kid {
                score += 4;
            } else {
                return best;
            }
        }

        if let Some(algorithm) = k.algorithm() {
            if algorithm == alg {
                score += 2;
            } else {
                return best;
            }
        }

        if let Some(key_usage) = k.usage() {
            if key_usage == alg_usage {
                score += 1;
            } else {
                return best;
            }
        }

        match best {
            Some((_, best_score)) if best_score < score => Some((k, score)),
            None => Some((k, score)),
            _ => best,
        }
    });

    best.map(|(b, _)| b)
}

fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<Jwk>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct MaybeJwksVisitor;

    impl<'de> serde::de::Visitor<'de> for MaybeJwksVisitor {
        type Value = Vec<Jwk>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a list of JWK objects")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            let mut values = Vec::with_capacity(seq.size_hint().unwrap_or_default());
            let mut index = 0_usize;

            while let Some(value) = seq.next_element()? {
                match value {
                    MaybeJwk::Jwk(jwk) => values.push(jwk),
                    MaybeJwk::Unknown(key) => {
                        tracing::warn!(
                            jwks.idx = index,
                            jwk.kid = ?key.kid,
                            "jwk.use" = ?key.r#use,
                            jwk.alg = ?key.alg,
                            "ignoring unknown JWK"
                        );
                    }
                }
                index += 1;
            }

            Ok(values)
        }
    }

    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum MaybeJwk {
        Jwk(Jwk),
        Unknown(JwkLike),
    }

    #[allow(dead_code)]
    #[derive(serde::Deserialize)]
    struct JwkLike {
        #[serde(default)]
        kid: Option<jwk::KeyId>,
        #[serde(rename = "use", default)]
        r#use: Option<String>,
        #[serde(default)]
        alg: Option<String>,
    }

    deserializer.deserialize_seq(MaybeJwksVisitor)
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;
    use crate::{
        header::Header,
        jwa::{self, KeyManagement, Usage},
        jws,
    };

    const JWKS_WITH_UNKNOWN_ALG: &str = r#"
        {
            "keys": [
                {
                    "kid": "1",
                    "use": "enc",
                    "alg": "RSA-OAEP-384"
                }
            ]
        }
    "#;

    const JWKS_WITH_NO_KTY: &str = r#"
        {
            "keys": [
                {
                    "kid": "1",
                    "use": "enc"
                }
            ]
        }
    "#;

    const JWKS_WITH_NOTHING: &str = r#"
        {
            "keys": [
                {}
            ]
        }
    "#;

    #[test]
    fn deserializes_jwks_with_unknown_alg() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(JWKS_WITH_UNKNOWN_ALG)?;
        assert!(jwks.keys.is_empty());
        Ok(())
    }

    #[test]
    fn deserializes_jwks_with_no_kty() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(JWKS_WITH_NO_KTY)?;
        assert!(jwks.keys.is_empty());
        Ok(())
    }

    #[test]
    fn deserializes_jwks_with_nothing() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(JWKS_WITH_NOTHING)?;
        assert!(jwks.keys.is_empty());
        Ok(())
    }

    #[test]
    fn serializable_round_trip() -> Result<()> {
        let mut jwks = Jwks::default();
        jwks.add_key(
            Jwk::from(jwa::Oct::generate(64)?)
                .with_key_id("hmac".into())
                .with_algorithm(jws::Algorithm::HS512),
        );

        let serialized = serde_json::to_string(&jwks)?;
        let round_trip: Jwks = serde_json::from_str(&serialized)?;
        assert_eq!(round_trip, jwks);
        Ok(())
    }

    fn mixed_set() -> Result<Jwks> {
        let mut jwks = Jwks::default();
        jwks.add_key(
            Jwk::from(jwa::Oct::generate(32)?)
                .with_key_id("sig-1".into())
                .with_algorithm(jws::Algorithm::HS256),
        );
        jwks.add_key(
            Jwk::from(jwa::EllipticCurve::generate(jwa::ec::Curve::P256)?)
                .with_key_id("sig-2".into())
                .with_algorithm(jws::Algorithm::ES256),
        );
        jwks.add_key(
            Jwk::from(jwa::Oct::generate(32)?)
                .with_key_id("enc-1".into())
                .with_usage(Usage::Encryption),
        );
        Ok(jwks)
    }

    #[test]
    fn prefers_exact_kid_match() -> Result<()> {
        let jwks = mixed_set()?;
        let key = jwks
            .get_key_by_id(jwk::KeyIdRef::from_str("sig-2"), jws::Algorithm::ES256)
            .expect("key should resolve");
        assert_eq!(key.key_id().map(jwk::KeyIdRef::as_str), Some("sig-2"));
        Ok(())
    }

    #[test]
    fn algorithm_filters_candidates() -> Result<()> {
        let jwks = mixed_set()?;
        assert!(jwks.get_key(jws::Algorithm::HS256).is_some());
        assert!(jwks.get_key(jws::Algorithm::RS256).is_none());
        Ok(())
    }

    #[test]
    fn usage_excludes_encryption_keys_from_signing() -> Result<()> {
        let jwks = mixed_set()?;
        let key = jwks
            .get_key(jws::Algorithm::HS256)
            .expect("key should resolve");
        assert_eq!(key.key_id().map(jwk::KeyIdRef::as_str), Some("sig-1"));

        let key = jwks
            .get_key(KeyManagement::Direct)
            .expect("key should resolve");
        assert_eq!(key.key_id().map(jwk::KeyIdRef::as_str), Some("enc-1"));
        Ok(())
    }

    #[test]
    fn resolves_from_token_header() -> Result<()> {
        let jwks = mixed_set()?;
        let header = Header::new()
            .with_param("alg", "ES256")
            .with_param("kid", "sig-2");
        let ctx = ResolutionContext::new(&header, None);
        let key = jwks.resolve(&ctx)?;
        assert_eq!(key.key_id().map(jwk::KeyIdRef::as_str), Some("sig-2"));

        let header = Header::new()
            .with_param("alg", "ES256")
            .with_param("kid", "missing");
        let ctx = ResolutionContext::new(&header, None);
        assert!(jwks.resolve(&ctx).is_err());
        Ok(())
    }
}
