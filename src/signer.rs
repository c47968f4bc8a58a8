//! RS256 signing.

use jsonwebtoken as jwt;
use tracing::debug;

use crate::claims::{ClaimSet, REQUIRED_CLAIMS};
use crate::error::RequestObjectError;
use crate::key::{Key, KeyStore};

/// Signs a request object with RS256, producing a compact JWT whose header is
/// `{"typ": "JWT", "alg": "RS256", "kid": <key id>}`.
///
/// The key must be a private RSA key and every required claim must be present and non-null.
/// RSASSA-PKCS1-v1_5 is deterministic, so the same key and claims always yield the same token.
pub fn sign(key: &Key, claims: &ClaimSet) -> Result<String, RequestObjectError> {
    if let Some(missing) = REQUIRED_CLAIMS
        .iter()
        .find(|name| claims.get(**name).map_or(true, |value| value.is_null()))
    {
        return Err(RequestObjectError::MissingClaim((*missing).to_owned()));
    }

    let encoding_key = key.encoding_key()?;
    let mut header = jwt::Header::new(jwt::Algorithm::RS256);
    header.kid = key.kid().map(str::to_owned);
    debug!(?header, "signing request object");

    jwt::encode(&header, claims, &encoding_key).map_err(|e| RequestObjectError::KeyMaterial {
        kid: key.kid().unwrap_or_default().to_owned(),
        reason: e.to_string(),
    })
}

/// Looks up `kid` in `store` and signs with it.
pub fn sign_with_store(
    store: &KeyStore,
    kid: &str,
    claims: &ClaimSet,
) -> Result<String, RequestObjectError> {
    sign(store.require_key(kid)?, claims)
}
