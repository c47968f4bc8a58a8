//! RS256 verification.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken as jwt;
use serde::Deserialize;
use tracing::debug;

use crate::claims::ClaimSet;
use crate::error::RequestObjectError;
use crate::key::{Key, KeyStore};

const SUPPORTED_ALGORITHM: &str = "RS256";

/// Resolves the key a token must be verified with.
pub trait KeyResolver {
    /// `kid` is the key id from the token header, if it has one.
    fn resolve(&self, kid: Option<&str>) -> Result<&Key, RequestObjectError>;
}

impl KeyResolver for Key {
    fn resolve(&self, kid: Option<&str>) -> Result<&Key, RequestObjectError> {
        match (kid, self.kid()) {
            (Some(token), Some(key)) if token != key => Err(RequestObjectError::KidMismatch {
                token: Some(token.to_owned()),
                key: Some(key.to_owned()),
            }),
            _ => Ok(self),
        }
    }
}

impl KeyResolver for KeyStore {
    fn resolve(&self, kid: Option<&str>) -> Result<&Key, RequestObjectError> {
        self.require_key(kid.unwrap_or_default())
    }
}

/// Only `alg` and `kid` are read from the header, and only to select the algorithm and key.
#[derive(Debug, Deserialize)]
struct UntrustedHeader {
    alg: Option<String>,
    kid: Option<String>,
}

fn decode_segment(name: &str, segment: &str) -> Result<Vec<u8>, RequestObjectError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| RequestObjectError::MalformedToken(format!("{name} segment: {e}")))
}

/// Verifies an RS256 request object and returns its claims.
///
/// The header must declare `"alg": "RS256"`; anything else, including `none` or no `alg` at all,
/// is rejected before the signature is looked at. The verifying key is chosen by `keys`, from the
/// header `kid` when a [KeyStore] is given.
///
/// ```rust
/// use mc_request_object::{sign, verify, ClaimAssembler, Key, KeyStore, REQUEST_OBJECT_KEYS};
///
/// let key = Key::generate_rsa("developer-app", 2048).unwrap();
/// let claims = ClaimAssembler::new()
///     .assemble(&Default::default(), &REQUEST_OBJECT_KEYS)
///     .unwrap();
///
/// let token = sign(&key, &claims).unwrap();
/// let public_keys = KeyStore::from(key.to_public());
///
/// assert_eq!(verify(&public_keys, &token), Ok(claims));
/// ```
pub fn verify<K>(keys: &K, token: &str) -> Result<ClaimSet, RequestObjectError>
where
    K: KeyResolver + ?Sized,
{
    let segments: Vec<&str> = token.split('.').collect();
    let [header, payload, signature] = segments[..] else {
        return Err(RequestObjectError::MalformedToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let header = serde_json::from_slice::<UntrustedHeader>(&decode_segment("header", header)?)
        .map_err(|e| RequestObjectError::MalformedToken(format!("header segment: {e}")))?;
    serde_json::from_slice::<ClaimSet>(&decode_segment("payload", payload)?)
        .map_err(|e| RequestObjectError::MalformedToken(format!("payload segment: {e}")))?;
    decode_segment("signature", signature)?;

    match header.alg.as_deref() {
        Some(SUPPORTED_ALGORITHM) => {}
        Some(alg) => return Err(RequestObjectError::UnsupportedAlgorithm(alg.to_owned())),
        None => {
            return Err(RequestObjectError::UnsupportedAlgorithm(
                "no alg in token header".to_owned(),
            ))
        }
    }

    let key = keys.resolve(header.kid.as_deref())?;
    let kid = key.kid().unwrap_or_default();
    debug!(kid, "verifying request object");

    let mut validation = jwt::Validation::new(jwt::Algorithm::RS256);
    // Request objects carry no temporal claims.
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let token = jwt::decode::<ClaimSet>(token, &key.decoding_key(), &validation).map_err(|e| {
        use jwt::errors::ErrorKind;
        match e.kind() {
            ErrorKind::InvalidSignature => RequestObjectError::InvalidSignature(kid.to_owned()),
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => RequestObjectError::MalformedToken(e.to_string()),
            _ => RequestObjectError::KeyMaterial {
                kid: kid.to_owned(),
                reason: e.to_string(),
            },
        }
    })?;

    Ok(token.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{ClaimAssembler, REQUEST_OBJECT_KEYS};
    use crate::key::tests::{developer_app_key, PUB_JWK};
    use crate::signer::sign;
    use assert_matches::assert_matches;
    use serde_json::{json, Value};

    fn default_claims() -> ClaimSet {
        ClaimAssembler::new()
            .assemble(&ClaimSet::new(), &REQUEST_OBJECT_KEYS)
            .unwrap()
    }

    fn public_store() -> KeyStore {
        KeyStore::from(developer_app_key().to_public())
    }

    fn encode_json(value: Value) -> String {
        URL_SAFE_NO_PAD.encode(value.to_string())
    }

    fn with_header(token: &str, header: Value) -> String {
        let rest = token.split_once('.').unwrap().1;
        format!("{}.{}", encode_json(header), rest)
    }

    #[test]
    fn round_trip_through_public_store() {
        let claims = default_claims();
        let token = sign(developer_app_key(), &claims).unwrap();

        let decoded = verify(&public_store(), &token).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(
            decoded["claims"]["premiuminfo"]["address"]["value"],
            "123 Fake Street"
        );
    }

    #[test]
    fn round_trip_through_single_key() {
        let claims = default_claims();
        let token = sign(developer_app_key(), &claims).unwrap();
        assert_eq!(verify(&developer_app_key().to_public(), &token), Ok(claims));
    }

    #[test]
    fn round_trip_through_imported_public_keyset() {
        let mut store = KeyStore::new();
        store.import_keyset(&public_store().export_keyset()).unwrap();

        let claims = default_claims();
        let token = sign(developer_app_key(), &claims).unwrap();
        assert_eq!(verify(&store, &token), Ok(claims));
    }

    #[test]
    fn reject_flipped_signature_bits() {
        let token = sign(developer_app_key(), &default_claims()).unwrap();
        let (signing_input, signature) = token.rsplit_once('.').unwrap();
        let signature = URL_SAFE_NO_PAD.decode(signature).unwrap();

        for bit in [0, 7, 8 * 128 + 3, signature.len() * 8 - 1] {
            let mut tampered = signature.clone();
            tampered[bit / 8] ^= 1 << (bit % 8);
            let tampered = format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(&tampered));

            let res = verify(&public_store(), &tampered);
            assert_eq!(
                res,
                Err(RequestObjectError::InvalidSignature("developer-app".to_owned())),
                "bit {bit} was not detected"
            );
        }
    }

    #[test]
    fn reject_altered_payload() {
        let token = sign(developer_app_key(), &default_claims()).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        let mut claims = default_claims();
        claims.insert("login_hint".to_owned(), json!("MSISDN:447700900000"));
        let forged = format!(
            "{}.{}.{}",
            segments[0],
            encode_json(Value::Object(claims)),
            segments[2]
        );

        assert_matches!(
            verify(&public_store(), &forged),
            Err(RequestObjectError::InvalidSignature(_))
        );
    }

    #[test]
    fn reject_alg_none() {
        let token = sign(developer_app_key(), &default_claims()).unwrap();
        let unsigned = with_header(
            &token,
            json!({"alg": "none", "typ": "JWT", "kid": "developer-app"}),
        );
        let (signing_input, _) = unsigned.rsplit_once('.').unwrap();
        let unsigned = format!("{signing_input}.");

        assert_eq!(
            verify(&public_store(), &unsigned),
            Err(RequestObjectError::UnsupportedAlgorithm("none".to_owned()))
        );
    }

    #[test]
    fn reject_other_or_absent_alg() {
        let token = sign(developer_app_key(), &default_claims()).unwrap();

        for alg in ["HS256", "RS512", "PS256"] {
            let confused = with_header(&token, json!({"alg": alg, "kid": "developer-app"}));
            assert_eq!(
                verify(&public_store(), &confused),
                Err(RequestObjectError::UnsupportedAlgorithm(alg.to_owned()))
            );
        }

        let absent = with_header(&token, json!({"typ": "JWT", "kid": "developer-app"}));
        assert_matches!(
            verify(&public_store(), &absent),
            Err(RequestObjectError::UnsupportedAlgorithm(_))
        );
    }

    #[test]
    fn reject_unknown_kid() {
        let token = sign(developer_app_key(), &default_claims()).unwrap();
        let unknown = with_header(
            &token,
            json!({"alg": "RS256", "typ": "JWT", "kid": "other-app"}),
        );
        assert_eq!(
            verify(&public_store(), &unknown),
            Err(RequestObjectError::UnknownKey("other-app".to_owned()))
        );

        let no_kid = with_header(&token, json!({"alg": "RS256", "typ": "JWT"}));
        assert_matches!(
            verify(&public_store(), &no_kid),
            Err(RequestObjectError::UnknownKey(_))
        );
    }

    #[test]
    fn reject_wrong_key() {
        let token = sign(developer_app_key(), &default_claims()).unwrap();
        let mut store = KeyStore::new();
        store
            .import_keyset(&format!(r#"{{"keys": [{PUB_JWK}]}}"#))
            .unwrap();

        let res = verify(store.keys().next().unwrap(), &token);
        assert_matches!(res, Err(RequestObjectError::KidMismatch { .. }));

        let retagged = with_header(
            &token,
            json!({
                "alg": "RS256",
                "typ": "JWT",
                "kid": "r50vKukJl4oVaT78O0ELIGS4w8ynMY_4lRSBq-uvTX4"
            }),
        );
        assert_matches!(
            verify(&store, &retagged),
            Err(RequestObjectError::InvalidSignature(_))
        );
    }

    #[test]
    fn reject_malformed_tokens() {
        assert_matches!(
            verify(&public_store(), "not-a-token"),
            Err(RequestObjectError::MalformedToken(_))
        );
        assert_matches!(
            verify(&public_store(), "a.b.c.d"),
            Err(RequestObjectError::MalformedToken(_))
        );
        assert_matches!(
            verify(&public_store(), "!!!.e30.e30"),
            Err(RequestObjectError::MalformedToken(_))
        );

        let token = sign(developer_app_key(), &default_claims()).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        let array_payload = format!(
            "{}.{}.{}",
            segments[0],
            encode_json(json!([1, 2])),
            segments[2]
        );
        assert_matches!(
            verify(&public_store(), &array_payload),
            Err(RequestObjectError::MalformedToken(_))
        );
        let bad_signature = format!("{}.{}.@@", segments[0], segments[1]);
        assert_matches!(
            verify(&public_store(), &bad_signature),
            Err(RequestObjectError::MalformedToken(_))
        );
    }
}
