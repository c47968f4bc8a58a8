//! RSA keys and JWK Sets.
//!
//! A [KeyStore] is populated once from a serialized set (`{"keys": [...]}`) and only read
//! afterwards, so a populated store can be shared freely between readers.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebkey as jwk;
use jsonwebtoken as jwt;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::RequestObjectError;

/// Modulus size used when generating new keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Modulus sizes the RS256 signer accepts.
pub const SUPPORTED_KEY_BITS: std::ops::RangeInclusive<usize> = 2048..=4096;

/// The only public exponent `jsonwebkey` can represent, 65537.
const RSA_PUBLIC_EXPONENT: &str = "AQAB";

/// Members of an RSA JWK that carry private material.
const RSA_PRIVATE_MEMBERS: [&str; 6] = ["d", "p", "q", "dp", "dq", "qi"];

/// An RSA key, as found in a JWK Set. It may hold only the public half (verify-capable) or the
/// private half as well (sign-capable).
#[derive(Debug, Clone)]
pub struct Key {
    jwk: jwk::JsonWebKey,
    members: Map<String, Value>,
}

impl Key {
    /// Builds a key from a single JWK JSON object. Only `"kty": "RSA"` is accepted.
    pub fn from_value(value: Value) -> Result<Self, RequestObjectError> {
        let Value::Object(members) = value else {
            return Err(RequestObjectError::Parse(
                "key representation is not a JSON object".to_owned(),
            ));
        };

        let kid = members
            .get("kid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        match members.get("kty").and_then(Value::as_str) {
            Some("RSA") => {}
            Some(kty) => {
                return Err(RequestObjectError::UnsupportedKey {
                    kid,
                    kty: kty.to_owned(),
                })
            }
            None => {
                return Err(RequestObjectError::Parse(format!(
                    "key `{kid}` has no `kty` member"
                )))
            }
        }

        match members.get("e").and_then(Value::as_str) {
            Some(RSA_PUBLIC_EXPONENT) | None => {}
            Some(e) => {
                return Err(RequestObjectError::Parse(format!(
                    "key `{kid}` has public exponent `{e}`, only 65537 (`{RSA_PUBLIC_EXPONENT}`) \
                     is supported"
                )))
            }
        }

        let jwk = serde_json::from_value::<jwk::JsonWebKey>(Value::Object(members.clone()))
            .map_err(|e| RequestObjectError::Parse(format!("key `{kid}`: {e}")))?;

        Ok(Key { jwk, members })
    }

    /// Generates a fresh RSA key pair with public exponent 65537. `bits` must lie within
    /// [SUPPORTED_KEY_BITS].
    pub fn generate_rsa(kid: &str, bits: usize) -> Result<Self, RequestObjectError> {
        if !SUPPORTED_KEY_BITS.contains(&bits) {
            return Err(RequestObjectError::KeyGeneration(format!(
                "{bits}-bit modulus is outside the supported {}..={} bits",
                SUPPORTED_KEY_BITS.start(),
                SUPPORTED_KEY_BITS.end()
            )));
        }
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| RequestObjectError::KeyGeneration(e.to_string()))?;

        let [p, q] = match private_key.primes() {
            [p, q] => [p, q],
            primes => {
                return Err(RequestObjectError::KeyGeneration(format!(
                    "expected two primes, got {}",
                    primes.len()
                )))
            }
        };
        let (Some(dp), Some(dq), Some(qi)) = (
            private_key.dp(),
            private_key.dq(),
            private_key.crt_coefficient(),
        ) else {
            return Err(RequestObjectError::KeyGeneration(
                "missing CRT values".to_owned(),
            ));
        };

        debug!(kid, bits, "generated RSA key");

        Key::from_value(json!({
            "kty": "RSA",
            "kid": kid,
            "n": encode_uint(private_key.n()),
            "e": encode_uint(private_key.e()),
            "d": encode_uint(private_key.d()),
            "p": encode_uint(p),
            "q": encode_uint(q),
            "dp": encode_uint(dp),
            "dq": encode_uint(dq),
            "qi": encode_uint(&qi),
        }))
    }

    /// Key identifier, if the JWK carries one.
    pub fn kid(&self) -> Option<&str> {
        self.jwk.key_id.as_deref()
    }

    /// Whether the key holds private material and can therefore sign.
    pub fn is_private(&self) -> bool {
        self.members.contains_key("d")
    }

    /// Returns a copy of this key without its private members.
    pub fn to_public(&self) -> Self {
        let members: Map<String, Value> = self
            .members
            .iter()
            .filter(|(name, _)| !RSA_PRIVATE_MEMBERS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let mut jwk = self.jwk.clone();
        if let jwk::Key::RSA { private, .. } = jwk.key.as_mut() {
            *private = None;
        }
        Key { jwk, members }
    }

    /// The JWK representation of this key.
    pub fn to_value(&self) -> Value {
        Value::Object(self.members.clone())
    }

    pub(crate) fn decoding_key(&self) -> jwt::DecodingKey {
        self.jwk.key.to_decoding_key()
    }

    /// Rebuilds the private key from its JWK components and hands it to the JWT encoder as
    /// PKCS#1 DER.
    pub(crate) fn encoding_key(&self) -> Result<jwt::EncodingKey, RequestObjectError> {
        let kid = self.kid().unwrap_or_default();
        if !self.is_private() {
            return Err(RequestObjectError::UnsupportedAlgorithm(format!(
                "RS256 signing needs private key material, key `{kid}` is public only"
            )));
        }

        let component = |name: &str| -> Result<Option<BigUint>, RequestObjectError> {
            self.members
                .get(name)
                .map(|value| {
                    decode_uint(value).ok_or_else(|| RequestObjectError::KeyMaterial {
                        kid: kid.to_owned(),
                        reason: format!("member `{name}` is not base64url"),
                    })
                })
                .transpose()
        };
        let required = |name: &str| -> Result<BigUint, RequestObjectError> {
            component(name)?.ok_or_else(|| RequestObjectError::KeyMaterial {
                kid: kid.to_owned(),
                reason: format!("member `{name}` is missing"),
            })
        };

        let primes = match (component("p")?, component("q")?) {
            (Some(p), Some(q)) => vec![p, q],
            _ => Vec::new(),
        };
        let private_key =
            RsaPrivateKey::from_components(required("n")?, required("e")?, required("d")?, primes)
                .and_then(|key| key.validate().map(|_| key))
                .map_err(|e| RequestObjectError::KeyMaterial {
                    kid: kid.to_owned(),
                    reason: e.to_string(),
                })?;
        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| RequestObjectError::KeyMaterial {
                kid: kid.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(jwt::EncodingKey::from_rsa_der(der.as_bytes()))
    }
}

fn encode_uint(value: &BigUint) -> String {
    URL_SAFE_NO_PAD.encode(value.to_bytes_be())
}

fn decode_uint(value: &Value) -> Option<BigUint> {
    let bytes = URL_SAFE_NO_PAD.decode(value.as_str()?).ok()?;
    Some(BigUint::from_bytes_be(&bytes))
}

#[derive(Deserialize)]
struct KeySetDocument {
    keys: Vec<Value>,
}

/// A set of keys addressable by kid, populated from a serialized JWK Set.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    keys: Vec<Key>,
}

impl KeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        KeyStore::default()
    }

    /// Parses `{"keys": [...]}` and adds every key to the store. Nothing is added unless the whole
    /// set is valid.
    ///
    /// Every key must be RSA with public exponent 65537 (`"e": "AQAB"`); other exponents are
    /// rejected as [RequestObjectError::Parse].
    pub fn import_keyset(&mut self, serialized: &str) -> Result<(), RequestObjectError> {
        let document = serde_json::from_str::<KeySetDocument>(serialized)
            .map_err(|e| RequestObjectError::Parse(e.to_string()))?;

        let mut imported = Vec::with_capacity(document.keys.len());
        for value in document.keys {
            let key = Key::from_value(value)?;
            if let Some(kid) = key.kid() {
                let duplicate = self
                    .keys
                    .iter()
                    .chain(imported.iter())
                    .any(|k: &Key| k.kid() == Some(kid));
                if duplicate {
                    return Err(RequestObjectError::Parse(format!("duplicate kid `{kid}`")));
                }
            }
            debug!(kid = key.kid(), private = key.is_private(), "imported key");
            imported.push(key);
        }

        self.keys.extend(imported);
        Ok(())
    }

    /// Adds a single key, rejecting a kid that is already present.
    pub fn insert(&mut self, key: Key) -> Result<(), RequestObjectError> {
        if let Some(kid) = key.kid() {
            if self.get_key(kid).is_some() {
                return Err(RequestObjectError::Parse(format!("duplicate kid `{kid}`")));
            }
        }
        self.keys.push(key);
        Ok(())
    }

    /// Looks up a key by kid.
    pub fn get_key(&self, kid: &str) -> Option<&Key> {
        self.keys.iter().find(|key| key.kid() == Some(kid))
    }

    /// Like [KeyStore::get_key], but treats an absent kid as an error.
    pub fn require_key(&self, kid: &str) -> Result<&Key, RequestObjectError> {
        self.get_key(kid)
            .ok_or_else(|| RequestObjectError::UnknownKey(kid.to_owned()))
    }

    /// Keys in import order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }

    /// Number of keys in the store.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// A store with the public half of every key.
    pub fn to_public(&self) -> Self {
        KeyStore {
            keys: self.keys.iter().map(Key::to_public).collect(),
        }
    }

    /// Serializes the store as a JWK Set.
    pub fn export_keyset(&self) -> String {
        let keys: Vec<Value> = self.keys.iter().map(Key::to_value).collect();
        json!({ "keys": keys }).to_string()
    }
}

impl From<Key> for KeyStore {
    fn from(key: Key) -> Self {
        KeyStore { keys: vec![key] }
    }
}
