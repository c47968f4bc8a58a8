//! Errors raised while handling request objects.

use thiserror::Error;

/// The error type for everything that can go wrong while loading keys, assembling, signing or
/// verifying a request object.
#[derive(Error, Debug, PartialEq)]
pub enum RequestObjectError {
    /// The key set (or a key within it) is not valid JSON of the expected shape.
    #[error("unable to parse key set: `{0}`")]
    Parse(String),

    /// A key in the key set is not an RSA key.
    #[error("unsupported key type `{kty}` for kid `{kid}`, only RSA keys are supported")]
    UnsupportedKey {
        /// Key id of the offending key (empty when the key has none)
        kid: String,
        /// Declared `kty` of the offending key
        kty: String,
    },

    /// The key cannot sign with RS256, or the token declares an algorithm other than RS256.
    #[error("unsupported algorithm: `{0}`, only RS256 is supported")]
    UnsupportedAlgorithm(String),

    /// A required claim is absent after defaults and overrides were merged.
    #[error("missing required claim `{0}`")]
    MissingClaim(String),

    /// No key with the given kid exists in the key store.
    #[error("no key found for kid `{0}`")]
    UnknownKey(String),

    /// The token names a key id that differs from the key it is being verified with.
    #[error("kid mismatch: token has {token:?}, key has {key:?}")]
    KidMismatch {
        /// kid from the token header
        token: Option<String>,
        /// kid of the verifying key
        key: Option<String>,
    },

    /// The signature does not verify against the resolved public key.
    #[error("invalid signature for kid `{0}`")]
    InvalidSignature(String),

    /// The token is not three valid base64url segments carrying JSON objects.
    #[error("malformed token: `{0}`")]
    MalformedToken(String),

    /// The crypto backend rejected the key components.
    #[error("invalid key material for kid `{kid}`: `{reason}`")]
    KeyMaterial {
        /// Key id of the rejected key
        kid: String,
        /// Reason reported by the backend
        reason: String,
    },

    /// RSA key generation failed.
    #[error("unable to generate key: `{0}`")]
    KeyGeneration(String),
}
