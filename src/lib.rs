#![warn(missing_docs)]
//!
//! This crate signs and verifies the request objects of the Mobile Connect SI (seamless identity) authorize flow. A request object is a set of claims describing the authorization request, signed with RS256 into a compact JWT by a key from a JWK Set and sent to the operator in the `request` query parameter.
//!
//! Only RSA keys and the RS256 algorithm are supported. See the OpenID Connect [request object](https://openid.net/specs/openid-connect-core-1_0.html#RequestObject) section for the general mechanism.
//!
//! ## Usage
//!
//! Load the private key set on startup, assemble the claims, and sign them:
//!
//! ```rust
//! use mc_request_object::{sign_with_store, verify, ClaimAssembler, Key, KeyStore, REQUEST_OBJECT_KEYS};
//!
//! // Usually read from `keys/private.json`, see `config::load_keyset`.
//! let private_keys = KeyStore::from(Key::generate_rsa("developer-app", 2048).unwrap());
//!
//! // Documented defaults, with the login hint overridden.
//! let mut overrides = serde_json::Map::new();
//! overrides.insert("login_hint".into(), "MSISDN:447700900907".into());
//! let claims = ClaimAssembler::new()
//!     .assemble(&overrides, &REQUEST_OBJECT_KEYS)
//!     .unwrap();
//!
//! let token = sign_with_store(&private_keys, "developer-app", &claims).unwrap();
//!
//! // The operator verifies with the public half only.
//! let public_keys = private_keys.to_public();
//! assert_eq!(verify(&public_keys, &token).unwrap(), claims);
//! ```
//!
//! The [transport] module sends the signed request to an si-authorize endpoint, and the
//! `mc-request-object` binary wraps all of the above for the command line.
//!
pub mod claims;
pub mod config;
pub mod error;
pub mod key;
pub mod logging;
pub mod signer;
pub mod transport;
pub mod verifier;

pub use claims::{ClaimAssembler, ClaimSet, REQUEST_OBJECT_KEYS, REQUIRED_CLAIMS};
pub use error::RequestObjectError;
pub use key::{Key, KeyStore, DEFAULT_KEY_BITS};
pub use signer::{sign, sign_with_store};
pub use verifier::{verify, KeyResolver};
