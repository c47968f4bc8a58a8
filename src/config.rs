//! Configuration from the environment, and key set files.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::claims::ClaimSet;
use crate::key::{Key, KeyStore};

const DEFAULT_KID: &str = "developer-app";
const DEFAULT_RESPONSE_TYPE: &str = "mc_si_async_code";
const DEFAULT_CLIENT_ID: &str = "x-a94d903f-ad45-4135-80b8-ac459f41b38f";
const DEFAULT_SCOPE: &str = "openid mc_atp";
const DEFAULT_VERSION: &str = "mc_si_r2_v1.0";
const DEFAULT_NONCE: &str = "878aacd7-83f1-4b4f-9582-7347b0a6fa62";
const DEFAULT_LOGIN_HINT: &str = "MSISDN:447700900907";
const DEFAULT_ACR_VALUES: i64 = 3;
const DEFAULT_CLIENT_NOTIFICATION_TOKEN: &str = "Wm1VFlURXpNR1V0T0Rjek1TMDBOVFpqTFdGalpEZ3";
const DEFAULT_NOTIFICATION_URI: &str = "https://mc.example.com/callback";
const DEFAULT_AUD: &str = "https://operator.example.com";
const DEFAULT_KEYS_DIR: &str = "keys";

const PRIVATE_KEYSET_FILE: &str = "private.json";
const PUBLIC_KEYSET_FILE: &str = "public.json";

/// The error type for reading configuration and key files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment variable holds a value of the wrong shape
    #[error("invalid value for `{name}`: `{reason}`")]
    InvalidValue {
        /// Variable name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },
    /// A setting that has no default was not provided
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    /// A key file could not be read or written
    #[error("key file `{}`: {reason}", path.display())]
    KeyFile {
        /// Offending path
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },
    /// The key file contents were rejected
    #[error(transparent)]
    Key(#[from] crate::error::RequestObjectError),
}

/// Every value that goes into an SI authorize request, with its documented default.
///
/// Build it with [RequestConfig::default] and set fields directly, or read it from the process
/// environment with [RequestConfig::from_env].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    /// Key used to sign the request object. `KID`
    pub kid: String,
    /// `RESPONSE_TYPE`
    pub response_type: String,
    /// `CLIENT_ID`
    pub client_id: String,
    /// `SCOPE`
    pub scope: String,
    /// `VERSION`
    pub version: String,
    /// `NONCE`
    pub nonce: String,
    /// `LOGIN_HINT`
    pub login_hint: String,
    /// `ACR_VALUES`
    pub acr_values: i64,
    /// `CLIENT_NOTIFICATION_TOKEN`
    pub client_notification_token: String,
    /// `NOTIFICATION_URI`
    pub notification_uri: String,
    /// `ISS`, falls back to the client id
    pub iss: String,
    /// `AUD`
    pub aud: String,
    /// Optional `claims` request as a JSON object. `CLAIMS`
    pub claims: Value,
    /// Directory holding `private.json` and `public.json`. `KEYS_DIR`
    pub keys_dir: PathBuf,
    /// `PRIVATE_KEY_PATH`
    pub private_key_path: PathBuf,
    /// `PUBLIC_KEY_PATH`
    pub public_key_path: PathBuf,
    /// The operator's si-authorize endpoint. `SI_AUTH_URL`
    pub si_auth_url: Option<String>,
    /// Host header override for a locally run sandbox. `HOST_HEADER`
    pub host_header: Option<String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        let keys_dir = PathBuf::from(DEFAULT_KEYS_DIR);
        RequestConfig {
            kid: DEFAULT_KID.to_owned(),
            response_type: DEFAULT_RESPONSE_TYPE.to_owned(),
            client_id: DEFAULT_CLIENT_ID.to_owned(),
            scope: DEFAULT_SCOPE.to_owned(),
            version: DEFAULT_VERSION.to_owned(),
            nonce: DEFAULT_NONCE.to_owned(),
            login_hint: DEFAULT_LOGIN_HINT.to_owned(),
            acr_values: DEFAULT_ACR_VALUES,
            client_notification_token: DEFAULT_CLIENT_NOTIFICATION_TOKEN.to_owned(),
            notification_uri: DEFAULT_NOTIFICATION_URI.to_owned(),
            iss: DEFAULT_CLIENT_ID.to_owned(),
            aud: DEFAULT_AUD.to_owned(),
            claims: default_claims_request(),
            private_key_path: keys_dir.join(PRIVATE_KEYSET_FILE),
            public_key_path: keys_dir.join(PUBLIC_KEYSET_FILE),
            keys_dir,
            si_auth_url: None,
            host_header: None,
        }
    }
}

fn default_claims_request() -> Value {
    json!({
        "premiuminfo": {
            "address": {
                "value": "123 Fake Street",
            },
        },
    })
}

impl RequestConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a variable if set.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RequestConfig::default();
        let string = |name: &str, default: String| lookup(name).unwrap_or(default);

        let client_id = string("CLIENT_ID", defaults.client_id);
        let acr_values = match lookup("ACR_VALUES") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|e| ConfigError::InvalidValue {
                    name: "ACR_VALUES",
                    reason: e.to_string(),
                })?,
            None => defaults.acr_values,
        };
        let claims = match lookup("CLAIMS").or_else(|| lookup("claims")) {
            Some(raw) => {
                let value = serde_json::from_str::<Value>(&raw).map_err(|e| {
                    ConfigError::InvalidValue {
                        name: "CLAIMS",
                        reason: e.to_string(),
                    }
                })?;
                if !value.is_object() {
                    return Err(ConfigError::InvalidValue {
                        name: "CLAIMS",
                        reason: "not a JSON object".to_owned(),
                    });
                }
                value
            }
            None => defaults.claims,
        };
        let keys_dir = lookup("KEYS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.keys_dir);

        let config = RequestConfig {
            kid: string("KID", defaults.kid),
            response_type: string("RESPONSE_TYPE", defaults.response_type),
            scope: lookup("SCOPE")
                .or_else(|| lookup("scope"))
                .unwrap_or(defaults.scope),
            version: string("VERSION", defaults.version),
            nonce: string("NONCE", defaults.nonce),
            login_hint: string("LOGIN_HINT", defaults.login_hint),
            acr_values,
            client_notification_token: string(
                "CLIENT_NOTIFICATION_TOKEN",
                defaults.client_notification_token,
            ),
            notification_uri: string("NOTIFICATION_URI", defaults.notification_uri),
            iss: string("ISS", client_id.clone()),
            aud: string("AUD", defaults.aud),
            claims,
            private_key_path: lookup("PRIVATE_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| keys_dir.join(PRIVATE_KEYSET_FILE)),
            public_key_path: lookup("PUBLIC_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| keys_dir.join(PUBLIC_KEYSET_FILE)),
            keys_dir,
            si_auth_url: lookup("SI_AUTH_URL"),
            host_header: lookup("HOST_HEADER"),
            client_id,
        };
        debug!(?config, "loaded configuration");
        Ok(config)
    }

    /// The request object values as a claim mapping.
    pub fn to_claims(&self) -> ClaimSet {
        let mut claims = ClaimSet::new();
        claims.insert("response_type".into(), self.response_type.clone().into());
        claims.insert("client_id".into(), self.client_id.clone().into());
        claims.insert("scope".into(), self.scope.clone().into());
        claims.insert("version".into(), self.version.clone().into());
        claims.insert("nonce".into(), self.nonce.clone().into());
        claims.insert("login_hint".into(), self.login_hint.clone().into());
        claims.insert("acr_values".into(), self.acr_values.into());
        claims.insert(
            "client_notification_token".into(),
            self.client_notification_token.clone().into(),
        );
        claims.insert(
            "notification_uri".into(),
            self.notification_uri.clone().into(),
        );
        claims.insert("iss".into(), self.iss.clone().into());
        claims.insert("aud".into(), self.aud.clone().into());
        claims.insert("claims".into(), self.claims.clone());
        claims
    }

    /// The si-authorize endpoint, which is only needed when actually sending a request.
    pub fn require_si_auth_url(&self) -> Result<&str, ConfigError> {
        self.si_auth_url
            .as_deref()
            .ok_or(ConfigError::Missing("SI_AUTH_URL"))
    }

    /// Loads the private key set used for signing.
    pub fn load_private_keys(&self) -> Result<KeyStore, ConfigError> {
        load_keyset(&self.private_key_path)
    }

    /// Loads the public key set used for verification.
    pub fn load_public_keys(&self) -> Result<KeyStore, ConfigError> {
        load_keyset(&self.public_key_path)
    }
}

/// Reads a key file. The path must name an existing regular file.
pub fn load_key_text(path: &Path) -> Result<String, ConfigError> {
    let key_file_error = |reason: String| ConfigError::KeyFile {
        path: path.to_owned(),
        reason,
    };
    if path.as_os_str().is_empty() {
        return Err(key_file_error("empty path".to_owned()));
    }
    if !path.is_file() {
        return Err(key_file_error(
            "does not exist or is not a file, generate one first with `generate-key`".to_owned(),
        ));
    }
    debug!(path = %path.display(), "loading key text");
    fs::read_to_string(path).map_err(|e| key_file_error(e.to_string()))
}

/// Reads and imports a JWK Set file.
pub fn load_keyset(path: &Path) -> Result<KeyStore, ConfigError> {
    let mut store = KeyStore::new();
    store.import_keyset(&load_key_text(path)?)?;
    Ok(store)
}

/// Writes `private.json` and `public.json` for `key` into `dir`, creating it if needed.
pub fn write_keyset_files(dir: &Path, key: &Key) -> Result<(PathBuf, PathBuf), ConfigError> {
    let write = |path: PathBuf, contents: String| -> Result<PathBuf, ConfigError> {
        fs::write(&path, contents).map_err(|e| ConfigError::KeyFile {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(path)
    };

    fs::create_dir_all(dir).map_err(|e| ConfigError::KeyFile {
        path: dir.to_owned(),
        reason: e.to_string(),
    })?;
    let mut store = KeyStore::new();
    store.insert(key.clone())?;
    let private = write(dir.join(PRIVATE_KEYSET_FILE), store.export_keyset())?;
    let public = write(dir.join(PUBLIC_KEYSET_FILE), store.to_public().export_keyset())?;
    debug!(dir = %dir.display(), "wrote key set files");
    Ok((private, public))
}
