//! Request object claims and their assembly from defaults and overrides.

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::RequestConfig;
use crate::error::RequestObjectError;

/// The payload of a request object: claim name to JSON value.
pub type ClaimSet = Map<String, Value>;

/// Claims every SI request object must carry.
pub const REQUIRED_CLAIMS: [&str; 11] = [
    "response_type",
    "client_id",
    "scope",
    "version",
    "nonce",
    "login_hint",
    "acr_values",
    "client_notification_token",
    "notification_uri",
    "iss",
    "aud",
];

/// Claims of a complete request object: the required ones plus the optional `claims` request.
pub const REQUEST_OBJECT_KEYS: [&str; 12] = [
    "response_type",
    "client_id",
    "scope",
    "version",
    "nonce",
    "login_hint",
    "acr_values",
    "client_notification_token",
    "notification_uri",
    "iss",
    "aud",
    "claims",
];

/// Builds claim sets from a table of defaults and caller overrides.
#[derive(Debug, Clone)]
pub struct ClaimAssembler {
    defaults: ClaimSet,
}

impl Default for ClaimAssembler {
    fn default() -> Self {
        ClaimAssembler::with_defaults(RequestConfig::default().to_claims())
    }
}

impl ClaimAssembler {
    /// Uses the documented defaults of [RequestConfig].
    pub fn new() -> Self {
        ClaimAssembler::default()
    }

    /// Uses the given default table instead.
    pub fn with_defaults(defaults: ClaimSet) -> Self {
        ClaimAssembler { defaults }
    }

    /// Drops the default for `name`, so that claim must come from the overrides.
    pub fn without_default(mut self, name: &str) -> Self {
        self.defaults.remove(name);
        self
    }

    /// The default table.
    pub fn defaults(&self) -> &ClaimSet {
        &self.defaults
    }

    /// Merges `overrides` over the defaults and projects the result down to exactly `keys`.
    ///
    /// A key that ends up absent or `null` is a [RequestObjectError::MissingClaim].
    pub fn assemble(
        &self,
        overrides: &ClaimSet,
        keys: &[&str],
    ) -> Result<ClaimSet, RequestObjectError> {
        let mut claims = ClaimSet::new();
        for &name in keys {
            let value = overrides
                .get(name)
                .or_else(|| self.defaults.get(name))
                .filter(|value| !value.is_null())
                .ok_or_else(|| RequestObjectError::MissingClaim(name.to_owned()))?;
            claims.insert(name.to_owned(), value.clone());
        }
        let rendered = Value::Object(claims.clone());
        debug!(claims = %rendered, "assembled request object");
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(value: Value) -> ClaimSet {
        match value {
            Value::Object(map) => map,
            _ => panic!("overrides must be an object"),
        }
    }

    #[test]
    fn defaults_only() {
        let claims = ClaimAssembler::new()
            .assemble(&ClaimSet::new(), &REQUEST_OBJECT_KEYS)
            .unwrap();

        assert_eq!(claims.len(), REQUEST_OBJECT_KEYS.len());
        assert_eq!(claims["response_type"], "mc_si_async_code");
        assert_eq!(claims["client_id"], "x-a94d903f-ad45-4135-80b8-ac459f41b38f");
        assert_eq!(claims["iss"], claims["client_id"]);
        assert_eq!(claims["scope"], "openid mc_atp");
        assert_eq!(claims["version"], "mc_si_r2_v1.0");
        assert_eq!(claims["login_hint"], "MSISDN:447700900907");
        assert_eq!(claims["acr_values"], 3);
        assert_eq!(claims["notification_uri"], "https://mc.example.com/callback");
        assert_eq!(claims["aud"], "https://operator.example.com");
        assert_eq!(
            claims["claims"]["premiuminfo"]["address"]["value"],
            "123 Fake Street"
        );
    }

    #[test]
    fn projects_to_requested_keys() {
        let extra = overrides(json!({"state": "abc", "nonce": "n-1"}));
        let claims = ClaimAssembler::new()
            .assemble(&extra, &REQUIRED_CLAIMS)
            .unwrap();

        assert_eq!(claims.len(), REQUIRED_CLAIMS.len());
        assert!(claims.get("state").is_none());
        assert!(claims.get("claims").is_none());
        assert_eq!(claims["nonce"], "n-1");
        assert!(REQUIRED_CLAIMS.iter().all(|name| claims.contains_key(*name)));
    }

    #[test]
    fn override_replaces_only_matching_keys() {
        let extra = overrides(json!({"login_hint": "MSISDN:447700900000", "acr_values": 2}));
        let claims = ClaimAssembler::new()
            .assemble(&extra, &REQUIRED_CLAIMS)
            .unwrap();

        assert_eq!(claims["login_hint"], "MSISDN:447700900000");
        assert_eq!(claims["acr_values"], 2);
        assert_eq!(claims["version"], "mc_si_r2_v1.0");
    }

    #[test]
    fn missing_iss() {
        let assembler = ClaimAssembler::new().without_default("iss");
        let res = assembler.assemble(&ClaimSet::new(), &REQUIRED_CLAIMS);
        assert_eq!(res, Err(RequestObjectError::MissingClaim("iss".to_owned())));

        let supplied = overrides(json!({"iss": "someone"}));
        let claims = assembler.assemble(&supplied, &REQUIRED_CLAIMS).unwrap();
        assert_eq!(claims["iss"], "someone");
    }

    #[test]
    fn default_table_follows_config() {
        let assembler = ClaimAssembler::new();
        assert_eq!(assembler.defaults(), &RequestConfig::default().to_claims());

        let assembler = assembler.without_default("nonce");
        assert!(assembler.defaults().get("nonce").is_none());
        assert_eq!(assembler.defaults()["aud"], "https://operator.example.com");
    }

    #[test]
    fn null_override_is_missing() {
        let res =
            ClaimAssembler::new().assemble(&overrides(json!({"aud": null})), &REQUIRED_CLAIMS);
        assert_eq!(res, Err(RequestObjectError::MissingClaim("aud".to_owned())));
    }
}
