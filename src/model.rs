// src/model.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Represents the data structure of an OIDC provider's discovery document.
/// Found at the `.well-known/openid-configuration` endpoint.
///
/// Only `jwks_uri` drives key resolution. The other well-known fields are kept
/// for callers, and anything unrecognized lands in `additional_data`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OpenIdConnectDiscovery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_session_iframe: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id_token_signing_alg_values_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_types_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_types_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub claims_supported: Vec<String>,
    /// Every field not listed above, passed through untouched.
    #[serde(flatten)]
    pub additional_data: Map<String, Value>,
}

impl OpenIdConnectDiscovery {
    /// Parses a discovery document from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The key-set address, if the provider publishes a non-blank one.
    pub fn jwks_uri(&self) -> Option<&str> {
        self.jwks_uri.as_deref().filter(|uri| !uri.trim().is_empty())
    }
}

/// Represents a single JSON Web Key (JWK) as defined in RFC 7517.
///
/// The record is kept verbatim in the resolved key set whether or not it
/// converts into a signing token.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct JsonWebKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default)]
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// Base64 (not base64url) DER certificates, leaf first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub x5c: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5t: Option<String>,
    #[serde(flatten)]
    pub additional_data: Map<String, Value>,
}

/// The `use` value marking a key for signature verification.
pub const USE_SIGNATURE: &str = "sig";

impl JsonWebKey {
    /// Whether this key may be used to verify signatures.
    ///
    /// An absent or blank `use` counts as signing; otherwise it must be exactly `sig`.
    pub fn is_signing_key(&self) -> bool {
        match self.use_purpose.as_deref() {
            None => true,
            Some(purpose) if purpose.trim().is_empty() => true,
            Some(purpose) => purpose == USE_SIGNATURE,
        }
    }

    /// The key id, if present and not blank.
    pub fn key_id(&self) -> Option<&str> {
        non_blank(self.kid.as_deref())
    }

    /// The RSA modulus and exponent, if both are present and not blank.
    pub fn rsa_components(&self) -> Option<(&str, &str)> {
        Some((non_blank(self.n.as_deref())?, non_blank(self.e.as_deref())?))
    }
}

/// Represents a JSON Web Key Set (JWKS), which is a collection of JWKs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct JsonWebKeySet {
    #[serde(default)]
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Parses a key set from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
