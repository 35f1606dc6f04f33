// src/identity.rs

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Authentication type given to identities built by the default factory.
pub const DEFAULT_AUTHENTICATION_TYPE: &str = "AuthenticationTypes.Federation";
/// Claim type used for `ClaimsIdentity::name` unless overridden.
pub const DEFAULT_NAME_CLAIM_TYPE: &str = "name";
/// Claim type used for roles unless overridden.
pub const DEFAULT_ROLE_CLAIM_TYPE: &str = "role";
/// Issuer recorded on claims that do not name one.
pub const DEFAULT_ISSUER: &str = "LOCAL AUTHORITY";

/// How a claim's string value should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimValueType {
    #[default]
    String,
    Integer,
    Double,
    Boolean,
    /// A serialized JSON object or array.
    Json,
}

/// A single statement about a subject, e.g. `sub = "alice"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
    pub value_type: ClaimValueType,
    pub issuer: String,
    pub original_issuer: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_value_type(claim_type, value, ClaimValueType::String)
    }

    pub fn with_value_type(claim_type: impl Into<String>, value: impl Into<String>, value_type: ClaimValueType) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            value_type,
            issuer: DEFAULT_ISSUER.to_string(),
            original_issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    /// Sets both the issuer and the original issuer.
    pub fn issued_by(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self.original_issuer = self.issuer.clone();
        self
    }

    /// The value as JSON, typed by `value_type`.
    ///
    /// A value that does not parse as its declared type stays a JSON string.
    pub fn json_value(&self) -> Value {
        let parsed = match self.value_type {
            ClaimValueType::String => None,
            ClaimValueType::Integer => self.value.parse::<i64>().ok().map(Value::from),
            ClaimValueType::Double => self.value.parse::<f64>().ok().map(Value::from),
            ClaimValueType::Boolean => self.value.parse::<bool>().ok().map(Value::from),
            ClaimValueType::Json => serde_json::from_str(&self.value).ok(),
        };
        parsed.unwrap_or_else(|| Value::String(self.value.clone()))
    }
}

/// An identity assembled from the claims of a validated token.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClaimsIdentity {
    pub authentication_type: Option<String>,
    pub name_claim_type: String,
    pub role_claim_type: String,
    pub label: Option<String>,
    claims: Vec<Claim>,
}

impl ClaimsIdentity {
    pub fn new(authentication_type: Option<String>, name_claim_type: impl Into<String>, role_claim_type: impl Into<String>) -> Self {
        Self {
            authentication_type,
            name_claim_type: name_claim_type.into(),
            role_claim_type: role_claim_type.into(),
            label: None,
            claims: Vec::new(),
        }
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    pub fn add_claims(&mut self, claims: impl IntoIterator<Item = Claim>) {
        self.claims.extend(claims);
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|claim| claim.claim_type == claim_type)
    }

    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a Claim> + 'a {
        self.claims.iter().filter(move |claim| claim.claim_type == claim_type)
    }

    /// Value of the first claim of `name_claim_type`.
    pub fn name(&self) -> Option<&str> {
        self.find_first(&self.name_claim_type).map(|claim| claim.value.as_str())
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.find_all(&self.role_claim_type).map(|claim| claim.value.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.authentication_type.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Enumerates the claims a token carries.
pub trait ClaimProvider {
    fn claims(&self) -> Vec<Claim>;
}

/// A token that went through validation.
///
/// Parsing the token is someone else's job; this crate only needs to know
/// whether the token can list its own claims.
pub trait SecurityToken: fmt::Debug + Send + Sync {
    /// The issuer the token names for itself.
    fn issuer(&self) -> Option<&str> {
        None
    }

    /// The token's claim-provider capability, if it has one.
    fn claim_provider(&self) -> Option<&dyn ClaimProvider> {
        None
    }
}

/// Creates the (initially empty) identity for a validated token.
pub trait IdentityFactory: Send + Sync {
    fn create_claims_identity(
        &self,
        parameters: &TokenValidationParameters,
        token: &dyn SecurityToken,
        issuer: Option<&str>,
    ) -> ClaimsIdentity;
}

/// Settings the orchestrator validated a token with.
///
/// `TokenValidationResult` keeps its own clone, so later changes made by the
/// caller do not leak into a result.
#[derive(Clone)]
pub struct TokenValidationParameters {
    pub authentication_type: Option<String>,
    pub name_claim_type: String,
    pub role_claim_type: String,
    pub identity_factory: Option<Arc<dyn IdentityFactory>>,
    pub property_bag: HashMap<String, Value>,
}

impl Default for TokenValidationParameters {
    fn default() -> Self {
        Self {
            authentication_type: None,
            name_claim_type: DEFAULT_NAME_CLAIM_TYPE.to_string(),
            role_claim_type: DEFAULT_ROLE_CLAIM_TYPE.to_string(),
            identity_factory: None,
            property_bag: HashMap::new(),
        }
    }
}

impl fmt::Debug for TokenValidationParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidationParameters")
            .field("authentication_type", &self.authentication_type)
            .field("name_claim_type", &self.name_claim_type)
            .field("role_claim_type", &self.role_claim_type)
            .field("identity_factory", &self.identity_factory.is_some())
            .field("property_bag", &self.property_bag)
            .finish()
    }
}

impl TokenValidationParameters {
    /// Builds the identity for `token`, through the configured factory if there is one.
    ///
    /// The default identity uses `authentication_type` (falling back to
    /// [`DEFAULT_AUTHENTICATION_TYPE`]) and is labelled with the issuer.
    pub fn create_claims_identity(&self, token: &dyn SecurityToken, issuer: Option<&str>) -> ClaimsIdentity {
        if let Some(factory) = &self.identity_factory {
            return factory.create_claims_identity(self, token, issuer);
        }

        let authentication_type = self
            .authentication_type
            .clone()
            .unwrap_or_else(|| DEFAULT_AUTHENTICATION_TYPE.to_string());
        let mut identity = ClaimsIdentity::new(
            Some(authentication_type),
            self.name_claim_type.clone(),
            self.role_claim_type.clone(),
        );
        identity.label = issuer.map(str::to_string);
        identity
    }
}

/// Per-call correlation data threaded through validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    pub activity_id: Uuid,
    pub property_bag: HashMap<String, Value>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::with_activity_id(Uuid::new_v4())
    }

    pub fn with_activity_id(activity_id: Uuid) -> Self {
        Self {
            activity_id,
            property_bag: HashMap::new(),
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct BareToken;

    impl SecurityToken for BareToken {}

    struct TaggingFactory;

    impl IdentityFactory for TaggingFactory {
        fn create_claims_identity(
            &self,
            _parameters: &TokenValidationParameters,
            _token: &dyn SecurityToken,
            issuer: Option<&str>,
        ) -> ClaimsIdentity {
            let mut identity = ClaimsIdentity::new(Some("custom".to_string()), "upn", "groups");
            identity.add_claim(Claim::new("created_for", issuer.unwrap_or_default()));
            identity
        }
    }

    #[test]
    fn claim_values_follow_their_declared_type() {
        assert_eq!(Claim::with_value_type("exp", "1700000000", ClaimValueType::Integer).json_value(), json!(1700000000));
        assert_eq!(Claim::with_value_type("ratio", "0.5", ClaimValueType::Double).json_value(), json!(0.5));
        assert_eq!(Claim::with_value_type("email_verified", "true", ClaimValueType::Boolean).json_value(), json!(true));
        assert_eq!(
            Claim::with_value_type("address", r#"{"country":"NZ"}"#, ClaimValueType::Json).json_value(),
            json!({"country": "NZ"})
        );
        // Unparseable values fall back to strings.
        assert_eq!(Claim::with_value_type("exp", "soon", ClaimValueType::Integer).json_value(), json!("soon"));
    }

    #[test]
    fn default_identity_uses_parameters() {
        let parameters = TokenValidationParameters {
            name_claim_type: "preferred_username".to_string(),
            ..Default::default()
        };

        let mut identity = parameters.create_claims_identity(&BareToken, Some("https://id.test.local/"));
        identity.add_claim(Claim::new("preferred_username", "alice"));
        identity.add_claim(Claim::new("role", "admin"));
        identity.add_claim(Claim::new("role", "ops"));

        assert_eq!(identity.authentication_type.as_deref(), Some(DEFAULT_AUTHENTICATION_TYPE));
        assert_eq!(identity.label.as_deref(), Some("https://id.test.local/"));
        assert!(identity.is_authenticated());
        assert_eq!(identity.name(), Some("alice"));
        assert_eq!(identity.roles().collect::<Vec<_>>(), vec!["admin", "ops"]);
    }

    #[test]
    fn configured_factory_takes_over() {
        let parameters = TokenValidationParameters {
            identity_factory: Some(Arc::new(TaggingFactory)),
            ..Default::default()
        };

        let identity = parameters.create_claims_identity(&BareToken, Some("iss"));
        assert_eq!(identity.authentication_type.as_deref(), Some("custom"));
        assert_eq!(identity.find_first("created_for").map(|c| c.value.as_str()), Some("iss"));
    }

    #[test]
    fn call_contexts_get_fresh_activity_ids() {
        assert_ne!(CallContext::new().activity_id, CallContext::new().activity_id);
    }
}
