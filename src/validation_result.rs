// src/validation_result.rs

use crate::error::NilaOidcError;
use crate::identity::{CallContext, Claim, ClaimsIdentity, SecurityToken, TokenValidationParameters};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// The outcome of validating one security token.
///
/// The orchestrator fills it in while validating; the caller then reads it.
/// Callers must check [`is_valid`](Self::is_valid) or
/// [`exception`](Self::exception) before trusting [`claims`](Self::claims);
/// reading claims first logs a warning.
///
/// The identity and the claims map are derived on first access and cached for
/// the lifetime of the result.
#[derive(Debug, Default)]
pub struct TokenValidationResult {
    security_token: Option<Arc<dyn SecurityToken>>,
    validation_parameters: Option<TokenValidationParameters>,
    issuer: Option<String>,
    token_type: Option<String>,
    is_valid: bool,
    exception: Option<Box<dyn Error + Send + Sync>>,
    has_is_valid_or_exception_been_read: AtomicBool,
    claims_identity: OnceCell<ClaimsIdentity>,
    claims: OnceCell<HashMap<String, Value>>,
    property_bag: HashMap<String, Value>,
    token_context: Option<CallContext>,
}

impl TokenValidationResult {
    /// An empty result: no token, no parameters, not valid.
    pub fn new() -> Self {
        Self::default()
    }

    /// A result whose identity is built later from `token`.
    ///
    /// `parameters` is cloned here.
    pub fn with_token(
        token: Arc<dyn SecurityToken>,
        parameters: &TokenValidationParameters,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            security_token: Some(token),
            validation_parameters: Some(parameters.clone()),
            issuer: Some(issuer.into()),
            ..Self::default()
        }
    }

    /// True if the token was successfully validated.
    pub fn is_valid(&self) -> bool {
        self.has_is_valid_or_exception_been_read.store(true, Ordering::Release);
        self.is_valid
    }

    pub fn set_is_valid(&mut self, is_valid: bool) {
        self.is_valid = is_valid;
    }

    /// Why validation failed, if it did.
    pub fn exception(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.has_is_valid_or_exception_been_read.store(true, Ordering::Release);
        self.exception.as_deref()
    }

    pub fn set_exception(&mut self, exception: impl Into<Box<dyn Error + Send + Sync>>) {
        self.exception = Some(exception.into());
    }

    pub fn clear_exception(&mut self) {
        self.exception = None;
    }

    /// Claims of the validated token keyed by claim type.
    ///
    /// Repeated claim types become a JSON array in the order they were added.
    ///
    /// # Errors
    ///
    /// Fails when the identity cannot be derived; see [`claims_identity`](Self::claims_identity).
    pub fn claims(&self) -> Result<&HashMap<String, Value>, NilaOidcError> {
        if !self.has_is_valid_or_exception_been_read.load(Ordering::Acquire) {
            warn!("Claims read before is_valid() or exception() was checked; the token may not have validated");
        }
        self.claims
            .get_or_try_init(|| Ok(claims_to_map(self.claims_identity()?.claims())))
    }

    /// The identity built from the validated token.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when there is no token or no validation parameters,
    /// or when the token cannot provide its claims. A failed derivation is not
    /// cached.
    pub fn claims_identity(&self) -> Result<&ClaimsIdentity, NilaOidcError> {
        self.claims_identity.get_or_try_init(|| self.create_claims_identity())
    }

    /// Replaces the identity, bypassing derivation.
    pub fn set_claims_identity(&mut self, identity: Option<ClaimsIdentity>) -> Result<(), NilaOidcError> {
        let identity = identity.ok_or_else(|| NilaOidcError::InvalidArgument("value".to_string()))?;
        self.claims_identity = OnceCell::with_value(identity);
        Ok(())
    }

    fn create_claims_identity(&self) -> Result<ClaimsIdentity, NilaOidcError> {
        let token = self
            .security_token
            .as_deref()
            .ok_or_else(|| NilaOidcError::InvalidArgument("security_token".to_string()))?;
        let claim_provider = token
            .claim_provider()
            .ok_or_else(|| NilaOidcError::InvalidArgument("ClaimProvider".to_string()))?;
        let parameters = self
            .validation_parameters
            .as_ref()
            .ok_or_else(|| NilaOidcError::InvalidArgument("validation_parameters".to_string()))?;

        // A blank issuer on the result falls back to the token's own.
        let issuer = self
            .issuer
            .as_deref()
            .filter(|issuer| !issuer.trim().is_empty())
            .or_else(|| token.issuer());
        let mut identity = parameters.create_claims_identity(token, issuer);
        identity.add_claims(claim_provider.claims());
        Ok(identity)
    }

    /// The issuer found in the token.
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn set_issuer(&mut self, issuer: impl Into<String>) {
        self.issuer = Some(issuer.into());
    }

    /// The token type, e.g. the JWT `typ` header.
    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    pub fn set_token_type(&mut self, token_type: impl Into<String>) {
        self.token_type = Some(token_type.into());
    }

    pub fn security_token(&self) -> Option<&Arc<dyn SecurityToken>> {
        self.security_token.as_ref()
    }

    pub fn set_security_token(&mut self, token: Arc<dyn SecurityToken>) {
        self.security_token = Some(token);
    }

    pub fn token_context(&self) -> Option<&CallContext> {
        self.token_context.as_ref()
    }

    pub fn set_token_context(&mut self, context: CallContext) {
        self.token_context = Some(context);
    }

    /// Free-form data for custom scenarios. Keys are case-sensitive.
    pub fn property_bag(&self) -> &HashMap<String, Value> {
        &self.property_bag
    }

    pub fn property_bag_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.property_bag
    }
}

fn claims_to_map(claims: &[Claim]) -> HashMap<String, Value> {
    let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
    for claim in claims {
        grouped.entry(claim.claim_type.clone()).or_default().push(claim.json_value());
    }

    grouped
        .into_iter()
        .map(|(claim_type, mut values)| {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            };
            (claim_type, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ClaimProvider, ClaimValueType};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// A token whose claims change on every query.
    #[derive(Debug, Default)]
    struct CountingToken {
        queries: AtomicUsize,
    }

    impl ClaimProvider for CountingToken {
        fn claims(&self) -> Vec<Claim> {
            let query = self.queries.fetch_add(1, Ordering::SeqCst);
            vec![
                Claim::new("sub", "alice").issued_by("https://id.test.local/"),
                Claim::with_value_type("query", query.to_string(), ClaimValueType::Integer),
                Claim::new("groups", "admins"),
                Claim::new("groups", "ops"),
            ]
        }
    }

    impl SecurityToken for CountingToken {
        fn claim_provider(&self) -> Option<&dyn ClaimProvider> {
            Some(self)
        }
    }

    /// A token without the claim-provider capability.
    #[derive(Debug)]
    struct OpaqueToken;

    impl SecurityToken for OpaqueToken {}

    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn count_warnings(f: impl FnOnce()) -> usize {
        let counter = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(counter.clone()));
        tracing::subscriber::with_default(subscriber, f);
        counter.load(Ordering::SeqCst)
    }

    fn seeded_result() -> (Arc<CountingToken>, TokenValidationResult) {
        let token = Arc::new(CountingToken::default());
        let result =
            TokenValidationResult::with_token(token.clone(), &TokenValidationParameters::default(), "https://id.test.local/");
        (token, result)
    }

    #[test]
    fn reading_claims_before_validity_warns() {
        let (_, mut result) = seeded_result();
        result.set_is_valid(false);
        result.set_exception(NilaOidcError::InvalidArgument("expired".to_string()));

        let warnings = count_warnings(|| {
            result.claims().unwrap();
        });
        assert_eq!(warnings, 1);
    }

    #[test]
    fn checking_validity_first_suppresses_the_warning() {
        let (_, mut result) = seeded_result();
        result.set_is_valid(true);

        let warnings = count_warnings(|| {
            assert!(result.is_valid());
            result.claims().unwrap();
        });
        assert_eq!(warnings, 0);
    }

    #[test]
    fn reading_the_exception_also_counts_as_checked() {
        let (_, mut result) = seeded_result();
        result.set_exception(NilaOidcError::Cancelled);

        let warnings = count_warnings(|| {
            assert!(result.exception().is_some());
            result.claims().unwrap();
        });
        assert_eq!(warnings, 0);
    }

    #[test]
    fn claims_are_derived_once() {
        let (token, result) = seeded_result();
        assert!(!result.is_valid());

        let first = result.claims().unwrap();
        let second = result.claims().unwrap();

        assert!(std::ptr::eq(first, second));
        assert_eq!(first.get("query"), Some(&json!(0)));
        assert_eq!(token.queries.load(Ordering::SeqCst), 1);
        assert_eq!(first.get("sub"), Some(&json!("alice")));
        assert_eq!(first.get("groups"), Some(&json!(["admins", "ops"])));
    }

    #[test]
    fn identity_is_cached_and_built_from_parameters() {
        let (token, result) = seeded_result();

        let identity = result.claims_identity().unwrap();
        assert_eq!(identity.label.as_deref(), Some("https://id.test.local/"));
        assert_eq!(identity.find_first("sub").map(|c| c.issuer.as_str()), Some("https://id.test.local/"));
        assert!(std::ptr::eq(identity, result.claims_identity().unwrap()));
        assert_eq!(token.queries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blank_issuer_falls_back_to_the_token() {
        #[derive(Debug)]
        struct IssuedToken;

        impl ClaimProvider for IssuedToken {
            fn claims(&self) -> Vec<Claim> {
                vec![Claim::new("sub", "carol")]
            }
        }

        impl SecurityToken for IssuedToken {
            fn issuer(&self) -> Option<&str> {
                Some("https://token.test.local/")
            }

            fn claim_provider(&self) -> Option<&dyn ClaimProvider> {
                Some(self)
            }
        }

        let result = TokenValidationResult::with_token(Arc::new(IssuedToken), &TokenValidationParameters::default(), " ");
        assert_eq!(
            result.claims_identity().unwrap().label.as_deref(),
            Some("https://token.test.local/")
        );

        let result = TokenValidationResult::with_token(
            Arc::new(IssuedToken),
            &TokenValidationParameters::default(),
            "https://id.test.local/",
        );
        assert_eq!(result.claims_identity().unwrap().label.as_deref(), Some("https://id.test.local/"));
    }

    #[test]
    fn token_without_claim_provider_is_rejected() {
        let result = TokenValidationResult::with_token(Arc::new(OpaqueToken), &TokenValidationParameters::default(), "iss");
        assert!(!result.is_valid());

        let err = result.claims().unwrap_err();
        assert!(matches!(err, NilaOidcError::InvalidArgument(ref name) if name == "ClaimProvider"));

        // The failure is not cached and the rest of the result still works.
        assert!(result.claims_identity().is_err());
        assert_eq!(result.issuer(), Some("iss"));
    }

    #[test]
    fn empty_result_has_nothing_to_derive() {
        let result = TokenValidationResult::new();
        assert!(!result.is_valid());
        assert!(result.exception().is_none());
        assert!(matches!(result.claims_identity(), Err(NilaOidcError::InvalidArgument(_))));
    }

    #[test]
    fn explicit_identity_bypasses_derivation() {
        let mut result = TokenValidationResult::new();
        let mut identity = ClaimsIdentity::new(Some("saml".to_string()), "name", "role");
        identity.add_claim(Claim::new("name", "bob"));

        result.set_claims_identity(Some(identity)).unwrap();
        assert!(!result.is_valid());
        assert_eq!(result.claims().unwrap().get("name"), Some(&json!("bob")));
    }

    #[test]
    fn absent_identity_is_rejected() {
        let (_, mut result) = seeded_result();
        let err = result.set_claims_identity(None).unwrap_err();
        assert!(matches!(err, NilaOidcError::InvalidArgument(ref name) if name == "value"));
        // Derivation is still available afterwards.
        assert!(result.claims_identity().is_ok());
    }

    #[test]
    fn parameters_are_cloned_at_construction() {
        let mut parameters = TokenValidationParameters::default();
        let result = TokenValidationResult::with_token(Arc::new(CountingToken::default()), &parameters, "iss");

        parameters.authentication_type = Some("changed-later".to_string());

        let identity = result.claims_identity().unwrap();
        assert_eq!(
            identity.authentication_type.as_deref(),
            Some(crate::identity::DEFAULT_AUTHENTICATION_TYPE)
        );
    }

    #[test]
    fn property_bag_is_case_sensitive() {
        let mut result = TokenValidationResult::new();
        result.property_bag_mut().insert("Tenant".to_string(), json!("a"));
        result.property_bag_mut().insert("tenant".to_string(), json!("b"));

        assert_eq!(result.property_bag().len(), 2);
        assert_eq!(result.property_bag().get("Tenant"), Some(&json!("a")));
    }

    #[test]
    fn orchestrator_fields_are_settable() {
        let mut result = TokenValidationResult::new();
        let context = CallContext::new();

        result.set_issuer("https://id.test.local/");
        result.set_token_type("JWT");
        result.set_security_token(Arc::new(OpaqueToken));
        result.set_token_context(context.clone());
        result.set_is_valid(true);

        assert_eq!(result.issuer(), Some("https://id.test.local/"));
        assert_eq!(result.token_type(), Some("JWT"));
        assert!(result.security_token().is_some());
        assert_eq!(result.token_context(), Some(&context));
        assert!(result.is_valid());

        result.set_exception(NilaOidcError::Cancelled);
        result.clear_exception();
        assert!(result.exception().is_none());
    }

    #[test]
    fn result_can_cross_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TokenValidationResult>();
    }
}
