// src/configuration.rs

use crate::model::{JsonWebKey, JsonWebKeySet, OpenIdConnectDiscovery};
use crate::signing::{SecurityKey, SigningToken, X509SigningToken};

/// The resolved signing configuration of an OpenID Connect provider.
///
/// Produced by [`crate::retriever::OpenIdConnectConfigurationRetriever`] and
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningConfiguration {
    discovery: OpenIdConnectDiscovery,
    json_web_key_set: JsonWebKeySet,
    signing_tokens: Vec<SigningToken>,
}

impl SigningConfiguration {
    pub(crate) fn new(discovery: OpenIdConnectDiscovery) -> Self {
        Self {
            discovery,
            json_web_key_set: JsonWebKeySet::default(),
            signing_tokens: Vec::new(),
        }
    }

    pub(crate) fn push_json_web_key(&mut self, jwk: JsonWebKey) {
        self.json_web_key_set.keys.push(jwk);
    }

    pub(crate) fn extend_signing_tokens(&mut self, tokens: impl IntoIterator<Item = SigningToken>) {
        self.signing_tokens.extend(tokens);
    }

    /// The discovery document the configuration was resolved from.
    pub fn discovery(&self) -> &OpenIdConnectDiscovery {
        &self.discovery
    }

    /// Every key the provider published, converted or not, in the order received.
    pub fn json_web_key_set(&self) -> &JsonWebKeySet {
        &self.json_web_key_set
    }

    pub fn signing_tokens(&self) -> &[SigningToken] {
        &self.signing_tokens
    }

    /// All keys published under `kid`.
    pub fn named_keys<'a>(&'a self, kid: &'a str) -> impl Iterator<Item = &'a SecurityKey> + 'a {
        self.signing_tokens
            .iter()
            .filter_map(SigningToken::as_named_key)
            .filter(move |named| named.key_id() == kid)
            .flat_map(|named| named.keys())
    }

    pub fn certificate_by_thumbprint(&self, thumbprint: &[u8]) -> Option<&X509SigningToken> {
        self.certificates().find(|cert| cert.thumbprint() == thumbprint)
    }

    pub fn certificates(&self) -> impl Iterator<Item = &X509SigningToken> {
        self.signing_tokens.iter().filter_map(SigningToken::as_certificate)
    }

    /// The raw JWK published under `kid`, whether or not it was converted.
    pub fn find_json_web_key(&self, kid: &str) -> Option<&JsonWebKey> {
        self.json_web_key_set
            .keys
            .iter()
            .find(|jwk| jwk.kid.as_deref() == Some(kid))
    }
}
