// src/retriever.rs

use crate::config::RetrieverConfig;
use crate::configuration::SigningConfiguration;
use crate::error::NilaOidcError;
use crate::fetcher::{DocumentRetriever, GenericDocumentRetriever, HttpDocumentRetriever};
use crate::model::{JsonWebKeySet, OpenIdConnectDiscovery};
use crate::signing::signing_tokens_from_jwk;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Retrieves a configuration of type `T` through a [`DocumentRetriever`].
///
/// Lets a caching layer above this crate stay generic over what it caches.
#[async_trait]
pub trait ConfigurationRetriever<T>: Send + Sync {
    async fn get_configuration(
        &self,
        retriever: &dyn DocumentRetriever,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<T, NilaOidcError>;
}

/// Resolves an OpenID Connect provider's signing keys from its discovery document.
///
/// Stateless; every call fetches and converts afresh.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenIdConnectConfigurationRetriever;

impl OpenIdConnectConfigurationRetriever {
    /// Resolves `address` with a [`GenericDocumentRetriever`].
    pub async fn get(address: &str, cancel: &CancellationToken) -> Result<SigningConfiguration, NilaOidcError> {
        Self::get_async(&GenericDocumentRetriever::new(), address, cancel).await
    }

    /// Resolves `address` over HTTPS using the caller's `reqwest::Client`.
    pub async fn get_with_client(
        address: &str,
        http_client: reqwest::Client,
        cancel: &CancellationToken,
    ) -> Result<SigningConfiguration, NilaOidcError> {
        let retriever = HttpDocumentRetriever::with_client(http_client, RetrieverConfig::default());
        Self::get_async(&retriever, address, cancel).await
    }

    /// Fetches the discovery document at `address`, then its JWKS, and converts every signing key.
    ///
    /// # Errors
    ///
    /// Fails before any fetch if `address` is blank. Transport errors, cancellation,
    /// malformed documents and malformed key material all abort the whole
    /// resolution; nothing partial is returned.
    #[instrument(skip(retriever, cancel), err)]
    pub async fn get_async<R>(
        retriever: &R,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<SigningConfiguration, NilaOidcError>
    where
        R: DocumentRetriever + ?Sized,
    {
        if address.trim().is_empty() {
            return Err(NilaOidcError::InvalidArgument("address".to_string()));
        }

        let document = fetch(retriever, address, cancel).await?;
        let discovery = OpenIdConnectDiscovery::from_json(&document)?;

        let jwks_uri = match discovery.jwks_uri() {
            Some(uri) => uri.to_string(),
            None => {
                debug!("Discovery document at {} has no jwks_uri", address);
                return Ok(SigningConfiguration::new(discovery));
            }
        };
        debug!("Discovered JWKS URI: {}", jwks_uri);

        let document = fetch(retriever, &jwks_uri, cancel).await?;
        let jwks = JsonWebKeySet::from_json(&document)?;

        let mut configuration = SigningConfiguration::new(discovery);
        for jwk in jwks.keys {
            let tokens = signing_tokens_from_jwk(&jwk)?;
            configuration.extend_signing_tokens(tokens);
            configuration.push_json_web_key(jwk);
        }

        debug!(
            "Resolved {} signing tokens from {} keys",
            configuration.signing_tokens().len(),
            configuration.json_web_key_set().keys.len()
        );
        Ok(configuration)
    }
}

#[async_trait]
impl ConfigurationRetriever<SigningConfiguration> for OpenIdConnectConfigurationRetriever {
    async fn get_configuration(
        &self,
        retriever: &dyn DocumentRetriever,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<SigningConfiguration, NilaOidcError> {
        Self::get_async(retriever, address, cancel).await
    }
}

async fn fetch<R>(retriever: &R, address: &str, cancel: &CancellationToken) -> Result<String, NilaOidcError>
where
    R: DocumentRetriever + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(NilaOidcError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NilaOidcError::Cancelled),
        result = retriever.get_document(address, cancel) => result,
    }
}
