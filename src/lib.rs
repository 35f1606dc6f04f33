// src/lib.rs

pub mod config;
pub mod configuration;
pub mod error;
pub mod fetcher;
pub mod identity;
pub mod model;
pub mod retriever;
pub mod signing;
pub mod validation_result;

/// The public prelude for the `nila-oidc-trust` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::config::{RetrieverConfig, RetrieverConfigBuilder};
    pub use crate::configuration::SigningConfiguration;
    pub use crate::error::NilaOidcError;
    pub use crate::fetcher::{DocumentRetriever, GenericDocumentRetriever, HttpDocumentRetriever};
    pub use crate::identity::{
        CallContext, Claim, ClaimProvider, ClaimValueType, ClaimsIdentity, IdentityFactory, SecurityToken,
        TokenValidationParameters,
    };
    pub use crate::model::{JsonWebKey, JsonWebKeySet, OpenIdConnectDiscovery};
    pub use crate::retriever::{ConfigurationRetriever, OpenIdConnectConfigurationRetriever};
    pub use crate::signing::{NamedKeySigningToken, RsaSecurityKey, SecurityKey, SigningToken, X509SigningToken};
    pub use crate::validation_result::TokenValidationResult;

    pub use tokio_util::sync::CancellationToken;
}
