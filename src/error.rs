// src/error.rs

use base64::DecodeError;
use thiserror::Error;

/// The primary error type for the `nila-oidc-trust` library.
#[derive(Debug, Error)]
pub enum NilaOidcError {
    /// A required argument was missing, blank, or otherwise unusable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An error occurred during an HTTP request.
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A document could not be retrieved for a reason other than a raw HTTP failure.
    #[error("Document retrieval failed: {0}")]
    Transport(String),

    /// The caller cancelled the operation while a document fetch was pending.
    #[error("The operation was cancelled")]
    Cancelled,

    /// A discovery document or key set was not valid JSON of the expected shape.
    #[error("Invalid document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// An error occurred while decoding a Base64 or Base64URL encoded string.
    #[error("Base64 decoding error: {0}")]
    Base64DecodeError(#[from] DecodeError),

    /// An `x5c` entry did not contain a parseable X.509 certificate.
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// A cryptographic key (e.g. the RSA modulus/exponent of a JWK) is malformed or invalid.
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Errors originating from the `jsonwebtoken` crate when building decoding keys.
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}
