// src/signing.rs

use crate::error::NilaOidcError;
use crate::model::JsonWebKey;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD, URL_SAFE_NO_PAD};
use base64::engine::{DecodePaddingMode, Engine};
use jsonwebtoken::DecodingKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::debug;

/// OID of `rsaEncryption` in a SubjectPublicKeyInfo.
const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";

/// Largest RSA modulus accepted from a JWK, in bits.
pub const MAX_RSA_MODULUS_BITS: usize = 16384;

// JWK components are base64url; some providers pad them anyway.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Verification-ready key material resolved from a JWK.
#[derive(Debug, Clone, PartialEq)]
pub enum SigningToken {
    /// Built from a JWK carrying exactly one `x5c` certificate.
    Certificate(X509SigningToken),
    /// Built from a JWK carrying a `kid` and RSA `n`/`e`.
    NamedKey(NamedKeySigningToken),
}

impl SigningToken {
    pub fn as_certificate(&self) -> Option<&X509SigningToken> {
        match self {
            SigningToken::Certificate(cert) => Some(cert),
            SigningToken::NamedKey(_) => None,
        }
    }

    pub fn as_named_key(&self) -> Option<&NamedKeySigningToken> {
        match self {
            SigningToken::NamedKey(named) => Some(named),
            SigningToken::Certificate(_) => None,
        }
    }
}

/// A single parsed X.509 certificate.
///
/// The DER bytes are kept alongside the fields extracted at parse time, so the
/// token owns everything it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509SigningToken {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    serial: String,
    not_before: i64,
    not_after: i64,
    thumbprint: Vec<u8>,
    public_key_algorithm: String,
    subject_public_key_info: Vec<u8>,
    subject_public_key: Vec<u8>,
}

impl X509SigningToken {
    /// Parses a DER-encoded certificate.
    pub fn from_der(der: Vec<u8>) -> Result<Self, NilaOidcError> {
        let (_, cert) =
            x509_parser::parse_x509_certificate(&der).map_err(|e| NilaOidcError::InvalidCertificate(e.to_string()))?;

        let spki = cert.public_key();
        let subject = cert.subject().to_string();
        let issuer = cert.issuer().to_string();
        let serial = cert.tbs_certificate.raw_serial_as_string();
        let not_before = cert.validity().not_before.timestamp();
        let not_after = cert.validity().not_after.timestamp();
        let public_key_algorithm = spki.algorithm.algorithm.to_id_string();
        let subject_public_key_info = spki.raw.to_vec();
        let subject_public_key = spki.subject_public_key.data.to_vec();

        Ok(Self {
            thumbprint: Sha256::digest(&der).to_vec(),
            der,
            subject,
            issuer,
            serial,
            not_before,
            not_after,
            public_key_algorithm,
            subject_public_key_info,
            subject_public_key,
        })
    }

    /// Decodes one standard-base64 `x5c` entry and parses it.
    ///
    /// Whitespace anywhere in the input is ignored, so line-wrapped values decode.
    pub fn from_base64(encoded: &str) -> Result<Self, NilaOidcError> {
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        Self::from_der(STANDARD.decode(compact)?)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Serial number as colon-separated hex.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Start of the validity window, in unix seconds.
    pub fn not_before(&self) -> i64 {
        self.not_before
    }

    /// End of the validity window, in unix seconds.
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    /// SHA-256 over the DER encoding.
    pub fn thumbprint(&self) -> &[u8] {
        &self.thumbprint
    }

    /// Dotted OID of the subject public key algorithm.
    pub fn public_key_algorithm(&self) -> &str {
        &self.public_key_algorithm
    }

    pub fn subject_public_key_info(&self) -> &[u8] {
        &self.subject_public_key_info
    }

    /// A `jsonwebtoken` key for the certificate's public key. RSA certificates only.
    pub fn decoding_key(&self) -> Option<DecodingKey> {
        if self.public_key_algorithm != RSA_ENCRYPTION_OID {
            return None;
        }
        // For RSA the SPKI bit string holds the PKCS#1 RSAPublicKey.
        Some(DecodingKey::from_rsa_der(&self.subject_public_key))
    }
}

/// Keys published under a single key id.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedKeySigningToken {
    key_id: String,
    keys: Vec<SecurityKey>,
}

impl NamedKeySigningToken {
    pub fn new(key_id: impl Into<String>, keys: Vec<SecurityKey>) -> Self {
        Self {
            key_id: key_id.into(),
            keys,
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn keys(&self) -> &[SecurityKey] {
        &self.keys
    }
}

/// A raw asymmetric public key.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityKey {
    Rsa(RsaSecurityKey),
}

impl SecurityKey {
    pub fn decoding_key(&self) -> Result<DecodingKey, NilaOidcError> {
        match self {
            SecurityKey::Rsa(rsa) => rsa.decoding_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaSecurityKey {
    key: RsaPublicKey,
}

impl RsaSecurityKey {
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Builds a key from the base64url `n` and `e` of a JWK.
    pub fn from_components(n: &str, e: &str) -> Result<Self, NilaOidcError> {
        let modulus = URL_SAFE_LENIENT.decode(n.trim())?;
        let exponent = URL_SAFE_LENIENT.decode(e.trim())?;
        let key = RsaPublicKey::new_with_max_size(
            BigUint::from_bytes_be(&modulus),
            BigUint::from_bytes_be(&exponent),
            MAX_RSA_MODULUS_BITS,
        )
        .map_err(|e| NilaOidcError::InvalidKeyFormat(format!("invalid RSA parameters: {e}")))?;
        Ok(Self { key })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.key
    }

    pub fn modulus(&self) -> Vec<u8> {
        self.key.n().to_bytes_be()
    }

    pub fn exponent(&self) -> Vec<u8> {
        self.key.e().to_bytes_be()
    }

    pub fn key_size_bits(&self) -> usize {
        self.key.size() * 8
    }

    pub fn decoding_key(&self) -> Result<DecodingKey, NilaOidcError> {
        let n = URL_SAFE_NO_PAD.encode(self.modulus());
        let e = URL_SAFE_NO_PAD.encode(self.exponent());
        Ok(DecodingKey::from_rsa_components(&n, &e)?)
    }
}

/// Converts one JWK into the signing tokens it supports.
///
/// Keys whose `use` is not signing yield nothing. A single-certificate `x5c`
/// yields a certificate token; a `kid` with RSA components yields a named
/// token. Both may come from the same JWK. Chains of any other length are not
/// converted.
pub fn signing_tokens_from_jwk(jwk: &JsonWebKey) -> Result<Vec<SigningToken>, NilaOidcError> {
    let mut tokens = Vec::new();

    if !jwk.is_signing_key() {
        debug!("Skipping JWK {:?} with use {:?}", jwk.kid, jwk.use_purpose);
        return Ok(tokens);
    }

    match jwk.x5c.as_slice() {
        [single] => tokens.push(SigningToken::Certificate(X509SigningToken::from_base64(single)?)),
        [] => {}
        chain => debug!("Not converting x5c chain of {} certificates for JWK {:?}", chain.len(), jwk.kid),
    }

    if let (Some(kid), Some((n, e))) = (jwk.key_id(), jwk.rsa_components()) {
        let key = RsaSecurityKey::from_components(n, e)?;
        tokens.push(SigningToken::NamedKey(NamedKeySigningToken::new(kid, vec![SecurityKey::Rsa(key)])));
    }

    Ok(tokens)
}
