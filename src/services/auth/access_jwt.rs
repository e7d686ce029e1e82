use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use thiserror::Error;

use crate::services::auth::claims::ClaimSet;

pub const DEFAULT_CREDENTIAL_COOKIE: &str = "access_token";

/// Errors returned while locating and verifying the access token.
///
/// Every variant is terminal for the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("no bearer token or credential cookie")]
    MissingCredential,
    #[error("malformed credential: {0}")]
    MalformedCredential(&'static str),
    #[error("invalid signature or expired token: {0}")]
    InvalidSignatureOrExpired(String),
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidToken => Self::MalformedCredential("token is not a compact JWS"),
            ErrorKind::Base64(_) => Self::MalformedCredential("token segment is not base64url"),
            ErrorKind::Json(_) => Self::MalformedCredential("token segment is not JSON"),
            ErrorKind::Utf8(_) => Self::MalformedCredential("token segment is not UTF-8"),
            _ => Self::InvalidSignatureOrExpired(e.to_string()),
        }
    }
}

/// Key material the access tokens are signed with.
#[derive(Clone)]
pub enum VerificationKey {
    /// Ed25519 public key (PKCS#8 / SPKI PEM), EdDSA tokens.
    Ed25519PublicPem(String),
    /// Shared secret, HS256 tokens.
    Hs256Secret(String),
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        match self {
            Self::Ed25519PublicPem(_) => f.write_str("Ed25519PublicPem(..)"),
            Self::Hs256Secret(_) => f.write_str("Hs256Secret(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_seconds: u64,
    pub cookie_name: String,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            leeway_seconds: 60,
            cookie_name: DEFAULT_CREDENTIAL_COOKIE.to_string(),
        }
    }
}

/// Stateless access-token verifier.
///
/// Built once at startup and shared read-only across requests.
#[derive(Clone)]
pub struct AccessTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    cookie_name: String,
}

impl std::fmt::Debug for AccessTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("AccessTokenVerifier")
            .field("validation", &self.validation)
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

impl AccessTokenVerifier {
    pub fn new(key: &VerificationKey, settings: VerifierSettings) -> Result<Self, String> {
        let (decoding_key, algorithm) = match key {
            VerificationKey::Ed25519PublicPem(pem) => (
                DecodingKey::from_ed_pem(pem.as_bytes())
                    .map_err(|e| format!("invalid ed25519 public key pem: {}", e))?,
                Algorithm::EdDSA,
            ),
            VerificationKey::Hs256Secret(secret) => {
                if secret.len() < 32 {
                    return Err("hs256 secret must be at least 32 bytes".to_string());
                }
                (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp"]);
        validation.validate_nbf = true;
        validation.leeway = settings.leeway_seconds;

        if let Some(issuer) = settings.issuer.as_deref() {
            validation.set_issuer(&[issuer]);
        }
        match settings.audience.as_deref() {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            decoding_key,
            validation,
            cookie_name: settings.cookie_name,
        })
    }

    /// Locate the credential on the request and verify it.
    ///
    /// This is the entry-point for the access middleware.
    pub fn verify_request(&self, headers: &HeaderMap) -> Result<ClaimSet, VerificationError> {
        let token = self.credential(headers)?;
        self.verify(token)
    }

    /// `Authorization: Bearer` wins over the credential cookie.
    pub fn credential<'a>(&self, headers: &'a HeaderMap) -> Result<&'a str, VerificationError> {
        if let Some(value) = headers.get(header::AUTHORIZATION) {
            let value = value
                .to_str()
                .map_err(|_| VerificationError::MalformedCredential("authorization header"))?;

            let (scheme, token) = value
                .split_once(' ')
                .ok_or(VerificationError::MalformedCredential("expected bearer scheme"))?;
            if !scheme.eq_ignore_ascii_case("bearer") {
                return Err(VerificationError::MalformedCredential(
                    "expected bearer scheme",
                ));
            }

            let token = token.trim();
            if token.is_empty() {
                return Err(VerificationError::MalformedCredential("empty bearer token"));
            }
            return Ok(token);
        }

        match cookie_value(headers, &self.cookie_name) {
            Some("") => Err(VerificationError::MalformedCredential(
                "empty credential cookie",
            )),
            Some(token) => Ok(token),
            None => Err(VerificationError::MissingCredential),
        }
    }

    /// Verify signature and time-based claims, returning the full claim set.
    ///
    /// `jsonwebtoken::Validation` checks:
    /// - signature (single algorithm per deployment)
    /// - `exp` presence and expiry, `nbf` when present
    /// - `iss` / `aud` when configured
    pub fn verify(&self, token: &str) -> Result<ClaimSet, VerificationError> {
        let data = jsonwebtoken::decode::<ClaimSet>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret-with-at-least-32-bytes!!";

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn sign(claims: serde_json::Value, secret: &str) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn verifier(settings: VerifierSettings) -> AccessTokenVerifier {
        AccessTokenVerifier::new(&VerificationKey::Hs256Secret(SECRET.into()), settings).unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn valid_token_yields_claims() {
        let token = sign(json!({"sub": "u-1", "exp": now() + 300, "jti": "t-1"}), SECRET);
        let claims = verifier(VerifierSettings::default())
            .verify_request(&bearer(&token))
            .unwrap();

        assert_eq!(claims.text("sub"), Some("u-1"));
        assert_eq!(claims.text("jti"), Some("t-1"));
    }

    #[test]
    fn missing_credential() {
        let err = verifier(VerifierSettings::default())
            .verify_request(&HeaderMap::new())
            .unwrap_err();
        assert_eq!(err, VerificationError::MissingCredential);
    }

    #[test]
    fn wrong_scheme_is_malformed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dTpw"));
        let err = verifier(VerifierSettings::default())
            .verify_request(&headers)
            .unwrap_err();
        assert!(matches!(err, VerificationError::MalformedCredential(_)));
    }

    #[test]
    fn unparsable_token_is_malformed() {
        let err = verifier(VerifierSettings::default())
            .verify_request(&bearer("not-a-jwt"))
            .unwrap_err();
        assert!(matches!(err, VerificationError::MalformedCredential(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign(json!({"sub": "u-1", "exp": now() - 3600}), SECRET);
        let err = verifier(VerifierSettings::default())
            .verify_request(&bearer(&token))
            .unwrap_err();
        assert!(matches!(err, VerificationError::InvalidSignatureOrExpired(_)));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = sign(
            json!({"sub": "u-1", "exp": now() + 300}),
            "another-secret-with-at-least-32-bytes",
        );
        let err = verifier(VerifierSettings::default())
            .verify_request(&bearer(&token))
            .unwrap_err();
        assert!(matches!(err, VerificationError::InvalidSignatureOrExpired(_)));
    }

    #[test]
    fn token_without_exp_is_rejected() {
        let token = sign(json!({"sub": "u-1"}), SECRET);
        let err = verifier(VerifierSettings::default())
            .verify_request(&bearer(&token))
            .unwrap_err();
        assert!(matches!(err, VerificationError::InvalidSignatureOrExpired(_)));
    }

    #[test]
    fn issuer_and_audience_are_checked_when_configured() {
        let v = verifier(VerifierSettings {
            issuer: Some("https://idp.example".into()),
            audience: Some("api".into()),
            ..VerifierSettings::default()
        });

        let good = sign(
            json!({"sub": "u-1", "exp": now() + 300, "iss": "https://idp.example", "aud": "api"}),
            SECRET,
        );
        assert!(v.verify_request(&bearer(&good)).is_ok());

        let wrong_aud = sign(
            json!({"sub": "u-1", "exp": now() + 300, "iss": "https://idp.example", "aud": "other"}),
            SECRET,
        );
        assert!(matches!(
            v.verify_request(&bearer(&wrong_aud)),
            Err(VerificationError::InvalidSignatureOrExpired(_))
        ));
    }

    #[test]
    fn audience_is_ignored_when_not_configured() {
        let token = sign(json!({"sub": "u-1", "exp": now() + 300, "aud": "anything"}), SECRET);
        assert!(
            verifier(VerifierSettings::default())
                .verify_request(&bearer(&token))
                .is_ok()
        );
    }

    #[test]
    fn cookie_is_used_when_no_authorization_header() {
        let token = sign(json!({"sub": "u-cookie", "exp": now() + 300}), SECRET);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; access_token={token}")).unwrap(),
        );

        let claims = verifier(VerifierSettings::default())
            .verify_request(&headers)
            .unwrap();
        assert_eq!(claims.text("sub"), Some("u-cookie"));
    }

    #[test]
    fn authorization_header_takes_precedence_over_cookie() {
        let header_token = sign(json!({"sub": "from-header", "exp": now() + 300}), SECRET);
        let cookie_token = sign(json!({"sub": "from-cookie", "exp": now() + 300}), SECRET);
        let mut headers = bearer(&header_token);
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("access_token={cookie_token}")).unwrap(),
        );

        let claims = verifier(VerifierSettings::default())
            .verify_request(&headers)
            .unwrap();
        assert_eq!(claims.text("sub"), Some("from-header"));
    }

    #[test]
    fn empty_cookie_is_malformed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token="));
        let err = verifier(VerifierSettings::default())
            .verify_request(&headers)
            .unwrap_err();
        assert!(matches!(err, VerificationError::MalformedCredential(_)));
    }

    #[test]
    fn short_hs256_secret_is_refused() {
        let err = AccessTokenVerifier::new(
            &VerificationKey::Hs256Secret("short".into()),
            VerifierSettings::default(),
        )
        .unwrap_err();
        assert!(err.contains("32 bytes"));
    }
}
