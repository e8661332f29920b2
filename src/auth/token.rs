//! Token lifecycle — issuance, validation, revocation.
//!
//! The email address never enters a token in clear: claims carry a
//! tenant-scoped HMAC-SHA256 pseudonym, so the same email under two tenants
//! cannot be correlated and the original cannot be recovered. Revocation is
//! a `revoked:<jti>` entry in the shared store that lives exactly as long
//! as the token itself would have.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::{TokenClaims, UserRole};
use crate::store::KvStore;

type HmacSha256 = Hmac<Sha256>;

/// Why a token failed verification. All map to HTTP 401 at the edge.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
    #[error("token has been revoked")]
    Revoked,
}

/// Signing secret with a redacted `Debug` so it can never leak into logs.
#[derive(Clone)]
pub struct SigningSecret(SecretString);

impl SigningSecret {
    pub fn new(secret: String) -> anyhow::Result<Self> {
        anyhow::ensure!(!secret.is_empty(), "signing secret must not be empty");
        Ok(Self(SecretString::from(secret)))
    }

    fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningSecret([REDACTED, {} chars])", self.expose().len())
    }
}

/// Resolve the signing secret at startup.
///
/// Order: secret store (when `secret_store_url` is set), then the
/// environment variable. In development a missing secret falls back to an
/// insecure default with a loud warning; anywhere else it is fatal.
pub async fn resolve_signing_secret(
    auth: &AuthConfig,
    development: bool,
) -> anyhow::Result<SigningSecret> {
    if let Some(url) = &auth.secret_store_url {
        let token = std::env::var(&auth.secret_store_token_env).map_err(|_| {
            anyhow::anyhow!(
                "secret store configured but `{}` is not set",
                auth.secret_store_token_env
            )
        })?;
        let secret = fetch_secret_from_store(url, &token).await?;
        return SigningSecret::new(secret);
    }

    match std::env::var(&auth.signing_secret_env) {
        Ok(secret) if !secret.is_empty() => SigningSecret::new(secret),
        _ if development => {
            warn!(
                env_var = %auth.signing_secret_env,
                "signing secret not set — using the insecure development default"
            );
            SigningSecret::new("insecure-dev-secret-do-not-deploy".to_string())
        }
        _ => anyhow::bail!(
            "signing secret unavailable: set `{}` or configure a secret store",
            auth.signing_secret_env
        ),
    }
}

/// `GET <url>` with an `X-Vault-Token` header; expects a KV-v2 shaped body
/// (`data.data.signing_secret`).
async fn fetch_secret_from_store(url: &str, token: &str) -> anyhow::Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build reqwest client");

    let response = client
        .get(url)
        .header("X-Vault-Token", token)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("secret store request failed: {e}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "secret store returned HTTP {}",
        response.status()
    );

    let body: serde_json::Value = response.json().await?;
    body.pointer("/data/data/signing_secret")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("secret store response missing data.data.signing_secret"))
}

/// Tenant-scoped pseudonym: HMAC-SHA256 of the lowercased email under the
/// key `secret:tenant_id`, truncated to 32 hex chars.
pub fn pseudonymize_email(secret: &SigningSecret, email: &str, tenant_id: &str) -> String {
    let key = format!("{}:{}", secret.expose(), tenant_id);
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(email.to_lowercase().as_bytes());
    let digest = mac.finalize().into_bytes();
    hex::encode(digest)[..32].to_string()
}

/// Issues, validates, and revokes signed tokens. Algorithm and key are fixed
/// at process start; key rotation is out of scope.
pub struct TokenAuthority {
    secret: SigningSecret,
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    key_id: String,
    default_lifetime_minutes: i64,
    max_lifetime_minutes: i64,
}

impl TokenAuthority {
    pub fn new(auth: &AuthConfig, secret: SigningSecret) -> anyhow::Result<Self> {
        let algorithm = match auth.algorithm.as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => anyhow::bail!("unsupported signing algorithm `{other}`"),
        };

        let encoding = EncodingKey::from_secret(secret.expose().as_bytes());
        let decoding = DecodingKey::from_secret(secret.expose().as_bytes());

        Ok(Self {
            secret,
            algorithm,
            encoding,
            decoding,
            key_id: auth.key_id.clone(),
            default_lifetime_minutes: auth.token_lifetime_minutes,
            max_lifetime_minutes: auth.max_token_lifetime_minutes,
        })
    }

    pub fn default_lifetime_minutes(&self) -> i64 {
        self.default_lifetime_minutes
    }

    /// Issue a signed token. The requested lifetime is capped at the
    /// configured maximum; `iat = nbf = now`.
    pub fn issue(
        &self,
        user_id: &str,
        tenant_id: &str,
        role: UserRole,
        email: &str,
        lifetime_minutes: Option<i64>,
    ) -> anyhow::Result<(String, TokenClaims)> {
        let lifetime = lifetime_minutes
            .unwrap_or(self.default_lifetime_minutes)
            .min(self.max_lifetime_minutes);
        let now = Utc::now().timestamp();

        let claims = TokenClaims {
            sub: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            role,
            email_hash: pseudonymize_email(&self.secret, email, tenant_id),
            exp: now + lifetime * 60,
            nbf: now,
            iat: now,
            kid: self.key_id.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.key_id.clone());
        let token = encode(&header, &claims, &self.encoding)?;

        info!(
            user_id,
            tenant_id,
            role = %role,
            exp = claims.exp,
            jti = %claims.jti,
            "token issued"
        );
        Ok((token, claims))
    }

    /// Verify signature, expiry, and not-before. Failures collapse into the
    /// three externally-meaningful kinds.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_nbf = true;

        match decode::<TokenClaims>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => {
                use jsonwebtoken::errors::ErrorKind;
                let kind = match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::Expired,
                    ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                    _ => AuthError::Malformed,
                };
                warn!(error = %e, "token validation failed");
                Err(kind)
            }
        }
    }

    /// Revoke by writing `revoked:<jti>` with TTL = remaining token lifetime
    /// (at least one second, so even an about-to-expire token is covered).
    pub async fn revoke(&self, store: &KvStore, claims: &TokenClaims) {
        let remaining = (claims.exp - Utc::now().timestamp()).max(1) as u64;
        store
            .set_ex(
                &revocation_key(&claims.jti),
                "1",
                Duration::from_secs(remaining),
            )
            .await;
        info!(user_id = %claims.sub, jti = %claims.jti, "token revoked");
    }

    /// Decode plus revocation check.
    pub async fn verify(&self, store: &KvStore, token: &str) -> Result<TokenClaims, AuthError> {
        let claims = self.decode(token)?;
        if store.exists(&revocation_key(&claims.jti)).await {
            return Err(AuthError::Revoked);
        }
        Ok(claims)
    }
}

fn revocation_key(jti: &str) -> String {
    format!("revoked:{jti}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    fn authority() -> TokenAuthority {
        authority_with_secret("test-signing-secret")
    }

    fn authority_with_secret(secret: &str) -> TokenAuthority {
        let auth = AuthConfig::default();
        TokenAuthority::new(&auth, SigningSecret::new(secret.to_string()).unwrap()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Issuance
    // -----------------------------------------------------------------------

    #[test]
    fn issues_a_decodable_token_with_expected_claims() {
        let authority = authority();
        let (token, claims) = authority
            .issue("user-123", "tenant-456", UserRole::Analyst, "analyst@test.com", None)
            .unwrap();

        assert!(token.len() > 50);
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.tenant_id, "tenant-456");
        assert_eq!(claims.role, UserRole::Analyst);
        assert!(!claims.jti.is_empty());
        assert_eq!(claims.kid, "gateway-key-1");
        assert!(claims.exp > Utc::now().timestamp());
        assert!(claims.nbf <= Utc::now().timestamp());
    }

    #[test]
    fn email_is_pseudonymized() {
        let (_, claims) = authority()
            .issue("u1", "t1", UserRole::Viewer, "real.email@example.com", None)
            .unwrap();

        assert!(!claims.email_hash.contains("real.email@example.com"));
        assert!(!claims.email_hash.contains('@'));
        assert_eq!(claims.email_hash.len(), 32);
        assert!(claims.email_hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn pseudonym_differs_across_tenants_for_same_email() {
        let authority = authority();
        let (_, a) = authority
            .issue("u1", "tenant-A", UserRole::Analyst, "same@email.com", None)
            .unwrap();
        let (_, b) = authority
            .issue("u1", "tenant-B", UserRole::Analyst, "same@email.com", None)
            .unwrap();
        assert_ne!(a.email_hash, b.email_hash);
    }

    #[test]
    fn pseudonym_is_stable_for_same_email_and_tenant() {
        let secret = SigningSecret::new("s".into()).unwrap();
        let a = pseudonymize_email(&secret, "User@Example.com", "t1");
        let b = pseudonymize_email(&secret, "user@example.com", "t1");
        assert_eq!(a, b, "pseudonym must be case-insensitive on the email");
    }

    #[test]
    fn raw_email_never_appears_in_the_token_body() {
        let (token, _) = authority()
            .issue("u1", "t1", UserRole::Viewer, "leaky@example.com", None)
            .unwrap();
        // The pseudonym replaced the email before encoding, so the raw
        // address cannot appear anywhere in the compact form.
        assert!(!token.contains("leaky"));
    }

    #[test]
    fn requested_lifetime_is_respected() {
        let (_, claims) = authority()
            .issue("u", "t", UserRole::Viewer, "v@t.com", Some(30))
            .unwrap();
        let expected = Utc::now().timestamp() + 30 * 60;
        assert!((claims.exp - expected).abs() < 5);
    }

    #[test]
    fn lifetime_is_capped_at_configured_maximum() {
        let (_, claims) = authority()
            .issue("u", "t", UserRole::Admin, "a@t.com", Some(99_999))
            .unwrap();
        let max_exp = Utc::now().timestamp() + 1_440 * 60;
        assert!(claims.exp <= max_exp + 5);
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    #[test]
    fn decode_round_trips_claims() {
        let authority = authority();
        let (token, original) = authority
            .issue("user-xyz", "tenant-abc", UserRole::DataScientist, "ds@test.com", None)
            .unwrap();
        let decoded = authority.decode(&token).unwrap();
        assert_eq!(decoded.sub, original.sub);
        assert_eq!(decoded.tenant_id, original.tenant_id);
        assert_eq!(decoded.role, original.role);
        assert_eq!(decoded.jti, original.jti);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let authority = authority();
        let (token, _) = authority
            .issue("u", "t", UserRole::Viewer, "v@t.com", None)
            .unwrap();
        let tampered = format!("{}XXXXX", &token[..token.len() - 5]);
        assert!(matches!(
            authority.decode(&tampered),
            Err(AuthError::InvalidSignature) | Err(AuthError::Malformed)
        ));
    }

    #[test]
    fn token_signed_with_different_secret_fails_signature_check() {
        let (token, _) = authority_with_secret("secret-one")
            .issue("u", "t", UserRole::Viewer, "v@t.com", None)
            .unwrap();
        assert!(matches!(
            authority_with_secret("secret-two").decode(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_token_is_malformed() {
        assert!(matches!(
            authority().decode("not.a.jwt.token"),
            Err(AuthError::Malformed)
        ));
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let authority = authority();
        // Hand-craft claims that expired a minute ago, signed with the
        // same key the authority verifies with.
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: "u".into(),
            tenant_id: "t".into(),
            role: UserRole::Viewer,
            email_hash: "0".repeat(32),
            exp: now - 60,
            nbf: now - 3_600,
            iat: now - 3_600,
            kid: "gateway-key-1".into(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-signing-secret"),
        )
        .unwrap();

        assert!(matches!(authority.decode(&token), Err(AuthError::Expired)));
    }

    // -----------------------------------------------------------------------
    // Revocation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn verify_accepts_fresh_token_and_rejects_after_revoke() {
        let authority = authority();
        let store = KvStore::memory();
        let (token, claims) = authority
            .issue("u", "t", UserRole::Analyst, "a@t.com", None)
            .unwrap();

        assert!(authority.verify(&store, &token).await.is_ok());

        authority.revoke(&store, &claims).await;

        assert!(matches!(
            authority.verify(&store, &token).await,
            Err(AuthError::Revoked)
        ));
    }

    #[tokio::test]
    async fn revocation_of_one_token_does_not_affect_another() {
        let authority = authority();
        let store = KvStore::memory();
        let (token_a, claims_a) = authority
            .issue("u", "t", UserRole::Analyst, "a@t.com", None)
            .unwrap();
        let (token_b, _) = authority
            .issue("u", "t", UserRole::Analyst, "a@t.com", None)
            .unwrap();

        authority.revoke(&store, &claims_a).await;

        assert!(matches!(
            authority.verify(&store, &token_a).await,
            Err(AuthError::Revoked)
        ));
        assert!(authority.verify(&store, &token_b).await.is_ok());
    }

    // -----------------------------------------------------------------------
    // Secret handling
    // -----------------------------------------------------------------------

    #[test]
    fn signing_secret_debug_is_redacted() {
        let secret = SigningSecret::new("super-secret-value".into()).unwrap();
        let debug = format!("{secret:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(SigningSecret::new(String::new()).is_err());
    }
}
