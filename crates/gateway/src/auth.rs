//! Bearer token handling shared by the WebSocket upgrade and the REST routes.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, HeaderMap},
};
use campus_config::AuthConfig;
use campus_messaging::Session;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,        // Subject (user ID)
    pub company_id: String, // Tenant scope of the user
    pub exp: usize,         // Expiration time
    pub iat: usize,         // Issued at
    pub iss: String,        // Issuer
    pub aud: String,        // Audience
}

/// Issues and validates HS256 tokens
#[derive(Clone)]
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
}

impl TokenAuthority {
    pub fn new(secret: &str, issuer: String, audience: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.issuer.clone(),
            config.audience.clone(),
        )
    }

    /// Generate a token for `session`, valid for `ttl`.
    pub fn issue(&self, session: &Session, ttl: Duration) -> GatewayResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| GatewayError::InternalError("system time error".to_string()))?;

        let expires = now
            .checked_add(ttl)
            .ok_or_else(|| GatewayError::InvalidRequest("token lifetime too long".to_string()))?;

        let claims = Claims {
            sub: session.user_id.to_string(),
            company_id: session.company_id.to_string(),
            exp: expires.as_secs() as usize,
            iat: now.as_secs() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| GatewayError::InternalError(format!("failed to encode token: {e}")))
    }

    /// Validate a token and resolve the session it authenticates.
    pub fn verify(&self, token: &str) -> GatewayResult<Session> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| GatewayError::AuthenticationFailed(format!("invalid token: {e}")))?
            .claims;

        let user_id = parse_identity(&claims.sub, "subject")?;
        let company_id = parse_identity(&claims.company_id, "company")?;

        Ok(Session {
            user_id,
            company_id,
        })
    }
}

fn parse_identity(raw: &str, what: &str) -> GatewayResult<Uuid> {
    match Uuid::parse_str(raw) {
        Ok(id) if !id.is_nil() => Ok(id),
        _ => Err(GatewayError::AuthenticationFailed(format!(
            "token {what} is not a valid id"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Token from `Authorization: Bearer`, falling back to the `token` query
/// parameter browsers use for WebSocket upgrades.
fn request_token(parts: &Parts) -> Option<String> {
    bearer_token(&parts.headers).or_else(|| {
        Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(query)| query.token)
            .filter(|token| !token.is_empty())
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// The authenticated caller of a request
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Session);

#[async_trait]
impl FromRequestParts<Arc<GatewayState>> for AuthUser {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState>,
    ) -> Result<Self, Self::Rejection> {
        let token = request_token(parts).ok_or_else(|| {
            GatewayError::AuthenticationFailed("Missing authentication token".to_string())
        })?;

        state.tokens.verify(&token).map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn authority() -> TokenAuthority {
        TokenAuthority::new("test-secret", "campus".into(), "campus-users".into())
    }

    fn session() -> Session {
        Session {
            user_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn issued_tokens_verify_back_to_the_session() {
        let authority = authority();
        let session = session();

        let token = authority.issue(&session, Duration::from_secs(60)).unwrap();
        assert_eq!(authority.verify(&token).unwrap(), session);
    }

    #[test]
    fn rejects_foreign_secret_and_audience() {
        let session = session();
        let token = authority().issue(&session, Duration::from_secs(60)).unwrap();

        let other_secret = TokenAuthority::new("other", "campus".into(), "campus-users".into());
        assert!(matches!(
            other_secret.verify(&token),
            Err(GatewayError::AuthenticationFailed(_))
        ));

        let other_audience = TokenAuthority::new("test-secret", "campus".into(), "admins".into());
        assert!(other_audience.verify(&token).is_err());
    }

    #[test]
    fn rejects_nil_identities() {
        let authority = authority();
        let session = Session {
            user_id: Uuid::nil(),
            company_id: Uuid::new_v4(),
        };

        let token = authority.issue(&session, Duration::from_secs(60)).unwrap();
        assert!(authority.verify(&token).is_err());
    }

    #[test]
    fn token_comes_from_header_or_query() {
        let (parts, _) = Request::builder()
            .uri("/ws?token=from-query")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(request_token(&parts).as_deref(), Some("from-query"));

        let (parts, _) = Request::builder()
            .uri("/ws?token=from-query")
            .header(header::AUTHORIZATION, "Bearer from-header")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(request_token(&parts).as_deref(), Some("from-header"));

        let (parts, _) = Request::builder()
            .uri("/ws")
            .header(header::AUTHORIZATION, "Basic abc")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(request_token(&parts), None);
    }

    #[test]
    fn absurd_lifetime_is_rejected() {
        let error = authority().issue(&session(), Duration::MAX).unwrap_err();
        assert!(matches!(error, GatewayError::InvalidRequest(_)));
    }
}
