use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::User,
    repository::RepositoryState,
    roles::{Role, RoleSet},
};

/// Name of the cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "jwt";

/// Claims
///
/// The payload of a session token (HS256, signed with `AppConfig::jwt_secret`).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: Uuid,
    /// Roles at issue time. Informational only; authorization always re-reads the
    /// current role set from the store.
    pub roles: Vec<Role>,
    pub iat: usize,
    pub exp: usize,
}

/// issue_token
///
/// Signs a token for `user` valid for `config.jwt_ttl_secs`.
pub fn issue_token(config: &AppConfig, user: &User) -> Result<String, ApiError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: user.id,
        roles: user.roles.to_vec(),
        iat: now,
        exp: now + config.jwt_ttl_secs as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|err| ApiError::Internal(format!("token signing failed: {err}")))
}

/// Decodes and validates a token, including its expiry.
pub fn decode_token(config: &AppConfig, token: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => ApiError::unauthorized("Not authorized, token expired"),
        _ => ApiError::unauthorized("Not authorized, token failed"),
    })
}

/// The `jwt` cookie set on register and login. `Secure` only outside local mode so the
/// cookie still works over plain http during development.
pub fn token_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(config.env == Env::Production)
        .build()
}

/// Returns the jar with the session cookie replaced by an expired removal cookie.
pub fn clear_token_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(TOKEN_COOKIE).path("/"))
}

/// Bearer header first, then the `jwt` cookie.
fn bearer_or_cookie(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(&parts.headers)
            .get(TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// AuthUser
///
/// The resolved identity of an authenticated request: the user id and the role set as
/// it is stored *now*, not as it was when the token was issued.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub roles: RoleSet,
}

impl AuthUser {
    async fn resolve(
        token: &str,
        repo: &RepositoryState,
        config: &AppConfig,
    ) -> Result<Self, ApiError> {
        let claims = decode_token(config, token)?;

        // A valid token for a deleted account is rejected like a bad token.
        let user = repo
            .get_user(claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Not authorized, user not found"))?;

        Ok(AuthUser {
            id: user.id,
            roles: user.roles,
        })
    }
}

/// Required authentication: rejects with 401 when no valid credential is present.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = bearer_or_cookie(parts)
            .ok_or_else(|| ApiError::unauthorized("Not authorized, no token"))?;

        AuthUser::resolve(&token, &repo, &config).await
    }
}

/// Optional authentication for public reads. A missing or unusable credential yields
/// `None` so the caller is treated as anonymous instead of being rejected.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let Some(token) = bearer_or_cookie(parts) else {
            return Ok(None);
        };
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        match AuthUser::resolve(&token, &repo, &config).await {
            Ok(user) => Ok(Some(user)),
            Err(ApiError::Unauthorized(reason)) => {
                tracing::debug!("ignoring credential on public route: {}", reason);
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }
}
