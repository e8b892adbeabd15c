// Authentication middleware for protected routes
// Validates bearer tokens and injects AuthenticatedUser into request extensions

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, errors::Error as TokenError, Algorithm, DecodingKey, Validation};
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{auth::PrincipalClaims, user::UserRole},
};

/// Validate a bearer token issued by the session provider and return its claims
pub fn decode_bearer_claims(token: &str) -> Result<PrincipalClaims, TokenError> {
    let config = crate::app_config::config();

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.jwt_audience.clone()]);
    validation.set_issuer(&[config.jwt_issuer.clone()]);
    validation.validate_exp = true;
    validation.validate_nbf = false;
    validation.leeway = 0;

    let token_data = decode::<PrincipalClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

/// Build the request-scoped identity from validated claims.
/// Returns None when the subject is not a UUID or the role is unknown.
fn principal_from_claims(claims: PrincipalClaims) -> Option<AuthenticatedUser> {
    let user_id = Uuid::parse_str(&claims.sub).ok()?;
    let role = UserRole::from_str(&claims.role).ok()?;

    Some(AuthenticatedUser {
        user_id,
        role,
        name: claims.name,
    })
}

/// Extract the bearer token from request headers, if present
fn bearer_token(parts: &axum::http::HeaderMap) -> Option<&str> {
    parts
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Middleware function that validates bearer tokens and adds AuthenticatedUser to extensions
pub async fn auth_middleware(
    State(_app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Some(token) => token,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "success": false,
                    "message": "Missing or invalid authorization header"
                })),
            )
                .into_response();
        },
    };

    match decode_bearer_claims(token) {
        Ok(claims) => {
            let auth_user = match principal_from_claims(claims) {
                Some(user) => user,
                None => {
                    return (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({
                            "success": false,
                            "message": "Invalid or expired token"
                        })),
                    )
                        .into_response();
                },
            };

            // Add AuthenticatedUser to request extensions
            request.extensions_mut().insert(auth_user);

            // Continue to the next handler
            next.run(request).await
        },
        Err(e) => {
            tracing::warn!("Token validation failed: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "success": false,
                    "message": "Invalid or expired token"
                })),
            )
                .into_response()
        },
    }
}

/// Extractor for AuthenticatedUser from request extensions
/// This allows handlers to use AuthenticatedUser directly in their parameters
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "success": false,
                        "message": "Authentication required"
                    })),
                )
            })
    }
}

/// Optional identity for public endpoints that behave differently when a
/// caller is signed in. Never rejects; invalid tokens yield None.
pub struct OptionalUser(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Prefer the identity placed by auth_middleware when the route is layered
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(OptionalUser(Some(user.clone())));
        }

        let user = bearer_token(&parts.headers)
            .and_then(|token| decode_bearer_claims(token).ok())
            .and_then(principal_from_claims);

        Ok(OptionalUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn sign(claims: &PrincipalClaims) -> String {
        let config = crate::app_config::config();
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims_for(sub: &str, role: &str, expires_in: i64) -> PrincipalClaims {
        let config = crate::app_config::config();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        PrincipalClaims {
            sub: sub.to_string(),
            role: role.to_string(),
            name: "Tester".to_string(),
            aud: config.jwt_audience.clone(),
            iss: config.jwt_issuer.clone(),
            iat: now,
            exp: (now as i64 + expires_in) as u64,
        }
    }

    #[test]
    fn valid_token_round_trips() {
        let id = Uuid::new_v4();
        let token = sign(&claims_for(&id.to_string(), "company", 3600));

        let claims = decode_bearer_claims(&token).unwrap();
        let user = principal_from_claims(claims).unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.role, UserRole::Company);
        assert!(!user.is_admin());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign(&claims_for(&Uuid::new_v4().to_string(), "driver", -60));
        assert!(decode_bearer_claims(&token).is_err());
    }

    #[test]
    fn garbage_subject_yields_no_principal() {
        let claims = claims_for("not-a-uuid", "driver", 3600);
        assert!(principal_from_claims(claims).is_none());
    }

    #[test]
    fn unknown_role_yields_no_principal() {
        let claims = claims_for(&Uuid::new_v4().to_string(), "superuser", 3600);
        assert!(principal_from_claims(claims).is_none());
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let mut claims = claims_for(&Uuid::new_v4().to_string(), "admin", 3600);
        claims.aud = "someone-else.example.com".to_string();
        let token = sign(&claims);
        assert!(decode_bearer_claims(&token).is_err());
    }
}
