use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::{
    AppState,
    error::{AppError, AppResult},
};

pub const ADMIN_COOKIE: &str = "admin_token";

/// Proof that the request comes from the site admin.
#[derive(Clone, Copy, Debug)]
pub struct AdminActor;

impl FromRequestParts<Arc<AppState>> for AdminActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let expected = state.config.admin_token.trim();
        if expected.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let presented = bearer_token(&parts.headers).map(str::to_string).or_else(|| {
            CookieJar::from_headers(&parts.headers).get(ADMIN_COOKIE).map(|c| c.value().to_string())
        });

        match presented {
            Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(AdminActor),
            _ => {
                tracing::debug!("rejected admin request");
                Err(AppError::Unauthorized)
            },
        }
    }
}

/// Checks `Authorization: Bearer <secret>` when a refresh secret is configured.
pub fn check_refresh_secret(secret: Option<&str>, headers: &HeaderMap) -> AppResult<()> {
    let Some(secret) = secret else {
        return Ok(());
    };
    match bearer_token(headers) {
        Some(token) if constant_time_eq(token.as_bytes(), secret.as_bytes()) => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn refresh_secret_is_optional() {
        assert!(check_refresh_secret(None, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn refresh_secret_must_match() {
        assert!(check_refresh_secret(Some("s3cret"), &headers("Bearer s3cret")).is_ok());
        assert!(check_refresh_secret(Some("s3cret"), &headers("Bearer nope")).is_err());
        assert!(check_refresh_secret(Some("s3cret"), &headers("s3cret")).is_err());
        assert!(check_refresh_secret(Some("s3cret"), &HeaderMap::new()).is_err());
    }

    #[test]
    fn refresh_secret_is_compared_exactly() {
        assert!(check_refresh_secret(Some("s3cret"), &headers("Bearer  s3cret")).is_err());
        assert!(check_refresh_secret(Some("s3cret"), &headers("Bearer s3cret x")).is_err());
    }

    #[test]
    fn constant_time_compare() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
