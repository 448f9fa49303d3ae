//! Bearer-token authentication (spec §1 "out of scope: user registration/
//! login plumbing", §6 "authenticated bearer tokens except where noted").
//!
//! The core's contract is "principal.user_id == resource.user_id" (spec §9
//! "Implicit ownership checks") — it does not issue or verify sessions.
//! The bearer token *is* the `user_id`: a real deployment sits this behind
//! an API gateway or reverse proxy that terminates the user's login
//! session and forwards a verified subject identifier as the bearer
//! token. There is no admin path; every extraction yields exactly one
//! user's principal.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or((StatusCode::UNAUTHORIZED, "missing Authorization header"))?;

        let value = header
            .to_str()
            .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid Authorization header"))?;

        let token = value
            .strip_prefix("Bearer ")
            .ok_or((StatusCode::UNAUTHORIZED, "expected a Bearer token"))?
            .trim();

        if token.is_empty() {
            return Err((StatusCode::UNAUTHORIZED, "empty bearer token"));
        }

        Ok(Principal {
            user_id: token.to_string(),
        })
    }
}

/// Extracted from the `X-Internal-Secret` header on `/internal/*` routes
/// (SPEC_FULL §2 supplemented feature 3): a shared secret, not a user
/// bearer token, gating the seam an out-of-scope payment webhook would
/// call.
pub struct InternalSecret;

impl InternalSecret {
    pub fn verify(parts: &Parts, expected: &str) -> Result<(), (StatusCode, &'static str)> {
        let header = parts
            .headers
            .get("x-internal-secret")
            .ok_or((StatusCode::UNAUTHORIZED, "missing X-Internal-Secret header"))?;
        let value = header
            .to_str()
            .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid X-Internal-Secret header"))?;
        if value != expected {
            return Err((StatusCode::UNAUTHORIZED, "invalid internal secret"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<Principal, (StatusCode, &'static str)> {
        let (mut parts, _) = req.into_parts();
        Principal::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_user_id_from_bearer_token() {
        let req = Request::builder()
            .header("authorization", "Bearer user_42")
            .body(())
            .unwrap();
        let principal = extract(req).await.unwrap();
        assert_eq!(principal.user_id, "user_42");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let req = Request::builder().body(()).unwrap();
        let err = extract(req).await.unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_unauthorized() {
        let req = Request::builder()
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap();
        let err = extract(req).await.unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }
}
