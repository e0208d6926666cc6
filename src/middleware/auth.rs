use axum::{
    extract::State,
    http::{header, HeaderMap, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::AppError, services::auth_service, AppState};

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

fn is_read_only(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Guards mutating `/api` calls with an HS256 bearer token. A no-op when no
/// secret is configured.
pub async fn require_api_token(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let secret = state.settings.jwt_secret.as_str();

    if secret.is_empty() || is_read_only(req.method()) || !req.uri().path().starts_with("/api/") {
        return next.run(req).await;
    }

    let Some(token) = bearer_token(req.headers()) else {
        return AppError::Unauthorized.into_response();
    };

    match auth_service::verify_token(secret, token) {
        Ok(claims) => {
            tracing::debug!("api call by {}: {} {}", claims.sub, req.method(), req.uri().path());
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("rejected api token: {}", e);
            AppError::Unauthorized.into_response()
        }
    }
}
