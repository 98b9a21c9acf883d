//! HTTP basic authentication for the admin routes.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::api::errors::ApiError;
use crate::api::handlers::AppState;

/// Decode `Authorization: Basic <base64(user:pass)>` into its parts
pub fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Reject requests without the configured admin credentials
pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let credentials = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_basic_credentials);

    match credentials {
        Some((username, password))
            if username == state.auth.username && password == state.auth.password =>
        {
            next.run(request).await
        }
        _ => {
            tracing::debug!(path = %request.uri().path(), "Rejected unauthenticated request");
            ApiError::Unauthorized(
                "Could not verify your access level for that URL. \
                 You have to login with proper credentials."
                    .to_string(),
            )
            .into_response()
        }
    }
}
