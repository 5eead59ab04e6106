use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, state::AppState};

/// Requires a valid bearer token and inserts the resolved
/// [`CurrentUser`](crate::models::session::CurrentUser) into the request
/// extensions.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .map(str::to_owned)
        .ok_or_else(AppError::unauthenticated)?;

    let current = state
        .tokens
        .authenticate(&token)
        .await?
        .ok_or_else(AppError::unauthenticated)?;

    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}
