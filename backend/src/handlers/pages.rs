//! Minimal HTML pages reached from links in emails.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    error::AppError,
    handlers::extract::{AppPath, AppQuery},
    services::auth::VerificationOutcome,
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct VerifyEmailQuery {
    pub expires: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordQuery {
    pub token: Option<String>,
    pub email: Option<String>,
}

pub async fn verify_email(
    State(state): State<AppState>,
    AppPath((user_id, hash)): AppPath<(String, String)>,
    AppQuery(query): AppQuery<VerifyEmailQuery>,
) -> Result<Response, AppError> {
    let expires = query
        .expires
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok());
    let outcome = state
        .auth
        .verify_email(&user_id, &hash, expires, query.signature.as_deref())
        .await?;

    let response = match outcome {
        VerificationOutcome::Verified => page(
            StatusCode::OK,
            "Email verified",
            "Your email address has been verified. You can now sign in.",
        ),
        VerificationOutcome::AlreadyVerified => page(
            StatusCode::OK,
            "Email verified",
            "Your email address was already verified.",
        ),
        VerificationOutcome::InvalidSignature => page(
            StatusCode::FORBIDDEN,
            "Verification failed",
            "This verification link is invalid or has expired. Please request a new one.",
        ),
        VerificationOutcome::InvalidLink => page(
            StatusCode::OK,
            "Verification failed",
            "This verification link is not valid. Please request a new one.",
        ),
    };
    Ok(response)
}

pub async fn reset_password_form(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ResetPasswordQuery>,
) -> Result<Response, AppError> {
    let token = query.token.filter(|value| !value.trim().is_empty());
    let email = query.email.filter(|value| !value.trim().is_empty());
    let (Some(token), Some(email)) = (token, email) else {
        return Ok(page(
            StatusCode::OK,
            "Reset password",
            "This password reset link is invalid. Please request a new one.",
        ));
    };

    if !state.auth.account_exists(&email).await? {
        return Ok(page(
            StatusCode::OK,
            "Reset password",
            "No account was found for this email address.",
        ));
    }

    Ok(Html(reset_form(&token, &email)).into_response())
}

pub async fn reset_password_success() -> Response {
    page(
        StatusCode::OK,
        "Password reset",
        "Your password has been reset. You can now sign in with your new password.",
    )
}

fn page(status: StatusCode, title: &str, message: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n<h1>{title}</h1>\n<p>{message}</p>\n</body>\n</html>\n",
        title = escape_html(title),
        message = escape_html(message),
    );
    (status, Html(body)).into_response()
}

fn reset_form(token: &str, email: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Reset password</title></head>
<body>
<h1>Reset password</h1>
<form id="reset-form">
<input type="hidden" name="token" value="{token}">
<input type="hidden" name="email" value="{email}">
<label>New password <input type="password" name="password" minlength="8" required></label>
<label>Confirm password <input type="password" name="password_confirmation" minlength="8" required></label>
<button type="submit">Reset password</button>
</form>
<p id="errors"></p>
<script>
document.getElementById('reset-form').addEventListener('submit', async (event) => {{
  event.preventDefault();
  const data = Object.fromEntries(new FormData(event.target));
  const response = await fetch('/api/v1/auth/reset-password', {{
    method: 'POST',
    headers: {{ 'Content-Type': 'application/json', 'Accept': 'application/json' }},
    body: JSON.stringify(data),
  }});
  const result = await response.json();
  if (response.ok && result.success) {{
    window.location.href = '/reset-password/success';
    return;
  }}
  document.getElementById('errors').textContent =
    Object.values(result.errors || {{}}).flat().join(' ');
}});
</script>
</body>
</html>
"#,
        token = escape_html(token),
        email = escape_html(email),
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
