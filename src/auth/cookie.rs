//! Refresh-token cookie helpers.
//!
//! Cookie format: `refresh_token=<jwt>; HttpOnly; SameSite=Lax; Path=/api/auth; Max-Age=<ttl>[; Secure]`

use crate::auth::error::AuthError;
use axum::http::HeaderValue;

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

const COOKIE_PATH: &str = "/api/auth";

/// `Set-Cookie` value carrying the refresh token.
pub fn build_refresh_cookie(
    token: &str,
    max_age_secs: u64,
    is_secure: bool,
) -> Result<HeaderValue, AuthError> {
    let secure_flag = if is_secure { "; Secure" } else { "" };
    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path={}; Max-Age={}{}",
        REFRESH_COOKIE_NAME, token, COOKIE_PATH, max_age_secs, secure_flag
    );
    HeaderValue::from_str(&cookie)
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("invalid cookie value: {}", e)))
}

/// `Set-Cookie` value that removes the refresh cookie.
pub fn build_clear_cookie(is_secure: bool) -> HeaderValue {
    if is_secure {
        HeaderValue::from_static("refresh_token=; HttpOnly; SameSite=Lax; Path=/api/auth; Max-Age=0; Secure")
    } else {
        HeaderValue::from_static("refresh_token=; HttpOnly; SameSite=Lax; Path=/api/auth; Max-Age=0")
    }
}

/// Refresh token from a `Cookie` request header, if present and non-empty.
pub fn extract_refresh_token_from_cookie(cookie_header: &str) -> Option<String> {
    cookie_header.split(';').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        let value = value.trim();
        (name == REFRESH_COOKIE_NAME && !value.is_empty()).then(|| value.to_string())
    })
}

/// Cookies get `Secure` only when the service is reached over HTTPS.
pub fn should_set_secure(public_url: Option<&str>) -> bool {
    public_url.is_some_and(|url| url.starts_with("https://"))
}
