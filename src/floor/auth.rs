//! Session authentication and the `admin` gate.
//!
//! Passwords are argon2id hashes. A successful login stores a random
//! session token in the `sessions` table and hands it to the browser as a
//! cookie. `require_session` resolves the cookie on every request and puts
//! a `CurrentUser` into the request extensions.

use anyhow::Context;
use axum::{
    Form,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use chrono::{Duration, Utc};

use crate::errors::{FloorError, FloorResult};

use super::api::{ApiError, SharedState};
use super::models::User;
use super::requests::LoginForm;
use super::views;

/// Hash a plain password with argon2id.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

/// Verify a password against an argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::Argon2;
    use password_hash::{PasswordHash, PasswordVerifier};

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Cookie and session lifetime settings.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub cookie_name: String,
    pub session_ttl: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            cookie_name: "andon_session".to_string(),
            session_ttl: Duration::hours(12),
        }
    }
}

/// The authenticated user, available to handlers as `Extension<CurrentUser>`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// The `admin` gate.
pub fn can_admin(user: &User) -> bool {
    user.is_admin
}

pub fn require_admin(user: &User) -> FloorResult<()> {
    if can_admin(user) {
        Ok(())
    } else {
        Err(FloorError::Forbidden)
    }
}

/// `302 Found` to `location`.
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Read the session token from the `Cookie` headers.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

fn session_cookie(settings: &AuthSettings, token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        settings.cookie_name,
        token,
        settings.session_ttl.num_seconds()
    )
}

fn expired_cookie(settings: &AuthSettings) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        settings.cookie_name
    )
}

fn is_public_path(path: &str) -> bool {
    matches!(path, "/" | "/health" | "/login")
}

/// Resolve the session cookie. Unauthenticated API calls get `401`, every
/// other protected route is redirected to the login page.
pub async fn require_session(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_public_path(&path) {
        return next.run(request).await;
    }

    let user = match session_token(request.headers(), &state.auth.cookie_name) {
        Some(token) => state
            .db
            .call(move |db| Ok(db.session_user(&token, Utc::now())?))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Session lookup failed");
                None
            }),
        None => None,
    };

    match user {
        Some(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        None if path.starts_with("/api/") => ApiError::from(FloorError::Unauthenticated).into_response(),
        None => {
            tracing::debug!(path = %path, "Redirecting unauthenticated request to login");
            redirect("/login")
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────

pub async fn login_page() -> Html<String> {
    Html(views::login_page(None, ""))
}

pub async fn login(
    State(state): State<SharedState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if let Err(e) = form.validate() {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(views::login_page(Some(&e.to_string()), &form.email)),
        )
            .into_response());
    }

    let email = form.email.clone();
    let credentials = state
        .db
        .call(move |db| Ok(db.find_user_credentials(&email)?))
        .await?;

    let password = form.password.clone();
    let user = match credentials {
        Some((user, hash)) => {
            let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
                .await
                .context("Password verification task panicked")
                .map_err(FloorError::from)?;
            valid.then_some(user)
        }
        None => None,
    };

    let Some(user) = user else {
        tracing::warn!(email = %form.email, "Failed login attempt");
        return Ok((
            StatusCode::UNAUTHORIZED,
            Html(views::login_page(
                Some("These credentials do not match our records."),
                &form.email,
            )),
        )
            .into_response());
    };

    let token = uuid::Uuid::new_v4().to_string();
    let expires_at = Utc::now() + state.auth.session_ttl;
    let user_id = user.user_id;
    let stored = token.clone();
    state
        .db
        .call(move |db| Ok(db.create_session(&stored, user_id, expires_at)?))
        .await?;
    tracing::info!(user_id, "User logged in");

    let mut response = redirect("/home");
    let cookie = HeaderValue::from_str(&session_cookie(&state.auth, &token))
        .context("Invalid session cookie")
        .map_err(FloorError::from)?;
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

pub async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(token) = session_token(&headers, &state.auth.cookie_name) {
        state
            .db
            .call(move |db| Ok(db.delete_session(&token)?))
            .await?;
    }

    let mut response = redirect("/login");
    let cookie = HeaderValue::from_str(&expired_cookie(&state.auth))
        .context("Invalid session cookie")
        .map_err(FloorError::from)?;
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}
