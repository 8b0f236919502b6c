use axum::{
    Json, Router,
    extract::FromRef,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::cookie::Key;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::db::Database;
use crate::error::ArtshareError;
use crate::github_oauth::{GithubOauthEndpoints, SignInService};
use crate::handlers::{auth, pages, users};
use crate::middleware::session::{SessionSettings, gate};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub github: GithubOauthEndpoints,
    pub sign_in: SignInService,
    pub sessions: SessionSettings,
    key: Key,
}

impl AppState {
    pub fn new(db: Database, cfg: &Config) -> Result<Self, ArtshareError> {
        let key = cookie_key(&cfg.auth_secret)?;
        Ok(Self {
            github: GithubOauthEndpoints::new(cfg)?,
            sign_in: SignInService::new(db.clone(), cfg.session_max_age_secs),
            sessions: SessionSettings::from(cfg),
            db,
            key,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

/// Derive the cookie key from `AUTH_SECRET`; without one, sessions do not
/// survive a restart.
fn cookie_key(secret: &str) -> Result<Key, ArtshareError> {
    match secret.len() {
        0 => {
            warn!("AUTH_SECRET is not set; using a random cookie key");
            Ok(Key::generate())
        }
        n if n < 32 => Err(figment::Error::from(
            "AUTH_SECRET must be at least 32 bytes long".to_string(),
        )
        .into()),
        _ => Ok(Key::derive_from(secret.as_bytes())),
    }
}

pub fn artshare_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/auth", get(pages::sign_in_page))
        .nest("/api", api_router())
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), gate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Catch-all `/api` router; each resource contributes a sub-router.
fn api_router() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(auth::router())
        .fallback(api_not_found)
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

#[cfg(test)]
mod tests {
    use super::cookie_key;

    #[test]
    fn short_secrets_are_rejected() {
        assert!(cookie_key("too-short").is_err());
        assert!(cookie_key("").is_ok());
        assert!(cookie_key(&"s".repeat(32)).is_ok());
    }
}
