use axum::extract::{FromRequestParts, Request, State};
use axum::http::{StatusCode, header::LOCATION, request::Parts};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error};

use crate::config::{Config, SESSION_COOKIE};
use crate::db::SessionAndUser;
use crate::error::ArtshareError;
use crate::router::AppState;

pub const SIGN_IN_PATH: &str = "/auth";
pub const HOME_PATH: &str = "/";

/// Path prefixes (after the leading slash) the gate never inspects.
const UNGATED_PREFIXES: &[&str] = &["api", "_next/static", "_next/image", "favicon.ico"];

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub max_age: Duration,
    pub update_age: Duration,
    pub insecure_cookie: bool,
}

impl From<&Config> for SessionSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            max_age: Duration::seconds(cfg.session_max_age_secs),
            update_age: Duration::seconds(cfg.session_update_age_secs),
            insecure_cookie: cfg.insecure_cookie,
        }
    }
}

impl SessionSettings {
    /// New expiry if the session has not been extended for `update_age`.
    pub fn refreshed_expiry(
        &self,
        expires: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let due = expires - self.max_age + self.update_age;
        (now >= due).then(|| now + self.max_age)
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(Cookie::new(SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(!self.insecure_cookie)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.max_age.num_seconds()))
            .build()
    }

    pub fn clear_session_cookie(&self) -> Cookie<'static> {
        Cookie::build(Cookie::new(SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .secure(!self.insecure_cookie)
            .same_site(SameSite::Lax)
            .build()
    }
}

/// Mirrors the `/((?!api|_next/static|_next/image|favicon.ico).*)` matcher.
pub fn is_gated(path: &str) -> bool {
    let rest = path.strip_prefix('/').unwrap_or(path);
    !UNGATED_PREFIXES.iter().any(|prefix| rest.starts_with(prefix))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Forward,
    RedirectTo(&'static str),
}

pub fn decide(path: &str, authenticated: bool) -> GateDecision {
    match (authenticated, path == SIGN_IN_PATH) {
        (false, false) => GateDecision::RedirectTo(SIGN_IN_PATH),
        (true, true) => GateDecision::RedirectTo(HOME_PATH),
        _ => GateDecision::Forward,
    }
}

/// The signed-in user, attached to gated requests.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub SessionAndUser);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(|| found(SIGN_IN_PATH))
    }
}

/// Request gate: redirects anonymous traffic to the sign-in page and signed-in
/// users away from it.
pub async fn gate(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_owned();
    if !is_gated(&path) {
        return next.run(req).await;
    }

    let (current, jar) = match resolve_session(&state, jar).await {
        Ok(resolved) => resolved,
        Err(e) => {
            error!(error = %e, "session lookup failed");
            return e.into_response();
        }
    };

    match decide(&path, current.is_some()) {
        GateDecision::RedirectTo(target) => {
            debug!(path = %path, target, "gate redirect");
            (jar, found(target)).into_response()
        }
        GateDecision::Forward => {
            if let Some(current) = current {
                req.extensions_mut().insert(current);
            }
            (jar, next.run(req).await).into_response()
        }
    }
}

/// Look up the session named by the cookie. Expired sessions are deleted;
/// sessions due for an update get a new expiry and a refreshed cookie.
pub async fn resolve_session(
    state: &AppState,
    jar: PrivateCookieJar,
) -> Result<(Option<CurrentSession>, PrivateCookieJar), ArtshareError> {
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
        return Ok((None, jar));
    };
    let Some(mut found) = state.db.get_session_and_user(&token).await? else {
        return Ok((None, jar.remove(state.sessions.clear_session_cookie())));
    };

    let now = Utc::now();
    if found.session.expires <= now {
        state.db.delete_session(&token).await?;
        return Ok((None, jar.remove(state.sessions.clear_session_cookie())));
    }

    let mut jar = jar;
    if let Some(expires) = state.sessions.refreshed_expiry(found.session.expires, now)
        && let Some(updated) = state.db.update_session_expiry(&token, expires).await?
    {
        found.session = updated;
        jar = jar.add(state.sessions.session_cookie(token));
    }

    Ok((Some(CurrentSession(found)), jar))
}

fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SessionSettings {
        SessionSettings::from(&Config::default())
    }

    #[test]
    fn matcher_skips_api_assets_and_favicon() {
        assert!(!is_gated("/api/users"));
        assert!(!is_gated("/api"));
        assert!(!is_gated("/_next/static/chunk.js"));
        assert!(!is_gated("/_next/image"));
        assert!(!is_gated("/favicon.ico"));
        assert!(is_gated("/"));
        assert!(is_gated("/auth"));
        assert!(is_gated("/gallery/42"));
        assert!(is_gated("/_next/data/x.json"));
    }

    #[test]
    fn anonymous_requests_are_sent_to_sign_in() {
        for path in ["/", "/gallery", "/profile/me", "/auth/extra"] {
            assert_eq!(decide(path, false), GateDecision::RedirectTo("/auth"));
        }
        assert_eq!(decide("/auth", false), GateDecision::Forward);
    }

    #[test]
    fn signed_in_users_leave_sign_in_page() {
        assert_eq!(decide("/auth", true), GateDecision::RedirectTo("/"));
        assert_eq!(decide("/", true), GateDecision::Forward);
        assert_eq!(decide("/gallery", true), GateDecision::Forward);
    }

    #[test]
    fn expiry_is_pushed_only_after_update_age() {
        let s = settings();
        let now = Utc::now();

        let fresh = now + s.max_age - Duration::hours(1);
        assert_eq!(s.refreshed_expiry(fresh, now), None);

        let stale = now + s.max_age - Duration::hours(25);
        assert_eq!(s.refreshed_expiry(stale, now), Some(now + s.max_age));
    }

    #[test]
    fn session_cookie_is_http_only_and_secure_by_default() {
        let cookie = settings().session_cookie("tok".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }
}
