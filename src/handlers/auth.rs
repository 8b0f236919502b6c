use crate::config::SESSION_COOKIE;
use crate::github_oauth::AccountTokens;
use crate::middleware::session::{HOME_PATH, SIGN_IN_PATH};
use crate::{ArtshareError, router::AppState};
use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

const CSRF_COOKIE: &str = "oauth_csrf_token";
const PKCE_COOKIE: &str = "oauth_pkce_verifier";

/// Sign-in and sign-out endpoints, mounted under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signin/github", post(github_sign_in))
        .route("/auth/callback/github", get(github_callback))
        .route("/auth/signout", post(sign_out))
}

/// POST /api/auth/signin/github -> redirects to GitHub's consent page.
pub async fn github_sign_in(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> impl IntoResponse {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) = state.github.build_authorize_url(challenge);

    let jar = store_oauth_cookies(
        jar,
        &csrf_token,
        verifier.secret(),
        state.sessions.insecure_cookie,
    );

    info!("Dispatching GitHub OAuth redirect");
    (jar, Redirect::to(auth_url.as_str()))
}

/// GET /api/auth/callback/github -> exchanges the code, signs the user in and
/// sets the session cookie.
pub async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let (pkce_verifier, csrf_cookie, jar) = match load_oauth_session(jar) {
        Ok(data) => data,
        Err((jar, err)) => return redirect_with_error(jar, err),
    };

    let Some(state_param) = query.state.as_deref() else {
        return redirect_with_error(
            jar,
            ArtshareError::OauthFlowError("missing `state` in callback".to_string()),
        );
    };

    if !bool::from(state_param.as_bytes().ct_eq(csrf_cookie.as_bytes())) {
        return redirect_with_error(
            jar,
            ArtshareError::OauthFlowError("CSRF token mismatch".to_string()),
        );
    }

    let Some(code) = query.code.as_deref() else {
        return redirect_with_error(
            jar,
            ArtshareError::OauthFlowError("missing `code` in callback".to_string()),
        );
    };

    let token_response = match state
        .github
        .exchange_authorization_code(
            AuthorizationCode::new(code.to_owned()),
            PkceCodeVerifier::new(pkce_verifier),
        )
        .await
    {
        Ok(res) => res,
        Err(err) => return redirect_with_error(jar, err),
    };

    let tokens = AccountTokens::from(&token_response);
    let access_token = tokens.access_token.clone().unwrap_or_default();
    let profile = match state.github.fetch_profile(&access_token).await {
        Ok(profile) => profile,
        Err(err) => return redirect_with_error(jar, err),
    };

    let session = match state.sign_in.complete(&profile, tokens).await {
        Ok(session) => session,
        Err(err) => return redirect_with_error(jar, err),
    };

    let jar = jar.add(state.sessions.session_cookie(session.session_token));
    (jar, Redirect::to(HOME_PATH)).into_response()
}

/// POST /api/auth/signout -> drops the session and returns to the sign-in page.
pub async fn sign_out(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<Response, ArtshareError> {
    if let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) {
        state.sign_in.sign_out(&token).await?;
    }
    let jar = jar.remove(state.sessions.clear_session_cookie());
    Ok((jar, Redirect::to(SIGN_IN_PATH)).into_response())
}

fn store_oauth_cookies(
    jar: PrivateCookieJar,
    csrf: &CsrfToken,
    pkce_verifier: &str,
    insecure: bool,
) -> PrivateCookieJar {
    jar.add(build_cookie(CSRF_COOKIE, csrf.secret().to_string(), insecure))
        .add(build_cookie(PKCE_COOKIE, pkce_verifier.to_string(), insecure))
}

fn load_oauth_session(
    jar: PrivateCookieJar,
) -> Result<(String, String, PrivateCookieJar), (PrivateCookieJar, ArtshareError)> {
    let Some(csrf_cookie) = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned()) else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            ArtshareError::OauthFlowError("Missing CSRF token in cookie".to_string()),
        ));
    };

    let Some(pkce_cookie) = jar.get(PKCE_COOKIE).map(|c| c.value().to_owned()) else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            ArtshareError::OauthFlowError("Missing PKCE verifier in cookie".to_string()),
        ));
    };

    let jar = clear_oauth_cookies(jar);

    Ok((pkce_cookie, csrf_cookie, jar))
}

fn clear_oauth_cookies(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE))
        .remove(clear_cookie(PKCE_COOKIE))
}

fn build_cookie(name: &str, value: String, insecure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(!insecure)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn redirect_with_error(jar: PrivateCookieJar, err: ArtshareError) -> Response {
    warn!(error = %err, "GitHub sign-in failed");
    let target = format!("{SIGN_IN_PATH}?error={}", err.auth_error_kind());
    (jar, Redirect::to(&target)).into_response()
}
