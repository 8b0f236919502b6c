use axum::{
    extract::Query,
    http::StatusCode,
    response::{Html, IntoResponse},
};
use serde::Deserialize;

use crate::middleware::session::CurrentSession;

#[derive(Debug, Deserialize)]
pub struct SignInPageQuery {
    pub error: Option<String>,
}

/// GET /auth
pub async fn sign_in_page(Query(query): Query<SignInPageQuery>) -> Html<String> {
    let notice = query
        .error
        .as_deref()
        .map(|kind| format!("<p role=\"alert\">{}</p>", error_message(kind)))
        .unwrap_or_default();
    Html(format!(
        r#"<!doctype html>
<html>
<head><title>Sign in</title></head>
<body>
{notice}
<form action="/api/auth/signin/github" method="post">
<button type="submit">Signin with GitHub</button>
</form>
</body>
</html>"#
    ))
}

/// GET /
pub async fn home(CurrentSession(current): CurrentSession) -> Html<String> {
    let name = escape_html(current.user.name.as_deref().unwrap_or_default());
    Html(format!(
        r#"<!doctype html>
<html>
<head><title>Home</title></head>
<body>
<div>
HOME PAGE protected
<h1>{name}</h1>
<form action="/api/auth/signout" method="post">
<button type="submit">Sign Out</button>
</form>
</div>
</body>
</html>"#
    ))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 Not Found")
}

fn error_message(kind: &str) -> &'static str {
    match kind {
        "OAuthAccountNotLinked" => {
            "This email is already used by another account. Sign in with the account you used originally."
        }
        "OAuthCallbackError" | "OAuthSignin" => "GitHub sign-in did not complete. Please try again.",
        "OAuthProfileError" => "Could not read your GitHub profile. Please try again.",
        _ => "Sign-in failed.",
    }
}

fn escape_html(raw: &str) -> String {
    raw.chars().fold(String::with_capacity(raw.len()), |mut out, c| {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
        out
    })
}
