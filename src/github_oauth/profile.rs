use serde::Deserialize;

/// Subset of `GET /user`.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// One entry of `GET /user/emails`.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubEmail {
    pub email: String,
    pub primary: bool,
    pub verified: bool,
}

/// Normalized identity used by the sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubProfile {
    pub provider_account_id: String,
    pub name: String,
    pub email: Option<String>,
    pub image: Option<String>,
}

impl GithubUser {
    /// `fallback_email` is used when the public profile hides the address.
    pub fn into_profile(self, fallback_email: Option<String>) -> GithubProfile {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.login.clone());
        GithubProfile {
            provider_account_id: self.id.to_string(),
            name,
            email: self.email.or(fallback_email),
            image: self.avatar_url,
        }
    }
}

pub fn primary_verified_email(emails: &[GithubEmail]) -> Option<String> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .map(|e| e.email.clone())
}
