use crate::db::models::{DbAccount, NewUser};
use crate::db::{Database, DbSession, DbUser};
use crate::error::ArtshareError;
use crate::github_oauth::profile::GithubProfile;
use chrono::{Duration, Utc};
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use tracing::{debug, info, warn};

pub const GITHUB_PROVIDER: &str = "github";

/// Token fields persisted on the linked account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Absolute expiry, seconds since the epoch.
    pub expires_at: Option<i32>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl From<&BasicTokenResponse> for AccountTokens {
    fn from(token: &BasicTokenResponse) -> Self {
        let expires_at = token
            .expires_in()
            .and_then(|d| i32::try_from(Utc::now().timestamp() + d.as_secs() as i64).ok());
        let scope = token.scopes().map(|scopes| {
            scopes
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",")
        });
        Self {
            access_token: Some(token.access_token().secret().clone()),
            refresh_token: token.refresh_token().map(|t| t.secret().clone()),
            expires_at,
            token_type: Some(token.token_type().as_ref().to_lowercase()),
            scope,
        }
    }
}

impl AccountTokens {
    fn into_account(self, user_id: String, profile: &GithubProfile) -> DbAccount {
        DbAccount {
            user_id,
            kind: "oauth".to_string(),
            provider: GITHUB_PROVIDER.to_string(),
            provider_account_id: profile.provider_account_id.clone(),
            refresh_token: self.refresh_token,
            access_token: self.access_token,
            expires_at: self.expires_at,
            token_type: self.token_type,
            scope: self.scope,
            id_token: None,
            session_state: None,
        }
    }
}

/// Turns a verified GitHub identity into a local user and a fresh session.
#[derive(Clone)]
pub struct SignInService {
    db: Database,
    session_max_age: Duration,
}

impl SignInService {
    pub fn new(db: Database, session_max_age_secs: i64) -> Self {
        Self {
            db,
            session_max_age: Duration::seconds(session_max_age_secs),
        }
    }

    /// Resolve (or register) the user behind `profile` and open a session.
    ///
    /// An email already owned by a user without this GitHub account is refused
    /// rather than silently linked.
    pub async fn complete(
        &self,
        profile: &GithubProfile,
        tokens: AccountTokens,
    ) -> Result<DbSession, ArtshareError> {
        let user = match self
            .db
            .get_user_by_account(GITHUB_PROVIDER, &profile.provider_account_id)
            .await?
        {
            Some(user) => user,
            None => {
                let email_taken = match profile.email.as_deref() {
                    Some(email) => self.db.get_user_by_email(email).await?.is_some(),
                    None => false,
                };
                if email_taken {
                    self.registered_concurrently(profile).await?
                } else {
                    self.register(profile, tokens).await?
                }
            }
        };

        let session = self
            .db
            .create_session(&user.id, Utc::now() + self.session_max_age)
            .await?;
        info!(user_id = %user.id, "signed in with GitHub");
        Ok(session)
    }

    async fn register(
        &self,
        profile: &GithubProfile,
        tokens: AccountTokens,
    ) -> Result<DbUser, ArtshareError> {
        let new_user = NewUser {
            name: Some(profile.name.clone()),
            email: profile.email.clone(),
            email_verified: None,
            image: profile.image.clone(),
        };
        let account = tokens.into_account(String::new(), profile);
        match self.db.register_oauth_user(new_user, account).await {
            Ok((user, _profile)) => Ok(user),
            Err(e) if e.is_unique_violation() => self.registered_concurrently(profile).await,
            Err(e) => Err(e),
        }
    }

    /// The email or account already exists. If a parallel first sign-in
    /// registered this GitHub account, its user is reused; otherwise the email
    /// belongs to an unlinked user.
    async fn registered_concurrently(
        &self,
        profile: &GithubProfile,
    ) -> Result<DbUser, ArtshareError> {
        match self
            .db
            .get_user_by_account(GITHUB_PROVIDER, &profile.provider_account_id)
            .await?
        {
            Some(user) => {
                debug!(github_id = %profile.provider_account_id, "joined concurrent registration");
                Ok(user)
            }
            None => {
                warn!(
                    github_id = %profile.provider_account_id,
                    "sign-in refused: email belongs to an unlinked user"
                );
                Err(ArtshareError::AccountNotLinked)
            }
        }
    }

    pub async fn sign_out(&self, session_token: &str) -> Result<(), ArtshareError> {
        if self.db.delete_session(session_token).await? {
            info!("signed out");
        }
        Ok(())
    }
}
