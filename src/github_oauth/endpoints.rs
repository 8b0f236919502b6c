use crate::config::{Config, GITHUB_API_BASE, GITHUB_AUTH_URL, GITHUB_SCOPES, GITHUB_TOKEN_URL};
use crate::error::ArtshareError;
use crate::github_oauth::profile::{GithubEmail, GithubProfile, GithubUser, primary_verified_email};

use backon::{ExponentialBuilder, Retryable};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenUrl,
    basic::{BasicClient, BasicTokenResponse},
};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub type GithubOauth2Client =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(3)
        .with_jitter()
}

/// GitHub OAuth endpoints and the REST calls needed to build a profile.
#[derive(Clone)]
pub struct GithubOauthEndpoints {
    client: GithubOauth2Client,
    http: reqwest::Client,
    api_base: Url,
}

impl GithubOauthEndpoints {
    pub fn new(cfg: &Config) -> Result<Self, ArtshareError> {
        let client = BasicClient::new(ClientId::new(cfg.github_client_id.clone()))
            .set_client_secret(ClientSecret::new(cfg.github_client_secret.clone()))
            .set_auth_uri(AuthUrl::new(GITHUB_AUTH_URL.to_string())?)
            .set_token_uri(TokenUrl::new(GITHUB_TOKEN_URL.to_string())?)
            .set_redirect_uri(RedirectUrl::from_url(cfg.github_redirect_url()?));

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        // No redirects: the token endpoint must not be able to bounce us elsewhere.
        let http = reqwest::Client::builder()
            .user_agent(concat!("artshare/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            http,
            api_base: Url::parse(GITHUB_API_BASE)?,
        })
    }

    /// Consent URL plus the CSRF state it embeds.
    pub fn build_authorize_url(&self, challenge: PkceCodeChallenge) -> (Url, CsrfToken) {
        GITHUB_SCOPES
            .iter()
            .fold(
                self.client.authorize_url(CsrfToken::new_random),
                |req, scope| req.add_scope(Scope::new(scope.to_string())),
            )
            .set_pkce_challenge(challenge)
            .url()
    }

    pub async fn exchange_authorization_code(
        &self,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
    ) -> Result<BasicTokenResponse, ArtshareError> {
        let token = self
            .client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(&self.http)
            .await?;
        info!("GitHub authorization code exchanged");
        Ok(token)
    }

    /// `GET /user`, completed with `GET /user/emails` when the email is private.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<GithubProfile, ArtshareError> {
        let user: GithubUser = self.get_with_retry("user", access_token).await?;
        let fallback = if user.email.is_none() {
            let emails: Vec<GithubEmail> = self.get_with_retry("user/emails", access_token).await?;
            primary_verified_email(&emails)
        } else {
            None
        };
        info!(github_id = user.id, login = %user.login, "fetched GitHub profile");
        Ok(user.into_profile(fallback))
    }

    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T, ArtshareError> {
        let url = self.api_base.join(path)?;
        (|| async {
            let value = self
                .http
                .get(url.clone())
                .bearer_auth(access_token)
                .send()
                .await?
                .error_for_status()?
                .json::<T>()
                .await?;
            Ok::<T, ArtshareError>(value)
        })
        .retry(default_retry_policy())
        .when(|e: &ArtshareError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!(path, error = %err, "GitHub API retrying after {:?}", dur);
        })
        .await
    }
}
