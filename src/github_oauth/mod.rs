//! GitHub sign-in: OAuth endpoints, profile mapping and the session-issuing service.

pub mod endpoints;
pub mod profile;
pub mod service;

pub use endpoints::GithubOauthEndpoints;
pub use profile::GithubProfile;
pub use service::{AccountTokens, GITHUB_PROVIDER, SignInService};
