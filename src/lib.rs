pub mod config;
pub mod db;
pub mod error;
pub mod github_oauth;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use error::ArtshareError;
pub use router::{AppState, artshare_router};
