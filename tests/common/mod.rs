#![allow(dead_code)]

use artshare::db::Database;
use artshare::db::models::{DbAccount, DbProfile, DbUser, NewUser};
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static SCHEMA_SEQ: AtomicU32 = AtomicU32::new(0);

/// A throwaway schema in the database named by `TEST_DATABASE_URL`.
pub struct TestDb {
    pub db: Database,
    admin: Database,
    schema: String,
}

impl TestDb {
    /// `None` when `TEST_DATABASE_URL` is unset; callers skip the test.
    pub async fn create() -> Option<Self> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping database test");
            return None;
        };

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let schema = format!(
            "artshare_test_{}_{}_{}",
            std::process::id(),
            nanos,
            SCHEMA_SEQ.fetch_add(1, Ordering::Relaxed)
        );

        let admin = Database::connect(&url, 1).await.expect("connect admin pool");
        sqlx::query(&format!("CREATE SCHEMA \"{schema}\""))
            .execute(admin.pool())
            .await
            .expect("create test schema");

        let opts = PgConnectOptions::from_str(&url)
            .expect("parse TEST_DATABASE_URL")
            .options([("search_path", schema.as_str())]);
        let db = Database::connect_with(opts, 5)
            .await
            .expect("connect test pool");
        db.init_schema().await.expect("apply schema");

        Some(Self { db, admin, schema })
    }

    pub async fn cleanup(self) {
        self.db.pool().close().await;
        sqlx::query(&format!("DROP SCHEMA \"{}\" CASCADE", self.schema))
            .execute(self.admin.pool())
            .await
            .expect("drop test schema");
    }
}

pub fn github_account(provider_account_id: &str) -> DbAccount {
    DbAccount {
        user_id: String::new(),
        kind: "oauth".to_string(),
        provider: "github".to_string(),
        provider_account_id: provider_account_id.to_string(),
        refresh_token: None,
        access_token: Some("gho_test".to_string()),
        expires_at: None,
        token_type: Some("bearer".to_string()),
        scope: Some("read:user,user:email".to_string()),
        id_token: None,
        session_state: None,
    }
}

/// Registers a GitHub user the way the first sign-in does.
pub async fn register(db: &Database, name: &str, github_id: &str) -> (DbUser, DbProfile) {
    let user = NewUser {
        name: Some(name.to_string()),
        email: Some(format!("{name}@example.com")),
        ..Default::default()
    };
    db.register_oauth_user(user, github_account(github_id))
        .await
        .expect("register user")
}
