use crate::db::models::{
    DbAccount, DbArtwork, DbArtworkTag, DbAuthenticator, DbCategory, DbComment, DbFavorite,
    DbFollow, DbLike, DbNotification, DbProfile, DbSession, DbTag, DbUser, DbVerificationToken,
    NewArtwork, NewUser, ProfileUpdate, SessionAndUser,
};
use crate::db::schema::POSTGRES_INIT;
use crate::error::ArtshareError;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgConnection, Pool, Postgres, Transaction};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub type PgPool = Pool<Postgres>;

/// Images an artwork may carry besides `main_image`.
pub const MAX_EXTRA_IMAGES: usize = 3;

/// Typed access to every table of the application schema.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, ArtshareError> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect_with(opts, max_connections).await
    }

    pub async fn connect_with(
        opts: PgConnectOptions,
        max_connections: u32,
    ) -> Result<Self, ArtshareError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(opts)
            .await?;
        Ok(Self::new(pool))
    }

    /// Pool that connects on first use.
    pub fn connect_lazy(url: &str) -> Result<Self, ArtshareError> {
        let pool = PgPoolOptions::new().connect_lazy(url)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled DDL. Safe to run on every start.
    pub async fn init_schema(&self) -> Result<(), ArtshareError> {
        sqlx::raw_sql(POSTGRES_INIT).execute(&self.pool).await?;
        info!("database schema is up to date");
        Ok(())
    }

    // ---- users ----

    pub async fn create_user(&self, user: NewUser) -> Result<DbUser, ArtshareError> {
        let row = sqlx::query_as::<_, DbUser>(
            r#"INSERT INTO "user" (name, email, "emailVerified", image)
               VALUES ($1, $2, $3, $4)
               RETURNING *"#,
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.email_verified)
        .bind(user.image)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<DbUser>, ArtshareError> {
        let row = sqlx::query_as::<_, DbUser>(r#"SELECT * FROM "user" WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<DbUser>, ArtshareError> {
        let row = sqlx::query_as::<_, DbUser>(r#"SELECT * FROM "user" WHERE email = $1"#)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<DbUser>, ArtshareError> {
        let row = sqlx::query_as::<_, DbUser>(
            r#"SELECT u.* FROM "user" u
               JOIN account a ON a."userId" = u.id
               WHERE a.provider = $1 AND a."providerAccountId" = $2"#,
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Overwrite the fields that are `Some` in `patch`.
    pub async fn update_user(&self, id: &str, patch: NewUser) -> Result<DbUser, ArtshareError> {
        sqlx::query_as::<_, DbUser>(
            r#"UPDATE "user" SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                "emailVerified" = COALESCE($4, "emailVerified"),
                image = COALESCE($5, image)
              WHERE id = $1
              RETURNING *"#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.email_verified)
        .bind(patch.image)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ArtshareError::NotFound("user"))
    }

    /// Accounts, sessions and authenticators go with the user. The profile
    /// and its artworks stay, detached from the user.
    pub async fn delete_user(&self, id: &str) -> Result<bool, ArtshareError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE profile_info SET user_id = NULL, updated_at = now() WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    /// First sign-in: user, linked account and profile (role `artist`) are
    /// created together or not at all.
    pub async fn register_oauth_user(
        &self,
        user: NewUser,
        mut account: DbAccount,
    ) -> Result<(DbUser, DbProfile), ArtshareError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, DbUser>(
            r#"INSERT INTO "user" (name, email, "emailVerified", image)
               VALUES ($1, $2, $3, $4)
               RETURNING *"#,
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.email_verified)
        .bind(user.image)
        .fetch_one(&mut *tx)
        .await?;

        account.user_id = created.id.clone();
        insert_account(&mut tx, account).await?;

        let profile = sqlx::query_as::<_, DbProfile>(
            "INSERT INTO profile_info (user_id, image) VALUES ($1, $2) RETURNING *",
        )
        .bind(&created.id)
        .bind(&created.image)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(user_id = %created.id, profile_id = %profile.id, "registered new user");
        Ok((created, profile))
    }

    // ---- accounts ----

    pub async fn link_account(&self, account: DbAccount) -> Result<DbAccount, ArtshareError> {
        let mut conn = self.pool.acquire().await?;
        insert_account(&mut conn, account).await
    }

    pub async fn unlink_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<bool, ArtshareError> {
        let res =
            sqlx::query(r#"DELETE FROM account WHERE provider = $1 AND "providerAccountId" = $2"#)
                .bind(provider)
                .bind(provider_account_id)
                .execute(&self.pool)
                .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn list_accounts_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<DbAccount>, ArtshareError> {
        let rows = sqlx::query_as::<_, DbAccount>(
            r#"SELECT * FROM account WHERE "userId" = $1 ORDER BY provider"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- sessions ----

    /// Insert a session; the token is generated by the database.
    pub async fn create_session(
        &self,
        user_id: &str,
        expires: DateTime<Utc>,
    ) -> Result<DbSession, ArtshareError> {
        let row = sqlx::query_as::<_, DbSession>(
            r#"INSERT INTO session ("userId", expires) VALUES ($1, $2) RETURNING *"#,
        )
        .bind(user_id)
        .bind(expires)
        .fetch_one(&self.pool)
        .await?;
        debug!(user_id = %row.user_id, expires = %row.expires, "session created");
        Ok(row)
    }

    pub async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> Result<Option<SessionAndUser>, ArtshareError> {
        let row = sqlx::query_as::<_, SessionAndUser>(
            r#"SELECT s."sessionToken", s."userId", s.expires,
                      u.id, u.name, u.email, u."emailVerified", u.image
               FROM session s
               JOIN "user" u ON u.id = s."userId"
               WHERE s."sessionToken" = $1"#,
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_session_expiry(
        &self,
        session_token: &str,
        expires: DateTime<Utc>,
    ) -> Result<Option<DbSession>, ArtshareError> {
        let row = sqlx::query_as::<_, DbSession>(
            r#"UPDATE session SET expires = $2 WHERE "sessionToken" = $1 RETURNING *"#,
        )
        .bind(session_token)
        .bind(expires)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_session(&self, session_token: &str) -> Result<bool, ArtshareError> {
        let res = sqlx::query(r#"DELETE FROM session WHERE "sessionToken" = $1"#)
            .bind(session_token)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn delete_expired_sessions(&self) -> Result<u64, ArtshareError> {
        let res = sqlx::query("DELETE FROM session WHERE expires < now()")
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    // ---- verification tokens ----

    pub async fn create_verification_token(
        &self,
        identifier: &str,
        token: &str,
        expires: DateTime<Utc>,
    ) -> Result<DbVerificationToken, ArtshareError> {
        let row = sqlx::query_as::<_, DbVerificationToken>(
            r#"INSERT INTO "verificationToken" (identifier, token, expires)
               VALUES ($1, $2, $3)
               RETURNING *"#,
        )
        .bind(identifier)
        .bind(token)
        .bind(expires)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Consume a token: it is returned at most once.
    pub async fn use_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> Result<Option<DbVerificationToken>, ArtshareError> {
        let row = sqlx::query_as::<_, DbVerificationToken>(
            r#"DELETE FROM "verificationToken"
               WHERE identifier = $1 AND token = $2
               RETURNING *"#,
        )
        .bind(identifier)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // ---- authenticators ----

    pub async fn create_authenticator(
        &self,
        auth: DbAuthenticator,
    ) -> Result<DbAuthenticator, ArtshareError> {
        let row = sqlx::query_as::<_, DbAuthenticator>(
            r#"INSERT INTO authenticator (
                "credentialID", "userId", "providerAccountId", "credentialPublicKey",
                counter, "credentialDeviceType", "credentialBackedUp", transports
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING *"#,
        )
        .bind(auth.credential_id)
        .bind(auth.user_id)
        .bind(auth.provider_account_id)
        .bind(auth.credential_public_key)
        .bind(auth.counter)
        .bind(auth.credential_device_type)
        .bind(auth.credential_backed_up)
        .bind(auth.transports)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_authenticator(
        &self,
        credential_id: &str,
    ) -> Result<Option<DbAuthenticator>, ArtshareError> {
        let row = sqlx::query_as::<_, DbAuthenticator>(
            r#"SELECT * FROM authenticator WHERE "credentialID" = $1"#,
        )
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_authenticators_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<DbAuthenticator>, ArtshareError> {
        let rows = sqlx::query_as::<_, DbAuthenticator>(
            r#"SELECT * FROM authenticator WHERE "userId" = $1 ORDER BY "credentialID""#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_authenticator_counter(
        &self,
        credential_id: &str,
        counter: i32,
    ) -> Result<DbAuthenticator, ArtshareError> {
        sqlx::query_as::<_, DbAuthenticator>(
            r#"UPDATE authenticator SET counter = $2 WHERE "credentialID" = $1 RETURNING *"#,
        )
        .bind(credential_id)
        .bind(counter)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ArtshareError::NotFound("authenticator"))
    }

    // ---- profiles ----

    pub async fn create_profile(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        image: Option<&str>,
    ) -> Result<DbProfile, ArtshareError> {
        let row = sqlx::query_as::<_, DbProfile>(
            "INSERT INTO profile_info (user_id, display_name, image) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(user_id)
        .bind(display_name)
        .bind(image)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_profile(&self, id: &str) -> Result<Option<DbProfile>, ArtshareError> {
        let row = sqlx::query_as::<_, DbProfile>("SELECT * FROM profile_info WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_profile_by_user(
        &self,
        user_id: &str,
    ) -> Result<Option<DbProfile>, ArtshareError> {
        let row = sqlx::query_as::<_, DbProfile>("SELECT * FROM profile_info WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn update_profile(
        &self,
        id: &str,
        patch: ProfileUpdate,
    ) -> Result<DbProfile, ArtshareError> {
        sqlx::query_as::<_, DbProfile>(
            r#"UPDATE profile_info SET
                display_name = COALESCE($2, display_name),
                image = COALESCE($3, image),
                bio = COALESCE($4, bio),
                role = COALESCE($5, role),
                updated_at = now()
              WHERE id = $1
              RETURNING *"#,
        )
        .bind(id)
        .bind(patch.display_name)
        .bind(patch.image)
        .bind(patch.bio)
        .bind(patch.role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ArtshareError::NotFound("profile"))
    }

    // ---- catalog ----

    pub async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<DbCategory, ArtshareError> {
        let row = sqlx::query_as::<_, DbCategory>(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_categories(&self) -> Result<Vec<DbCategory>, ArtshareError> {
        let rows = sqlx::query_as::<_, DbCategory>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get_or_create_tag(&self, name: &str) -> Result<DbTag, ArtshareError> {
        let mut conn = self.pool.acquire().await?;
        upsert_tag(&mut conn, name).await
    }

    // ---- artworks ----

    /// Insert an artwork and link it to `tag_names` in one transaction.
    /// Repeated tag names are linked once.
    pub async fn create_artwork(
        &self,
        artwork: NewArtwork,
        tag_names: &[&str],
    ) -> Result<DbArtwork, ArtshareError> {
        if artwork.extra_images.len() > MAX_EXTRA_IMAGES {
            return Err(ArtshareError::TooManyImages(artwork.extra_images.len()));
        }
        // Sorted so concurrent uploads upsert shared tags in the same order.
        let tag_names: BTreeSet<&str> = tag_names.iter().copied().collect();
        let mut images = artwork.extra_images.into_iter();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, DbArtwork>(
            r#"INSERT INTO artworks (
                title, description, main_image, image1, image2, image3,
                type, license_type, is_publish, profile_id, category_id
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING *"#,
        )
        .bind(artwork.title)
        .bind(artwork.description)
        .bind(artwork.main_image)
        .bind(images.next())
        .bind(images.next())
        .bind(images.next())
        .bind(artwork.kind)
        .bind(artwork.license_type)
        .bind(artwork.is_publish)
        .bind(artwork.profile_id)
        .bind(artwork.category_id)
        .fetch_one(&mut *tx)
        .await?;

        for name in &tag_names {
            let tag = upsert_tag(&mut tx, name).await?;
            sqlx::query("INSERT INTO artwork_tags (artwork_id, tag_id, name) VALUES ($1, $2, $3)")
                .bind(&row.id)
                .bind(&tag.id)
                .bind(format!("{}:{}", row.id, tag.name))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(artwork_id = %row.id, tags = tag_names.len(), "artwork created");
        Ok(row)
    }

    pub async fn get_artwork(&self, id: &str) -> Result<Option<DbArtwork>, ArtshareError> {
        let row = sqlx::query_as::<_, DbArtwork>("SELECT * FROM artworks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Newest first; soft-deleted artworks are skipped.
    pub async fn list_artworks_by_profile(
        &self,
        profile_id: &str,
    ) -> Result<Vec<DbArtwork>, ArtshareError> {
        let rows = sqlx::query_as::<_, DbArtwork>(
            r#"SELECT * FROM artworks
               WHERE profile_id = $1 AND NOT COALESCE(is_deleted, FALSE)
               ORDER BY date_uploaded DESC"#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_artwork_tags(&self, artwork_id: &str) -> Result<Vec<DbTag>, ArtshareError> {
        let rows = sqlx::query_as::<_, DbTag>(
            r#"SELECT t.* FROM tags t
               JOIN artwork_tags at ON at.tag_id = t.id
               WHERE at.artwork_id = $1
               ORDER BY t.name"#,
        )
        .bind(artwork_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_artwork_tag_links(
        &self,
        artwork_id: &str,
    ) -> Result<Vec<DbArtworkTag>, ArtshareError> {
        let rows = sqlx::query_as::<_, DbArtworkTag>(
            "SELECT * FROM artwork_tags WHERE artwork_id = $1 ORDER BY name",
        )
        .bind(artwork_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Returns the new view count.
    pub async fn record_view(&self, artwork_id: &str) -> Result<i32, ArtshareError> {
        sqlx::query_scalar::<_, i32>(
            r#"UPDATE artworks SET views_count = COALESCE(views_count, 0) + 1
               WHERE id = $1 AND NOT COALESCE(is_deleted, FALSE)
               RETURNING views_count"#,
        )
        .bind(artwork_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ArtshareError::NotFound("artwork"))
    }

    pub async fn soft_delete_artwork(&self, artwork_id: &str) -> Result<bool, ArtshareError> {
        let res = sqlx::query(
            "UPDATE artworks SET is_deleted = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(artwork_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    // ---- likes & favorites ----

    /// Returns `false` when the profile already liked the artwork.
    pub async fn like_artwork(
        &self,
        artwork_id: &str,
        profile_id: &str,
    ) -> Result<bool, ArtshareError> {
        let mut tx = self.pool.begin().await?;
        let target = lock_artwork(&mut tx, artwork_id).await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE artwork_id = $1 AND profile_id = $2)",
        )
        .bind(artwork_id)
        .bind(profile_id)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            tx.commit().await?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO likes (artwork_id, profile_id) VALUES ($1, $2)")
            .bind(artwork_id)
            .bind(profile_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE artworks SET likes_count = COALESCE(likes_count, 0) + 1 WHERE id = $1")
            .bind(artwork_id)
            .execute(&mut *tx)
            .await?;

        if let Some(owner) = target.owner_to_notify(profile_id) {
            let actor = actor_name(&mut tx, profile_id).await?;
            insert_notification(
                &mut tx,
                owner,
                &format!("{actor} liked your artwork \"{}\"", target.title),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Returns `false` when there was nothing to remove.
    pub async fn unlike_artwork(
        &self,
        artwork_id: &str,
        profile_id: &str,
    ) -> Result<bool, ArtshareError> {
        let mut tx = self.pool.begin().await?;
        lock_artwork(&mut tx, artwork_id).await?;

        let removed = sqlx::query("DELETE FROM likes WHERE artwork_id = $1 AND profile_id = $2")
            .bind(artwork_id)
            .bind(profile_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed > 0 {
            sqlx::query(
                "UPDATE artworks SET likes_count = GREATEST(COALESCE(likes_count, 0) - $2, 0) WHERE id = $1",
            )
            .bind(artwork_id)
            .bind(removed as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed > 0)
    }

    pub async fn list_likes(&self, artwork_id: &str) -> Result<Vec<DbLike>, ArtshareError> {
        let rows = sqlx::query_as::<_, DbLike>(
            "SELECT * FROM likes WHERE artwork_id = $1 ORDER BY date_liked",
        )
        .bind(artwork_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Returns `false` when the artwork was already a favorite.
    pub async fn favorite_artwork(
        &self,
        artwork_id: &str,
        profile_id: &str,
    ) -> Result<bool, ArtshareError> {
        let mut tx = self.pool.begin().await?;
        lock_artwork(&mut tx, artwork_id).await?;

        let inserted = sqlx::query(
            r#"INSERT INTO favorites (artwork_id, profile_id)
               SELECT $1, $2
               WHERE NOT EXISTS (
                   SELECT 1 FROM favorites WHERE artwork_id = $1 AND profile_id = $2
               )"#,
        )
        .bind(artwork_id)
        .bind(profile_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(inserted > 0)
    }

    pub async fn unfavorite_artwork(
        &self,
        artwork_id: &str,
        profile_id: &str,
    ) -> Result<bool, ArtshareError> {
        let res = sqlx::query("DELETE FROM favorites WHERE artwork_id = $1 AND profile_id = $2")
            .bind(artwork_id)
            .bind(profile_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn list_favorites(&self, profile_id: &str) -> Result<Vec<DbFavorite>, ArtshareError> {
        let rows = sqlx::query_as::<_, DbFavorite>(
            "SELECT * FROM favorites WHERE profile_id = $1 ORDER BY date_favorited DESC",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- comments ----

    /// A reply must target a comment on the same artwork. A parent id that does
    /// not exist is left to the foreign key; a missing artwork is `NotFound`.
    pub async fn add_comment(
        &self,
        artwork_id: &str,
        profile_id: &str,
        content: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<DbComment, ArtshareError> {
        let mut tx = self.pool.begin().await?;
        let target = lock_artwork(&mut tx, artwork_id).await?;

        if let Some(parent_id) = parent_comment_id {
            let parent_artwork: Option<String> =
                sqlx::query_scalar("SELECT artwork_id FROM comments WHERE id = $1")
                    .bind(parent_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if let Some(parent_artwork) = parent_artwork
                && parent_artwork != artwork_id
            {
                return Err(ArtshareError::InvalidParentComment);
            }
        }

        let comment = sqlx::query_as::<_, DbComment>(
            r#"INSERT INTO comments (content, artwork_id, profile_id, parent_comment_id)
               VALUES ($1, $2, $3, $4)
               RETURNING *"#,
        )
        .bind(content)
        .bind(artwork_id)
        .bind(profile_id)
        .bind(parent_comment_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(owner) = target.owner_to_notify(profile_id) {
            let actor = actor_name(&mut tx, profile_id).await?;
            insert_notification(
                &mut tx,
                owner,
                &format!("{actor} commented on \"{}\"", target.title),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(comment)
    }

    /// Oldest first, replies included.
    pub async fn list_comments(&self, artwork_id: &str) -> Result<Vec<DbComment>, ArtshareError> {
        let rows = sqlx::query_as::<_, DbComment>(
            "SELECT * FROM comments WHERE artwork_id = $1 ORDER BY date_commented, id",
        )
        .bind(artwork_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- follows ----

    /// Returns `false` when the follow already exists.
    pub async fn follow_profile(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<bool, ArtshareError> {
        if follower_id == following_id {
            return Err(ArtshareError::SelfFollow);
        }
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent follows issued by the same profile. A mutual
        // follow only needs `KEY SHARE` on the other row, which this allows.
        let follower: Option<String> = sqlx::query_scalar(
            "SELECT COALESCE(display_name, 'Someone') FROM profile_info WHERE id = $1 FOR NO KEY UPDATE",
        )
        .bind(follower_id)
        .fetch_optional(&mut *tx)
        .await?;
        let follower = follower.ok_or(ArtshareError::NotFound("profile"))?;

        let inserted = sqlx::query(
            r#"INSERT INTO follows (follower_id, following_id)
               SELECT $1, $2
               WHERE NOT EXISTS (
                   SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2
               )"#,
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted > 0 {
            insert_notification(
                &mut tx,
                following_id,
                &format!("{follower} started following you"),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(inserted > 0)
    }

    pub async fn unfollow_profile(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<bool, ArtshareError> {
        let res = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(follower_id)
            .bind(following_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn list_following(&self, follower_id: &str) -> Result<Vec<DbFollow>, ArtshareError> {
        let rows = sqlx::query_as::<_, DbFollow>(
            "SELECT * FROM follows WHERE follower_id = $1 ORDER BY date_followed",
        )
        .bind(follower_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_followers(&self, profile_id: &str) -> Result<i64, ArtshareError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM follows WHERE following_id = $1",
        )
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // ---- notifications ----

    pub async fn create_notification(
        &self,
        profile_id: &str,
        content: &str,
    ) -> Result<DbNotification, ArtshareError> {
        let mut conn = self.pool.acquire().await?;
        insert_notification(&mut conn, profile_id, content).await
    }

    /// Newest first.
    pub async fn list_notifications(
        &self,
        profile_id: &str,
        unread_only: bool,
    ) -> Result<Vec<DbNotification>, ArtshareError> {
        let rows = sqlx::query_as::<_, DbNotification>(
            r#"SELECT * FROM notifications
               WHERE profile_id = $1 AND (NOT $2 OR NOT COALESCE(is_read, FALSE))
               ORDER BY date_created DESC, id"#,
        )
        .bind(profile_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<bool, ArtshareError> {
        let res = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn mark_all_read(&self, profile_id: &str) -> Result<u64, ArtshareError> {
        let res = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE profile_id = $1 AND NOT COALESCE(is_read, FALSE)",
        )
        .bind(profile_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}

/// Row-locked artwork header used by the engagement operations.
///
/// `FOR NO KEY UPDATE` leaves the `KEY SHARE` locks taken by foreign-key
/// checks on likes and comments free to proceed.
struct LockedArtwork {
    title: String,
    owner: Option<String>,
}

impl LockedArtwork {
    fn owner_to_notify(&self, actor_profile_id: &str) -> Option<&str> {
        self.owner
            .as_deref()
            .filter(|owner| *owner != actor_profile_id)
    }
}

async fn lock_artwork(
    tx: &mut Transaction<'_, Postgres>,
    artwork_id: &str,
) -> Result<LockedArtwork, ArtshareError> {
    let row: Option<(String, Option<String>)> =
        sqlx::query_as("SELECT title, profile_id FROM artworks WHERE id = $1 FOR NO KEY UPDATE")
            .bind(artwork_id)
            .fetch_optional(&mut **tx)
            .await?;
    let (title, owner) = row.ok_or(ArtshareError::NotFound("artwork"))?;
    Ok(LockedArtwork { title, owner })
}

async fn insert_account(
    conn: &mut PgConnection,
    account: DbAccount,
) -> Result<DbAccount, ArtshareError> {
    let row = sqlx::query_as::<_, DbAccount>(
        r#"INSERT INTO account (
            "userId", type, provider, "providerAccountId", refresh_token,
            access_token, expires_at, token_type, scope, id_token, session_state
           ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
           RETURNING *"#,
    )
    .bind(account.user_id)
    .bind(account.kind)
    .bind(account.provider)
    .bind(account.provider_account_id)
    .bind(account.refresh_token)
    .bind(account.access_token)
    .bind(account.expires_at)
    .bind(account.token_type)
    .bind(account.scope)
    .bind(account.id_token)
    .bind(account.session_state)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

async fn actor_name(conn: &mut PgConnection, profile_id: &str) -> Result<String, ArtshareError> {
    let name: Option<String> =
        sqlx::query_scalar("SELECT display_name FROM profile_info WHERE id = $1")
            .bind(profile_id)
            .fetch_optional(&mut *conn)
            .await?
            .flatten();
    Ok(name.unwrap_or_else(|| "Someone".to_string()))
}

async fn upsert_tag(conn: &mut PgConnection, name: &str) -> Result<DbTag, ArtshareError> {
    let row = sqlx::query_as::<_, DbTag>(
        r#"INSERT INTO tags (name) VALUES ($1)
           ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
           RETURNING *"#,
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

async fn insert_notification(
    conn: &mut PgConnection,
    profile_id: &str,
    content: &str,
) -> Result<DbNotification, ArtshareError> {
    let row = sqlx::query_as::<_, DbNotification>(
        "INSERT INTO notifications (profile_id, content) VALUES ($1, $2) RETURNING *",
    )
    .bind(profile_id)
    .bind(content)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}
