//! SQL DDL for initializing the application database.
//! PostgreSQL dialect; every statement is idempotent so it can run on each start.

/// PostgreSQL schema with:
/// - text primary keys defaulting to `gen_random_uuid()::TEXT`
/// - authentication tables (`"user"`, `account`, `session`, `"verificationToken"`,
///   `authenticator`) using the camelCase column names session adapters expect
/// - `ON DELETE CASCADE` from the auth tables to `"user"`
/// - enum types `role`, `artwork_type`, `license_type`
/// - self-referencing `comments.parent_comment_id`
///
/// Likes, favorites and follows carry no uniqueness constraint on their natural
/// keys; the store keeps one row per pair.
pub const POSTGRES_INIT: &str = r#"
DO $$ BEGIN
    CREATE TYPE role AS ENUM ('artist', 'user', 'admin');
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;

DO $$ BEGIN
    CREATE TYPE artwork_type AS ENUM (
        'Digital Art', 'Sticker', 'Painting', 'Handmade',
        'Photo', 'GIFs', 'AI Generated', 'Illustration'
    );
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;

DO $$ BEGIN
    CREATE TYPE license_type AS ENUM ('Creative Commons', 'Free to use', 'Copyright');
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;

CREATE TABLE IF NOT EXISTS "user" (
    id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    name TEXT NULL,
    email TEXT NULL UNIQUE,
    "emailVerified" TIMESTAMPTZ NULL,
    image TEXT NULL
);

CREATE TABLE IF NOT EXISTS account (
    "userId" TEXT NOT NULL REFERENCES "user"(id) ON DELETE CASCADE,
    type TEXT NOT NULL,
    provider TEXT NOT NULL,
    "providerAccountId" TEXT NOT NULL,
    refresh_token TEXT NULL,
    access_token TEXT NULL,
    expires_at INTEGER NULL,
    token_type TEXT NULL,
    scope TEXT NULL,
    id_token TEXT NULL,
    session_state TEXT NULL,
    PRIMARY KEY (provider, "providerAccountId")
);

CREATE TABLE IF NOT EXISTS session (
    "sessionToken" TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    "userId" TEXT NOT NULL REFERENCES "user"(id) ON DELETE CASCADE,
    expires TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS "verificationToken" (
    identifier TEXT NOT NULL,
    token TEXT NOT NULL,
    expires TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (identifier, token)
);

CREATE TABLE IF NOT EXISTS authenticator (
    "credentialID" TEXT NOT NULL UNIQUE,
    "userId" TEXT NOT NULL REFERENCES "user"(id) ON DELETE CASCADE,
    "providerAccountId" TEXT NOT NULL,
    "credentialPublicKey" TEXT NOT NULL,
    counter INTEGER NOT NULL,
    "credentialDeviceType" TEXT NOT NULL,
    "credentialBackedUp" BOOLEAN NOT NULL,
    transports TEXT NULL,
    PRIMARY KEY ("userId", "credentialID")
);

CREATE TABLE IF NOT EXISTS profile_info (
    id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    display_name TEXT NULL UNIQUE,
    image TEXT NULL,
    bio TEXT NULL,
    role role NOT NULL DEFAULT 'artist',
    user_id TEXT NULL REFERENCES "user"(id),
    date_joined TIMESTAMPTZ NULL DEFAULT now(),
    created_at TIMESTAMPTZ NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    name TEXT NOT NULL UNIQUE,
    description TEXT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS artworks (
    id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    title TEXT NOT NULL,
    description TEXT NULL,
    main_image TEXT NOT NULL,
    image1 TEXT NULL,
    image2 TEXT NULL,
    image3 TEXT NULL,
    type artwork_type NOT NULL,
    license_type license_type NOT NULL,
    is_publish BOOLEAN NULL DEFAULT TRUE,
    is_deleted BOOLEAN NULL DEFAULT FALSE,
    views_count INTEGER NULL DEFAULT 0,
    likes_count INTEGER NULL DEFAULT 0,
    profile_id TEXT NULL REFERENCES profile_info(id),
    category_id TEXT NULL REFERENCES categories(id),
    date_uploaded TIMESTAMPTZ NULL DEFAULT now(),
    created_at TIMESTAMPTZ NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NULL
);

CREATE INDEX IF NOT EXISTS idx_artworks_profile_id ON artworks(profile_id);

CREATE TABLE IF NOT EXISTS artwork_tags (
    id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    artwork_id TEXT NOT NULL REFERENCES artworks(id),
    tag_id TEXT NOT NULL REFERENCES tags(id),
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    content TEXT NOT NULL,
    date_commented TIMESTAMPTZ NULL DEFAULT now(),
    artwork_id TEXT NOT NULL REFERENCES artworks(id),
    profile_id TEXT NULL REFERENCES profile_info(id),
    parent_comment_id TEXT NULL,
    created_at TIMESTAMPTZ NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NULL,
    CONSTRAINT comments_parent_comment_id_fkey
        FOREIGN KEY (parent_comment_id) REFERENCES comments(id)
);

CREATE INDEX IF NOT EXISTS idx_comments_artwork_id ON comments(artwork_id);

CREATE TABLE IF NOT EXISTS likes (
    id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    artwork_id TEXT NOT NULL REFERENCES artworks(id),
    profile_id TEXT NULL REFERENCES profile_info(id),
    date_liked TIMESTAMPTZ NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_likes_artwork_profile ON likes(artwork_id, profile_id);

CREATE TABLE IF NOT EXISTS favorites (
    id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    artwork_id TEXT NOT NULL REFERENCES artworks(id),
    profile_id TEXT NULL REFERENCES profile_info(id),
    date_favorited TIMESTAMPTZ NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_favorites_artwork_profile ON favorites(artwork_id, profile_id);

CREATE TABLE IF NOT EXISTS follows (
    id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    follower_id TEXT NULL REFERENCES profile_info(id),
    following_id TEXT NULL REFERENCES profile_info(id),
    date_followed TIMESTAMPTZ NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_follows_following_id ON follows(following_id);

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::TEXT,
    profile_id TEXT NULL REFERENCES profile_info(id),
    content TEXT NOT NULL,
    is_read BOOLEAN NULL DEFAULT FALSE,
    date_created TIMESTAMPTZ NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_notifications_profile_id ON notifications(profile_id);
"#;

#[cfg(test)]
mod tests {
    use super::POSTGRES_INIT;

    #[test]
    fn auth_tables_cascade_on_user_delete() {
        let cascades = POSTGRES_INIT
            .matches(r#"REFERENCES "user"(id) ON DELETE CASCADE"#)
            .count();
        // account, session, authenticator
        assert_eq!(cascades, 3);
    }

    #[test]
    fn composite_keys_are_declared() {
        assert!(POSTGRES_INIT.contains(r#"PRIMARY KEY (provider, "providerAccountId")"#));
        assert!(POSTGRES_INIT.contains("PRIMARY KEY (identifier, token)"));
        assert!(POSTGRES_INIT.contains(r#"PRIMARY KEY ("userId", "credentialID")"#));
    }

    #[test]
    fn every_table_is_created_idempotently() {
        let creates = POSTGRES_INIT.matches("CREATE TABLE ").count();
        let guarded = POSTGRES_INIT.matches("CREATE TABLE IF NOT EXISTS").count();
        assert_eq!(creates, 15);
        assert_eq!(creates, guarded);
    }
}
