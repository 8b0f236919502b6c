use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Artist,
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "artwork_type")]
pub enum ArtworkType {
    #[sqlx(rename = "Digital Art")]
    #[serde(rename = "Digital Art")]
    DigitalArt,
    Sticker,
    Painting,
    Handmade,
    Photo,
    #[sqlx(rename = "GIFs")]
    #[serde(rename = "GIFs")]
    Gifs,
    #[sqlx(rename = "AI Generated")]
    #[serde(rename = "AI Generated")]
    AiGenerated,
    Illustration,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "license_type")]
pub enum LicenseType {
    #[sqlx(rename = "Creative Commons")]
    #[serde(rename = "Creative Commons")]
    CreativeCommons,
    #[sqlx(rename = "Free to use")]
    #[serde(rename = "Free to use")]
    FreeToUse,
    Copyright,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    #[sqlx(rename = "emailVerified")]
    pub email_verified: Option<DateTime<Utc>>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<DateTime<Utc>>,
    pub image: Option<String>,
}

/// Linked provider account. Token columns keep the provider's snake_case names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbAccount {
    #[sqlx(rename = "userId")]
    pub user_id: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub provider: String,
    #[sqlx(rename = "providerAccountId")]
    pub provider_account_id: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub expires_at: Option<i32>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    #[serde(skip_serializing)]
    pub id_token: Option<String>,
    pub session_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbSession {
    #[sqlx(rename = "sessionToken")]
    #[serde(skip_serializing)]
    pub session_token: String,
    #[sqlx(rename = "userId")]
    pub user_id: String,
    pub expires: DateTime<Utc>,
}

/// A session joined with its owning user.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SessionAndUser {
    #[sqlx(flatten)]
    pub session: DbSession,
    #[sqlx(flatten)]
    pub user: DbUser,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbVerificationToken {
    pub identifier: String,
    pub token: String,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbAuthenticator {
    #[sqlx(rename = "credentialID")]
    pub credential_id: String,
    #[sqlx(rename = "userId")]
    pub user_id: String,
    #[sqlx(rename = "providerAccountId")]
    pub provider_account_id: String,
    #[sqlx(rename = "credentialPublicKey")]
    pub credential_public_key: String,
    pub counter: i32,
    #[sqlx(rename = "credentialDeviceType")]
    pub credential_device_type: String,
    #[sqlx(rename = "credentialBackedUp")]
    pub credential_backed_up: bool,
    pub transports: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub user_id: Option<String>,
    pub date_joined: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial profile update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbCategory {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbTag {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbArtwork {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub main_image: String,
    pub image1: Option<String>,
    pub image2: Option<String>,
    pub image3: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: ArtworkType,
    pub license_type: LicenseType,
    pub is_publish: Option<bool>,
    pub is_deleted: Option<bool>,
    pub views_count: Option<i32>,
    pub likes_count: Option<i32>,
    pub profile_id: Option<String>,
    pub category_id: Option<String>,
    pub date_uploaded: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewArtwork {
    pub title: String,
    pub description: Option<String>,
    pub main_image: String,
    /// Up to three images besides the main one; more is rejected.
    pub extra_images: Vec<String>,
    pub kind: ArtworkType,
    pub license_type: LicenseType,
    pub is_publish: bool,
    pub profile_id: Option<String>,
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbArtworkTag {
    pub id: String,
    pub artwork_id: String,
    pub tag_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbComment {
    pub id: String,
    pub content: String,
    pub date_commented: Option<DateTime<Utc>>,
    pub artwork_id: String,
    pub profile_id: Option<String>,
    pub parent_comment_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbLike {
    pub id: String,
    pub artwork_id: String,
    pub profile_id: Option<String>,
    pub date_liked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbFavorite {
    pub id: String,
    pub artwork_id: String,
    pub profile_id: Option<String>,
    pub date_favorited: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbFollow {
    pub id: String,
    pub follower_id: Option<String>,
    pub following_id: Option<String>,
    pub date_followed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbNotification {
    pub id: String,
    pub profile_id: Option<String>,
    pub content: String,
    pub is_read: Option<bool>,
    pub date_created: Option<DateTime<Utc>>,
}
