use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// Access tier of an account, stored as the PostgreSQL enum `user_role`.
/// Every authorization decision matches on this exhaustively.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User
///
/// An account row from the `users` table. Carries the password hash, so it is never
/// serialized directly; handlers answer with `UserOut`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// UserOut
///
/// Public view of an account returned by the provisioning endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserOut {
    pub id: Uuid,
    pub login: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserOut {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            login: user.login,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// ExhibitImage
///
/// A gallery image owned by an exhibit (`exhibit_images`). `position` preserves the
/// order in which the images were uploaded.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct ExhibitImage {
    pub id: i64,
    pub exhibit_id: Uuid,
    pub url: String,
    pub position: i32,
}

/// ArticleImage
///
/// A gallery image owned by an article (`article_images`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct ArticleImage {
    pub id: i64,
    pub article_id: Uuid,
    pub url: String,
    pub position: i32,
}

/// Exhibit
///
/// A catalog item: a photo, a 3D model and an optional gallery. May reference the
/// article (expedition write-up) it was collected under.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Exhibit {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub photo_url: String,
    pub model_url: String,
    pub article_id: Option<Uuid>,
    // FK to users.id.
    pub author_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // Loaded by a second query, ordered by position.
    #[sqlx(skip)]
    pub images: Vec<ExhibitImage>,
}

/// Article
///
/// An editorial item with a preview image, a main image and an optional gallery.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub preview_url: String,
    pub main_image_url: String,
    pub author_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub images: Vec<ArticleImage>,
}

// --- Repository Inputs ---

/// NewExhibit
///
/// Everything needed to insert an exhibit once its files are on disk.
#[derive(Debug, Clone, Default)]
pub struct NewExhibit {
    pub title: String,
    pub description: String,
    pub photo_url: String,
    pub model_url: String,
    pub article_id: Option<Uuid>,
    // Public paths of the gallery images, in upload order.
    pub images: Vec<String>,
}

/// NewArticle
#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub preview_url: String,
    pub main_image_url: String,
    pub images: Vec<String>,
}

/// --- Request Payloads (Input Schemas) ---

/// LoginForm
///
/// Form-urlencoded body of POST /auth/login (OAuth2 password-flow field names).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// CreateUserRequest
///
/// Input payload for POST /users/. Only admins may call it; they may create any role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    pub login: String,
    pub password: String,
    pub role: Role,
}

/// UpdateExhibitRequest
///
/// Partial update for PUT /exhibits/{id}. Images, model and author are immutable.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateExhibitRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// UpdateArticleRequest
///
/// Partial update for PUT /articles/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateArticleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

// Multipart bodies, described for the OpenAPI document only. The handlers read the
// parts through `forms::UploadForm`.

/// ExhibitUpload
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ExhibitUpload {
    pub title: String,
    pub description: String,
    #[schema(value_type = String, format = Binary)]
    pub photo: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    pub model: Vec<u8>,
    pub article_id: Option<Uuid>,
    #[schema(value_type = Option<Vec<String>>)]
    pub images: Option<Vec<Vec<u8>>>,
}

/// ArticleUpload
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ArticleUpload {
    pub title: String,
    pub content: String,
    #[schema(value_type = String, format = Binary)]
    pub preview: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    pub main_image: Vec<u8>,
    #[schema(value_type = Option<Vec<String>>)]
    pub images: Option<Vec<Vec<u8>>>,
}

/// GalleryUpload
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct GalleryUpload {
    #[schema(value_type = Vec<String>)]
    pub images: Vec<Vec<u8>>,
}

/// --- Response Schemas (Output) ---

/// TokenResponse
///
/// Successful login: the bearer token plus the account's role for the client UI.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub role: Role,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}
