use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- Reference Data ---

/// Role
///
/// The closed set of roles a user can hold. Stored by name in the `roles`
/// table; every comparison in the crate matches on this enum, never on strings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Role names are matched case-insensitively, the seed data uses lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// RoleRecord
///
/// A seeded row of the `roles` table. Users reference it by `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    pub id: Uuid,
    pub role: Role,
}

// --- Core Entities (Mapped to Database) ---

/// User
///
/// The canonical account record. `posts` and `comments` are ordered sets of
/// weak references kept in step with the authoritative Post/Comment rows.
/// Never serialised directly: the password hash must not leave the process.
#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub posts: Vec<Uuid>,
    pub comments: Vec<Uuid>,
    pub is_deleted: bool,
    pub deleted_by: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Post
///
/// Owned by exactly one user (`user`). Soft-deleted rows stay readable through
/// the audit path only.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    // Owner. Column is `user_id` because `user` is reserved in Postgres.
    #[sqlx(rename = "user_id")]
    pub user: Uuid,
    pub comments: Vec<Uuid>,
    pub is_deleted: bool,
    pub deleted_by: Option<Uuid>,
    #[ts(type = "string | null")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Comment
///
/// Written by `user` against `post`. The post must be live at insert time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub comment: String,
    #[sqlx(rename = "user_id")]
    pub user: Uuid,
    #[sqlx(rename = "post_id")]
    pub post: Uuid,
    pub is_deleted: bool,
    pub deleted_by: Option<Uuid>,
    #[ts(type = "string | null")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /users/register`. The password is hashed before it
/// reaches the store and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 3, max = 32, message = "username must be 3 to 32 characters"))]
    pub username: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// UpdateUserRequest
///
/// Partial self-edit. A new password is re-hashed before storage.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 3, max = 32, message = "username must be 3 to 32 characters"))]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: Option<String>,
}

/// CreateCommentRequest
///
/// `post` must resolve to a live post when the comment is written.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub post: Uuid,
    #[validate(length(min = 1, message = "comment is required"))]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, message = "comment is required"))]
    pub comment: String,
}

/// SetRoleRequest
///
/// Admin-only payload for `PUT /admin/users/{id}/role`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct SetRoleRequest {
    pub role: Role,
}

// --- Response Projections (Output Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// UserView
///
/// The account as returned by registration and self-edits. No password, no
/// reference sets, no audit fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub role: Role,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub content: String,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            content: post.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CommentSummary {
    pub id: Uuid,
    pub comment: String,
}

impl From<&Comment> for CommentSummary {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            comment: comment.comment.clone(),
        }
    }
}

/// UserProfile
///
/// A user with its reference sets resolved to live posts and comments.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub posts: Vec<PostSummary>,
    pub comments: Vec<CommentSummary>,
}

/// AuthorView
///
/// Populated owner/author of a post or comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AuthorView {
    pub name: String,
    pub username: String,
}

impl From<&User> for AuthorView {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            username: user.username.clone(),
        }
    }
}

/// PostView
///
/// Flat projection used by the public listing, creation and update responses.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct PostView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub user: Uuid,
}

impl From<&Post> for PostView {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            content: post.content.clone(),
            user: post.user,
        }
    }
}

/// CommentOnPost
///
/// A live comment nested under a post. `user` is the author's username, or
/// `None` when the author has been deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CommentOnPost {
    pub id: Uuid,
    pub comment: String,
    pub user: Option<String>,
}

/// PostDetail
///
/// Post with populated owner and live comments (authenticated reads).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostDetail {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub user: Option<AuthorView>,
    pub comments: Vec<CommentOnPost>,
}

/// PostComments
///
/// Public `getComments` projection: owner id plus live comments.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostComments {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub user: Uuid,
    pub comments: Vec<CommentOnPost>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CommentView {
    pub id: Uuid,
    pub comment: String,
    pub user: Uuid,
    pub post: Uuid,
}

impl From<&Comment> for CommentView {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            comment: comment.comment.clone(),
            user: comment.user,
            post: comment.post,
        }
    }
}

/// CommentDetail
///
/// Comment with populated author and parent post. Either side is `None` once
/// it has been soft-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentDetail {
    pub id: Uuid,
    pub comment: String,
    pub user: Option<AuthorView>,
    pub post: Option<PostSummary>,
}

/// UserAudit
///
/// Admin audit projection of a user, soft-deleted or not. Still omits the hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserAudit {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub role: Role,
    pub posts: Vec<Uuid>,
    pub comments: Vec<Uuid>,
    pub is_deleted: bool,
    pub deleted_by: Option<Uuid>,
    #[ts(type = "string | null")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserAudit {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            role: user.role,
            posts: user.posts,
            comments: user.comments,
            is_deleted: user.is_deleted,
            deleted_by: user.deleted_by,
            deleted_at: user.deleted_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
