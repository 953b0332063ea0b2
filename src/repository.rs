use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{Comment, Post, Role, RoleRecord, User},
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Visibility
///
/// Every read states which rows it may see. Normal flows use `Active`, which
/// applies the `is_deleted = false` filter; only the admin audit path asks
/// for `IncludeDeleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Active,
    IncludeDeleted,
}

impl Visibility {
    pub fn admits(&self, is_deleted: bool) -> bool {
        match self {
            Visibility::Active => !is_deleted,
            Visibility::IncludeDeleted => true,
        }
    }
}

/// RefSet
///
/// The two reference sets a user owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefSet {
    Posts,
    Comments,
}

/// DeletionStamp
///
/// Audit fields written by a soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionStamp {
    pub by: Uuid,
    pub at: DateTime<Utc>,
}

impl DeletionStamp {
    pub fn now(by: Uuid) -> Self {
        Self { by, at: Utc::now() }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub password_hash: String,
    pub role: RoleRecord,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub user: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// PostFilter
///
/// Filtered find over live posts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter {
    /// Leave out posts owned by this user.
    pub exclude_owner: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub comment: String,
    pub user: Uuid,
    pub post: Uuid,
}

/// Repository Trait
///
/// The Entity Store contract: point lookup, filtered find, conditional update
/// and bulk conditional update for users, roles, posts and comments.
///
/// Every mutation is conditional on `is_deleted = false`, so an already-deleted
/// row is never resurrected or stamped twice: such calls return `None` (or an
/// empty list, or do nothing for reference-set edits).
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Roles ---
    async fn find_role(&self, role: Role) -> StoreResult<Option<RoleRecord>>;

    // --- Users ---
    /// Fails with `Conflict` if an active user already holds the username.
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
    async fn get_user(&self, id: Uuid, visibility: Visibility) -> StoreResult<Option<User>>;
    /// Exact match on an active user.
    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Active users among `ids`.
    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>>;
    async fn soft_delete_user(&self, id: Uuid, stamp: DeletionStamp) -> StoreResult<Option<User>>;
    /// Add-to-set: a no-op when the id is already present.
    async fn push_user_ref(&self, user: Uuid, set: RefSet, id: Uuid) -> StoreResult<()>;
    async fn pull_user_ref(&self, user: Uuid, set: RefSet, id: Uuid) -> StoreResult<()>;

    // --- Posts ---
    async fn create_post(&self, new: NewPost) -> StoreResult<Post>;
    async fn get_post(&self, id: Uuid, visibility: Visibility) -> StoreResult<Option<Post>>;
    async fn list_posts(&self, filter: PostFilter) -> StoreResult<Vec<Post>>;
    /// Active posts among `ids`, in the order given.
    async fn get_posts(&self, ids: &[Uuid]) -> StoreResult<Vec<Post>>;
    async fn update_post(&self, id: Uuid, patch: PostPatch) -> StoreResult<Option<Post>>;
    async fn soft_delete_post(&self, id: Uuid, stamp: DeletionStamp) -> StoreResult<Option<Post>>;
    /// Bulk: returns the posts this call deleted.
    async fn soft_delete_posts_by_owner(
        &self,
        owner: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Vec<Post>>;
    async fn push_post_comment(&self, post: Uuid, comment: Uuid) -> StoreResult<()>;
    async fn pull_post_comment(&self, post: Uuid, comment: Uuid) -> StoreResult<()>;

    // --- Comments ---
    /// Fails with `InvalidReference` unless `new.post` is an active post at
    /// the moment of the write. No row is created in that case.
    async fn create_comment(&self, new: NewComment) -> StoreResult<Comment>;
    async fn get_comment(&self, id: Uuid, visibility: Visibility) -> StoreResult<Option<Comment>>;
    async fn list_comments(&self) -> StoreResult<Vec<Comment>>;
    /// Active comments among `ids`, in the order given.
    async fn get_comments(&self, ids: &[Uuid]) -> StoreResult<Vec<Comment>>;
    async fn update_comment(&self, id: Uuid, comment: String) -> StoreResult<Option<Comment>>;
    async fn soft_delete_comment(
        &self,
        id: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Option<Comment>>;
    async fn soft_delete_comments_by_post(
        &self,
        post: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Vec<Comment>>;
    async fn soft_delete_comments_by_author(
        &self,
        author: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Vec<Comment>>;
}

/// RepositoryState
///
/// The shared handle to the Entity Store held in the application state.
pub type RepositoryState = Arc<dyn Repository>;
