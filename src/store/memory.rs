use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::order_by_ids;
use crate::{
    error::StoreError,
    models::{Comment, Post, Role, RoleRecord, User},
    repository::{
        DeletionStamp, NewComment, NewPost, NewUser, PostFilter, PostPatch, RefSet, Repository,
        StoreResult, UserPatch, Visibility,
    },
};

#[derive(Default)]
struct Tables {
    roles: Vec<RoleRecord>,
    users: Vec<User>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
}

/// InMemoryRepository
///
/// A process-local Entity Store with the same conditional-update semantics as
/// the Postgres driver. Each trait call takes the lock once, so every single
/// call is atomic; cascades spanning several calls are not.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    /// A store seeded with both roles, like a freshly migrated database.
    pub fn seeded() -> Self {
        let roles = [Role::User, Role::Admin]
            .into_iter()
            .map(|role| RoleRecord {
                id: Uuid::new_v4(),
                role,
            })
            .collect();

        Self {
            tables: RwLock::new(Tables {
                roles,
                ..Tables::default()
            }),
        }
    }

    /// A store whose `roles` table was never seeded.
    pub fn without_roles() -> Self {
        Self::default()
    }
}

fn active_user_mut(users: &mut [User], id: Uuid) -> Option<&mut User> {
    users.iter_mut().find(|u| u.id == id && !u.is_deleted)
}

fn active_post_mut(posts: &mut [Post], id: Uuid) -> Option<&mut Post> {
    posts.iter_mut().find(|p| p.id == id && !p.is_deleted)
}

fn active_comment_mut(comments: &mut [Comment], id: Uuid) -> Option<&mut Comment> {
    comments.iter_mut().find(|c| c.id == id && !c.is_deleted)
}

fn username_taken(users: &[User], username: &str, except: Option<Uuid>) -> bool {
    users
        .iter()
        .any(|u| !u.is_deleted && u.username == username && Some(u.id) != except)
}

fn add_to_set(set: &mut Vec<Uuid>, id: Uuid) {
    if !set.contains(&id) {
        set.push(id);
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_role(&self, role: Role) -> StoreResult<Option<RoleRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.iter().find(|r| r.role == role).cloned())
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if username_taken(&tables.users, &new.username, None) {
            return Err(StoreError::Conflict("Username is already taken".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            username: new.username,
            password_hash: new.password_hash,
            role: new.role.role,
            created_at: now,
            updated_at: now,
            ..User::default()
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid, visibility: Visibility) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.id == id && visibility.admits(u.is_deleted))
            .cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.username == username && !u.is_deleted)
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().filter(|u| !u.is_deleted).cloned().collect())
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let found = tables
            .users
            .iter()
            .filter(|u| !u.is_deleted && ids.contains(&u.id))
            .cloned()
            .collect();
        Ok(order_by_ids(ids, found, |u| u.id))
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if let Some(username) = &patch.username {
            if username_taken(&tables.users, username, Some(id)) {
                return Err(StoreError::Conflict("Username is already taken".to_string()));
            }
        }

        let Some(user) = active_user_mut(&mut tables.users, id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if !tables.roles.iter().any(|r| r.role == role) {
            return Err(StoreError::CorruptRecord(format!("role '{role}' is not seeded")));
        }

        Ok(active_user_mut(&mut tables.users, id).map(|user| {
            user.role = role;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn soft_delete_user(&self, id: Uuid, stamp: DeletionStamp) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(active_user_mut(&mut tables.users, id).map(|user| {
            user.is_deleted = true;
            user.deleted_by = Some(stamp.by);
            user.deleted_at = Some(stamp.at);
            user.clone()
        }))
    }

    async fn push_user_ref(&self, user: Uuid, set: RefSet, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = active_user_mut(&mut tables.users, user) {
            match set {
                RefSet::Posts => add_to_set(&mut user.posts, id),
                RefSet::Comments => add_to_set(&mut user.comments, id),
            }
        }
        Ok(())
    }

    async fn pull_user_ref(&self, user: Uuid, set: RefSet, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = active_user_mut(&mut tables.users, user) {
            match set {
                RefSet::Posts => user.posts.retain(|p| *p != id),
                RefSet::Comments => user.comments.retain(|c| *c != id),
            }
        }
        Ok(())
    }

    async fn create_post(&self, new: NewPost) -> StoreResult<Post> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            title: new.title,
            content: new.content,
            user: new.user,
            created_at: now,
            updated_at: now,
            ..Post::default()
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: Uuid, visibility: Visibility) -> StoreResult<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .find(|p| p.id == id && visibility.admits(p.is_deleted))
            .cloned())
    }

    async fn list_posts(&self, filter: PostFilter) -> StoreResult<Vec<Post>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .rev()
            .filter(|p| !p.is_deleted && filter.exclude_owner != Some(p.user))
            .cloned()
            .collect())
    }

    async fn get_posts(&self, ids: &[Uuid]) -> StoreResult<Vec<Post>> {
        let tables = self.tables.read().await;
        let found = tables
            .posts
            .iter()
            .filter(|p| !p.is_deleted && ids.contains(&p.id))
            .cloned()
            .collect();
        Ok(order_by_ids(ids, found, |p| p.id))
    }

    async fn update_post(&self, id: Uuid, patch: PostPatch) -> StoreResult<Option<Post>> {
        let mut tables = self.tables.write().await;
        Ok(active_post_mut(&mut tables.posts, id).map(|post| {
            if let Some(title) = patch.title {
                post.title = title;
            }
            if let Some(content) = patch.content {
                post.content = content;
            }
            post.updated_at = Utc::now();
            post.clone()
        }))
    }

    async fn soft_delete_post(&self, id: Uuid, stamp: DeletionStamp) -> StoreResult<Option<Post>> {
        let mut tables = self.tables.write().await;
        Ok(active_post_mut(&mut tables.posts, id).map(|post| {
            post.is_deleted = true;
            post.deleted_by = Some(stamp.by);
            post.deleted_at = Some(stamp.at);
            post.clone()
        }))
    }

    async fn soft_delete_posts_by_owner(
        &self,
        owner: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Vec<Post>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .posts
            .iter_mut()
            .filter(|p| p.user == owner && !p.is_deleted)
            .map(|post| {
                post.is_deleted = true;
                post.deleted_by = Some(stamp.by);
                post.deleted_at = Some(stamp.at);
                post.clone()
            })
            .collect())
    }

    async fn push_post_comment(&self, post: Uuid, comment: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(post) = active_post_mut(&mut tables.posts, post) {
            add_to_set(&mut post.comments, comment);
        }
        Ok(())
    }

    async fn pull_post_comment(&self, post: Uuid, comment: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(post) = active_post_mut(&mut tables.posts, post) {
            post.comments.retain(|c| *c != comment);
        }
        Ok(())
    }

    async fn create_comment(&self, new: NewComment) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;
        if !tables.posts.iter().any(|p| p.id == new.post && !p.is_deleted) {
            return Err(StoreError::InvalidReference(
                "Please provide a valid post id.".to_string(),
            ));
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            comment: new.comment,
            user: new.user,
            post: new.post,
            created_at: now,
            updated_at: now,
            ..Comment::default()
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: Uuid, visibility: Visibility) -> StoreResult<Option<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .iter()
            .find(|c| c.id == id && visibility.admits(c.is_deleted))
            .cloned())
    }

    async fn list_comments(&self) -> StoreResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .iter()
            .filter(|c| !c.is_deleted)
            .cloned()
            .collect())
    }

    async fn get_comments(&self, ids: &[Uuid]) -> StoreResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        let found = tables
            .comments
            .iter()
            .filter(|c| !c.is_deleted && ids.contains(&c.id))
            .cloned()
            .collect();
        Ok(order_by_ids(ids, found, |c| c.id))
    }

    async fn update_comment(&self, id: Uuid, comment: String) -> StoreResult<Option<Comment>> {
        let mut tables = self.tables.write().await;
        Ok(active_comment_mut(&mut tables.comments, id).map(|c| {
            c.comment = comment;
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn soft_delete_comment(
        &self,
        id: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Option<Comment>> {
        let mut tables = self.tables.write().await;
        Ok(active_comment_mut(&mut tables.comments, id).map(|c| {
            c.is_deleted = true;
            c.deleted_by = Some(stamp.by);
            c.deleted_at = Some(stamp.at);
            c.clone()
        }))
    }

    async fn soft_delete_comments_by_post(
        &self,
        post: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Vec<Comment>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .comments
            .iter_mut()
            .filter(|c| c.post == post && !c.is_deleted)
            .map(|c| {
                c.is_deleted = true;
                c.deleted_by = Some(stamp.by);
                c.deleted_at = Some(stamp.at);
                c.clone()
            })
            .collect())
    }

    async fn soft_delete_comments_by_author(
        &self,
        author: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Vec<Comment>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .comments
            .iter_mut()
            .filter(|c| c.user == author && !c.is_deleted)
            .map(|c| {
                c.is_deleted = true;
                c.deleted_by = Some(stamp.by);
                c.deleted_at = Some(stamp.at);
                c.clone()
            })
            .collect())
    }
}
