use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
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

// Users are always read joined to their role so the role name comes back as text.
const USER_COLUMNS: &str = "u.id, u.name, u.username, u.password_hash, r.name AS role, \
     u.posts, u.comments, u.is_deleted, u.deleted_by, u.deleted_at, u.created_at, u.updated_at";

const POST_COLUMNS: &str =
    "id, title, content, user_id, comments, is_deleted, deleted_by, deleted_at, created_at, updated_at";

const COMMENT_COLUMNS: &str =
    "id, comment, user_id, post_id, is_deleted, deleted_by, deleted_at, created_at, updated_at";

impl Visibility {
    /// SQL predicate fragment for this visibility, scoped to `alias`.
    fn clause(&self, alias: &str) -> String {
        match self {
            Visibility::Active => format!("AND {alias}.is_deleted = false"),
            Visibility::IncludeDeleted => String::new(),
        }
    }
}

impl RefSet {
    fn column(&self) -> &'static str {
        match self {
            RefSet::Posts => "posts",
            RefSet::Comments => "comments",
        }
    }
}

/// UserRow
///
/// Raw `users ⋈ roles` row. Converted into [`User`] once the role name has
/// been parsed into the closed [`Role`] enum.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    username: String,
    password_hash: String,
    role: String,
    posts: Vec<Uuid>,
    comments: Vec<Uuid>,
    is_deleted: bool,
    deleted_by: Option<Uuid>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| StoreError::CorruptRecord(format!("user {}: {e}", row.id)))?;

        Ok(User {
            id: row.id,
            name: row.name,
            username: row.username,
            password_hash: row.password_hash,
            role,
            posts: row.posts,
            comments: row.comments,
            is_deleted: row.is_deleted,
            deleted_by: row.deleted_by,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
}

/// Maps a driver error, turning unique violations into `Conflict`.
fn map_write_err(conflict_message: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(conflict_message.to_string())
        }
        _ => {
            tracing::error!("postgres write error: {:?}", err);
            StoreError::Database(err)
        }
    }
}

fn log_read_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| {
        tracing::error!("{context} error: {:?}", err);
        StoreError::Database(err)
    }
}

/// Wraps a user-returning write in a CTE named `changed` so the result can be
/// joined back to `roles`.
fn changed_user_sql(statement: &str) -> String {
    format!(
        "WITH changed AS ({statement}) SELECT {USER_COLUMNS} FROM changed u JOIN roles r ON r.id = u.role_id"
    )
}

fn into_users(rows: Vec<UserRow>) -> StoreResult<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

/// PostgresRepository
///
/// The production Entity Store backed by PostgreSQL. Reference sets are
/// `UUID[]` columns edited with `array_append`/`array_remove`; every update
/// carries `is_deleted = false` in its `WHERE` clause.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_role(&self, role: Role) -> StoreResult<Option<RoleRecord>> {
        let row = sqlx::query_as::<_, RoleRow>("SELECT id, name FROM roles WHERE lower(name) = $1")
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(log_read_err("find_role"))?;

        row.map(|r| {
            r.name
                .parse::<Role>()
                .map(|role| RoleRecord { id: r.id, role })
                .map_err(StoreError::CorruptRecord)
        })
        .transpose()
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let sql = changed_user_sql(
            "INSERT INTO users (id, name, username, password_hash, role_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.name)
            .bind(new.username)
            .bind(new.password_hash)
            .bind(new.role.id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_err("Username is already taken"))?;

        User::try_from(row)
    }

    async fn get_user(&self, id: Uuid, visibility: Visibility) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = $1 {}",
            visibility.clause("u")
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(log_read_err("get_user"))?
            .map(User::try_from)
            .transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id \
             WHERE u.username = $1 AND u.is_deleted = false"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(log_read_err("get_user_by_username"))?
            .map(User::try_from)
            .transpose()
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id \
             WHERE u.is_deleted = false ORDER BY u.created_at"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(log_read_err("list_users"))?;
        into_users(rows)
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id \
             WHERE u.id = ANY($1) AND u.is_deleted = false"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(log_read_err("get_users"))?;
        Ok(order_by_ids(ids, into_users(rows)?, |u| u.id))
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>> {
        let sql = changed_user_sql(
            "UPDATE users SET name = COALESCE($2, name), \
                              username = COALESCE($3, username), \
                              password_hash = COALESCE($4, password_hash), \
                              updated_at = NOW() \
             WHERE id = $1 AND is_deleted = false RETURNING *",
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(patch.name)
            .bind(patch.username)
            .bind(patch.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_err("Username is already taken"))?
            .map(User::try_from)
            .transpose()
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>> {
        let sql = changed_user_sql(
            "UPDATE users SET role_id = (SELECT id FROM roles WHERE lower(name) = $2), updated_at = NOW() \
             WHERE id = $1 AND is_deleted = false RETURNING *",
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(log_read_err("set_user_role"))?
            .map(User::try_from)
            .transpose()
    }

    async fn soft_delete_user(&self, id: Uuid, stamp: DeletionStamp) -> StoreResult<Option<User>> {
        let sql = changed_user_sql(
            "UPDATE users SET is_deleted = true, deleted_by = $2, deleted_at = $3 \
             WHERE id = $1 AND is_deleted = false RETURNING *",
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(stamp.by)
            .bind(stamp.at)
            .fetch_optional(&self.pool)
            .await
            .map_err(log_read_err("soft_delete_user"))?
            .map(User::try_from)
            .transpose()
    }

    async fn push_user_ref(&self, user: Uuid, set: RefSet, id: Uuid) -> StoreResult<()> {
        let column = set.column();
        let sql = format!(
            "UPDATE users SET {column} = array_append({column}, $2) \
             WHERE id = $1 AND is_deleted = false AND NOT ($2 = ANY({column}))"
        );
        sqlx::query(&sql)
            .bind(user)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(log_read_err("push_user_ref"))?;
        Ok(())
    }

    async fn pull_user_ref(&self, user: Uuid, set: RefSet, id: Uuid) -> StoreResult<()> {
        let column = set.column();
        let sql = format!(
            "UPDATE users SET {column} = array_remove({column}, $2) \
             WHERE id = $1 AND is_deleted = false"
        );
        sqlx::query(&sql)
            .bind(user)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(log_read_err("pull_user_ref"))?;
        Ok(())
    }

    async fn create_post(&self, new: NewPost) -> StoreResult<Post> {
        let sql = format!(
            "INSERT INTO posts (id, title, content, user_id) VALUES ($1, $2, $3, $4) RETURNING {POST_COLUMNS}"
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.title)
            .bind(new.content)
            .bind(new.user)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_err("Post already exists"))
    }

    async fn get_post(&self, id: Uuid, visibility: Visibility) -> StoreResult<Option<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1 {}",
            visibility.clause("p")
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(log_read_err("get_post"))
    }

    async fn list_posts(&self, filter: PostFilter) -> StoreResult<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE is_deleted = false AND ($1::uuid IS NULL OR user_id <> $1) \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(filter.exclude_owner)
            .fetch_all(&self.pool)
            .await
            .map_err(log_read_err("list_posts"))
    }

    async fn get_posts(&self, ids: &[Uuid]) -> StoreResult<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = ANY($1) AND is_deleted = false"
        );
        let posts = sqlx::query_as::<_, Post>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(log_read_err("get_posts"))?;
        Ok(order_by_ids(ids, posts, |p| p.id))
    }

    async fn update_post(&self, id: Uuid, patch: PostPatch) -> StoreResult<Option<Post>> {
        let sql = format!(
            "UPDATE posts SET title = COALESCE($2, title), content = COALESCE($3, content), updated_at = NOW() \
             WHERE id = $1 AND is_deleted = false RETURNING {POST_COLUMNS}"
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .bind(patch.title)
            .bind(patch.content)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_err("Post update conflicted"))
    }

    async fn soft_delete_post(&self, id: Uuid, stamp: DeletionStamp) -> StoreResult<Option<Post>> {
        let sql = format!(
            "UPDATE posts SET is_deleted = true, deleted_by = $2, deleted_at = $3 \
             WHERE id = $1 AND is_deleted = false RETURNING {POST_COLUMNS}"
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .bind(stamp.by)
            .bind(stamp.at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_err("Post delete conflicted"))
    }

    async fn soft_delete_posts_by_owner(
        &self,
        owner: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Vec<Post>> {
        let sql = format!(
            "UPDATE posts SET is_deleted = true, deleted_by = $2, deleted_at = $3 \
             WHERE user_id = $1 AND is_deleted = false RETURNING {POST_COLUMNS}"
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(owner)
            .bind(stamp.by)
            .bind(stamp.at)
            .fetch_all(&self.pool)
            .await
            .map_err(map_write_err("Post delete conflicted"))
    }

    async fn push_post_comment(&self, post: Uuid, comment: Uuid) -> StoreResult<()> {
        sqlx::query(
            "UPDATE posts SET comments = array_append(comments, $2) \
             WHERE id = $1 AND is_deleted = false AND NOT ($2 = ANY(comments))",
        )
        .bind(post)
        .bind(comment)
        .execute(&self.pool)
        .await
        .map_err(log_read_err("push_post_comment"))?;
        Ok(())
    }

    async fn pull_post_comment(&self, post: Uuid, comment: Uuid) -> StoreResult<()> {
        sqlx::query(
            "UPDATE posts SET comments = array_remove(comments, $2) \
             WHERE id = $1 AND is_deleted = false",
        )
        .bind(post)
        .bind(comment)
        .execute(&self.pool)
        .await
        .map_err(log_read_err("pull_post_comment"))?;
        Ok(())
    }

    /// create_comment
    ///
    /// The post check and the insert are one statement: `INSERT ... SELECT ...
    /// WHERE EXISTS` writes nothing unless the post is live at that instant.
    async fn create_comment(&self, new: NewComment) -> StoreResult<Comment> {
        let sql = format!(
            "INSERT INTO comments (id, comment, user_id, post_id) \
             SELECT $1, $2, $3, $4 \
             WHERE EXISTS (SELECT 1 FROM posts WHERE id = $4 AND is_deleted = false) \
             RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.comment)
            .bind(new.user)
            .bind(new.post)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_err("Comment already exists"))?
            .ok_or_else(|| StoreError::InvalidReference("Please provide a valid post id.".to_string()))
    }

    async fn get_comment(&self, id: Uuid, visibility: Visibility) -> StoreResult<Option<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = $1 {}",
            visibility.clause("c")
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(log_read_err("get_comment"))
    }

    async fn list_comments(&self) -> StoreResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE is_deleted = false ORDER BY created_at"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(log_read_err("list_comments"))
    }

    async fn get_comments(&self, ids: &[Uuid]) -> StoreResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ANY($1) AND is_deleted = false"
        );
        let comments = sqlx::query_as::<_, Comment>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(log_read_err("get_comments"))?;
        Ok(order_by_ids(ids, comments, |c| c.id))
    }

    async fn update_comment(&self, id: Uuid, comment: String) -> StoreResult<Option<Comment>> {
        let sql = format!(
            "UPDATE comments SET comment = $2, updated_at = NOW() \
             WHERE id = $1 AND is_deleted = false RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .bind(comment)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_err("Comment update conflicted"))
    }

    async fn soft_delete_comment(
        &self,
        id: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Option<Comment>> {
        let sql = format!(
            "UPDATE comments SET is_deleted = true, deleted_by = $2, deleted_at = $3 \
             WHERE id = $1 AND is_deleted = false RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .bind(stamp.by)
            .bind(stamp.at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_err("Comment delete conflicted"))
    }

    async fn soft_delete_comments_by_post(
        &self,
        post: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Vec<Comment>> {
        let sql = format!(
            "UPDATE comments SET is_deleted = true, deleted_by = $2, deleted_at = $3 \
             WHERE post_id = $1 AND is_deleted = false RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(post)
            .bind(stamp.by)
            .bind(stamp.at)
            .fetch_all(&self.pool)
            .await
            .map_err(map_write_err("Comment delete conflicted"))
    }

    async fn soft_delete_comments_by_author(
        &self,
        author: Uuid,
        stamp: DeletionStamp,
    ) -> StoreResult<Vec<Comment>> {
        let sql = format!(
            "UPDATE comments SET is_deleted = true, deleted_by = $2, deleted_at = $3 \
             WHERE user_id = $1 AND is_deleted = false RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(author)
            .bind(stamp.by)
            .bind(stamp.at)
            .fetch_all(&self.pool)
            .await
            .map_err(map_write_err("Comment delete conflicted"))
    }
}
