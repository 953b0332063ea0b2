//! Postgres driver tests. They need a reachable database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

use blog_api::{
    PostgresRepository,
    error::StoreError,
    models::{Role, User},
    repository::{
        DeletionStamp, NewComment, NewPost, NewUser, PostFilter, RefSet, Repository, UserPatch,
        Visibility,
    },
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Usernames are unique among live users, so every test run gets fresh ones.
fn unique_username(prefix: &str) -> String {
    format!("{prefix}_{}", &Uuid::new_v4().simple().to_string()[..12])
}

async fn create_test_user(repo: &PostgresRepository, prefix: &str) -> User {
    let role = repo
        .find_role(Role::User)
        .await
        .unwrap()
        .expect("roles are seeded by the migration");

    repo.create_user(NewUser {
        name: prefix.to_string(),
        username: unique_username(prefix),
        password_hash: "not-a-real-hash".to_string(),
        role,
    })
    .await
    .unwrap()
}

async fn create_test_post(repo: &PostgresRepository, owner: Uuid) -> Uuid {
    let post = repo
        .create_post(NewPost {
            title: "Title".into(),
            content: "Content".into(),
            user: owner,
        })
        .await
        .unwrap();
    repo.push_user_ref(owner, RefSet::Posts, post.id)
        .await
        .unwrap();
    post.id
}

// --- Users ---

#[tokio::test]
#[ignore]
async fn test_create_user_resolves_role_name() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let user = create_test_user(&repo, "alice").await;
    assert_eq!(user.role, Role::User);
    assert!(!user.is_deleted);
    assert!(user.posts.is_empty());

    let found = repo
        .get_user_by_username(&user.username)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, user.id);
}

#[tokio::test]
#[ignore]
async fn test_username_conflict_only_among_live_users() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let role = repo.find_role(Role::User).await.unwrap().unwrap();

    let first = create_test_user(&repo, "dup").await;
    let clash = NewUser {
        name: "Dup".into(),
        username: first.username.clone(),
        password_hash: "x".into(),
        role,
    };

    assert!(matches!(
        repo.create_user(clash.clone()).await,
        Err(StoreError::Conflict(_))
    ));

    // Once the holder is soft-deleted the name is free again.
    repo.soft_delete_user(first.id, DeletionStamp::now(first.id))
        .await
        .unwrap();
    let second = repo.create_user(clash).await.unwrap();
    assert_ne!(second.id, first.id);
}

#[tokio::test]
#[ignore]
async fn test_update_user_into_taken_username_conflicts() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let alice = create_test_user(&repo, "alice").await;
    let bob = create_test_user(&repo, "bob").await;

    let patch = UserPatch {
        username: Some(alice.username.clone()),
        ..UserPatch::default()
    };
    assert!(matches!(
        repo.update_user(bob.id, patch).await,
        Err(StoreError::Conflict(_))
    ));
}

#[tokio::test]
#[ignore]
async fn test_soft_delete_is_conditional() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&repo, "gone").await;
    let stamp = DeletionStamp::now(user.id);

    let deleted = repo.soft_delete_user(user.id, stamp).await.unwrap().unwrap();
    assert!(deleted.is_deleted);
    assert_eq!(deleted.deleted_by, Some(user.id));

    // A second delete finds no live row and leaves the audit stamp alone.
    assert!(repo
        .soft_delete_user(user.id, DeletionStamp::now(Uuid::new_v4()))
        .await
        .unwrap()
        .is_none());

    assert!(repo.get_user(user.id, Visibility::Active).await.unwrap().is_none());
    let audit = repo
        .get_user(user.id, Visibility::IncludeDeleted)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(audit.deleted_by, Some(user.id));
}

#[tokio::test]
#[ignore]
async fn test_set_user_role_promotes() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&repo, "promote").await;

    let promoted = repo
        .set_user_role(user.id, Role::Admin)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promoted.role, Role::Admin);
}

// --- Posts ---

#[tokio::test]
#[ignore]
async fn test_reference_sets_are_add_to_set() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&repo, "owner").await;
    let post_id = create_test_post(&repo, owner.id).await;

    repo.push_user_ref(owner.id, RefSet::Posts, post_id)
        .await
        .unwrap();
    let owner_now = repo.get_user(owner.id, Visibility::Active).await.unwrap().unwrap();
    assert_eq!(owner_now.posts, vec![post_id]);

    repo.pull_user_ref(owner.id, RefSet::Posts, post_id)
        .await
        .unwrap();
    let owner_now = repo.get_user(owner.id, Visibility::Active).await.unwrap().unwrap();
    assert!(owner_now.posts.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_list_posts_excludes_owner_and_deleted() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let alice = create_test_user(&repo, "alice").await;
    let bob = create_test_user(&repo, "bob").await;
    let alive = create_test_post(&repo, alice.id).await;
    let dead = create_test_post(&repo, alice.id).await;
    repo.soft_delete_post(dead, DeletionStamp::now(alice.id))
        .await
        .unwrap();

    let for_bob: Vec<Uuid> = repo
        .list_posts(PostFilter {
            exclude_owner: Some(bob.id),
        })
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert!(for_bob.contains(&alive));
    assert!(!for_bob.contains(&dead));

    let for_alice: Vec<Uuid> = repo
        .list_posts(PostFilter {
            exclude_owner: Some(alice.id),
        })
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert!(!for_alice.contains(&alive));
}

#[tokio::test]
#[ignore]
async fn test_bulk_delete_by_owner_returns_only_newly_deleted() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&repo, "bulk").await;
    let first = create_test_post(&repo, owner.id).await;
    let second = create_test_post(&repo, owner.id).await;
    repo.soft_delete_post(first, DeletionStamp::now(owner.id))
        .await
        .unwrap();

    let deleted = repo
        .soft_delete_posts_by_owner(owner.id, DeletionStamp::now(owner.id))
        .await
        .unwrap();
    let ids: Vec<Uuid> = deleted.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![second]);
}

// --- Comments ---

#[tokio::test]
#[ignore]
async fn test_comment_requires_live_post_at_write_time() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo, "author").await;
    let post_id = create_test_post(&repo, author.id).await;
    repo.soft_delete_post(post_id, DeletionStamp::now(author.id))
        .await
        .unwrap();

    let result = repo
        .create_comment(NewComment {
            comment: "late".into(),
            user: author.id,
            post: post_id,
        })
        .await;
    assert!(matches!(result, Err(StoreError::InvalidReference(_))));

    let result = repo
        .create_comment(NewComment {
            comment: "nowhere".into(),
            user: author.id,
            post: Uuid::new_v4(),
        })
        .await;
    assert!(matches!(result, Err(StoreError::InvalidReference(_))));
}

#[tokio::test]
#[ignore]
async fn test_comments_by_post_cascade() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo, "author").await;
    let post_id = create_test_post(&repo, author.id).await;

    let comment = repo
        .create_comment(NewComment {
            comment: "hello".into(),
            user: author.id,
            post: post_id,
        })
        .await
        .unwrap();
    repo.push_post_comment(post_id, comment.id).await.unwrap();

    let post = repo.get_post(post_id, Visibility::Active).await.unwrap().unwrap();
    let live = repo.get_comments(&post.comments).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].post, post_id);

    let deleted = repo
        .soft_delete_comments_by_post(post_id, DeletionStamp::now(author.id))
        .await
        .unwrap();
    assert_eq!(deleted.len(), 1);
    assert!(repo.get_comments(&post.comments).await.unwrap().is_empty());
}
