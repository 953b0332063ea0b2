use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::ApiError,
    models::Post,
    repository::{DeletionStamp, RefSet, Repository, StoreResult, Visibility},
};

pub const COMMENT_NOT_FOUND: &str = "No Such Comment Exists";
pub const POST_NOT_FOUND: &str = "There is no such post belong to given id";
pub const USER_NOT_FOUND: &str = "No user were found with given id.";

/// CascadeSummary
///
/// Ids soft-deleted by one cascade, the root entity included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub users: Vec<Uuid>,
    pub posts: Vec<Uuid>,
    pub comments: Vec<Uuid>,
}

/// Maps a failed step that ran after the root entity was deleted.
fn step<T>(entity: &str, name: &str, result: StoreResult<T>) -> Result<T, ApiError> {
    result.map_err(|err| {
        tracing::error!(entity, step = name, error = %err, "cascade stopped part way");
        ApiError::partial_cascade(entity, name)
    })
}

/// CascadeCoordinator
///
/// Runs the three delete cascades. Each one deletes the root entity first and
/// its dependents after, so a failure part way leaves records over-deleted
/// rather than visible. Both sides of every reference are pruned. Nothing is
/// rolled back.
///
/// A deleted user's own `posts` and `comments` sets are left as they were at
/// deletion time: pruning only touches active rows.
pub struct CascadeCoordinator<'a> {
    repo: &'a dyn Repository,
}

impl<'a> CascadeCoordinator<'a> {
    pub fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    /// delete_comment
    ///
    /// Allowed for the post owner, an admin, or the comment's author. Prunes the
    /// comment from its author's set and from its post's set.
    pub async fn delete_comment(
        &self,
        actor: &AuthUser,
        comment_id: Uuid,
    ) -> Result<CascadeSummary, ApiError> {
        let comment = self
            .repo
            .get_comment(comment_id, Visibility::Active)
            .await?
            .ok_or_else(|| ApiError::not_found(COMMENT_NOT_FOUND))?;

        let post_owner = self
            .repo
            .get_post(comment.post, Visibility::IncludeDeleted)
            .await?
            .map(|post| post.user);

        let path = if actor.is_admin() || post_owner == Some(actor.id) {
            "post owner or admin"
        } else if comment.user == actor.id {
            "author"
        } else {
            return Err(ApiError::forbidden("You cannot delete someone's comment"));
        };

        let stamp = DeletionStamp::now(actor.id);
        let deleted = self
            .repo
            .soft_delete_comment(comment.id, stamp)
            .await?
            .ok_or_else(|| ApiError::not_found(COMMENT_NOT_FOUND))?;

        step(
            "Comment",
            "unlink from author",
            self.repo
                .pull_user_ref(deleted.user, RefSet::Comments, deleted.id)
                .await,
        )?;
        step(
            "Comment",
            "unlink from post",
            self.repo.pull_post_comment(deleted.post, deleted.id).await,
        )?;

        tracing::info!(comment_id = %deleted.id, by = %actor.id, path, "comment deleted");

        Ok(CascadeSummary {
            comments: vec![deleted.id],
            ..CascadeSummary::default()
        })
    }

    /// delete_post
    ///
    /// Owner or admin. Soft-deletes the post and all of its live comments, then
    /// prunes the post from its owner and each comment from its author.
    pub async fn delete_post(
        &self,
        actor: &AuthUser,
        post_id: Uuid,
    ) -> Result<CascadeSummary, ApiError> {
        let post = self
            .repo
            .get_post(post_id, Visibility::Active)
            .await?
            .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))?;

        if post.user != actor.id && !actor.is_admin() {
            return Err(ApiError::forbidden("You can't delete someone else's post."));
        }

        let stamp = DeletionStamp::now(actor.id);
        let deleted = self
            .repo
            .soft_delete_post(post.id, stamp)
            .await?
            .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))?;

        let comments = self.cascade_post(&deleted, stamp, "Post").await?;

        tracing::info!(
            post_id = %deleted.id,
            by = %actor.id,
            comments = comments.len(),
            "post deleted"
        );

        Ok(CascadeSummary {
            posts: vec![deleted.id],
            comments,
            ..CascadeSummary::default()
        })
    }

    /// delete_user
    ///
    /// Self or admin. Soft-deletes the user, runs the post cascade for every
    /// post they own, then deletes their remaining comments and prunes those
    /// from their posts.
    pub async fn delete_user(
        &self,
        actor: &AuthUser,
        user_id: Uuid,
    ) -> Result<CascadeSummary, ApiError> {
        if actor.id != user_id && !actor.is_admin() {
            return Err(ApiError::forbidden("You can't delete another user's details"));
        }

        let stamp = DeletionStamp::now(actor.id);
        let user = self
            .repo
            .soft_delete_user(user_id, stamp)
            .await?
            .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

        let mut summary = CascadeSummary {
            users: vec![user.id],
            ..CascadeSummary::default()
        };

        let posts = step(
            "User",
            "delete owned posts",
            self.repo.soft_delete_posts_by_owner(user.id, stamp).await,
        )?;
        for post in &posts {
            summary.posts.push(post.id);
            summary
                .comments
                .extend(self.cascade_post(post, stamp, "User").await?);
        }

        let authored = step(
            "User",
            "delete authored comments",
            self.repo.soft_delete_comments_by_author(user.id, stamp).await,
        )?;
        for comment in &authored {
            step(
                "User",
                "unlink comments from posts",
                self.repo.pull_post_comment(comment.post, comment.id).await,
            )?;
            summary.comments.push(comment.id);
        }

        tracing::info!(
            user_id = %user.id,
            by = %actor.id,
            posts = summary.posts.len(),
            comments = summary.comments.len(),
            "user deleted"
        );

        Ok(summary)
    }

    /// Dependents of an already-deleted post. Returns the ids of the comments
    /// this call deleted.
    async fn cascade_post(
        &self,
        post: &Post,
        stamp: DeletionStamp,
        entity: &str,
    ) -> Result<Vec<Uuid>, ApiError> {
        let comments = step(
            entity,
            "delete post comments",
            self.repo.soft_delete_comments_by_post(post.id, stamp).await,
        )?;

        step(
            entity,
            "unlink post from owner",
            self.repo.pull_user_ref(post.user, RefSet::Posts, post.id).await,
        )?;

        for comment in &comments {
            step(
                entity,
                "unlink comments from authors",
                self.repo
                    .pull_user_ref(comment.user, RefSet::Comments, comment.id)
                    .await,
            )?;
        }

        Ok(comments.into_iter().map(|c| c.id).collect())
    }
}
