use crate::entities::{bookmark, like, post};
use crate::error::{AppError, AppResult};
use crate::services::posts::find_visible_post;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, Set, TransactionTrait,
};

/// What the caller asked for: `Add` and `Remove` refuse a no-op, `Toggle` always flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionAction {
    Add,
    Remove,
    Toggle,
}

impl ReactionAction {
    /// Decides whether the row should exist afterwards, given whether it exists now.
    fn target(self, present: bool, noun: &str) -> AppResult<bool> {
        match (self, present) {
            (ReactionAction::Add, true) => Err(AppError::Conflict(format!("Post already {}", noun))),
            (ReactionAction::Remove, false) => {
                Err(AppError::Conflict(format!("Post not {}", noun)))
            }
            (ReactionAction::Add, false) => Ok(true),
            (ReactionAction::Remove, true) => Ok(false),
            (ReactionAction::Toggle, present) => Ok(!present),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkState {
    pub bookmarked: bool,
}

/// Rewrites `posts.like_count` from the like rows so the two cannot drift.
pub async fn sync_like_count<C: ConnectionTrait>(db: &C, post_id: i64) -> AppResult<i64> {
    let count = like::Entity::find()
        .filter(like::Column::PostId.eq(post_id))
        .count(db)
        .await? as i64;

    let active = post::ActiveModel {
        id: Set(post_id),
        like_count: Set(count),
        ..Default::default()
    };
    post::Entity::update(active).exec(db).await?;
    Ok(count)
}

pub async fn set_like(
    db: &DatabaseConnection,
    user_id: i64,
    post_id: i64,
    action: ReactionAction,
) -> AppResult<LikeState> {
    find_visible_post(db, post_id, Some(user_id)).await?;

    let txn = db.begin().await?;

    let existing = like::Entity::find()
        .filter(like::Column::UserId.eq(user_id))
        .filter(like::Column::PostId.eq(post_id))
        .one(&txn)
        .await?;
    let liked = action.target(existing.is_some(), "liked")?;

    match existing {
        Some(row) if !liked => {
            row.delete(&txn).await?;
        }
        None if liked => {
            let new_like = like::ActiveModel {
                user_id: Set(user_id),
                post_id: Set(post_id),
                created_at: Set(Utc::now()),
                ..Default::default()
            };
            like::Entity::insert(new_like).exec(&txn).await?;
        }
        _ => {}
    }
    let like_count = sync_like_count(&txn, post_id).await?;

    txn.commit().await?;

    log::debug!(
        "User {} {} post {} (like_count={})",
        user_id,
        if liked { "liked" } else { "unliked" },
        post_id,
        like_count
    );
    Ok(LikeState { liked, like_count })
}

pub async fn set_bookmark(
    db: &DatabaseConnection,
    user_id: i64,
    post_id: i64,
    action: ReactionAction,
) -> AppResult<BookmarkState> {
    find_visible_post(db, post_id, Some(user_id)).await?;

    let existing = bookmark::Entity::find()
        .filter(bookmark::Column::UserId.eq(user_id))
        .filter(bookmark::Column::PostId.eq(post_id))
        .one(db)
        .await?;
    let bookmarked = action.target(existing.is_some(), "bookmarked")?;

    match existing {
        Some(row) if !bookmarked => {
            row.delete(db).await?;
        }
        None if bookmarked => {
            let new_bookmark = bookmark::ActiveModel {
                user_id: Set(user_id),
                post_id: Set(post_id),
                created_at: Set(Utc::now()),
                ..Default::default()
            };
            bookmark::Entity::insert(new_bookmark).exec(db).await?;
        }
        _ => {}
    }

    Ok(BookmarkState { bookmarked })
}
