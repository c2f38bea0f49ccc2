use crate::entities::{comment, post, user};
use crate::error::{AppError, AppResult};
use crate::models::{
    CommentResponse, CreateCommentRequest, Page, PageRequest, Pagination, UpdateCommentRequest,
    UserSummary, MAX_COMMENT_LENGTH,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};

pub fn clean_comment(raw: &str) -> AppResult<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::field("content", "Content cannot be empty."));
    }
    if content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(AppError::field(
            "content",
            format!("Content too long (max {} characters).", MAX_COMMENT_LENGTH),
        ));
    }
    Ok(content.to_string())
}

pub async fn find_comment<C: ConnectionTrait>(db: &C, comment_id: i64) -> AppResult<comment::Model> {
    comment::Entity::find_by_id(comment_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))
}

pub async fn create_comment(
    db: &DatabaseConnection,
    author: &user::Model,
    req: CreateCommentRequest,
) -> AppResult<comment::Model> {
    let content = clean_comment(&req.content)?;

    post::Entity::find_by_id(req.post_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;

    if let Some(parent_id) = req.parent_id {
        let parent = comment::Entity::find_by_id(parent_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("Parent comment"))?;
        if parent.post_id != req.post_id {
            return Err(AppError::field(
                "parent_id",
                "Parent comment must be from the same post.",
            ));
        }
    }

    let now = Utc::now();
    let new_comment = comment::ActiveModel {
        content: Set(content),
        post_id: Set(req.post_id),
        user_id: Set(author.id),
        parent_id: Set(req.parent_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let comment = comment::Entity::insert(new_comment)
        .exec_with_returning(db)
        .await?;
    Ok(comment)
}

pub async fn update_comment(
    db: &DatabaseConnection,
    comment_id: i64,
    actor_id: i64,
    req: UpdateCommentRequest,
) -> AppResult<comment::Model> {
    let comment = find_comment(db, comment_id).await?;
    if comment.user_id != actor_id {
        return Err(AppError::Forbidden(
            "You can only edit your own comments".to_string(),
        ));
    }

    let content = match req.content.as_deref() {
        Some(raw) => clean_comment(raw)?,
        None => return Ok(comment),
    };

    let mut active: comment::ActiveModel = comment.into();
    active.content = Set(content);
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

/// Deletes the comment and every reply beneath it, deepest first.
pub async fn delete_comment(db: &DatabaseConnection, comment_id: i64, actor_id: i64) -> AppResult<()> {
    let comment = find_comment(db, comment_id).await?;
    if comment.user_id != actor_id {
        return Err(AppError::Forbidden(
            "You can only delete your own comments".to_string(),
        ));
    }

    let txn = db.begin().await?;

    let replies = replies_in_posts(&txn, &[comment.post_id]).await?;
    let children = children_by_parent(&replies);

    let mut levels: Vec<Vec<i64>> = vec![vec![comment.id]];
    loop {
        let next: Vec<i64> = levels
            .last()
            .map(|level| {
                level
                    .iter()
                    .filter_map(|id| children.get(id))
                    .flat_map(|kids| kids.iter().map(|c| c.id))
                    .collect()
            })
            .unwrap_or_default();
        if next.is_empty() {
            break;
        }
        levels.push(next);
    }

    for level in levels.into_iter().rev() {
        comment::Entity::delete_many()
            .filter(comment::Column::Id.is_in(level))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;
    Ok(())
}

async fn replies_in_posts<C: ConnectionTrait>(
    db: &C,
    post_ids: &[i64],
) -> AppResult<Vec<comment::Model>> {
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(comment::Entity::find()
        .filter(comment::Column::PostId.is_in(post_ids.to_vec()))
        .filter(comment::Column::ParentId.is_not_null())
        .order_by_asc(comment::Column::CreatedAt)
        .order_by_asc(comment::Column::Id)
        .all(db)
        .await?)
}

fn children_by_parent(replies: &[comment::Model]) -> HashMap<i64, Vec<&comment::Model>> {
    let mut children: HashMap<i64, Vec<&comment::Model>> = HashMap::new();
    for reply in replies {
        if let Some(parent_id) = reply.parent_id {
            children.entry(parent_id).or_default().push(reply);
        }
    }
    children
}

/// Every descendant of `root`, flattened into one list ordered by creation.
fn flatten_descendants<'a>(
    root: i64,
    children: &HashMap<i64, Vec<&'a comment::Model>>,
) -> Vec<&'a comment::Model> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    let mut pending = vec![root];
    while let Some(id) = pending.pop() {
        for child in children.get(&id).into_iter().flatten() {
            if seen.insert(child.id) {
                found.push(*child);
                pending.push(child.id);
            }
        }
    }
    found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    found
}

async fn authors_of<C: ConnectionTrait>(
    db: &C,
    comments: &[&comment::Model],
) -> AppResult<HashMap<i64, user::Model>> {
    let ids: HashSet<i64> = comments.iter().map(|c| c.user_id).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect())
}

fn to_response(
    comment: &comment::Model,
    authors: &HashMap<i64, user::Model>,
    replies: Vec<CommentResponse>,
) -> AppResult<CommentResponse> {
    let author = authors.get(&comment.user_id).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "comment {} references missing author {}",
            comment.id,
            comment.user_id
        ))
    })?;
    Ok(CommentResponse {
        id: comment.id,
        content: comment.content.clone(),
        post_id: comment.post_id,
        parent_id: comment.parent_id,
        author: UserSummary::from(author),
        created_at: comment.created_at,
        updated_at: comment.updated_at,
        replies,
    })
}

/// Shapes comments for output: top-level comments carry all their
/// descendants as one flat reply list, replies carry none.
pub async fn comment_threads<C: ConnectionTrait>(
    db: &C,
    comments: Vec<comment::Model>,
) -> AppResult<Vec<CommentResponse>> {
    let top_level_posts: Vec<i64> = comments
        .iter()
        .filter(|c| c.parent_id.is_none())
        .map(|c| c.post_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let replies = replies_in_posts(db, &top_level_posts).await?;
    let children = children_by_parent(&replies);

    let threads: Vec<(&comment::Model, Vec<&comment::Model>)> = comments
        .iter()
        .map(|c| {
            let descendants = if c.parent_id.is_none() {
                flatten_descendants(c.id, &children)
            } else {
                Vec::new()
            };
            (c, descendants)
        })
        .collect();

    let everyone: Vec<&comment::Model> = threads
        .iter()
        .flat_map(|(c, descendants)| std::iter::once(*c).chain(descendants.iter().copied()))
        .collect();
    let authors = authors_of(db, &everyone).await?;

    threads
        .into_iter()
        .map(|(c, descendants)| {
            let replies = descendants
                .into_iter()
                .map(|reply| to_response(reply, &authors, Vec::new()))
                .collect::<AppResult<Vec<_>>>()?;
            to_response(c, &authors, replies)
        })
        .collect()
}

/// Top-level comments, newest first, optionally restricted to one post.
pub async fn list_comments<C: ConnectionTrait>(
    db: &C,
    post_id: Option<i64>,
    page: PageRequest,
) -> AppResult<Page<CommentResponse>> {
    let mut query = comment::Entity::find().filter(comment::Column::ParentId.is_null());
    if let Some(post_id) = post_id {
        query = query.filter(comment::Column::PostId.eq(post_id));
    }

    let paginator = query
        .order_by_desc(comment::Column::CreatedAt)
        .order_by_desc(comment::Column::Id)
        .paginate(db, page.per_page);
    let total = paginator.num_items().await?;
    let comments = paginator.fetch_page(page.page - 1).await?;

    Ok(Page {
        items: comment_threads(db, comments).await?,
        pagination: Pagination::new(page, total),
    })
}

pub async fn get_comment<C: ConnectionTrait>(db: &C, comment_id: i64) -> AppResult<CommentResponse> {
    let comment = find_comment(db, comment_id).await?;
    comment_threads(db, vec![comment])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Comment"))
}

/// Replies beneath any comment, flattened and oldest first.
pub async fn get_replies<C: ConnectionTrait>(
    db: &C,
    comment_id: i64,
) -> AppResult<Vec<CommentResponse>> {
    let comment = find_comment(db, comment_id).await?;
    let replies = replies_in_posts(db, &[comment.post_id]).await?;
    let children = children_by_parent(&replies);
    let descendants = flatten_descendants(comment.id, &children);
    let authors = authors_of(db, &descendants).await?;

    descendants
        .into_iter()
        .map(|reply| to_response(reply, &authors, Vec::new()))
        .collect()
}
