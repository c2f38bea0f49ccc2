use crate::entities::{post, post_tag, tag};
use crate::error::{AppError, AppResult};
use crate::models::{Page, PageRequest, Pagination, PostResponse, TagResponse, MAX_TAG_LENGTH};
use crate::services::posts;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, Query, SelectStatement};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

/// Trims names, drops blanks and collapses duplicates while keeping first-seen order.
pub fn normalize_tag_names(names: &[String]) -> AppResult<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(names.len());
    for raw in names {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        if name.chars().count() > MAX_TAG_LENGTH {
            return Err(AppError::field(
                "tag_names",
                format!("Tag name too long (max {} characters): {}", MAX_TAG_LENGTH, name),
            ));
        }
        if !normalized.iter().any(|existing| existing == name) {
            normalized.push(name.to_string());
        }
    }
    Ok(normalized)
}

/// Splits a comma-separated `tags` query value.
pub fn parse_tag_filter(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves a tag by name, creating it when absent.
pub async fn get_or_create_tag<C: ConnectionTrait>(db: &C, name: &str) -> AppResult<tag::Model> {
    let existing = tag::Entity::find()
        .filter(tag::Column::Name.eq(name))
        .one(db)
        .await?;
    if let Some(tag) = existing {
        return Ok(tag);
    }

    let new_tag = tag::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    match tag::Entity::insert(new_tag).exec_with_returning(db).await {
        Ok(tag) => Ok(tag),
        Err(e) => {
            // Lost a race with a concurrent insert of the same name.
            let existing = tag::Entity::find()
                .filter(tag::Column::Name.eq(name))
                .one(db)
                .await?;
            existing.ok_or_else(|| AppError::from(e))
        }
    }
}

/// Replaces the complete tag set of a post.
pub async fn replace_post_tags<C: ConnectionTrait>(
    db: &C,
    post_id: i64,
    names: &[String],
) -> AppResult<()> {
    post_tag::Entity::delete_many()
        .filter(post_tag::Column::PostId.eq(post_id))
        .exec(db)
        .await?;

    for name in names {
        let tag = get_or_create_tag(db, name).await?;
        let link = post_tag::ActiveModel {
            post_id: Set(post_id),
            tag_id: Set(tag.id),
            ..Default::default()
        };
        post_tag::Entity::insert(link).exec(db).await?;
    }
    Ok(())
}

/// `SELECT post_id FROM post_tags JOIN tags ... WHERE tags.name IN (names)`
pub fn tagged_post_ids(names: Vec<String>) -> SelectStatement {
    Query::select()
        .column((post_tag::Entity, post_tag::Column::PostId))
        .from(post_tag::Entity)
        .inner_join(
            tag::Entity,
            Expr::col((tag::Entity, tag::Column::Id))
                .equals((post_tag::Entity, post_tag::Column::TagId)),
        )
        .and_where(Expr::col((tag::Entity, tag::Column::Name)).is_in(names))
        .to_owned()
}

pub async fn list_tags<C: ConnectionTrait>(
    db: &C,
    search: Option<&str>,
    page: PageRequest,
) -> AppResult<Page<TagResponse>> {
    let mut query = tag::Entity::find();
    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        query = query.filter(
            Expr::expr(Func::lower(Expr::col(tag::Column::Name)))
                .like(posts::contains_pattern(search)),
        );
    }

    let paginator = query
        .order_by_asc(tag::Column::Name)
        .paginate(db, page.per_page);
    let total = paginator.num_items().await?;
    let tags = paginator.fetch_page(page.page - 1).await?;

    Ok(Page {
        items: tags.into_iter().map(TagResponse::from).collect(),
        pagination: Pagination::new(page, total),
    })
}

pub async fn get_tag<C: ConnectionTrait>(db: &C, tag_id: i64) -> AppResult<tag::Model> {
    tag::Entity::find_by_id(tag_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Tag"))
}

/// Published posts carrying the tag, newest first.
pub async fn tag_posts<C: ConnectionTrait>(
    db: &C,
    tag_id: i64,
    page: PageRequest,
    viewer: Option<i64>,
) -> AppResult<(tag::Model, Page<PostResponse>)> {
    let tag = get_tag(db, tag_id).await?;

    let query = post::Entity::find()
        .filter(post::Column::IsPublished.eq(true))
        .filter(post::Column::Id.in_subquery(tagged_post_ids(vec![tag.name.clone()])));
    let posts = posts::paginate_posts(db, posts::newest_first(query), page, viewer).await?;

    Ok((tag, posts))
}
