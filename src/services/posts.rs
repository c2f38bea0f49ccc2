use crate::entities::{bookmark, category, comment, like, post, post_tag, tag, user};
use crate::error::{AppError, AppResult};
use crate::models::{
    CategorySummary, CreatePostRequest, Page, PageRequest, Pagination, PostListQuery,
    PostResponse, UpdatePostRequest, UserSummary, MAX_TITLE_LENGTH,
};
use crate::services::tags::{normalize_tag_names, parse_tag_filter, replace_post_tags, tagged_post_ids};
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, LikeExpr, Query, SelectStatement};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    TransactionTrait,
};
use std::collections::{HashMap, HashSet};

/// Trims the title and checks it is non-empty and within length.
pub fn clean_title(raw: &str) -> AppResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AppError::field("title", "Title cannot be empty."));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::field(
            "title",
            format!("Title too long (max {} characters).", MAX_TITLE_LENGTH),
        ));
    }
    Ok(title.to_string())
}

pub fn clean_content(raw: &str) -> AppResult<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::field("content", "Content cannot be empty."));
    }
    Ok(content.to_string())
}

async fn ensure_category<C: ConnectionTrait>(db: &C, category_id: i64) -> AppResult<()> {
    let exists = category::Entity::find_by_id(category_id).one(db).await?;
    if exists.is_none() {
        return Err(AppError::field(
            "category_id",
            format!("Invalid pk \"{}\" - object does not exist.", category_id),
        ));
    }
    Ok(())
}

pub async fn find_post<C: ConnectionTrait>(db: &C, post_id: i64) -> AppResult<post::Model> {
    post::Entity::find_by_id(post_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))
}

/// Published posts are visible to everyone; unpublished ones only to their author.
pub async fn find_visible_post<C: ConnectionTrait>(
    db: &C,
    post_id: i64,
    viewer: Option<i64>,
) -> AppResult<post::Model> {
    let post = find_post(db, post_id).await?;
    if post.is_published || viewer == Some(post.user_id) {
        Ok(post)
    } else {
        Err(AppError::not_found("Post"))
    }
}

fn ensure_owner(post: &post::Model, actor_id: i64, action: &str) -> AppResult<()> {
    if post.user_id != actor_id {
        return Err(AppError::Forbidden(format!(
            "Not authorized to {} this post",
            action
        )));
    }
    Ok(())
}

pub async fn create_post(
    db: &DatabaseConnection,
    author: &user::Model,
    req: CreatePostRequest,
) -> AppResult<post::Model> {
    let title = clean_title(&req.title)?;
    let content = clean_content(&req.content)?;
    let tag_names = normalize_tag_names(&req.tag_names)?;
    if let Some(category_id) = req.category_id {
        ensure_category(db, category_id).await?;
    }

    let txn = db.begin().await?;

    let now = Utc::now();
    let new_post = post::ActiveModel {
        title: Set(title),
        content: Set(content),
        user_id: Set(author.id),
        category_id: Set(req.category_id),
        view_count: Set(0),
        like_count: Set(0),
        is_published: Set(req.is_published),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let post = post::Entity::insert(new_post)
        .exec_with_returning(&txn)
        .await?;
    replace_post_tags(&txn, post.id, &tag_names).await?;

    txn.commit().await?;

    log::info!("User {} created post {}", author.id, post.id);
    Ok(post)
}

/// Partial update; a provided tag list replaces the whole existing set.
pub async fn update_post(
    db: &DatabaseConnection,
    post_id: i64,
    actor_id: i64,
    req: UpdatePostRequest,
) -> AppResult<post::Model> {
    let post = find_post(db, post_id).await?;
    ensure_owner(&post, actor_id, "edit")?;

    let title = req.title.as_deref().map(clean_title).transpose()?;
    let content = req.content.as_deref().map(clean_content).transpose()?;
    let tag_names = req
        .tag_names
        .as_deref()
        .map(normalize_tag_names)
        .transpose()?;
    if let Some(Some(category_id)) = req.category_id {
        ensure_category(db, category_id).await?;
    }

    let txn = db.begin().await?;

    let mut active: post::ActiveModel = post.into();
    if let Some(title) = title {
        active.title = Set(title);
    }
    if let Some(content) = content {
        active.content = Set(content);
    }
    if let Some(category_id) = req.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(is_published) = req.is_published {
        active.is_published = Set(is_published);
    }
    active.updated_at = Set(Utc::now());
    let post = active.update(&txn).await?;

    if let Some(tag_names) = tag_names {
        replace_post_tags(&txn, post.id, &tag_names).await?;
    }

    txn.commit().await?;
    Ok(post)
}

/// Removes the post together with its comments, likes, bookmarks and tag links.
pub async fn delete_post(db: &DatabaseConnection, post_id: i64, actor_id: i64) -> AppResult<()> {
    let post = find_post(db, post_id).await?;
    ensure_owner(&post, actor_id, "delete")?;

    let txn = db.begin().await?;

    like::Entity::delete_many()
        .filter(like::Column::PostId.eq(post_id))
        .exec(&txn)
        .await?;
    bookmark::Entity::delete_many()
        .filter(bookmark::Column::PostId.eq(post_id))
        .exec(&txn)
        .await?;
    post_tag::Entity::delete_many()
        .filter(post_tag::Column::PostId.eq(post_id))
        .exec(&txn)
        .await?;
    // Replies before the comments they point at.
    comment::Entity::delete_many()
        .filter(comment::Column::PostId.eq(post_id))
        .filter(comment::Column::ParentId.is_not_null())
        .exec(&txn)
        .await?;
    comment::Entity::delete_many()
        .filter(comment::Column::PostId.eq(post_id))
        .exec(&txn)
        .await?;
    post::Entity::delete_by_id(post_id).exec(&txn).await?;

    txn.commit().await?;

    log::info!("User {} deleted post {}", actor_id, post_id);
    Ok(())
}

/// Counts a view unless the viewer is the author. Every qualifying fetch
/// counts; there is no per-viewer deduplication. Returns the new count.
pub async fn increment_view<C: ConnectionTrait>(
    db: &C,
    post: &post::Model,
    viewer: Option<i64>,
) -> AppResult<i64> {
    if viewer == Some(post.user_id) {
        return Ok(post.view_count);
    }

    post::Entity::update_many()
        .col_expr(
            post::Column::ViewCount,
            Expr::col(post::Column::ViewCount).add(1),
        )
        .filter(post::Column::Id.eq(post.id))
        .exec(db)
        .await?;

    let refreshed = find_post(db, post.id).await?;
    Ok(refreshed.view_count)
}

/// Fetches a post for display and records the view.
pub async fn get_post_detail(
    db: &DatabaseConnection,
    post_id: i64,
    viewer: Option<i64>,
) -> AppResult<PostResponse> {
    let mut post = find_visible_post(db, post_id, viewer).await?;
    post.view_count = increment_view(db, &post, viewer).await?;
    post_response(db, post, viewer).await
}

fn sort_column(sort_by: Option<&str>) -> post::Column {
    match sort_by.unwrap_or("created_at") {
        "updated_at" => post::Column::UpdatedAt,
        "view_count" => post::Column::ViewCount,
        "like_count" => post::Column::LikeCount,
        "title" => post::Column::Title,
        _ => post::Column::CreatedAt,
    }
}

fn sort_order(order: Option<&str>) -> Order {
    match order {
        Some(o) if o.eq_ignore_ascii_case("asc") => Order::Asc,
        _ => Order::Desc,
    }
}

/// `SELECT id FROM posts WHERE is_published`
pub fn published_post_ids() -> SelectStatement {
    Query::select()
        .column(post::Column::Id)
        .from(post::Entity)
        .and_where(Expr::col(post::Column::IsPublished).eq(true))
        .to_owned()
}

pub fn newest_first(query: Select<post::Entity>) -> Select<post::Entity> {
    query
        .order_by_desc(post::Column::CreatedAt)
        .order_by_desc(post::Column::Id)
}

/// Lowercases `search` and escapes the LIKE metacharacters so it matches literally.
pub fn escape_like(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len());
    for c in search.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive substring pattern for a `LOWER(column) LIKE` filter.
pub fn contains_pattern(search: &str) -> LikeExpr {
    LikeExpr::new(format!("%{}%", escape_like(search))).escape('\\')
}

fn search_condition(search: &str) -> Condition {
    let pattern = contains_pattern(search);
    Condition::any()
        .add(Expr::expr(Func::lower(Expr::col(post::Column::Title))).like(pattern.clone()))
        .add(Expr::expr(Func::lower(Expr::col(post::Column::Content))).like(pattern))
}

/// Published posts matching the filters, ordered and paginated.
pub async fn list_posts<C: ConnectionTrait>(
    db: &C,
    filter: &PostListQuery,
    page: PageRequest,
    viewer: Option<i64>,
) -> AppResult<Page<PostResponse>> {
    let mut query = post::Entity::find().filter(post::Column::IsPublished.eq(true));

    if let Some(category_id) = filter.category_id.or(filter.category) {
        query = query.filter(post::Column::CategoryId.eq(category_id));
    }
    if let Some(author_id) = filter.author {
        query = query.filter(post::Column::UserId.eq(author_id));
    }
    if let Some(tags) = filter.tags.as_deref() {
        let names = parse_tag_filter(tags);
        if !names.is_empty() {
            query = query.filter(post::Column::Id.in_subquery(tagged_post_ids(names)));
        }
    }
    if let Some(after) = filter.created_after {
        query = query.filter(post::Column::CreatedAt.gte(after));
    }
    if let Some(before) = filter.created_before {
        query = query.filter(post::Column::CreatedAt.lte(before));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query = query.filter(search_condition(search));
    }

    let order = sort_order(filter.order.as_deref());
    let query = query
        .order_by(sort_column(filter.sort_by.as_deref()), order.clone())
        .order_by(post::Column::Id, order);

    paginate_posts(db, query, page, viewer).await
}

/// Runs an ordered post query for one page and shapes the results.
pub async fn paginate_posts<C: ConnectionTrait>(
    db: &C,
    query: Select<post::Entity>,
    page: PageRequest,
    viewer: Option<i64>,
) -> AppResult<Page<PostResponse>> {
    let paginator = query.paginate(db, page.per_page);
    let total = paginator.num_items().await?;
    let posts = paginator.fetch_page(page.page - 1).await?;

    Ok(Page {
        items: post_responses(db, posts, viewer).await?,
        pagination: Pagination::new(page, total),
    })
}

#[derive(Debug, FromQueryResult)]
struct PostCount {
    post_id: i64,
    total: i64,
}

pub async fn post_response<C: ConnectionTrait>(
    db: &C,
    post: post::Model,
    viewer: Option<i64>,
) -> AppResult<PostResponse> {
    post_responses(db, vec![post], viewer)
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("post vanished while loading")))
}

/// Loads authors, categories, tags, comment counts and the viewer's
/// reactions for a batch of posts, one query per relation.
pub async fn post_responses<C: ConnectionTrait>(
    db: &C,
    posts: Vec<post::Model>,
    viewer: Option<i64>,
) -> AppResult<Vec<PostResponse>> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    let author_ids: HashSet<i64> = posts.iter().map(|p| p.user_id).collect();
    let category_ids: HashSet<i64> = posts.iter().filter_map(|p| p.category_id).collect();

    let authors: HashMap<i64, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(author_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let categories: HashMap<i64, category::Model> = if category_ids.is_empty() {
        HashMap::new()
    } else {
        category::Entity::find()
            .filter(category::Column::Id.is_in(category_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };

    let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
    let links = post_tag::Entity::find()
        .filter(post_tag::Column::PostId.is_in(post_ids.clone()))
        .order_by_asc(post_tag::Column::Id)
        .find_also_related(tag::Entity)
        .all(db)
        .await?;
    for (link, tag) in links {
        if let Some(tag) = tag {
            tags.entry(link.post_id).or_default().push(tag.name);
        }
    }

    let comment_counts: HashMap<i64, u64> = comment::Entity::find()
        .select_only()
        .column(comment::Column::PostId)
        .column_as(Expr::col(comment::Column::Id).count(), "total")
        .filter(comment::Column::PostId.is_in(post_ids.clone()))
        .group_by(comment::Column::PostId)
        .into_model::<PostCount>()
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.post_id, c.total.max(0) as u64))
        .collect();

    let (liked, bookmarked): (HashSet<i64>, HashSet<i64>) = match viewer {
        Some(user_id) => {
            let liked = like::Entity::find()
                .filter(like::Column::UserId.eq(user_id))
                .filter(like::Column::PostId.is_in(post_ids.clone()))
                .all(db)
                .await?
                .into_iter()
                .map(|l| l.post_id)
                .collect();
            let bookmarked = bookmark::Entity::find()
                .filter(bookmark::Column::UserId.eq(user_id))
                .filter(bookmark::Column::PostId.is_in(post_ids.clone()))
                .all(db)
                .await?
                .into_iter()
                .map(|b| b.post_id)
                .collect();
            (liked, bookmarked)
        }
        None => (HashSet::new(), HashSet::new()),
    };

    let mut responses = Vec::with_capacity(posts.len());
    for post in posts {
        let author = authors.get(&post.user_id).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "post {} references missing author {}",
                post.id,
                post.user_id
            ))
        })?;
        let category = post
            .category_id
            .and_then(|id| categories.get(&id))
            .map(CategorySummary::from);

        responses.push(PostResponse {
            id: post.id,
            title: post.title,
            content: post.content,
            author: UserSummary::from(author),
            category,
            tags: tags.remove(&post.id).unwrap_or_default(),
            view_count: post.view_count,
            like_count: post.like_count,
            comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
            is_published: post.is_published,
            is_liked: liked.contains(&post.id),
            is_bookmarked: bookmarked.contains(&post.id),
            created_at: post.created_at,
            updated_at: post.updated_at,
        });
    }

    Ok(responses)
}
