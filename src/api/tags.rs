use crate::api::page_request;
use crate::auth::AuthenticatedUser;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{PageQuery, TagListResponse, TagPostsResponse, TagQuery, TagResponse};
use crate::services::tags;
use actix_web::{web, HttpResponse};

pub async fn list_tags(
    query: web::Query<TagQuery>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let page = page_request(&config, query.page, query.per_page, query.limit, None);
    let result = tags::list_tags(pool.get_ref(), query.search.as_deref(), page).await?;
    Ok(HttpResponse::Ok().json(TagListResponse {
        tags: result.items,
        pagination: result.pagination,
    }))
}

pub async fn tag_posts(
    user: Option<AuthenticatedUser>,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let page = page_request(&config, query.page, query.per_page, query.limit, None);
    let viewer = user.map(|u| u.user_id);

    let (tag, posts) = tags::tag_posts(pool.get_ref(), path.into_inner(), page, viewer).await?;
    Ok(HttpResponse::Ok().json(TagPostsResponse {
        tag: TagResponse::from(tag),
        posts: posts.items,
        pagination: posts.pagination,
    }))
}
