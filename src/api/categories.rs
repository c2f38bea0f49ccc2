use crate::api::{message, page_request};
use crate::auth::AuthenticatedUser;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{
    CategoryListResponse, CategoryPostsResponse, CreateCategoryRequest, PageQuery,
    UpdateCategoryRequest,
};
use crate::services::categories;
use actix_web::{web, HttpResponse};

const CATEGORY_PAGE_SIZE: u64 = 50;

pub async fn list_categories(
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let page = page_request(
        &config,
        query.page,
        query.per_page,
        query.limit,
        Some(CATEGORY_PAGE_SIZE),
    );
    let result = categories::list_categories(pool.get_ref(), page).await?;
    Ok(HttpResponse::Ok().json(CategoryListResponse {
        categories: result.items,
        pagination: result.pagination,
    }))
}

pub async fn create_category(
    user: AuthenticatedUser,
    req: web::Json<CreateCategoryRequest>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let category = categories::create_category(pool.get_ref(), req.into_inner()).await?;
    log::debug!("Category {} created by user {}", category.id, user.user_id);
    Ok(HttpResponse::Created().json(category))
}

pub async fn get_category(path: web::Path<i64>, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let category = categories::get_category(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(category))
}

pub async fn update_category(
    _user: AuthenticatedUser,
    path: web::Path<i64>,
    req: web::Json<UpdateCategoryRequest>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let category =
        categories::update_category(pool.get_ref(), path.into_inner(), req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(category))
}

pub async fn delete_category(
    _user: AuthenticatedUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    categories::delete_category(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(message("Category deleted successfully")))
}

pub async fn category_posts(
    user: Option<AuthenticatedUser>,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let page = page_request(&config, query.page, query.per_page, query.limit, None);
    let viewer = user.map(|u| u.user_id);

    let (category, posts) =
        categories::category_posts(pool.get_ref(), path.into_inner(), page, viewer).await?;
    Ok(HttpResponse::Ok().json(CategoryPostsResponse {
        category,
        posts: posts.items,
        pagination: posts.pagination,
    }))
}
