use crate::api::{message, page_request};
use crate::auth::AuthenticatedUser;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{
    BookmarksResponse, ChangePasswordRequest, LikesResponse, MyPostsQuery, PageQuery,
    PostsResponse, UpdateProfileRequest, UserPostsResponse, UserResponse, UserSummary,
};
use crate::services::users;
use actix_web::{web, HttpResponse};

pub async fn me(user: AuthenticatedUser, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let response = users::me(pool.get_ref(), user.user).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn update_me(
    user: AuthenticatedUser,
    req: web::Json<UpdateProfileRequest>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let updated = users::update_profile(pool.get_ref(), user.user, req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(updated)))
}

pub async fn change_password(
    user: AuthenticatedUser,
    req: web::Json<ChangePasswordRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    users::change_password(pool.get_ref(), &config, user.user, req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(message("Password changed successfully")))
}

pub async fn my_posts(
    user: AuthenticatedUser,
    query: web::Query<MyPostsQuery>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let page = page_request(&config, query.page, query.per_page, query.limit, None);
    let result =
        users::my_posts(pool.get_ref(), user.user_id, query.status.as_deref(), page).await?;
    Ok(HttpResponse::Ok().json(PostsResponse {
        posts: result.items,
        pagination: result.pagination,
    }))
}

pub async fn my_bookmarks(
    user: AuthenticatedUser,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let page = page_request(&config, query.page, query.per_page, query.limit, None);
    let result = users::my_bookmarks(pool.get_ref(), user.user_id, page).await?;
    Ok(HttpResponse::Ok().json(BookmarksResponse {
        bookmarks: result.items,
        pagination: result.pagination,
    }))
}

pub async fn my_likes(
    user: AuthenticatedUser,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let page = page_request(&config, query.page, query.per_page, query.limit, None);
    let result = users::my_likes(pool.get_ref(), user.user_id, page).await?;
    Ok(HttpResponse::Ok().json(LikesResponse {
        likes: result.items,
        pagination: result.pagination,
    }))
}

pub async fn get_user(path: web::Path<i64>, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let profile = users::public_profile(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn user_posts(
    viewer: Option<AuthenticatedUser>,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let page = page_request(&config, query.page, query.per_page, query.limit, None);
    let viewer = viewer.map(|u| u.user_id);

    let (user, posts) = users::user_posts(pool.get_ref(), path.into_inner(), page, viewer).await?;
    Ok(HttpResponse::Ok().json(UserPostsResponse {
        user: UserSummary::from(&user),
        posts: posts.items,
        pagination: posts.pagination,
    }))
}
