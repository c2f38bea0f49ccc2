use crate::api::{message, page_request};
use crate::auth::AuthenticatedUser;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{
    CommentListResponse, CreatePostRequest, PageQuery, PostListQuery, PostListResponse,
    ReactionResponse, UpdatePostRequest,
};
use crate::services::reactions::{set_bookmark, set_like, BookmarkState, LikeState, ReactionAction};
use crate::services::{comments, posts};
use actix_web::{web, HttpResponse};
use validator::Validate;

pub async fn list_posts(
    user: Option<AuthenticatedUser>,
    query: web::Query<PostListQuery>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let page = page_request(&config, query.page, query.per_page, query.limit, None);
    let viewer = user.map(|u| u.user_id);

    let result = posts::list_posts(pool.get_ref(), &query, page, viewer).await?;
    Ok(HttpResponse::Ok().json(PostListResponse {
        items: result.items,
        pagination: result.pagination,
    }))
}

pub async fn create_post(
    user: AuthenticatedUser,
    req: web::Json<CreatePostRequest>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let req = req.into_inner();
    req.validate()?;

    let post = posts::create_post(pool.get_ref(), &user.user, req).await?;
    let response = posts::post_response(pool.get_ref(), post, Some(user.user_id)).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Every successful fetch by someone other than the author counts as a view.
pub async fn get_post(
    user: Option<AuthenticatedUser>,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let viewer = user.map(|u| u.user_id);
    let response = posts::get_post_detail(pool.get_ref(), path.into_inner(), viewer).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn update_post(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    req: web::Json<UpdatePostRequest>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let post = posts::update_post(
        pool.get_ref(),
        path.into_inner(),
        user.user_id,
        req.into_inner(),
    )
    .await?;
    let response = posts::post_response(pool.get_ref(), post, Some(user.user_id)).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn delete_post(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    posts::delete_post(pool.get_ref(), path.into_inner(), user.user_id).await?;
    Ok(HttpResponse::Ok().json(message("Post deleted successfully")))
}

fn like_response(text: &str, state: LikeState) -> ReactionResponse {
    ReactionResponse {
        message: text.to_string(),
        liked: Some(state.liked),
        bookmarked: None,
        like_count: Some(state.like_count),
    }
}

fn bookmark_response(text: &str, state: BookmarkState) -> ReactionResponse {
    ReactionResponse {
        message: text.to_string(),
        liked: None,
        bookmarked: Some(state.bookmarked),
        like_count: None,
    }
}

pub async fn like_post(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let state = set_like(pool.get_ref(), user.user_id, path.into_inner(), ReactionAction::Add).await?;
    Ok(HttpResponse::Created().json(like_response("Post liked successfully", state)))
}

pub async fn unlike_post(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let state =
        set_like(pool.get_ref(), user.user_id, path.into_inner(), ReactionAction::Remove).await?;
    Ok(HttpResponse::Ok().json(like_response("Post unliked successfully", state)))
}

pub async fn toggle_like(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let state =
        set_like(pool.get_ref(), user.user_id, path.into_inner(), ReactionAction::Toggle).await?;
    let text = if state.liked { "Post liked" } else { "Post unliked" };
    Ok(HttpResponse::Ok().json(like_response(text, state)))
}

pub async fn bookmark_post(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let state =
        set_bookmark(pool.get_ref(), user.user_id, path.into_inner(), ReactionAction::Add).await?;
    Ok(HttpResponse::Created().json(bookmark_response("Post bookmarked successfully", state)))
}

pub async fn unbookmark_post(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let state =
        set_bookmark(pool.get_ref(), user.user_id, path.into_inner(), ReactionAction::Remove)
            .await?;
    Ok(HttpResponse::Ok().json(bookmark_response("Bookmark removed successfully", state)))
}

pub async fn toggle_bookmark(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let state =
        set_bookmark(pool.get_ref(), user.user_id, path.into_inner(), ReactionAction::Toggle)
            .await?;
    let text = if state.bookmarked {
        "Post bookmarked"
    } else {
        "Bookmark removed"
    };
    Ok(HttpResponse::Ok().json(bookmark_response(text, state)))
}

pub async fn post_comments(
    user: Option<AuthenticatedUser>,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let post_id = path.into_inner();
    let viewer = user.map(|u| u.user_id);
    posts::find_visible_post(pool.get_ref(), post_id, viewer).await?;

    let page = page_request(&config, query.page, query.per_page, query.limit, None);
    let result = comments::list_comments(pool.get_ref(), Some(post_id), page).await?;
    Ok(HttpResponse::Ok().json(CommentListResponse {
        comments: result.items,
        pagination: result.pagination,
    }))
}
