use crate::api::{message, page_request};
use crate::auth::AuthenticatedUser;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{CommentListResponse, CommentQuery, CreateCommentRequest, UpdateCommentRequest};
use crate::services::comments;
use actix_web::{web, HttpResponse};
use validator::Validate;

pub async fn list_comments(
    query: web::Query<CommentQuery>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let page = page_request(&config, query.page, query.per_page, query.limit, None);
    let result = comments::list_comments(pool.get_ref(), query.post_id, page).await?;
    Ok(HttpResponse::Ok().json(CommentListResponse {
        comments: result.items,
        pagination: result.pagination,
    }))
}

pub async fn create_comment(
    user: AuthenticatedUser,
    req: web::Json<CreateCommentRequest>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let req = req.into_inner();
    req.validate()?;

    let comment = comments::create_comment(pool.get_ref(), &user.user, req).await?;
    let response = comments::get_comment(pool.get_ref(), comment.id).await?;
    Ok(HttpResponse::Created().json(response))
}

pub async fn get_comment(path: web::Path<i64>, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let response = comments::get_comment(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn update_comment(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    req: web::Json<UpdateCommentRequest>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let comment = comments::update_comment(
        pool.get_ref(),
        path.into_inner(),
        user.user_id,
        req.into_inner(),
    )
    .await?;
    let response = comments::get_comment(pool.get_ref(), comment.id).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn delete_comment(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    comments::delete_comment(pool.get_ref(), path.into_inner(), user.user_id).await?;
    Ok(HttpResponse::Ok().json(message("Comment deleted successfully")))
}

pub async fn get_replies(path: web::Path<i64>, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let replies = comments::get_replies(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(replies))
}
