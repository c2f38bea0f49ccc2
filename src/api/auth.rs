use crate::auth::AuthenticatedUser;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{LoginRequest, RefreshRequest, RegisterRequest, UserResponse};
use crate::services::users;
use actix_web::{web, HttpResponse};

pub async fn register(
    req: web::Json<RegisterRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let user = users::register(pool.get_ref(), config.get_ref(), req.into_inner()).await?;
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

pub async fn login(
    req: web::Json<LoginRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let response = users::authenticate(pool.get_ref(), config.get_ref(), req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn refresh(
    req: web::Json<RefreshRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let tokens = users::refresh(pool.get_ref(), config.get_ref(), &req.refresh_token).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

pub async fn me(user: AuthenticatedUser) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(UserResponse::from(user.user)))
}
