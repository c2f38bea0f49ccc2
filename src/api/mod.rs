pub mod auth;
pub mod categories;
pub mod comments;
pub mod posts;
pub mod tags;
pub mod users;

use crate::config::Config;
use crate::error::AppError;
use crate::models::PageRequest;
use actix_web::http::Method;
use actix_web::{web, HttpResponse, Route};
use serde_json::json;

pub const API_PREFIX: &str = "/api/v1";

/// Who may call an endpoint.
///
/// `Owner` endpoints authenticate like `Authenticated` ones; the ownership
/// check itself happens in the service layer and yields 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Owner,
}

pub struct Endpoint {
    pub method: Method,
    /// Relative to [`API_PREFIX`].
    pub path: &'static str,
    pub access: Access,
    pub handler: fn(Route) -> Route,
}

/// Every routed endpoint. Order matters: literal segments such as
/// `/users/me` must precede `/users/{id}`.
pub static ENDPOINTS: &[Endpoint] = &[
    // auth
    Endpoint { method: Method::POST, path: "/auth/register", access: Access::Public, handler: |r| r.to(auth::register) },
    Endpoint { method: Method::POST, path: "/auth/login", access: Access::Public, handler: |r| r.to(auth::login) },
    Endpoint { method: Method::POST, path: "/auth/refresh", access: Access::Public, handler: |r| r.to(auth::refresh) },
    Endpoint { method: Method::GET, path: "/auth/me", access: Access::Authenticated, handler: |r| r.to(auth::me) },
    // posts
    Endpoint { method: Method::GET, path: "/posts", access: Access::Public, handler: |r| r.to(posts::list_posts) },
    Endpoint { method: Method::POST, path: "/posts", access: Access::Authenticated, handler: |r| r.to(posts::create_post) },
    Endpoint { method: Method::GET, path: "/posts/{id}", access: Access::Public, handler: |r| r.to(posts::get_post) },
    Endpoint { method: Method::PUT, path: "/posts/{id}", access: Access::Owner, handler: |r| r.to(posts::update_post) },
    Endpoint { method: Method::DELETE, path: "/posts/{id}", access: Access::Owner, handler: |r| r.to(posts::delete_post) },
    Endpoint { method: Method::POST, path: "/posts/{id}/like", access: Access::Authenticated, handler: |r| r.to(posts::like_post) },
    Endpoint { method: Method::DELETE, path: "/posts/{id}/like", access: Access::Authenticated, handler: |r| r.to(posts::unlike_post) },
    Endpoint { method: Method::POST, path: "/posts/{id}/like/toggle", access: Access::Authenticated, handler: |r| r.to(posts::toggle_like) },
    Endpoint { method: Method::POST, path: "/posts/{id}/bookmark", access: Access::Authenticated, handler: |r| r.to(posts::bookmark_post) },
    Endpoint { method: Method::DELETE, path: "/posts/{id}/bookmark", access: Access::Authenticated, handler: |r| r.to(posts::unbookmark_post) },
    Endpoint { method: Method::POST, path: "/posts/{id}/bookmark/toggle", access: Access::Authenticated, handler: |r| r.to(posts::toggle_bookmark) },
    Endpoint { method: Method::GET, path: "/posts/{id}/comments", access: Access::Public, handler: |r| r.to(posts::post_comments) },
    // comments
    Endpoint { method: Method::GET, path: "/comments", access: Access::Public, handler: |r| r.to(comments::list_comments) },
    Endpoint { method: Method::POST, path: "/comments", access: Access::Authenticated, handler: |r| r.to(comments::create_comment) },
    Endpoint { method: Method::GET, path: "/comments/{id}", access: Access::Public, handler: |r| r.to(comments::get_comment) },
    Endpoint { method: Method::PUT, path: "/comments/{id}", access: Access::Owner, handler: |r| r.to(comments::update_comment) },
    Endpoint { method: Method::DELETE, path: "/comments/{id}", access: Access::Owner, handler: |r| r.to(comments::delete_comment) },
    Endpoint { method: Method::GET, path: "/comments/{id}/replies", access: Access::Public, handler: |r| r.to(comments::get_replies) },
    // categories
    Endpoint { method: Method::GET, path: "/categories", access: Access::Public, handler: |r| r.to(categories::list_categories) },
    Endpoint { method: Method::POST, path: "/categories", access: Access::Authenticated, handler: |r| r.to(categories::create_category) },
    Endpoint { method: Method::GET, path: "/categories/{id}", access: Access::Public, handler: |r| r.to(categories::get_category) },
    Endpoint { method: Method::PUT, path: "/categories/{id}", access: Access::Authenticated, handler: |r| r.to(categories::update_category) },
    Endpoint { method: Method::DELETE, path: "/categories/{id}", access: Access::Authenticated, handler: |r| r.to(categories::delete_category) },
    Endpoint { method: Method::GET, path: "/categories/{id}/posts", access: Access::Public, handler: |r| r.to(categories::category_posts) },
    // tags
    Endpoint { method: Method::GET, path: "/tags", access: Access::Public, handler: |r| r.to(tags::list_tags) },
    Endpoint { method: Method::GET, path: "/tags/{id}/posts", access: Access::Public, handler: |r| r.to(tags::tag_posts) },
    // users
    Endpoint { method: Method::GET, path: "/users/me", access: Access::Authenticated, handler: |r| r.to(users::me) },
    Endpoint { method: Method::PUT, path: "/users/me", access: Access::Authenticated, handler: |r| r.to(users::update_me) },
    Endpoint { method: Method::PUT, path: "/users/me/password", access: Access::Authenticated, handler: |r| r.to(users::change_password) },
    Endpoint { method: Method::GET, path: "/users/me/posts", access: Access::Authenticated, handler: |r| r.to(users::my_posts) },
    Endpoint { method: Method::GET, path: "/users/me/bookmarks", access: Access::Authenticated, handler: |r| r.to(users::my_bookmarks) },
    Endpoint { method: Method::GET, path: "/users/me/likes", access: Access::Authenticated, handler: |r| r.to(users::my_likes) },
    Endpoint { method: Method::GET, path: "/users/{id}", access: Access::Public, handler: |r| r.to(users::get_user) },
    Endpoint { method: Method::GET, path: "/users/{id}/posts", access: Access::Public, handler: |r| r.to(users::user_posts) },
];

/// Resolves `page`/`per_page` (or its `limit` alias) against the configured bounds.
pub(crate) fn page_request(
    config: &Config,
    page: Option<u64>,
    per_page: Option<u64>,
    limit: Option<u64>,
    default_size: Option<u64>,
) -> PageRequest {
    PageRequest::resolve(
        page,
        per_page.or(limit),
        default_size.unwrap_or(config.pagination.default_page_size),
        &config.pagination,
    )
}

pub(crate) fn message(text: &str) -> serde_json::Value {
    json!({ "message": text })
}

pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "FinBoard API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": format!("{}/auth/", API_PREFIX),
            "posts": format!("{}/posts/", API_PREFIX),
            "comments": format!("{}/comments/", API_PREFIX),
            "categories": format!("{}/categories/", API_PREFIX),
            "tags": format!("{}/tags/", API_PREFIX),
            "users": format!("{}/users/", API_PREFIX),
            "health": "/health",
        }
    }))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "healthy" }))
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected JSON body: {}", err);
        AppError::Validation(err.to_string()).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected query string: {}", err);
        AppError::Validation(err.to_string()).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected path parameter: {}", err);
        AppError::NotFound("Not found".to_string()).into()
    })
}

/// Mounts the service routes and the versioned API scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let mut scope = web::scope(API_PREFIX);
    for endpoint in ENDPOINTS {
        let route = web::route().method(endpoint.method.clone());
        scope = scope.route(endpoint.path, (endpoint.handler)(route));
    }

    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .route("/", web::get().to(index))
        .route("/health", web::get().to(health))
        .service(scope);
}
