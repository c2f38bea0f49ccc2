// Integration tests for the HTTP API.
// Each test gets its own in-memory SQLite database.
// Run with: cargo test --test api_test

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{http::StatusCode, test, web, App};
use finboard::{
    api::{self, Access, ENDPOINTS},
    config::Config,
    db::{self, DbPool},
    entities::{post_tag, user},
    models::{
        CategoryResponse, CommentListResponse, CommentResponse, LoginResponse, PostListResponse,
        PostResponse, TokenResponse, UserResponse,
    },
};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};

const PASSWORD: &str = "s3cure-pass!";

/// Test configuration plus a fresh in-memory database
async fn test_state() -> (Config, DbPool) {
    let mut config = Config::from_env().expect("Failed to load configuration");
    config.database.url = Some("sqlite::memory:".to_string());
    config.database.max_connections = 1;
    config.auth.bcrypt_cost = 4;
    config.jwt.secret = "integration-test-secret".to_string();
    config.pagination.default_page_size = 20;
    config.pagination.max_page_size = 100;

    let pool = db::create_pool(&config)
        .await
        .expect("Failed to create test database");
    (config, pool)
}

fn build_app(
    config: Config,
    pool: DbPool,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(config))
        .app_data(web::Data::new(pool))
        .configure(api::configure)
}

/// Helper function to create a test app backed by a fresh database
async fn create_test_app() -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let (config, pool) = test_state().await;
    build_app(config, pool)
}

/// Sends a request and returns the status with the decoded JSON body (`Null` if empty).
async fn send<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("response body should be JSON")
    };
    (status, value)
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

async fn register<S, B>(app: &S, username: &str) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": PASSWORD,
            "password_confirm": PASSWORD,
        }))
        .to_request();
    send(app, req).await
}

/// Registers `username` and logs in, returning the login body.
async fn signup<S, B>(app: &S, username: &str) -> LoginResponse
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, _) = register(app, username).await;
    assert_eq!(status, StatusCode::CREATED, "registration should succeed");

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "username": username, "password": PASSWORD }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK, "login should succeed");
    serde_json::from_value(body).expect("login body")
}

async fn create_post<S, B>(app: &S, token: &str, body: Value) -> PostResponse
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(bearer(token))
        .set_json(body)
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "post creation failed: {}", body);
    serde_json::from_value(body).expect("post body")
}

#[actix_web::test]
async fn test_index_and_health() {
    let app = test::init_service(create_test_app().await).await;

    let (status, body) = send(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["posts"], "/api/v1/posts/");

    let (status, body) = send(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn test_register_login_and_refresh() {
    let app = test::init_service(create_test_app().await).await;

    let (status, body) = register(&app, "alice").await;
    assert_eq!(status, StatusCode::CREATED);
    let user: UserResponse = serde_json::from_value(body.clone()).unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.nickname, "alice", "Nickname should default to the username");
    assert!(body.get("password_hash").is_none(), "Hash must never be returned");

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "username": "alice", "password": PASSWORD }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let login: LoginResponse = serde_json::from_value(body).unwrap();
    assert_eq!(login.token_type, "bearer");
    assert_eq!(login.user.id, user.id);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .set_json(json!({ "refresh_token": login.refresh_token }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let tokens: TokenResponse = serde_json::from_value(body).unwrap();

    let req = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&tokens.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "Refreshed access token should work");
    assert_eq!(body["username"], "alice");

    // An access token is not a refresh token.
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .set_json(json!({ "refresh_token": login.access_token }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nor the other way round.
    let req = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&tokens.refresh_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_register_duplicate_username_and_email() {
    let app = test::init_service(create_test_app().await).await;

    let (status, _) = register(&app, "bob").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, "bob").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["username"][0], "Username already exists.");
    assert_eq!(body["email"][0], "Email already exists.");
}

#[actix_web::test]
async fn test_register_password_rules() {
    let app = test::init_service(create_test_app().await).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({
            "username": "carol",
            "email": "carol@example.com",
            "password": PASSWORD,
            "password_confirm": "something-else",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["password"][0], "Password fields didn't match.");

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({
            "username": "carol",
            "email": "not-an-email",
            "password": "12345",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["password"].as_array().map(Vec::len), Some(2));
    assert!(body.get("email").is_some());
}

#[actix_web::test]
async fn test_login_invalid_credentials() {
    let app = test::init_service(create_test_app().await).await;
    signup(&app, "dave").await;

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "username": "dave", "password": "wrong-password" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "username": "nobody", "password": PASSWORD }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_protected_endpoints_reject_anonymous_callers() {
    let app = test::init_service(create_test_app().await).await;

    for endpoint in ENDPOINTS.iter().filter(|e| e.access != Access::Public) {
        let uri = format!("/api/v1{}", endpoint.path.replace("{id}", "1"));
        let req = test::TestRequest::default()
            .method(endpoint.method.clone())
            .uri(&uri)
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(
            status,
            StatusCode::UNAUTHORIZED,
            "{} {} should require a token",
            endpoint.method,
            uri
        );
        assert!(body["error"].is_string());
    }
}

#[actix_web::test]
async fn test_malformed_body_is_a_json_error() {
    let app = test::init_service(create_test_app().await).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[actix_web::test]
async fn test_view_count_increments_for_each_non_author_fetch() {
    let app = test::init_service(create_test_app().await).await;
    let author = signup(&app, "author").await;
    let reader = signup(&app, "reader").await;

    let post = create_post(
        &app,
        &author.access_token,
        json!({ "title": "Counting", "content": "views" }),
    )
    .await;
    assert_eq!(post.view_count, 0);

    for expected in 1..=2 {
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/posts/{}", post.id))
            .insert_header(bearer(&reader.access_token))
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["view_count"], expected);
    }

    // The author's own fetch is not a view.
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}", post.id))
        .insert_header(bearer(&author.access_token))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["view_count"], 2);
}

#[actix_web::test]
async fn test_like_count_matches_like_rows() {
    let app = test::init_service(create_test_app().await).await;
    let author = signup(&app, "writer").await;
    let fan = signup(&app, "fan").await;
    let post = create_post(
        &app,
        &author.access_token,
        json!({ "title": "Likeable", "content": "body" }),
    )
    .await;
    let like_uri = format!("/api/v1/posts/{}/like", post.id);

    let req = test::TestRequest::post()
        .uri(&like_uri)
        .insert_header(bearer(&fan.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Post liked successfully");
    assert_eq!(body["like_count"], 1);

    let req = test::TestRequest::post()
        .uri(&like_uri)
        .insert_header(bearer(&fan.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "Second like is a conflict");
    assert_eq!(body["error"], "Post already liked");

    let req = test::TestRequest::delete()
        .uri(&like_uri)
        .insert_header(bearer(&fan.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["like_count"], 0);

    let req = test::TestRequest::delete()
        .uri(&like_uri)
        .insert_header(bearer(&fan.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Post not liked");

    let req = test::TestRequest::post()
        .uri(&like_uri)
        .insert_header(bearer(&fan.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}", post.id))
        .insert_header(bearer(&fan.access_token))
        .to_request();
    let (_, body) = send(&app, req).await;
    let detail: PostResponse = serde_json::from_value(body).unwrap();
    assert_eq!(detail.like_count, 1);
    assert!(detail.is_liked);

    let req = test::TestRequest::post()
        .uri(&format!("{}/toggle", like_uri))
        .insert_header(bearer(&fan.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["liked"], false);
    assert_eq!(body["like_count"], 0);

    let req = test::TestRequest::get()
        .uri("/api/v1/users/me")
        .insert_header(bearer(&fan.access_token))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["stats"]["likes_count"], 0);
}

#[actix_web::test]
async fn test_bookmarks_add_list_and_remove() {
    let app = test::init_service(create_test_app().await).await;
    let author = signup(&app, "saver").await;
    let post = create_post(
        &app,
        &author.access_token,
        json!({ "title": "Keep me", "content": "body" }),
    )
    .await;
    let uri = format!("/api/v1/posts/{}/bookmark", post.id);

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(bearer(&author.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["bookmarked"], true);
    assert!(body.get("like_count").is_none());

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(bearer(&author.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/v1/users/me/bookmarks")
        .insert_header(bearer(&author.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["bookmarks"][0]["post"]["id"], post.id);
    assert_eq!(body["bookmarks"][0]["post"]["is_bookmarked"], true);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(bearer(&author.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(bearer(&author.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Post not bookmarked");
}

#[actix_web::test]
async fn test_unpublished_posts_are_visible_only_to_their_author() {
    let app = test::init_service(create_test_app().await).await;
    let author = signup(&app, "drafter").await;
    let other = signup(&app, "other").await;

    let draft = create_post(
        &app,
        &author.access_token,
        json!({ "title": "Secret", "content": "draft", "is_published": false }),
    )
    .await;
    assert!(!draft.is_published);

    let (status, body) = send(&app, test::TestRequest::get().uri("/api/v1/posts").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let list: PostListResponse = serde_json::from_value(body).unwrap();
    assert!(list.items.iter().all(|p| p.id != draft.id));

    let uri = format!("/api/v1/posts/{}", draft.id);
    let (status, _) = send(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(bearer(&other.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(bearer(&author.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Secret");

    let req = test::TestRequest::post()
        .uri(&format!("{}/like", uri))
        .insert_header(bearer(&other.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_my_posts_filters_by_status() {
    let app = test::init_service(create_test_app().await).await;
    let author = signup(&app, "mixer").await;
    create_post(
        &app,
        &author.access_token,
        json!({ "title": "Out", "content": "published" }),
    )
    .await;
    create_post(
        &app,
        &author.access_token,
        json!({ "title": "In", "content": "draft", "is_published": false }),
    )
    .await;

    for (status_filter, expected) in [("draft", 1), ("published", 1), ("all", 2)] {
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/users/me/posts?status={}", status_filter))
            .insert_header(bearer(&author.access_token))
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], expected, "status={}", status_filter);
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/users/{}/posts", author.user.id))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["user"]["username"], "mixer");
}

#[actix_web::test]
async fn test_update_post_replaces_tag_set() {
    let app = test::init_service(create_test_app().await).await;
    let author = signup(&app, "tagger").await;
    let post = create_post(
        &app,
        &author.access_token,
        json!({ "title": "Tagged", "content": "body", "tag_names": ["a", " b ", "a", ""] }),
    )
    .await;
    assert_eq!(post.tags, vec!["a", "b"]);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/posts/{}", post.id))
        .insert_header(bearer(&author.access_token))
        .set_json(json!({ "tag_names": ["b", "c"] }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let updated: PostResponse = serde_json::from_value(body).unwrap();
    let mut tags = updated.tags.clone();
    tags.sort();
    assert_eq!(tags, vec!["b", "c"]);
    assert_eq!(updated.title, "Tagged", "Untouched fields stay as they were");

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/posts?tags=a").to_request()).await;
    assert_eq!(body["pagination"]["total"], 0);
    let (_, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/posts?tags=c,zzz").to_request()).await;
    assert_eq!(body["pagination"]["total"], 1);

    let (status, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/tags?search=C").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"][0]["name"], "c");
    let tag_id = body["tags"][0]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/tags/{}/posts", tag_id))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tag"]["name"], "c");
    assert_eq!(body["posts"][0]["id"], post.id);
}

#[actix_web::test]
async fn test_only_the_owner_may_edit_or_delete_a_post() {
    let app = test::init_service(create_test_app().await).await;
    let owner = signup(&app, "owner").await;
    let intruder = signup(&app, "intruder").await;
    let post = create_post(
        &app,
        &owner.access_token,
        json!({ "title": "Mine", "content": "hands off" }),
    )
    .await;
    let uri = format!("/api/v1/posts/{}", post.id);

    let req = test::TestRequest::put()
        .uri(&uri)
        .insert_header(bearer(&intruder.access_token))
        .set_json(json!({ "title": "Yours now" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(bearer(&intruder.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(bearer(&owner.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_post_validation_errors_are_keyed_by_field() {
    let app = test::init_service(create_test_app().await).await;
    let author = signup(&app, "sloppy").await;

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(bearer(&author.access_token))
        .set_json(json!({ "title": "   ", "content": "body" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("title").is_some());

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(bearer(&author.access_token))
        .set_json(json!({ "title": "Fine", "content": "body", "category_id": 999 }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("category_id").is_some());
}

#[actix_web::test]
async fn test_category_with_posts_cannot_be_deleted() {
    let app = test::init_service(create_test_app().await).await;
    let user = signup(&app, "curator").await;

    let req = test::TestRequest::post()
        .uri("/api/v1/categories")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "name": "  Markets ", "description": " ", "color": "#00FF7f" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let category: CategoryResponse = serde_json::from_value(body).unwrap();
    assert_eq!(category.name, "Markets");
    assert_eq!(category.description, None);

    let post = create_post(
        &app,
        &user.access_token,
        json!({ "title": "Filed", "content": "body", "category_id": category.id }),
    )
    .await;
    assert_eq!(post.category.as_ref().map(|c| c.id), Some(category.id));

    let uri = format!("/api/v1/categories/{}", category.id);
    let (_, body) = send(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(body["post_count"], 1);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(bearer(&user.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Cannot delete category with 1 posts. Move or delete posts first."
    );

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/posts/{}", post.id))
        .insert_header(bearer(&user.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(bearer(&user.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_category_name_and_color_rules() {
    let app = test::init_service(create_test_app().await).await;
    let user = signup(&app, "painter").await;

    let req = test::TestRequest::post()
        .uri("/api/v1/categories")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "name": "Bonds", "color": "red" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("color").is_some());

    let req = test::TestRequest::post()
        .uri("/api/v1/categories")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "name": "Bonds" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/v1/categories")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "name": " Bonds " }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Category with this name already exists");

    let req = test::TestRequest::post()
        .uri("/api/v1/categories")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "name": "Alpha" }))
        .to_request();
    send(&app, req).await;

    let (status, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/categories").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"][0]["name"], "Alpha");
    assert_eq!(body["categories"][1]["name"], "Bonds");
    assert_eq!(body["pagination"]["per_page"], 50);
}

#[actix_web::test]
async fn test_reply_parent_must_belong_to_the_same_post() {
    let app = test::init_service(create_test_app().await).await;
    let user = signup(&app, "commenter").await;
    let first = create_post(&app, &user.access_token, json!({ "title": "One", "content": "1" })).await;
    let second = create_post(&app, &user.access_token, json!({ "title": "Two", "content": "2" })).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/comments")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "post_id": first.id, "content": "on the first post" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let parent: CommentResponse = serde_json::from_value(body).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/v1/comments")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({
            "post_id": second.id,
            "parent_id": parent.id,
            "content": "misplaced reply",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["parent_id"][0], "Parent comment must be from the same post.");

    let req = test::TestRequest::post()
        .uri("/api/v1/comments")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "post_id": first.id, "parent_id": 9999, "content": "orphan" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Parent comment not found");
}

#[actix_web::test]
async fn test_comment_threads_flatten_replies() {
    let app = test::init_service(create_test_app().await).await;
    let user = signup(&app, "talker").await;
    let other = signup(&app, "listener").await;
    let post = create_post(&app, &user.access_token, json!({ "title": "Thread", "content": "x" })).await;

    let post_comment = |parent: Option<i64>, content: &'static str| {
        let body = json!({ "post_id": post.id, "parent_id": parent, "content": content });
        test::TestRequest::post()
            .uri("/api/v1/comments")
            .insert_header(bearer(&user.access_token))
            .set_json(body)
            .to_request()
    };

    let (_, body) = send(&app, post_comment(None, "root")).await;
    let root_id = body["id"].as_i64().unwrap();
    let (_, body) = send(&app, post_comment(Some(root_id), "first reply")).await;
    let reply_id = body["id"].as_i64().unwrap();
    let (_, body) = send(&app, post_comment(Some(reply_id), "  nested reply  ")).await;
    let nested_id = body["id"].as_i64().unwrap();
    assert_eq!(body["content"], "nested reply");

    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/comments?post_id={}", post.id))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let list: CommentListResponse = serde_json::from_value(body).unwrap();
    assert_eq!(list.pagination.total, 1, "Only top-level comments are listed");
    let replies: Vec<i64> = list.comments[0].replies.iter().map(|r| r.id).collect();
    assert_eq!(replies, vec![reply_id, nested_id]);
    assert!(list.comments[0].replies.iter().all(|r| r.replies.is_empty()));

    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/posts/{}/comments", post.id))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["comments"][0]["id"], root_id);

    let (_, body) = send(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/comments/{}/replies", reply_id))
            .to_request(),
    )
    .await;
    assert_eq!(body[0]["id"], nested_id);

    let (_, body) = send(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/posts/{}", post.id))
            .to_request(),
    )
    .await;
    assert_eq!(body["comment_count"], 3);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/comments/{}", root_id))
        .insert_header(bearer(&other.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/comments/{}", reply_id))
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "content": "edited" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "edited");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/comments/{}", root_id))
        .insert_header(bearer(&user.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/comments/{}", nested_id))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "Descendants go with their root");
}

#[actix_web::test]
async fn test_list_pagination_is_clamped() {
    let app = test::init_service(create_test_app().await).await;
    let author = signup(&app, "prolific").await;
    for title in ["Alpha rust", "Beta", "Gamma"] {
        create_post(&app, &author.access_token, json!({ "title": title, "content": "c" })).await;
    }

    let (_, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/posts?per_page=500").to_request()).await;
    assert_eq!(body["pagination"]["per_page"], 100);
    assert_eq!(body["pagination"]["pages"], 1);

    let (_, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/posts?limit=2").to_request()).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["pagination"]["pages"], 2);
    assert_eq!(body["pagination"]["has_next"], true);
    assert_eq!(body["pagination"]["has_prev"], false);

    let (_, body) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/posts?per_page=2&page=2")
            .to_request(),
    )
    .await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["pagination"]["has_prev"], true);

    let (_, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/posts?search=RUST").to_request()).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["items"][0]["title"], "Alpha rust");

    let (_, body) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/posts?sort_by=title&order=asc")
            .to_request(),
    )
    .await;
    let titles: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Alpha rust", "Beta", "Gamma"]);
}

#[actix_web::test]
async fn test_page_numbers_past_the_end_are_empty_not_errors() {
    let app = test::init_service(create_test_app().await).await;
    let author = signup(&app, "pager").await;
    create_post(&app, &author.access_token, json!({ "title": "Only", "content": "c" })).await;

    for uri in [
        "/api/v1/posts?page=18446744073709551615",
        "/api/v1/posts?page=9223372036854775807&per_page=100",
        "/api/v1/tags?page=18446744073709551615",
        "/api/v1/categories?page=18446744073709551615",
    ] {
        let (status, body) = send(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(status, StatusCode::OK, "{}: {}", uri, body);
        assert_eq!(body["pagination"]["has_next"], false, "{}", uri);
    }

    let (_, body) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/posts?page=18446744073709551615")
            .to_request(),
    )
    .await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(body["pagination"]["total"], 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/users/me/bookmarks?page=18446744073709551615")
        .insert_header(bearer(&author.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn test_search_wildcards_match_literally() {
    let app = test::init_service(create_test_app().await).await;
    let author = signup(&app, "literal").await;
    create_post(&app, &author.access_token, json!({ "title": "Hello", "content": "world" })).await;
    create_post(
        &app,
        &author.access_token,
        json!({ "title": "Up 100% today", "content": "snake_case body", "tag_names": ["my_tag"] }),
    )
    .await;

    let total = |body: &Value| body["pagination"]["total"].clone();

    let (_, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/posts?search=%25").to_request()).await;
    assert_eq!(total(&body), 1, "Only the post containing a percent sign");
    assert_eq!(body["items"][0]["title"], "Up 100% today");

    let (_, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/posts?search=_").to_request()).await;
    assert_eq!(total(&body), 1, "Only the post containing an underscore");

    let (_, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/posts?search=h_llo").to_request()).await;
    assert_eq!(total(&body), 0);

    let (_, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/posts?search=hello").to_request()).await;
    assert_eq!(total(&body), 1);

    let (_, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/tags?search=_").to_request()).await;
    assert_eq!(total(&body), 1);
    assert_eq!(body["tags"][0]["name"], "my_tag");

    let (_, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/tags?search=%25").to_request()).await;
    assert_eq!(total(&body), 0);
}

#[actix_web::test]
async fn test_profile_update_and_password_change() {
    let app = test::init_service(create_test_app().await).await;
    let user = signup(&app, "erin").await;
    signup(&app, "frank").await;

    let req = test::TestRequest::put()
        .uri("/api/v1/users/me")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "nickname": "Erin E.", "bio": "  trader  " }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nickname"], "Erin E.");
    assert_eq!(body["bio"], "trader");

    let req = test::TestRequest::put()
        .uri("/api/v1/users/me")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "nickname": "", "email": "frank@example.com" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some());

    let req = test::TestRequest::put()
        .uri("/api/v1/users/me")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "nickname": "" }))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["nickname"], "erin", "Blank nickname resets to the username");

    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/users/{}", user.user.id))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("email").is_none(), "Public profile hides the email");
    assert_eq!(body["stats"]["posts_count"], 0);
    assert!(body["stats"].get("likes_count").is_none());

    let req = test::TestRequest::put()
        .uri("/api/v1/users/me/password")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "current_password": "not-it-at-all", "new_password": "brand-new-pass" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri("/api/v1/users/me/password")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "current_password": PASSWORD, "new_password": "brand-new-pass" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "username": "erin", "password": "brand-new-pass" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        test::TestRequest::get().uri("/api/v1/users/9999").to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_disabled_account_is_locked_out() {
    let (config, pool) = test_state().await;
    let app = test::init_service(build_app(config, pool.clone())).await;
    let user = signup(&app, "gina").await;

    user::Entity::update_many()
        .col_expr(user::Column::IsActive, Expr::value(false))
        .filter(user::Column::Username.eq("gina"))
        .exec(&pool)
        .await
        .expect("deactivate user");

    let req = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&user.access_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Account is disabled");

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(bearer(&user.access_token))
        .set_json(json!({ "title": "Still here?", "content": "no" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .set_json(json!({ "refresh_token": user.refresh_token }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "User not found or inactive");

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "username": "gina", "password": PASSWORD }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Account is disabled");

    // A wrong password on a disabled account reads the same as any bad credential.
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "username": "gina", "password": "wrong-password" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");
}

#[actix_web::test]
async fn test_deleting_a_post_removes_its_dependents() {
    let (config, pool) = test_state().await;
    let app = test::init_service(build_app(config, pool.clone())).await;
    let author = signup(&app, "henry").await;
    let fan = signup(&app, "iris").await;

    let post = create_post(
        &app,
        &author.access_token,
        json!({ "title": "Doomed", "content": "body", "tag_names": ["gone"] }),
    )
    .await;
    let post_uri = format!("/api/v1/posts/{}", post.id);

    let req = test::TestRequest::post()
        .uri("/api/v1/comments")
        .insert_header(bearer(&fan.access_token))
        .set_json(json!({ "post_id": post.id, "content": "top" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let root: CommentResponse = serde_json::from_value(body).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/v1/comments")
        .insert_header(bearer(&fan.access_token))
        .set_json(json!({ "post_id": post.id, "parent_id": root.id, "content": "reply" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let reply: CommentResponse = serde_json::from_value(body).unwrap();

    for action in ["like", "bookmark"] {
        let req = test::TestRequest::post()
            .uri(&format!("{}/{}", post_uri, action))
            .insert_header(bearer(&fan.access_token))
            .to_request();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::CREATED, "{}", action);
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/users/me")
        .insert_header(bearer(&fan.access_token))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["stats"]["comments_count"], 2);
    assert_eq!(body["stats"]["likes_count"], 1);
    assert_eq!(body["stats"]["bookmarks_count"], 1);

    let req = test::TestRequest::delete()
        .uri(&post_uri)
        .insert_header(bearer(&author.access_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/v1/users/me")
        .insert_header(bearer(&fan.access_token))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["stats"]["comments_count"], 0);
    assert_eq!(body["stats"]["likes_count"], 0);
    assert_eq!(body["stats"]["bookmarks_count"], 0);

    for comment_id in [root.id, reply.id] {
        let (status, _) = send(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/v1/comments/{}", comment_id))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let (_, body) = send(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/comments?post_id={}", post.id))
            .to_request(),
    )
    .await;
    assert_eq!(body["pagination"]["total"], 0);

    for list in ["likes", "bookmarks"] {
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/users/me/{}", list))
            .insert_header(bearer(&fan.access_token))
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 0, "{}", list);
    }

    let links = post_tag::Entity::find()
        .count(&pool)
        .await
        .expect("count post tags");
    assert_eq!(links, 0, "Tag links go with the post");

    let (_, body) =
        send(&app, test::TestRequest::get().uri("/api/v1/tags?search=gone").to_request()).await;
    assert_eq!(body["tags"][0]["name"], "gone", "The tag itself survives");
}
