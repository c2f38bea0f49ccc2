use crate::auth::{hash_password, issue_token_pair, password_problems, verify_password, verify_token, TokenType};
use crate::config::Config;
use crate::entities::{bookmark, comment, like, post, user};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{
    BookmarkedPost, ChangePasswordRequest, LikedPost, LoginRequest, LoginResponse, MeResponse,
    Page, PageRequest, Pagination, PostResponse, PublicProfile, RegisterRequest, TokenResponse,
    UpdateProfileRequest, UserResponse, UserStats,
};
use crate::services::posts;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;
use validator::Validate;

const TOKEN_TYPE: &str = "bearer";

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn merge(errors: &mut FieldErrors, field: &str, messages: Vec<String>) {
    if !messages.is_empty() {
        errors.entry(field.to_string()).or_default().extend(messages);
    }
}

pub async fn find_user<C: ConnectionTrait>(db: &C, user_id: i64) -> AppResult<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

async fn find_active_user<C: ConnectionTrait>(db: &C, user_id: i64) -> AppResult<user::Model> {
    match find_user(db, user_id).await? {
        u if u.is_active => Ok(u),
        _ => Err(AppError::not_found("User")),
    }
}

async fn email_taken<C: ConnectionTrait>(db: &C, email: &str, except: Option<i64>) -> AppResult<bool> {
    let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
    if let Some(id) = except {
        query = query.filter(user::Column::Id.ne(id));
    }
    Ok(query.one(db).await?.is_some())
}

/// Creates an account after checking every field; all problems are reported together.
pub async fn register(
    db: &DatabaseConnection,
    config: &Config,
    req: RegisterRequest,
) -> AppResult<user::Model> {
    let mut errors = match req.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => match AppError::from(e) {
            AppError::FieldValidation(fields) => fields,
            other => return Err(other),
        },
    };

    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();

    if let Some(confirm) = req.password_confirm.as_deref() {
        if confirm != req.password {
            merge(&mut errors, "password", vec!["Password fields didn't match.".to_string()]);
        }
    }
    merge(
        &mut errors,
        "password",
        password_problems(&req.password, &username, &config.auth),
    );

    let taken = user::Entity::find()
        .filter(user::Column::Username.eq(username.as_str()))
        .one(db)
        .await?;
    if taken.is_some() {
        merge(&mut errors, "username", vec!["Username already exists.".to_string()]);
    }
    if email_taken(db, &email, None).await? {
        merge(&mut errors, "email", vec!["Email already exists.".to_string()]);
    }

    if !errors.is_empty() {
        return Err(AppError::FieldValidation(errors));
    }

    let password_hash = hash_password(&req.password, config.auth.bcrypt_cost)?;
    let nickname = blank_to_none(req.nickname).unwrap_or_else(|| username.clone());

    let now = Utc::now();
    let new_user = user::ActiveModel {
        username: Set(username),
        email: Set(email),
        password_hash: Set(password_hash),
        nickname: Set(nickname),
        bio: Set(blank_to_none(req.bio)),
        avatar_url: Set(blank_to_none(req.avatar_url)),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let user = user::Entity::insert(new_user)
        .exec_with_returning(db)
        .await?;

    log::info!("Registered user {} ({})", user.id, user.username);
    Ok(user)
}

pub async fn authenticate(
    db: &DatabaseConnection,
    config: &Config,
    req: LoginRequest,
) -> AppResult<LoginResponse> {
    req.validate()?;

    let found = user::Entity::find()
        .filter(user::Column::Username.eq(req.username.trim()))
        .one(db)
        .await?;

    let user = match found {
        Some(u) if verify_password(&req.password, &u.password_hash) => u,
        _ => {
            log::debug!("Failed login for {}", req.username);
            return Err(AppError::Auth("Invalid username or password".to_string()));
        }
    };
    if !user.is_active {
        return Err(AppError::Auth("Account is disabled".to_string()));
    }

    let tokens = issue_token_pair(user.id, &user.username, &config.jwt)?;
    Ok(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: TOKEN_TYPE.to_string(),
        user: UserResponse::from(user),
    })
}

/// Exchanges a refresh token for a fresh pair.
pub async fn refresh(
    db: &DatabaseConnection,
    config: &Config,
    refresh_token: &str,
) -> AppResult<TokenResponse> {
    let claims = verify_token(refresh_token, &config.jwt.secret, TokenType::Refresh).map_err(|e| {
        log::debug!("Rejected refresh token: {:?}", e);
        AppError::Auth("Invalid or expired refresh token".to_string())
    })?;

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(&claims.sub))
        .one(db)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Auth("User not found or inactive".to_string()))?;

    let tokens = issue_token_pair(user.id, &user.username, &config.jwt)?;
    Ok(TokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: TOKEN_TYPE.to_string(),
    })
}

pub async fn user_stats<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    include_reactions: bool,
) -> AppResult<UserStats> {
    let posts_count = post::Entity::find()
        .filter(post::Column::UserId.eq(user_id))
        .filter(post::Column::IsPublished.eq(true))
        .count(db)
        .await?;
    let comments_count = comment::Entity::find()
        .filter(comment::Column::UserId.eq(user_id))
        .count(db)
        .await?;

    let (likes_count, bookmarks_count) = if include_reactions {
        let likes = like::Entity::find()
            .filter(like::Column::UserId.eq(user_id))
            .count(db)
            .await?;
        let bookmarks = bookmark::Entity::find()
            .filter(bookmark::Column::UserId.eq(user_id))
            .count(db)
            .await?;
        (Some(likes), Some(bookmarks))
    } else {
        (None, None)
    };

    Ok(UserStats {
        posts_count,
        comments_count,
        likes_count,
        bookmarks_count,
    })
}

pub async fn me(db: &DatabaseConnection, user: user::Model) -> AppResult<MeResponse> {
    let stats = user_stats(db, user.id, true).await?;
    Ok(MeResponse {
        user: UserResponse::from(user),
        stats,
    })
}

pub async fn update_profile(
    db: &DatabaseConnection,
    user: user::Model,
    req: UpdateProfileRequest,
) -> AppResult<user::Model> {
    req.validate()?;

    let mut active: user::ActiveModel = user.clone().into();

    if let Some(email) = req.email.as_deref().map(str::trim) {
        if email_taken(db, email, Some(user.id)).await? {
            return Err(AppError::field("email", "Email already exists."));
        }
        active.email = Set(email.to_string());
    }
    if req.nickname.is_some() {
        let nickname = blank_to_none(req.nickname).unwrap_or_else(|| user.username.clone());
        active.nickname = Set(nickname);
    }
    if req.bio.is_some() {
        active.bio = Set(blank_to_none(req.bio));
    }
    if req.avatar_url.is_some() {
        active.avatar_url = Set(blank_to_none(req.avatar_url));
    }
    active.updated_at = Set(Utc::now());

    Ok(active.update(db).await?)
}

pub async fn change_password(
    db: &DatabaseConnection,
    config: &Config,
    user: user::Model,
    req: ChangePasswordRequest,
) -> AppResult<()> {
    req.validate()?;

    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(AppError::field(
            "current_password",
            "Current password is incorrect.",
        ));
    }
    let problems = password_problems(&req.new_password, &user.username, &config.auth);
    if !problems.is_empty() {
        let mut errors = FieldErrors::new();
        errors.insert("new_password".to_string(), problems);
        return Err(AppError::FieldValidation(errors));
    }

    let user_id = user.id;
    let mut active: user::ActiveModel = user.into();
    active.password_hash = Set(hash_password(&req.new_password, config.auth.bcrypt_cost)?);
    active.updated_at = Set(Utc::now());
    active.update(db).await?;

    log::info!("User {} changed password", user_id);
    Ok(())
}

pub async fn public_profile<C: ConnectionTrait>(db: &C, user_id: i64) -> AppResult<PublicProfile> {
    let user = find_active_user(db, user_id).await?;
    let stats = user_stats(db, user.id, false).await?;
    Ok(PublicProfile {
        id: user.id,
        username: user.username,
        nickname: user.nickname,
        avatar_url: user.avatar_url,
        bio: user.bio,
        created_at: user.created_at,
        stats,
    })
}

/// Another user's published posts, newest first.
pub async fn user_posts<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    page: PageRequest,
    viewer: Option<i64>,
) -> AppResult<(user::Model, Page<PostResponse>)> {
    let user = find_active_user(db, user_id).await?;
    let query = post::Entity::find()
        .filter(post::Column::UserId.eq(user_id))
        .filter(post::Column::IsPublished.eq(true));
    let posts = posts::paginate_posts(db, posts::newest_first(query), page, viewer).await?;
    Ok((user, posts))
}

/// The caller's own posts; `status` is `published`, `draft` or anything else for all.
pub async fn my_posts<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    status: Option<&str>,
    page: PageRequest,
) -> AppResult<Page<PostResponse>> {
    let mut query = post::Entity::find().filter(post::Column::UserId.eq(user_id));
    match status {
        Some("published") => query = query.filter(post::Column::IsPublished.eq(true)),
        Some("draft") => query = query.filter(post::Column::IsPublished.eq(false)),
        _ => {}
    }
    posts::paginate_posts(db, posts::newest_first(query), page, Some(user_id)).await
}

/// Loads the published posts behind a page of reaction rows, keeping row order.
async fn reacted_posts<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    rows: Vec<(i64, chrono::DateTime<Utc>)>,
) -> AppResult<Vec<(chrono::DateTime<Utc>, PostResponse)>> {
    let ids: Vec<i64> = rows.iter().map(|(post_id, _)| *post_id).collect();
    let models = post::Entity::find()
        .filter(post::Column::Id.is_in(ids))
        .all(db)
        .await?;
    let mut by_id: HashMap<i64, PostResponse> = posts::post_responses(db, models, Some(user_id))
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(rows
        .into_iter()
        .filter_map(|(post_id, at)| by_id.remove(&post_id).map(|p| (at, p)))
        .collect())
}

pub async fn my_bookmarks<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    page: PageRequest,
) -> AppResult<Page<BookmarkedPost>> {
    let paginator = bookmark::Entity::find()
        .filter(bookmark::Column::UserId.eq(user_id))
        .filter(bookmark::Column::PostId.in_subquery(posts::published_post_ids()))
        .order_by_desc(bookmark::Column::CreatedAt)
        .order_by_desc(bookmark::Column::Id)
        .paginate(db, page.per_page);
    let total = paginator.num_items().await?;
    let rows = paginator
        .fetch_page(page.page - 1)
        .await?
        .into_iter()
        .map(|b| (b.post_id, b.created_at))
        .collect();

    let items = reacted_posts(db, user_id, rows)
        .await?
        .into_iter()
        .map(|(bookmarked_at, post)| BookmarkedPost { bookmarked_at, post })
        .collect();
    Ok(Page {
        items,
        pagination: Pagination::new(page, total),
    })
}

pub async fn my_likes<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    page: PageRequest,
) -> AppResult<Page<LikedPost>> {
    let paginator = like::Entity::find()
        .filter(like::Column::UserId.eq(user_id))
        .filter(like::Column::PostId.in_subquery(posts::published_post_ids()))
        .order_by_desc(like::Column::CreatedAt)
        .order_by_desc(like::Column::Id)
        .paginate(db, page.per_page);
    let total = paginator.num_items().await?;
    let rows = paginator
        .fetch_page(page.page - 1)
        .await?
        .into_iter()
        .map(|l| (l.post_id, l.created_at))
        .collect();

    let items = reacted_posts(db, user_id, rows)
        .await?
        .into_iter()
        .map(|(liked_at, post)| LikedPost { liked_at, post })
        .collect();
    Ok(Page {
        items,
        pagination: Pagination::new(page, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_profile_fields_are_dropped() {
        assert_eq!(blank_to_none(Some("  ".to_string())), None);
        assert_eq!(blank_to_none(None), None);
        assert_eq!(
            blank_to_none(Some(" hi ".to_string())).as_deref(),
            Some("hi")
        );
    }

    #[test]
    fn merged_field_errors_accumulate() {
        let mut errors = FieldErrors::new();
        merge(&mut errors, "password", vec!["a".to_string()]);
        merge(&mut errors, "password", vec!["b".to_string()]);
        merge(&mut errors, "email", Vec::new());
        assert_eq!(errors["password"], vec!["a", "b"]);
        assert!(!errors.contains_key("email"));
    }
}
