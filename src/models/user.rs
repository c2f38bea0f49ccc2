use crate::entities::user;
use crate::models::Pagination;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub const MAX_USERNAME_LENGTH: u64 = 150;
pub const MAX_NICKNAME_LENGTH: u64 = 50;
pub const MAX_BIO_LENGTH: u64 = 500;
pub const MAX_AVATAR_URL_LENGTH: u64 = 500;

/// Usernames may contain letters, digits and `@ . + - _`.
pub fn check_username(username: &str) -> Result<(), ValidationError> {
    let valid = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_username");
        err.message = Some(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .into(),
        );
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(max = MAX_USERNAME_LENGTH, message = "Username too long (max 150 characters)"),
        custom(function = "check_username")
    )]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
    #[validate(length(max = MAX_NICKNAME_LENGTH, message = "Nickname too long (max 50 characters)"))]
    pub nickname: Option<String>,
    #[validate(length(max = MAX_BIO_LENGTH, message = "Bio too long (max 500 characters)"))]
    pub bio: Option<String>,
    #[validate(length(
        max = MAX_AVATAR_URL_LENGTH,
        message = "Avatar URL too long (max 500 characters)"
    ))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub username: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(max = MAX_NICKNAME_LENGTH, message = "Nickname too long (max 50 characters)"))]
    pub nickname: Option<String>,
    #[validate(length(max = MAX_BIO_LENGTH, message = "Bio too long (max 500 characters)"))]
    pub bio: Option<String>,
    #[validate(length(
        max = MAX_AVATAR_URL_LENGTH,
        message = "Avatar URL too long (max 500 characters)"
    ))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub current_password: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub new_password: String,
}

/// Full profile; only ever returned to the user it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub nickname: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            nickname: user.nickname,
            bio: user.bio,
            avatar_url: user.avatar_url,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Author block nested into posts and comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub avatar_url: Option<String>,
}

impl From<&user::Model> for UserSummary {
    fn from(user: &user::Model) -> Self {
        UserSummary {
            id: user.id,
            username: user.username.clone(),
            nickname: user.nickname.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub posts_count: u64,
    pub comments_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmarks_count: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub stats: UserStats,
}

/// What anyone may see about a user; never includes the email.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub stats: UserStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserPostsResponse {
    pub user: UserSummary,
    pub posts: Vec<crate::models::PostResponse>,
    pub pagination: Pagination,
}
