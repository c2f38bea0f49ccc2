use crate::models::{CategorySummary, Pagination, UserSummary};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_TAG_LENGTH: usize = 50;

fn default_true() -> bool {
    true
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub title: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub content: String,
    pub category_id: Option<i64>,
    #[serde(default, alias = "tags")]
    pub tag_names: Vec<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
    #[serde(default, alias = "tags")]
    pub tag_names: Option<Vec<String>>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub limit: Option<u64>,
    pub category_id: Option<i64>,
    pub category: Option<i64>,
    pub author: Option<i64>,
    /// Comma-separated tag names; a post matches if it has any of them.
    pub tags: Option<String>,
    pub created_after: Option<chrono::DateTime<chrono::Utc>>,
    pub created_before: Option<chrono::DateTime<chrono::Utc>>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MyPostsQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub limit: Option<u64>,
    /// `published`, `draft` or `all` (default).
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: UserSummary,
    pub category: Option<CategorySummary>,
    pub tags: Vec<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: u64,
    pub is_published: bool,
    pub is_liked: bool,
    pub is_bookmarked: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostListResponse {
    pub items: Vec<PostResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostsResponse {
    pub posts: Vec<PostResponse>,
    pub pagination: Pagination,
}

/// Body returned by like and bookmark endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReactionResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmarked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_count: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookmarkedPost {
    pub bookmarked_at: chrono::DateTime<chrono::Utc>,
    pub post: PostResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikedPost {
    pub liked_at: chrono::DateTime<chrono::Utc>,
    pub post: PostResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookmarksResponse {
    pub bookmarks: Vec<BookmarkedPost>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikesResponse {
    pub likes: Vec<LikedPost>,
    pub pagination: Pagination,
}
