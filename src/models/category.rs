use crate::entities::{category, tag};
use crate::models::{Pagination, PostResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const MAX_CATEGORY_NAME_LENGTH: usize = 50;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub post_count: u64,
}

impl CategoryResponse {
    pub fn new(category: category::Model, post_count: u64) -> Self {
        CategoryResponse {
            id: category.id,
            name: category.name,
            description: category.description,
            color: category.color,
            created_at: category.created_at,
            post_count,
        }
    }
}

/// Category block nested into posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
}

impl From<&category::Model> for CategorySummary {
    fn from(category: &category::Model) -> Self {
        CategorySummary {
            id: category.id,
            name: category.name.clone(),
            color: category.color.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryListResponse {
    pub categories: Vec<CategoryResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryPostsResponse {
    pub category: CategoryResponse,
    pub posts: Vec<PostResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagQuery {
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<tag::Model> for TagResponse {
    fn from(tag: tag::Model) -> Self {
        TagResponse {
            id: tag.id,
            name: tag.name,
            created_at: tag.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TagListResponse {
    pub tags: Vec<TagResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TagPostsResponse {
    pub tag: TagResponse,
    pub posts: Vec<PostResponse>,
    pub pagination: Pagination,
}
