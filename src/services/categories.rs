use crate::entities::{category, post};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{
    CategoryResponse, CreateCategoryRequest, Page, PageRequest, Pagination, PostResponse,
    UpdateCategoryRequest, MAX_CATEGORY_NAME_LENGTH, MAX_DESCRIPTION_LENGTH,
};
use crate::services::posts;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("hex colour pattern is valid")
});

pub fn clean_category_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::field("name", "Name cannot be empty."));
    }
    if name.chars().count() > MAX_CATEGORY_NAME_LENGTH {
        return Err(AppError::field(
            "name",
            format!("Name too long (max {} characters).", MAX_CATEGORY_NAME_LENGTH),
        ));
    }
    Ok(name.to_string())
}

/// Blank descriptions are stored as absent.
pub fn clean_description(raw: Option<&str>) -> AppResult<Option<String>> {
    let description = match raw.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => d,
        None => return Ok(None),
    };
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(AppError::field(
            "description",
            format!(
                "Description too long (max {} characters).",
                MAX_DESCRIPTION_LENGTH
            ),
        ));
    }
    Ok(Some(description.to_string()))
}

/// Colours are `#RRGGBB`; blank means no colour.
pub fn clean_color(raw: Option<&str>) -> AppResult<Option<String>> {
    match raw.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(None),
        Some(color) if HEX_COLOR.is_match(color) => Ok(Some(color.to_string())),
        Some(_) => Err(AppError::field(
            "color",
            "Color must be a valid hex color code (e.g., #FF0000).",
        )),
    }
}

async fn ensure_unique_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
    except: Option<i64>,
) -> AppResult<()> {
    let mut query = category::Entity::find().filter(category::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(category::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(AppError::Conflict(
            "Category with this name already exists".to_string(),
        ));
    }
    Ok(())
}

pub async fn find_category<C: ConnectionTrait>(db: &C, category_id: i64) -> AppResult<category::Model> {
    category::Entity::find_by_id(category_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))
}

async fn post_count<C: ConnectionTrait>(db: &C, category_id: i64) -> AppResult<u64> {
    Ok(post::Entity::find()
        .filter(post::Column::CategoryId.eq(category_id))
        .count(db)
        .await?)
}

#[derive(Debug, FromQueryResult)]
struct CategoryCount {
    category_id: i64,
    total: i64,
}

pub async fn create_category(
    db: &DatabaseConnection,
    req: CreateCategoryRequest,
) -> AppResult<CategoryResponse> {
    let name = clean_category_name(&req.name);
    let description = clean_description(req.description.as_deref());
    let color = clean_color(req.color.as_deref());

    let mut errors = FieldErrors::new();
    for result in [name.as_ref().err(), description.as_ref().err(), color.as_ref().err()] {
        if let Some(AppError::FieldValidation(fields)) = result {
            for (field, messages) in fields {
                errors.entry(field.clone()).or_default().extend(messages.clone());
            }
        }
    }
    if !errors.is_empty() {
        return Err(AppError::FieldValidation(errors));
    }
    let (name, description, color) = (name?, description?, color?);

    ensure_unique_name(db, &name, None).await?;

    let new_category = category::ActiveModel {
        name: Set(name),
        description: Set(description),
        color: Set(color),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let category = category::Entity::insert(new_category)
        .exec_with_returning(db)
        .await?;

    log::info!("Created category {} ({})", category.id, category.name);
    Ok(CategoryResponse::new(category, 0))
}

/// Partial update; only the supplied fields change.
pub async fn update_category(
    db: &DatabaseConnection,
    category_id: i64,
    req: UpdateCategoryRequest,
) -> AppResult<CategoryResponse> {
    let category = find_category(db, category_id).await?;
    let mut active: category::ActiveModel = category.into();

    if let Some(raw) = req.name.as_deref() {
        let name = clean_category_name(raw)?;
        ensure_unique_name(db, &name, Some(category_id)).await?;
        active.name = Set(name);
    }
    if req.description.is_some() {
        active.description = Set(clean_description(req.description.as_deref())?);
    }
    if req.color.is_some() {
        active.color = Set(clean_color(req.color.as_deref())?);
    }

    let category = active.update(db).await?;
    let count = post_count(db, category.id).await?;
    Ok(CategoryResponse::new(category, count))
}

/// Refuses while any post still references the category.
pub async fn delete_category(db: &DatabaseConnection, category_id: i64) -> AppResult<()> {
    find_category(db, category_id).await?;

    let count = post_count(db, category_id).await?;
    if count > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete category with {} posts. Move or delete posts first.",
            count
        )));
    }

    category::Entity::delete_by_id(category_id).exec(db).await?;
    log::info!("Deleted category {}", category_id);
    Ok(())
}

pub async fn get_category<C: ConnectionTrait>(db: &C, category_id: i64) -> AppResult<CategoryResponse> {
    let category = find_category(db, category_id).await?;
    let count = post_count(db, category.id).await?;
    Ok(CategoryResponse::new(category, count))
}

/// All categories ordered by name, each with its post count.
pub async fn list_categories<C: ConnectionTrait>(
    db: &C,
    page: PageRequest,
) -> AppResult<Page<CategoryResponse>> {
    let paginator = category::Entity::find()
        .order_by_asc(category::Column::Name)
        .paginate(db, page.per_page);
    let total = paginator.num_items().await?;
    let categories = paginator.fetch_page(page.page - 1).await?;

    let ids: Vec<i64> = categories.iter().map(|c| c.id).collect();
    let counts: HashMap<i64, u64> = if ids.is_empty() {
        HashMap::new()
    } else {
        post::Entity::find()
            .select_only()
            .column_as(post::Column::CategoryId, "category_id")
            .column_as(Expr::col(post::Column::Id).count(), "total")
            .filter(post::Column::CategoryId.is_in(ids))
            .group_by(post::Column::CategoryId)
            .into_model::<CategoryCount>()
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.category_id, c.total.max(0) as u64))
            .collect()
    };

    Ok(Page {
        items: categories
            .into_iter()
            .map(|c| {
                let count = counts.get(&c.id).copied().unwrap_or(0);
                CategoryResponse::new(c, count)
            })
            .collect(),
        pagination: Pagination::new(page, total),
    })
}

/// The category plus a page of its published posts, newest first.
pub async fn category_posts<C: ConnectionTrait>(
    db: &C,
    category_id: i64,
    page: PageRequest,
    viewer: Option<i64>,
) -> AppResult<(CategoryResponse, Page<PostResponse>)> {
    let category = get_category(db, category_id).await?;

    let query = post::Entity::find()
        .filter(post::Column::IsPublished.eq(true))
        .filter(post::Column::CategoryId.eq(category_id));
    let posts = posts::paginate_posts(db, posts::newest_first(query), page, viewer).await?;

    Ok((category, posts))
}
