use crate::auth::{verify_token, TokenType};
use crate::config::Config;
use crate::db::DbPool;
use crate::entities::user;
use crate::error::AppError;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

/// The caller resolved from a bearer access token.
///
/// Use `Option<AuthenticatedUser>` on endpoints where authentication is optional.
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub user: user::Model,
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header_value = req.headers().get("Authorization")?;
    let header_str = header_value.to_str().ok()?;
    header_str
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

/// Looks up the user named by a token; missing or disabled accounts are rejected.
pub async fn current_user(
    db: &DbPool,
    token: &str,
    config: &Config,
) -> Result<user::Model, AppError> {
    let claims = verify_token(token, &config.jwt.secret, TokenType::Access).map_err(|e| {
        log::debug!("Rejected access token: {:?}", e);
        AppError::Auth("Invalid or expired token".to_string())
    })?;

    let found = user::Entity::find()
        .filter(user::Column::Username.eq(&claims.sub))
        .one(db)
        .await?;

    match found {
        Some(u) if u.is_active => Ok(u),
        Some(_) => Err(AppError::Auth("Account is disabled".to_string())),
        None => Err(AppError::Auth("User not found".to_string())),
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let token = bearer_token(req);
        let config = req.app_data::<web::Data<Config>>().cloned();
        let pool = req.app_data::<web::Data<DbPool>>().cloned();

        Box::pin(async move {
            let token = token.ok_or_else(|| {
                AppError::Auth("Missing or invalid authorization header".to_string())
            })?;
            let (config, pool) = match (config, pool) {
                (Some(config), Some(pool)) => (config, pool),
                _ => {
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "authentication state not registered"
                    )))
                }
            };

            let user = current_user(pool.get_ref(), &token, config.get_ref()).await?;
            Ok(AuthenticatedUser {
                user_id: user.id,
                user,
            })
        })
    }
}
