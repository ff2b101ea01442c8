use axum::{
    extract::{Extension, Path},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::quota::Plan;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub plan: Plan,
    pub monthly_quota: i32,
    pub lifetime_quota: i32,
    pub custom_quota: Option<i32>,
    pub bonus_quota: i32,
    pub is_banned: bool,
    pub ban_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn list_users(
    admin: AuthUser,
    Extension(pool): Extension<PgPool>,
) -> AppResult<Json<Vec<User>>> {
    if !admin.is_admin() {
        return Err(AppError::Forbidden("admin only".into()));
    }
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE deleted_at IS NULL ORDER BY created_at DESC",
    )
    .fetch_all(&pool)
    .await?;
    Ok(Json(users))
}

/// All fields optional; absent fields are left untouched. `custom_quota` is
/// an override sentinel, so clearing it back to the plan default needs the
/// explicit `clear_custom_quota` flag rather than omission.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub plan: Option<Plan>,
    pub monthly_quota: Option<i32>,
    pub lifetime_quota: Option<i32>,
    pub custom_quota: Option<i32>,
    #[serde(default)]
    pub clear_custom_quota: bool,
    pub bonus_quota: Option<i32>,
    pub is_banned: Option<bool>,
    pub ban_reason: Option<String>,
}

/// key: admin-users -> quota field edits, ban/unban
pub async fn update_user(
    admin: AuthUser,
    Extension(pool): Extension<PgPool>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    if !admin.is_admin() {
        return Err(AppError::Forbidden("admin only".into()));
    }
    if payload.clear_custom_quota && payload.custom_quota.is_some() {
        return Err(AppError::BadRequest(
            "cannot both set and clear custom_quota".into(),
        ));
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            plan = COALESCE($2, plan),
            monthly_quota = COALESCE($3, monthly_quota),
            lifetime_quota = COALESCE($4, lifetime_quota),
            custom_quota = CASE WHEN $5 THEN NULL ELSE COALESCE($6, custom_quota) END,
            bonus_quota = COALESCE($7, bonus_quota),
            is_banned = COALESCE($8, is_banned),
            ban_reason = CASE
                WHEN $8 IS TRUE THEN COALESCE($9, ban_reason)
                WHEN $8 IS FALSE THEN NULL
                ELSE ban_reason
            END
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(payload.plan)
    .bind(payload.monthly_quota)
    .bind(payload.lifetime_quota)
    .bind(payload.clear_custom_quota)
    .bind(payload.custom_quota)
    .bind(payload.bonus_quota)
    .bind(payload.is_banned)
    .bind(payload.ban_reason)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(Json(user))
}
