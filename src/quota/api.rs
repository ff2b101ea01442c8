use axum::{
    extract::{Extension, Path},
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

use super::catalog::{all_plans, PlanInfo};
use super::models::Entitlement;
use super::QuotaService;

/// key: quota-api -> rest endpoints
pub async fn list_plans() -> Json<Vec<&'static PlanInfo>> {
    Json(all_plans().to_vec())
}

pub async fn my_quota(
    user: AuthUser,
    Extension(pool): Extension<PgPool>,
) -> AppResult<Json<Entitlement>> {
    let service = QuotaService::new(pool);
    let entitlement = service.check_entitlement(user.user_id, Utc::now()).await?;
    Ok(Json(entitlement))
}

pub async fn user_quota(
    admin: AuthUser,
    Extension(pool): Extension<PgPool>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Entitlement>> {
    if !admin.is_admin() {
        return Err(AppError::Forbidden("admin only".into()));
    }
    let service = QuotaService::new(pool);
    let entitlement = service.check_entitlement(user_id, Utc::now()).await?;
    Ok(Json(entitlement))
}
