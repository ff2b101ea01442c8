use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::content_filter;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::provider::{GenerateImageRequest, PosterProvider};
use crate::quota::QuotaService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "generation_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum GenerationStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Generation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prompt: String,
    pub category: String,
    pub status: GenerationStatus,
    pub aspect_ratio: String,
    pub is_public: bool,
    pub result_image_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub reference_images: Vec<String>,
    pub is_public: Option<bool>,
    /// Present on revision requests so the fraud checks can compare against
    /// the poster's original payment details.
    pub original_account_number: Option<String>,
    pub original_account_name: Option<String>,
}

fn default_category() -> String {
    "CUSTOM".to_string()
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub generation: Generation,
    pub remaining: i64,
}

/// key: generate-endpoint -> quota gate, charge-on-accept, provider dispatch
///
/// Usage is charged once the request is accepted, before the provider
/// outcome is known. A FAILED generation keeps its monthly charge (the
/// ledger never decrements) but drops out of the FREE lifetime count.
pub async fn create_generation(
    user: AuthUser,
    Extension(pool): Extension<PgPool>,
    Extension(provider): Extension<Arc<dyn PosterProvider>>,
    Json(payload): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    let prompt = payload.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(AppError::BadRequest("prompt must not be empty".into()));
    }

    if let Some(violation) = content_filter::check_prompt_safety(&prompt) {
        return Err(AppError::BadRequest(violation.reason));
    }
    if let Some(violation) = content_filter::check_fraud_attempt(
        &prompt,
        payload.original_account_number.as_deref(),
        payload.original_account_name.as_deref(),
    ) {
        return Err(AppError::BadRequest(violation.reason));
    }

    let now = Utc::now();
    let quota = QuotaService::new(pool.clone());
    let entitlement = quota.check_entitlement(user.user_id, now).await?;
    if entitlement.is_banned {
        let reason = entitlement
            .ban_reason
            .unwrap_or_else(|| "contact an administrator".to_string());
        return Err(AppError::Forbidden(format!("account banned: {reason}")));
    }
    if !entitlement.allowed {
        return Err(AppError::QuotaExhausted {
            limit: entitlement.limit,
        });
    }

    let aspect_ratio = payload.aspect_ratio.unwrap_or_else(|| "1:1".to_string());
    let generation = sqlx::query_as::<_, Generation>(
        r#"
        INSERT INTO generations (id, user_id, prompt, category, status, aspect_ratio, is_public)
        VALUES ($1, $2, $3, $4, 'PROCESSING', $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(&prompt)
    .bind(&payload.category)
    .bind(&aspect_ratio)
    .bind(payload.is_public.unwrap_or(true))
    .fetch_one(&pool)
    .await?;

    // Charge before dispatch. If the charge cannot be persisted the whole
    // request fails; skipping it silently would grant unmetered usage.
    if let Err(err) = quota.record_usage(user.user_id, now).await {
        mark_failed(&pool, generation.id, "usage could not be recorded").await?;
        return Err(err.into());
    }

    let request = GenerateImageRequest {
        prompt: prompt.clone(),
        aspect_ratio,
        init_images: payload.reference_images,
    };

    match provider.generate(&request).await {
        Ok(image) => {
            let generation = sqlx::query_as::<_, Generation>(
                r#"
                UPDATE generations
                SET status = 'COMPLETED', result_image_url = $2
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(generation.id)
            .bind(&image.url)
            .fetch_one(&pool)
            .await?;

            Ok(Json(GenerateResponse {
                remaining: (entitlement.remaining - 1).max(0),
                generation,
            }))
        }
        Err(err) => {
            tracing::warn!(generation_id = %generation.id, error = %err, "provider call failed");
            mark_failed(&pool, generation.id, &err.to_string()).await?;
            Err(AppError::Provider(err))
        }
    }
}

async fn mark_failed(pool: &PgPool, id: Uuid, message: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE generations SET status = 'FAILED', error_message = $2 WHERE id = $1")
        .bind(id)
        .bind(message)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

pub async fn list_generations(
    user: AuthUser,
    Extension(pool): Extension<PgPool>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<Generation>>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let rows = sqlx::query_as::<_, Generation>(
        r#"
        SELECT * FROM generations
        WHERE user_id = $1 AND deleted_at IS NULL
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .fetch_all(&pool)
    .await?;
    Ok(Json(rows))
}

pub async fn public_gallery(
    Extension(pool): Extension<PgPool>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<Generation>>> {
    let limit = params.limit.unwrap_or(60).clamp(1, 200);
    let rows = sqlx::query_as::<_, Generation>(
        r#"
        SELECT * FROM generations
        WHERE is_public AND status = 'COMPLETED' AND deleted_at IS NULL
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(&pool)
    .await?;
    Ok(Json(rows))
}
