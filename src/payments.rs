use axum::{extract::Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::quota::{catalog, subscriptions, Plan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentConfirmation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: Plan,
    pub amount_cents: i32,
    pub sender_name: String,
    pub proof_url: Option<String>,
    pub status: PaymentStatus,
    pub admin_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitPaymentRequest {
    pub plan: Plan,
    pub amount_cents: i32,
    pub sender_name: String,
    pub proof_url: Option<String>,
}

/// User reports a bank transfer for manual review.
pub async fn submit_confirmation(
    user: AuthUser,
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<SubmitPaymentRequest>,
) -> AppResult<Json<PaymentConfirmation>> {
    if !payload.plan.is_paid() {
        return Err(AppError::BadRequest("cannot pay for the free plan".into()));
    }
    if payload.amount_cents <= 0 {
        return Err(AppError::BadRequest("amount must be positive".into()));
    }

    let row = sqlx::query_as::<_, PaymentConfirmation>(
        r#"
        INSERT INTO payment_confirmations (id, user_id, plan, amount_cents, sender_name, proof_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.plan)
    .bind(payload.amount_cents)
    .bind(payload.sender_name.trim())
    .bind(payload.proof_url)
    .fetch_one(&pool)
    .await?;

    Ok(Json(row))
}

#[derive(Debug, Serialize)]
pub struct PaymentStats {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentConfirmation>,
    pub stats: PaymentStats,
}

pub async fn list_confirmations(
    admin: AuthUser,
    Extension(pool): Extension<PgPool>,
) -> AppResult<Json<PaymentListResponse>> {
    if !admin.is_admin() {
        return Err(AppError::Forbidden("admin only".into()));
    }

    let payments = sqlx::query_as::<_, PaymentConfirmation>(
        "SELECT * FROM payment_confirmations ORDER BY created_at DESC",
    )
    .fetch_all(&pool)
    .await?;

    let (pending, approved, rejected, total): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE status = 'PENDING'),
            COUNT(*) FILTER (WHERE status = 'APPROVED'),
            COUNT(*) FILTER (WHERE status = 'REJECTED'),
            COUNT(*)
        FROM payment_confirmations
        "#,
    )
    .fetch_one(&pool)
    .await?;

    Ok(Json(PaymentListResponse {
        payments,
        stats: PaymentStats {
            pending,
            approved,
            rejected,
            total,
        },
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub payment_id: Uuid,
    pub action: ReviewAction,
    pub admin_notes: Option<String>,
}

/// key: payment-review -> plan upgrade, subscription renewal
///
/// Approval writes the plan and its catalog quota onto the user, then
/// extends or creates the subscription. A renewal extends from the current
/// `end_date` so no paid days are lost.
pub async fn review_confirmation(
    admin: AuthUser,
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<Json<PaymentConfirmation>> {
    if !admin.is_admin() {
        return Err(AppError::Forbidden("admin only".into()));
    }

    let payment = sqlx::query_as::<_, PaymentConfirmation>(
        "SELECT * FROM payment_confirmations WHERE id = $1",
    )
    .bind(payload.payment_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound)?;

    if payment.status != PaymentStatus::Pending {
        return Err(AppError::BadRequest("payment already reviewed".into()));
    }

    let (status, default_notes) = match payload.action {
        ReviewAction::Approve => (PaymentStatus::Approved, "Approved by admin"),
        ReviewAction::Reject => (PaymentStatus::Rejected, "Rejected by admin"),
    };
    let notes = payload
        .admin_notes
        .unwrap_or_else(|| default_notes.to_string());

    let now = Utc::now();
    let payment = sqlx::query_as::<_, PaymentConfirmation>(
        r#"
        UPDATE payment_confirmations
        SET status = $2, admin_notes = $3, reviewed_at = $4, reviewed_by = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(payment.id)
    .bind(status)
    .bind(&notes)
    .bind(now)
    .bind(admin.user_id)
    .fetch_one(&pool)
    .await?;

    if status == PaymentStatus::Approved {
        let info = catalog::plan_info(payment.plan);
        sqlx::query("UPDATE users SET plan = $2, monthly_quota = $3 WHERE id = $1")
            .bind(payment.user_id)
            .bind(payment.plan)
            .bind(info.limit)
            .execute(&pool)
            .await?;

        subscriptions::activate_or_extend(
            &pool,
            payment.user_id,
            payment.plan,
            payment.amount_cents,
            now,
        )
        .await?;
        tracing::info!(user_id = %payment.user_id, plan = ?payment.plan, "payment approved, plan upgraded");
    }

    Ok(Json(payment))
}
