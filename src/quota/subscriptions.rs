use chrono::{DateTime, Months, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::catalog::Plan;
use super::models::Subscription;

/// "Active" means the administrative flag is set AND the period has not
/// lapsed. Enforcement of at-most-one such row per user belongs to the
/// renewal workflow, not here.
pub async fn has_active_subscription(
    pool: &PgPool,
    user_id: Uuid,
    as_of: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM subscriptions
            WHERE user_id = $1 AND is_active = TRUE AND end_date >= $2
        )
        "#,
    )
    .bind(user_id)
    .bind(as_of)
    .fetch_one(pool)
    .await
}

/// Renewal on payment approval: extend a still-active subscription from its
/// current `end_date` so no paid days are lost, otherwise start a fresh
/// one-month period from now.
pub async fn activate_or_extend(
    pool: &PgPool,
    user_id: Uuid,
    plan: Plan,
    price_cents: i32,
    now: DateTime<Utc>,
) -> Result<Subscription, sqlx::Error> {
    let existing = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT * FROM subscriptions
        WHERE user_id = $1 AND is_active = TRUE AND end_date >= $2
        ORDER BY end_date DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    if let Some(subscription) = existing {
        sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET end_date = $2, plan = $3, price_cents = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.end_date + Months::new(1))
        .bind(plan)
        .bind(price_cents)
        .fetch_one(pool)
        .await
    } else {
        sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (id, user_id, plan, price_cents, start_date, end_date, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(plan)
        .bind(price_cents)
        .bind(now)
        .bind(now + Months::new(1))
        .fetch_one(pool)
        .await
    }
}
