use axum::{extract::Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "coupon_type")]
pub enum CouponType {
    /// Adds to `bonus_quota`; never expires or resets.
    #[sqlx(rename = "EXTRA_QUOTA")]
    #[serde(rename = "EXTRA_QUOTA")]
    ExtraQuota,
    /// Percentage off the next payment; informational here, applied by the
    /// payment flow.
    #[sqlx(rename = "DISCOUNT")]
    #[serde(rename = "DISCOUNT")]
    Discount,
    /// Permanently raises `monthly_quota`.
    #[sqlx(rename = "QUOTA_BOOST")]
    #[serde(rename = "QUOTA_BOOST")]
    QuotaBoost,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: CouponType,
    pub value: i32,
    pub max_uses: i32,
    pub used_count: i32,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedeemError {
    #[error("coupon is no longer active")]
    Inactive,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon redemption limit reached")]
    Exhausted,
    #[error("coupon already redeemed by this user")]
    AlreadyRedeemed,
}

/// Validation order matches the user-facing messages: an inactive coupon
/// reports as inactive even if it also expired.
pub fn validate_redemption(
    coupon: &Coupon,
    now: DateTime<Utc>,
    already_redeemed: bool,
) -> Result<(), RedeemError> {
    if !coupon.is_active {
        return Err(RedeemError::Inactive);
    }
    if now > coupon.expires_at {
        return Err(RedeemError::Expired);
    }
    if coupon.used_count >= coupon.max_uses {
        return Err(RedeemError::Exhausted);
    }
    if already_redeemed {
        return Err(RedeemError::AlreadyRedeemed);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: CouponType,
    pub value: i32,
}

/// key: coupon-redeem -> quota field mutation
pub async fn redeem_coupon(
    user: AuthUser,
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<RedeemRequest>,
) -> AppResult<Json<RedeemResponse>> {
    let code = payload.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::BadRequest("coupon code must not be empty".into()));
    }

    let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE code = $1")
        .bind(&code)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound)?;

    let already_redeemed: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM coupon_redemptions WHERE user_id = $1 AND coupon_id = $2)",
    )
    .bind(user.user_id)
    .bind(coupon.id)
    .fetch_one(&pool)
    .await?;

    validate_redemption(&coupon, Utc::now(), already_redeemed)
        .map_err(|err| AppError::BadRequest(err.to_string()))?;

    let mut tx = pool.begin().await?;

    let message = match coupon.kind {
        CouponType::ExtraQuota => {
            sqlx::query("UPDATE users SET bonus_quota = bonus_quota + $2 WHERE id = $1")
                .bind(user.user_id)
                .bind(coupon.value)
                .execute(&mut tx)
                .await?;
            format!("{} bonus generations added", coupon.value)
        }
        CouponType::QuotaBoost => {
            sqlx::query("UPDATE users SET monthly_quota = monthly_quota + $2 WHERE id = $1")
                .bind(user.user_id)
                .bind(coupon.value)
                .execute(&mut tx)
                .await?;
            format!("monthly quota raised by {}", coupon.value)
        }
        CouponType::Discount => {
            format!("{}% discount activated for your next payment", coupon.value)
        }
    };

    sqlx::query("INSERT INTO coupon_redemptions (user_id, coupon_id) VALUES ($1, $2)")
        .bind(user.user_id)
        .bind(coupon.id)
        .execute(&mut tx)
        .await?;
    sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE id = $1")
        .bind(coupon.id)
        .execute(&mut tx)
        .await?;

    tx.commit().await?;

    Ok(Json(RedeemResponse {
        message,
        kind: coupon.kind,
        value: coupon.value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(kind: CouponType) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "RAMADAN24".into(),
            kind,
            value: 10,
            max_uses: 100,
            used_count: 0,
            is_active: true,
            expires_at: Utc::now() + Duration::days(30),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn valid_coupon_passes() {
        assert_eq!(
            validate_redemption(&coupon(CouponType::ExtraQuota), Utc::now(), false),
            Ok(())
        );
    }

    #[test]
    fn inactive_reported_before_expiry() {
        let mut c = coupon(CouponType::Discount);
        c.is_active = false;
        c.expires_at = Utc::now() - Duration::days(1);
        assert_eq!(
            validate_redemption(&c, Utc::now(), false),
            Err(RedeemError::Inactive)
        );
    }

    #[test]
    fn expired_coupon_rejected() {
        let mut c = coupon(CouponType::ExtraQuota);
        c.expires_at = Utc::now() - Duration::seconds(1);
        assert_eq!(
            validate_redemption(&c, Utc::now(), false),
            Err(RedeemError::Expired)
        );
    }

    #[test]
    fn exhausted_coupon_rejected() {
        let mut c = coupon(CouponType::QuotaBoost);
        c.used_count = c.max_uses;
        assert_eq!(
            validate_redemption(&c, Utc::now(), false),
            Err(RedeemError::Exhausted)
        );
    }

    #[test]
    fn double_redemption_rejected() {
        assert_eq!(
            validate_redemption(&coupon(CouponType::ExtraQuota), Utc::now(), true),
            Err(RedeemError::AlreadyRedeemed)
        );
    }
}
