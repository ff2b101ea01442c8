use chrono::{DateTime, Datelike, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::catalog::Plan;
use super::models::{
    CountingWindow, EffectiveQuota, Entitlement, MonthlyUsage, QuotaError, QuotaProfile,
    QuotaSource,
};
use super::subscriptions;

/// key: quota-service -> entitlement resolution, usage recording
#[derive(Clone)]
pub struct QuotaService {
    pool: PgPool,
}

/// Ledger period key for paid plans, `YYYY-MM`.
pub fn month_key(now: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", now.year(), now.month())
}

/// Combine override, plan default, bonus credits, and subscription state into
/// one limit. Precedence, highest first: admin override (including zero),
/// FREE lifetime allowance, expired paid plan (bonus credits only), active
/// paid plan. Bans are handled by the caller before this point.
pub fn effective_quota(profile: &QuotaProfile, subscription_active: bool) -> EffectiveQuota {
    let bonus = profile.bonus_quota as i64;
    match profile.source() {
        QuotaSource::Override(value) => EffectiveQuota {
            limit: value + bonus,
            window: CountingWindow::Monthly,
            subscription_expired: false,
        },
        QuotaSource::PlanDefault(Plan::Free) => EffectiveQuota {
            limit: profile.lifetime_quota as i64 + bonus,
            window: CountingWindow::Lifetime,
            subscription_expired: false,
        },
        // Paid access lapses with the subscription, but earned bonus credits
        // remain usable.
        QuotaSource::PlanDefault(Plan::Basic) | QuotaSource::PlanDefault(Plan::Pro)
            if !subscription_active =>
        {
            EffectiveQuota {
                limit: bonus,
                window: CountingWindow::Monthly,
                subscription_expired: true,
            }
        }
        QuotaSource::PlanDefault(_) => EffectiveQuota {
            limit: profile.monthly_quota as i64 + bonus,
            window: CountingWindow::Monthly,
            subscription_expired: false,
        },
    }
}

impl QuotaService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Answer "may this user consume one more generation right now".
    ///
    /// Pure read, no side effects. A missing ledger row is not an error; it
    /// means zero used so far in the period.
    pub async fn check_entitlement(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Entitlement, QuotaError> {
        let profile = self
            .profile(user_id)
            .await?
            .ok_or(QuotaError::UserNotFound)?;

        if profile.is_banned {
            return Ok(Entitlement::banned(profile.ban_reason));
        }

        // FREE needs no subscription; skip the query entirely.
        let subscription_active = if profile.plan.is_paid() {
            subscriptions::has_active_subscription(&self.pool, user_id, now).await?
        } else {
            true
        };

        let effective = effective_quota(&profile, subscription_active);
        let used = match effective.window {
            CountingWindow::Lifetime => self.lifetime_used(user_id).await?,
            CountingWindow::Monthly => self.monthly_used(user_id, &month_key(now)).await?,
        };

        let remaining = (effective.limit - used).max(0);
        Ok(Entitlement {
            allowed: remaining > 0,
            limit: effective.limit,
            used,
            remaining,
            is_banned: false,
            ban_reason: None,
            window: effective.window,
            subscription_expired: effective.subscription_expired,
        })
    }

    /// Charge one unit against the current month's ledger row.
    ///
    /// A single upsert-increment so that concurrent requests for the same
    /// user serialize at the storage layer instead of losing updates. Called
    /// at request acceptance, before the provider outcome is known; failures
    /// must fail the generation request rather than skip the charge.
    pub async fn record_usage(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<MonthlyUsage, QuotaError> {
        let row = sqlx::query_as::<_, MonthlyUsage>(
            r#"
            INSERT INTO monthly_usage (user_id, month, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, month)
            DO UPDATE SET
                count = monthly_usage.count + 1,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(month_key(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn profile(&self, user_id: Uuid) -> Result<Option<QuotaProfile>, sqlx::Error> {
        sqlx::query_as::<_, QuotaProfile>(
            r#"
            SELECT plan, monthly_quota, lifetime_quota, custom_quota, bonus_quota,
                   is_banned, ban_reason
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// FREE-plan usage derives from generation records, not the ledger.
    /// FAILED rows do not count; PROCESSING rows do, because usage is charged
    /// at acceptance and a still-pending request must already be reflected.
    async fn lifetime_used(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM generations
            WHERE user_id = $1
              AND status IN ('COMPLETED', 'PROCESSING')
              AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn monthly_used(&self, user_id: Uuid, month: &str) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT count FROM monthly_usage WHERE user_id = $1 AND month = $2")
                .bind(user_id)
                .bind(month)
                .fetch_optional(&self.pool)
                .await?;
        Ok(count.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn profile(plan: Plan) -> QuotaProfile {
        QuotaProfile {
            plan,
            monthly_quota: 150,
            lifetime_quota: 2,
            custom_quota: None,
            bonus_quota: 0,
            is_banned: false,
            ban_reason: None,
        }
    }

    #[test]
    fn override_beats_plan_default() {
        let mut p = profile(Plan::Pro);
        p.custom_quota = Some(7);
        let effective = effective_quota(&p, true);
        assert_eq!(effective.limit, 7);
        assert_eq!(effective.window, CountingWindow::Monthly);
        assert!(!effective.subscription_expired);
    }

    #[test]
    fn override_zero_blocks_but_bonus_still_adds() {
        let mut p = profile(Plan::Pro);
        p.custom_quota = Some(0);
        assert_eq!(effective_quota(&p, true).limit, 0);

        p.bonus_quota = 5;
        assert_eq!(effective_quota(&p, true).limit, 5);
    }

    #[test]
    fn override_applies_even_when_subscription_expired() {
        let mut p = profile(Plan::Basic);
        p.custom_quota = Some(40);
        let effective = effective_quota(&p, false);
        assert_eq!(effective.limit, 40);
        assert!(!effective.subscription_expired);
    }

    #[test]
    fn free_plan_counts_lifetime() {
        let mut p = profile(Plan::Free);
        p.bonus_quota = 3;
        let effective = effective_quota(&p, true);
        assert_eq!(effective.limit, 5);
        assert_eq!(effective.window, CountingWindow::Lifetime);
    }

    #[test]
    fn expired_paid_plan_degrades_to_bonus_only() {
        let mut p = profile(Plan::Pro);
        p.monthly_quota = 500;
        p.bonus_quota = 20;
        let effective = effective_quota(&p, false);
        assert_eq!(effective.limit, 20);
        assert_eq!(effective.window, CountingWindow::Monthly);
        assert!(effective.subscription_expired);
    }

    #[test]
    fn active_paid_plan_adds_bonus_to_monthly() {
        let mut p = profile(Plan::Basic);
        p.bonus_quota = 10;
        let effective = effective_quota(&p, true);
        assert_eq!(effective.limit, 160);
        assert!(!effective.subscription_expired);
    }

    #[test]
    fn month_key_is_zero_padded_and_rolls_over() {
        let january = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let february = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(month_key(january), "2024-01");
        assert_eq!(month_key(february), "2024-02");
        assert_ne!(month_key(january), month_key(february));
    }
}
