use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use super::catalog::Plan;

#[derive(Debug, Error)]
pub enum QuotaError {
    /// The user vanished mid-request (soft-deleted or missing). Callers must
    /// not confuse this with "has no quota left".
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// key: quota-profile -> per-user quota fields
///
/// The quota-relevant slice of a user row. `custom_quota` is an admin
/// override sentinel; see [`QuotaSource`].
#[derive(Debug, Clone, FromRow)]
pub struct QuotaProfile {
    pub plan: Plan,
    pub monthly_quota: i32,
    pub lifetime_quota: i32,
    pub custom_quota: Option<i32>,
    pub bonus_quota: i32,
    pub is_banned: bool,
    pub ban_reason: Option<String>,
}

impl QuotaProfile {
    pub fn source(&self) -> QuotaSource {
        match self.custom_quota {
            Some(value) => QuotaSource::Override(value as i64),
            None => QuotaSource::PlanDefault(self.plan),
        }
    }
}

/// Where the base limit comes from. An admin override beats the plan default
/// outright, including `Override(0)` to hard-block a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaSource {
    Override(i64),
    PlanDefault(Plan),
}

/// The period over which usage accumulates before resetting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountingWindow {
    Monthly,
    Lifetime,
}

/// Effective limit for a user once override, plan, bonus, and subscription
/// state have been combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveQuota {
    pub limit: i64,
    pub window: CountingWindow,
    pub subscription_expired: bool,
}

/// key: entitlement -> quota decision
#[derive(Debug, Clone, Serialize)]
pub struct Entitlement {
    pub allowed: bool,
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
    pub is_banned: bool,
    pub ban_reason: Option<String>,
    pub window: CountingWindow,
    pub subscription_expired: bool,
}

impl Entitlement {
    pub fn banned(reason: Option<String>) -> Self {
        Self {
            allowed: false,
            limit: 0,
            used: 0,
            remaining: 0,
            is_banned: true,
            ban_reason: reason,
            window: CountingWindow::Monthly,
            subscription_expired: false,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: Plan,
    pub price_cents: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Both the administrative flag and the date window must hold.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.end_date >= now
    }
}

/// Monthly ledger row, keyed by `(user_id, "YYYY-MM")`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MonthlyUsage {
    pub user_id: Uuid,
    pub month: String,
    pub count: i64,
    pub updated_at: DateTime<Utc>,
}
