pub mod api;
pub mod catalog;
pub mod models;
pub mod service;
pub mod subscriptions;

pub use catalog::{all_plans, plan_info, Plan, PlanInfo};
pub use models::{
    CountingWindow, EffectiveQuota, Entitlement, MonthlyUsage, QuotaError, QuotaProfile,
    QuotaSource, Subscription,
};
pub use service::{effective_quota, month_key, QuotaService};
pub use subscriptions::{activate_or_extend, has_active_subscription};
