use serde::{Deserialize, Serialize};

/// Service tier. Stored in Postgres as the `plan` enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Plan {
    Free,
    Basic,
    Pro,
}

impl Plan {
    pub fn is_paid(self) -> bool {
        !matches!(self, Plan::Free)
    }
}

/// key: plan-catalog -> static tier table
///
/// For paid plans `limit` is the monthly generation allowance; for FREE it is
/// the all-time allowance. Prices are IDR cents.
#[derive(Debug, Clone, Serialize)]
pub struct PlanInfo {
    pub plan: Plan,
    pub display_name: &'static str,
    pub limit: i32,
    pub amount_cents: i32,
    pub features: &'static [&'static str],
}

const FREE: PlanInfo = PlanInfo {
    plan: Plan::Free,
    display_name: "Gratis",
    limit: 2,
    amount_cents: 0,
    features: &[
        "2 poster generations, ever",
        "All poster categories",
        "AI prompt enhancement",
        "Download results",
    ],
};

const BASIC: PlanInfo = PlanInfo {
    plan: Plan::Basic,
    display_name: "Basic",
    limit: 150,
    amount_cents: 4_900_000,
    features: &[
        "150 generations per month",
        "All poster categories",
        "AI prompt enhancement",
        "Download results",
        "Priority queue",
        "No watermark",
    ],
};

const PRO: PlanInfo = PlanInfo {
    plan: Plan::Pro,
    display_name: "Pro",
    limit: 500,
    amount_cents: 10_000_000,
    features: &[
        "500 generations per month",
        "All poster categories",
        "AI prompt enhancement",
        "Download results",
        "Priority queue",
        "No watermark",
        "HD output",
        "Priority support",
    ],
};

pub fn plan_info(plan: Plan) -> &'static PlanInfo {
    match plan {
        Plan::Free => &FREE,
        Plan::Basic => &BASIC,
        Plan::Pro => &PRO,
    }
}

pub fn all_plans() -> [&'static PlanInfo; 3] {
    [&FREE, &BASIC, &PRO]
}
