use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::{coupons, generations, payments, quota, users};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/plans", get(quota::api::list_plans))
        .route("/api/quota", get(quota::api::my_quota))
        .route("/api/generate", post(generations::create_generation))
        .route("/api/generations", get(generations::list_generations))
        .route("/api/public/gallery", get(generations::public_gallery))
        .route("/api/coupons/redeem", post(coupons::redeem_coupon))
        .route("/api/payments", post(payments::submit_confirmation))
        .route(
            "/api/admin/payments",
            get(payments::list_confirmations).put(payments::review_confirmation),
        )
        .route("/api/admin/users", get(users::list_users))
        .route("/api/admin/users/:id", patch(users::update_user))
        .route("/api/admin/users/:id/quota", get(quota::api::user_quota))
}
