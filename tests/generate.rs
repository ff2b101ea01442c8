use std::sync::Arc;

use async_trait::async_trait;
use axum::Extension;
use chrono::{Duration, Utc};
use hyper::{Body, Request, StatusCode};
use jsonwebtoken::{encode, EncodingKey, Header};
use poster_backend::api_routes;
use poster_backend::provider::{
    GenerateImageRequest, PosterProvider, ProviderError, ProviderImage,
};
use poster_backend::quota::Plan;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

// key: generate-tests -> quota gate, charge-on-accept

struct StubProvider;

#[async_trait]
impl PosterProvider for StubProvider {
    async fn generate(
        &self,
        _request: &GenerateImageRequest,
    ) -> Result<ProviderImage, ProviderError> {
        Ok(ProviderImage {
            url: "https://img.example/stub.png".into(),
        })
    }
}

struct FailingProvider;

#[async_trait]
impl PosterProvider for FailingProvider {
    async fn generate(
        &self,
        _request: &GenerateImageRequest,
    ) -> Result<ProviderImage, ProviderError> {
        Err(ProviderError::NoImage)
    }
}

fn app(pool: PgPool, provider: Arc<dyn PosterProvider>) -> axum::Router {
    api_routes()
        .layer(Extension(pool))
        .layer(Extension(provider))
}

fn token_for(user_id: Uuid, role: &str) -> String {
    std::env::set_var("JWT_SECRET", "test-secret");
    let claims = serde_json::json!({
        "sub": user_id,
        "role": role,
        "exp": 9999999999u64,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

async fn seed_user(pool: &PgPool, plan: Plan, monthly: i32, lifetime: i32) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO users (email, name, plan, monthly_quota, lifetime_quota)
        VALUES ($1, 'Generate Test User', $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(format!("{}@example.com", Uuid::new_v4()))
    .bind(plan)
    .bind(monthly)
    .bind(lifetime)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_active_subscription(pool: &PgPool, user_id: Uuid, plan: Plan) {
    sqlx::query(
        r#"
        INSERT INTO subscriptions (user_id, plan, price_cents, start_date, end_date, is_active)
        VALUES ($1, $2, 0, $3, $4, TRUE)
        "#,
    )
    .bind(user_id)
    .bind(plan)
    .bind(Utc::now() - Duration::days(1))
    .bind(Utc::now() + Duration::days(29))
    .execute(pool)
    .await
    .unwrap();
}

fn generate_request(token: &str, prompt: &str) -> Request<Body> {
    let body = serde_json::json!({ "prompt": prompt });
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn ledger_count(pool: &PgPool, user_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COALESCE(SUM(count), 0)::BIGINT FROM monthly_usage WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn banned_user_gets_403_with_reason(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, Plan::Pro, 500, 2).await;
    sqlx::query("UPDATE users SET is_banned = TRUE, ban_reason = 'payment fraud' WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

    let app = app(pool.clone(), Arc::new(StubProvider));
    let token = token_for(user_id, "USER");
    let response = app
        .oneshot(generate_request(&token, "poster kajian subuh"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("payment fraud"));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn exhausted_quota_gets_429_with_limit(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    // FREE user with a zero lifetime allowance.
    let user_id = seed_user(&pool, Plan::Free, 150, 0).await;

    let app = app(pool.clone(), Arc::new(StubProvider));
    let token = token_for(user_id, "USER");
    let response = app
        .oneshot(generate_request(&token, "poster kajian subuh"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("0"));
    assert_eq!(ledger_count(&pool, user_id).await, 0);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn accepted_request_charges_and_completes(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, Plan::Basic, 150, 2).await;
    seed_active_subscription(&pool, user_id, Plan::Basic).await;

    let app = app(pool.clone(), Arc::new(StubProvider));
    let token = token_for(user_id, "USER");
    let response = app
        .oneshot(generate_request(&token, "poster kajian subuh"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["remaining"], 149);
    assert_eq!(json["generation"]["status"], "COMPLETED");
    assert_eq!(
        json["generation"]["result_image_url"],
        "https://img.example/stub.png"
    );
    assert_eq!(ledger_count(&pool, user_id).await, 1);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn provider_failure_keeps_monthly_charge(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, Plan::Basic, 150, 2).await;
    seed_active_subscription(&pool, user_id, Plan::Basic).await;

    let app = app(pool.clone(), Arc::new(FailingProvider));
    let token = token_for(user_id, "USER");
    let response = app
        .oneshot(generate_request(&token, "poster kajian subuh"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let status: String =
        sqlx::query_scalar("SELECT status::text FROM generations WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "FAILED");
    // Charge-on-accept: the ledger never decrements.
    assert_eq!(ledger_count(&pool, user_id).await, 1);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn unsafe_prompt_rejected_before_any_charge(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, Plan::Basic, 150, 2).await;
    seed_active_subscription(&pool, user_id, Plan::Basic).await;

    let app = app(pool.clone(), Arc::new(StubProvider));
    let token = token_for(user_id, "USER");
    let response = app
        .oneshot(generate_request(&token, "related nsfw poster"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ledger_count(&pool, user_id).await, 0);

    let generations: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM generations WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(generations, 0);
}
