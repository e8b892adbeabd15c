// Common test utilities and fixtures
// Shared across all test files to avoid duplication

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use tokio::sync::RwLock;
use tower::util::ServiceExt;
use uuid::Uuid;

use chamafrete_backend_core::{
    ad_routes, admin_routes,
    app::AppState,
    app_config,
    config::PricingConfig,
    credit_routes,
    db::{create_diesel_pool, DieselDatabaseConfig, DieselPool, RedisConfig, RedisPool},
    freight_routes,
    models::auth::PrincipalClaims,
    models::user::{NewUser, UserRole},
    notification_routes,
    services::{NotificationService, RateLimitService},
};

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub diesel_pool: DieselPool,
    pub redis_pool: RedisPool,
}

impl TestApp {
    pub fn post(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "POST", uri)
    }

    pub fn get(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "GET", uri)
    }

    pub fn put(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "PUT", uri)
    }

    pub fn delete(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "DELETE", uri)
    }
}

/// Test request builder
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: String,
    uri: String,
    bearer: Option<String>,
    body: Option<Vec<u8>>,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &str, uri: &str) -> Self {
        Self {
            app,
            method: method.to_string(),
            uri: uri.to_string(),
            bearer: None,
            body: None,
        }
    }

    /// Add JSON body to request
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Some(serde_json::to_vec(body).unwrap());
        self
    }

    /// Attach a bearer token
    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    /// Send the request through the router
    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method.as_str()).uri(self.uri);

        if let Some(token) = &self.bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match self.body {
            Some(bytes) => builder
                .header("content-type", "application/json")
                .body(Body::from(bytes))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.app.clone().oneshot(request).await.unwrap();

        TestResponse { response }
    }
}

/// Test response wrapper
pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Parse JSON response
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> T {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }
}

/// Setup test application with all dependencies
pub async fn setup_test_app() -> TestApp {
    // Load test environment
    dotenv::from_filename(".env.test").ok();
    dotenv::dotenv().ok();

    // Initialize test database pool
    let db_config = DieselDatabaseConfig::default();
    let diesel_pool = create_diesel_pool(db_config).await.unwrap();

    // Initialize test Redis pool
    let redis_config = RedisConfig::from_env();
    let redis_pool = RedisPool::new(redis_config).await.unwrap();

    // Initialize services
    let rate_limit_service = Arc::new(RateLimitService::new(redis_pool.clone()));
    let notification_service = Arc::new(NotificationService::new(diesel_pool.clone()));

    // Create app state with default pricing
    let state = AppState {
        diesel_pool: diesel_pool.clone(),
        redis_pool: redis_pool.clone(),
        rate_limit_service,
        notification_service,
        pricing: Arc::new(RwLock::new(PricingConfig::default())),
    };

    // Build router the way the binary does
    let app = Router::new()
        .nest("/v1/freights", freight_routes(state.clone()))
        .nest("/v1/ads", ad_routes(state.clone()))
        .nest("/v1/notifications", notification_routes(state.clone()))
        .nest("/v1/credits", credit_routes(state.clone()))
        .nest("/v1/admin", admin_routes(state.clone()))
        .with_state(state);

    TestApp {
        app,
        diesel_pool,
        redis_pool,
    }
}

/// Sign a bearer token the way the session provider does
pub fn token_for(user_id: Uuid, role: UserRole, name: &str) -> String {
    let config = app_config::config();
    let now = Utc::now().timestamp() as u64;

    let claims = PrincipalClaims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        name: name.to_string(),
        aud: config.jwt_audience.clone(),
        iss: config.jwt_issuer.clone(),
        iat: now,
        exp: now + 3600,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .unwrap()
}

/// Insert a user row with a unique email. Returns the generated ID.
pub async fn create_user(
    pool: &DieselPool,
    role: UserRole,
    document_approved: bool,
    verified: bool,
    balance: i64,
) -> Uuid {
    use chamafrete_backend_core::schema::users::dsl;

    let new_user = NewUser {
        name: format!("Test {}", role.as_str()),
        email: format!(
            "{}_{}@test.chamafrete.com.br",
            role.as_str(),
            Uuid::new_v4().simple()
        ),
        whatsapp: Some("41999990000".to_string()),
        role: role.as_str().to_string(),
        document_status: if document_approved {
            "approved".to_string()
        } else {
            "pending".to_string()
        },
        is_verified: verified,
        balance,
    };

    let mut conn = pool.get().await.unwrap();
    diesel::insert_into(dsl::users)
        .values(&new_user)
        .returning(dsl::id)
        .get_result(&mut conn)
        .await
        .unwrap()
}

/// Give a driver equipment and a preferred region so matching can find them
pub async fn set_driver_profile(
    pool: &DieselPool,
    driver_id: Uuid,
    vehicle: Option<&str>,
    body: Option<&str>,
    region: Option<&str>,
) {
    use chamafrete_backend_core::schema::users::dsl;

    let mut conn = pool.get().await.unwrap();
    diesel::update(dsl::users.filter(dsl::id.eq(driver_id)))
        .set((
            dsl::vehicle_type.eq(vehicle.map(str::to_string)),
            dsl::body_type.eq(body.map(str::to_string)),
            dsl::preferred_region.eq(region.map(str::to_string)),
        ))
        .execute(&mut conn)
        .await
        .unwrap();
}

/// Current balance for a user
pub async fn user_balance(pool: &DieselPool, user_id: Uuid) -> i64 {
    use chamafrete_backend_core::schema::users::dsl;

    let mut conn = pool.get().await.unwrap();
    dsl::users
        .filter(dsl::id.eq(user_id))
        .select(dsl::balance)
        .first(&mut conn)
        .await
        .unwrap()
}

/// Current status column of a freight
pub async fn freight_status(pool: &DieselPool, freight_id: Uuid) -> String {
    use chamafrete_backend_core::schema::freights::dsl;

    let mut conn = pool.get().await.unwrap();
    dsl::freights
        .filter(dsl::id.eq(freight_id))
        .select(dsl::status)
        .first(&mut conn)
        .await
        .unwrap()
}

/// Current status column of an ad
pub async fn ad_status(pool: &DieselPool, ad_id: Uuid) -> String {
    use chamafrete_backend_core::schema::ads::dsl;

    let mut conn = pool.get().await.unwrap();
    dsl::ads
        .filter(dsl::id.eq(ad_id))
        .select(dsl::status)
        .first(&mut conn)
        .await
        .unwrap()
}

/// Count ledger rows attached to one user
pub async fn ledger_count(pool: &DieselPool, owner: Uuid) -> i64 {
    use chamafrete_backend_core::schema::credit_transactions::dsl;

    let mut conn = pool.get().await.unwrap();
    dsl::credit_transactions
        .filter(dsl::user_id.eq(owner))
        .count()
        .get_result(&mut conn)
        .await
        .unwrap()
}

/// Notifications stored for one user
pub async fn notification_titles(pool: &DieselPool, user_id: Uuid) -> Vec<String> {
    use chamafrete_backend_core::schema::notifications::dsl;

    let mut conn = pool.get().await.unwrap();
    dsl::notifications
        .filter(dsl::user_id.eq(user_id))
        .select(dsl::title)
        .load(&mut conn)
        .await
        .unwrap()
}
