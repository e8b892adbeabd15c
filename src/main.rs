use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chamafrete_backend_core::{
    ad_routes, admin_routes, app_config, credit_routes, docs_routes, freight_routes, health_check,
    initialize_app_state, middleware::dynamic_cors_middleware, notification_routes,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chamafrete_backend_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = app_config::config();
    let bind_address = config.bind_address.clone();

    println!("=== STARTING CHAMAFRETE BACKEND API ===");
    info!("Starting ChamaFrete backend on {}", bind_address);

    // Build shared state: pools, services, pricing snapshot
    let state = match initialize_app_state().await {
        Ok(state) => {
            println!("✓ Application state initialized successfully");
            info!("Application state initialized successfully");
            state
        },
        Err(e) => {
            println!("✗ Failed to initialize application state: {}", e);
            error!("Failed to initialize application state: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("State initialization failed: {}", e),
            ));
        },
    };

    let mut app = Router::new()
        .route("/v1/health", get(health_check))
        .nest("/v1/freights", freight_routes(state.clone()))
        .nest("/v1/ads", ad_routes(state.clone()))
        .nest("/v1/notifications", notification_routes(state.clone()))
        .nest("/v1/credits", credit_routes(state.clone()))
        .nest("/v1/admin", admin_routes(state.clone()));

    if config.enable_swagger_ui {
        info!("Swagger UI enabled at /v1/docs");
        app = app.nest("/v1/docs", docs_routes());
    }

    let app = app
        .layer(middleware::from_fn(dynamic_cors_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    println!("Starting HTTP server on {}...", bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on {}", bind_address);
    axum::serve(listener, app).await
}
