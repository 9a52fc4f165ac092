//! # Server Configuration
//!
//! Router setup, shared application state, and the serve loop with
//! graceful shutdown.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::connect::ConnectService;
use crate::handlers;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub connect: ConnectService,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/connect/consumers", post(handlers::integrations::create_consumer))
        .route(
            "/connect/{consumer_id}/integrations",
            get(handlers::integrations::list_integrations),
        )
        // The third segment is a service code for enable/login/callback
        // and an integration id for oauth2/secret; the router needs one
        // consistent parameter name, handlers destructure by position.
        .route(
            "/connect/{consumer_id}/integrations/{integration_ref}/enable",
            post(handlers::integrations::set_enabled),
        )
        .route(
            "/connect/{consumer_id}/integrations/{integration_ref}/oauth2",
            post(handlers::integrations::configure_oauth2),
        )
        .route(
            "/connect/{consumer_id}/integrations/{integration_ref}/secret",
            post(handlers::integrations::set_secret),
        )
        .route(
            "/connect/{consumer_id}/integrations/{integration_ref}/oauth2/login",
            get(handlers::oauth::login),
        )
        .route(
            "/connect/{consumer_id}/integrations/{integration_ref}/oauth2/callback",
            get(handlers::oauth::callback),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let crypto_key = config.crypto_key()?;
    let addr = config.bind_addr()?;

    let config = Arc::new(config);
    let connect = ConnectService::new(config.clone(), Arc::new(db.clone()), crypto_key);
    let state = AppState {
        config: config.clone(),
        db,
        connect,
    };
    let app = create_app(state);

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shutdown_signal.cancel();
        }
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, profile = %config.profile, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::integrations::create_consumer,
        crate::handlers::integrations::list_integrations,
        crate::handlers::integrations::set_enabled,
        crate::handlers::integrations::configure_oauth2,
        crate::handlers::integrations::set_secret,
        crate::handlers::oauth::login,
        crate::handlers::oauth::callback,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::catalog::AuthType,
            crate::connect::IntegrationView,
            crate::connect::Oauth2Metadata,
            crate::connect::Oauth2ConfigurationInput,
            crate::handlers::integrations::CreateConsumerResponse,
            crate::handlers::integrations::SetEnabledRequest,
            crate::handlers::integrations::SetSecretRequest,
            crate::handlers::integrations::SuccessResponse,
        )
    ),
    info(
        title = "OmniCRM Connect API",
        description = "Unified CRM connect service",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
