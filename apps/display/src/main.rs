use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use auth_cell::AuthenticatedClient;
use booking_queue_cell::{announcer_from_config, AnnouncementService, DisplayService, QueueContext};
use shared_config::AppConfig;
use shared_database::{ClinicApiClient, FileCredentialStore};
use shared_models::auth::SignInCredentials;
use shared_utils::{Clock, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic queue display");

    let config = AppConfig::from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store = Arc::new(FileCredentialStore::new(&config.credential_store_path, clock.clone()));
    let api = Arc::new(ClinicApiClient::new(&config));
    let client = Arc::new(AuthenticatedClient::new(api, store, &config));

    seed_credentials(&client, &config).await?;

    let announcements = AnnouncementService::new(announcer_from_config(&config));
    let context = QueueContext::new(client.clone(), clock, announcements, &config);
    let display = Arc::new(DisplayService::new(context));
    let _auth_listener = display.spawn_auth_listener();

    if let (Some(hospital_id), Some(mapping_id)) = (&config.hospital_id, &config.mapping_id) {
        if let Err(e) = display.select(hospital_id, mapping_id).await {
            error!("Failed to start display for mapping {}: {}", mapping_id, e);
        }
    } else {
        info!("No mapping configured; select one with PUT /display");
    }

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(client, display.clone())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    display.stop().await;
    info!("Clinic queue display stopped");
    Ok(())
}

/// Hands credentials from the environment to the store on first start.
/// Credentials already in the store win.
async fn seed_credentials(client: &AuthenticatedClient, config: &AppConfig) -> anyhow::Result<()> {
    let (Some(access_token), Some(refresh_token)) = (&config.access_token, &config.refresh_token) else {
        if !client.is_signed_in().await? {
            warn!("No credentials stored; sign in with POST /auth/session");
        }
        return Ok(());
    };

    if client.is_signed_in().await? {
        info!("Using stored credentials");
        return Ok(());
    }

    client
        .sign_in(&SignInCredentials {
            access_token: access_token.clone(),
            refresh_token: refresh_token.clone(),
            user_id: config.user_id.clone(),
        })
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
