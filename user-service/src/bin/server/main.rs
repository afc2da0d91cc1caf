use std::sync::Arc;

use auth::Authenticator;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use user_service::config::Config;
use user_service::domain::user::service::UserService;
use user_service::inbound::http::router::create_router;
use user_service::outbound::repositories::InMemoryUserRepository;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_service=debug,auth=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "user-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;
    let token_validity = config.jwt.token_validity()?;

    tracing::info!(
        http_port = config.server.http_port,
        token_validity_hours = config.jwt.expiration_hours,
        "Configuration loaded"
    );

    if config.jwt.uses_development_secret() {
        tracing::warn!("Using the built-in development JWT secret; set JWT__SECRET in production");
    }
    if config.jwt.expiration_hours <= 0 {
        tracing::warn!(
            expiration_hours = config.jwt.expiration_hours,
            "Token validity is not positive; every issued token will be expired"
        );
    }

    let authenticator = Arc::new(Authenticator::new(
        config.jwt.secret.as_bytes(),
        token_validity,
    ));
    let user_repository = Arc::new(InMemoryUserRepository::new());
    tracing::info!(store = "in-memory", "User repository initialized");

    let user_service = Arc::new(UserService::new(
        user_repository,
        Arc::clone(&authenticator),
    ));

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(user_service, authenticator);

    axum::serve(http_listener, http_application)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server exited successfully");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
