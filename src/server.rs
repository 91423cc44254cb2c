use crate::config::AppConfig;
use axum::Router;
use sms_core::SmsError;
use sms_twilio::TwilioClient;
use sms_web_axum::AppState;
use sms_web_generic::{MessageProcessor, MessageService};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Wire the store, the Twilio gateway and the router from configuration.
pub async fn build_router(config: &AppConfig) -> Result<Router, SmsError> {
    let store = sms_store::open(config.database.url.as_deref()).await?;

    let gateway = TwilioClient::with_base_url(
        config.twilio_credentials(),
        config.twilio.base_url.clone(),
    )
    .with_timeout(Duration::from_secs(config.twilio.timeout_seconds));
    if gateway.is_simulated() {
        warn!("Twilio credentials not configured, messages will be queued without sending");
    }

    let service = MessageService::new(Arc::new(gateway), store);
    let processor = MessageProcessor::new(service, config.database_settings());
    Ok(sms_web_axum::router(AppState { processor }))
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(&config).await?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "smsrelay listening");

    serve(listener, app, shutdown_signal()).await?;
    info!("smsrelay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
