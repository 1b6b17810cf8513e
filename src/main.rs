use anyhow::Context;
use nexus_webhook_collector::http_server::{self, ServerState};
use nexus_webhook_collector::{
    EndpointRegistry, IngestGateway, LogFormat, ManagementGateway, PublicUrl, Reaper, Settings,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;
    init_tracing(&settings);

    let registry = Arc::new(EndpointRegistry::new(settings.registry_limits()));
    let state = ServerState {
        management: ManagementGateway::new(
            registry.clone(),
            PublicUrl {
                server_url: settings.public_server_url.clone(),
                mount_point: settings.mount_point.clone(),
            },
        ),
        ingest: IngestGateway::new(registry.clone()),
    };
    let app = http_server::router(state, &settings.mount_point);

    let reaper = Reaper::spawn(registry, settings.cleanup_frequency);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP server on {addr}"))?;
    info!(
        %addr,
        public_server_url = %settings.public_server_url,
        mount_point = %settings.mount_point,
        max_active_endpoints = settings.max_active_endpoints.get(),
        max_endpoint_notifications = settings.max_endpoint_notifications.get(),
        "webhook collector listening"
    );

    let served = http_server::serve(listener, app, shutdown_signal()).await;
    reaper.shutdown().await;
    served.context("HTTP server error")?;

    info!("webhook collector stopped");
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match settings.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
