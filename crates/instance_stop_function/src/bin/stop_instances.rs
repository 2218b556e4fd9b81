use std::net::SocketAddr;
use std::sync::Arc;

use instance_stop_function::adapters::compute::ComputeInstances;
use instance_stop_function::adapters::gce::{AccessTokenSource, GceComputeClient};
use instance_stop_function::config::FunctionConfig;
use instance_stop_function::server::{router, AppState, ConnectCompute};
use instance_stop_function::telemetry::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = FunctionConfig::from_env()?;
    info!(
        component = "push_endpoint",
        event = "config_loaded",
        project = %config.project,
        compute_endpoint = %config.compute_endpoint,
        stop_delay_ms = config.stop_delay.as_millis() as u64,
    );

    let tokens = AccessTokenSource::from_env();
    let connect: Box<ConnectCompute> = Box::new(move |config: &FunctionConfig| {
        GceComputeClient::new(config, tokens.clone())
            .map(|client| Box::new(client) as Box<dyn ComputeInstances>)
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(Arc::new(AppState { config, connect }));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(component = "push_endpoint", event = "listening", %addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!(component = "push_endpoint", event = "shutdown_requested");
}
