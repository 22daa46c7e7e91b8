use dispatch_module::{run_service, BoxError, DispatchConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = DispatchConfig::from_env()?;
    run_service(config, async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl-C"),
            Err(err) => {
                warn!("failed to listen for Ctrl-C: {}", err);
                std::future::pending::<()>().await;
            }
        }
    })
    .await?;
    info!("neon-dispatch stopped");
    Ok(())
}
