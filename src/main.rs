use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fhir_gateway::config::Args;
use fhir_gateway::rate_limit::sweeper;
use fhir_gateway::state::AppState;
use fhir_gateway::{PROXY_ROUTE, app};

// this is main async function with tokio
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fhir_gateway=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // parse cli arguments
    let args = Args::parse();

    let state = Arc::new(AppState::from_args(&args)?);

    // spawn the background sweeper
    tokio::spawn(sweeper(Arc::clone(&state.rate_limiter), args.sweep_interval()));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(address = %addr, route = PROXY_ROUTE, "Gateway listening");
    tracing::info!(
        mode = ?args.mode,
        allowed_domains = %args.allowed_domains,
        resolve_hosts = args.resolve_hosts,
        "Network policy"
    );
    tracing::info!(
        rate_limit = args.rate_limit,
        rate_window_secs = args.rate_window,
        timeout_secs = args.timeout,
        max_response_bytes = args.max_response_bytes,
        "Limits"
    );

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
