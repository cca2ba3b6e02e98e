use dataseal_api::{create_app, AppState};
use dataseal_protocol::ProtocolConfig;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND: &str = "127.0.0.1:3000";

fn load_config() -> Result<ProtocolConfig, dataseal_protocol::ProtocolError> {
    match std::env::var("DATASEAL_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration");
            ProtocolConfig::from_json_file(path)
        }
        Err(_) => Ok(ProtocolConfig::default()),
    }
}

/// `DATASEAL_DEV_FAUCET=1` opens the deposit endpoint on a devnet
fn faucet_enabled() -> bool {
    let enabled = matches!(
        std::env::var("DATASEAL_DEV_FAUCET").as_deref(),
        Ok("1") | Ok("true")
    );
    if enabled {
        warn!("Deposit faucet enabled; anyone can mint funds");
    }
    enabled
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = match load_config().and_then(AppState::new) {
        Ok(state) => state.with_faucet(faucet_enabled()),
        Err(err) => {
            error!(error = %err, "Invalid configuration");
            std::process::exit(1);
        }
    };
    let app = create_app(state);

    let bind = std::env::var("DATASEAL_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(bind = %bind, error = %err, "Failed to bind");
            std::process::exit(1);
        }
    };

    info!(bind = %bind, "DataSeal devnet API listening");
    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "Server error");
    }
}
