//! GuessInk relay hub binary.

use std::process::ExitCode;

use guessink_server::{HubConfig, HubError, serve};
use tracing::error;

async fn run() -> Result<(), HubError> {
    let config = HubConfig::from_env()?;
    serve(config).await
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guessink_server=info,tower_http=info".into()),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
