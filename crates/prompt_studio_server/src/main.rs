use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use prompt_studio::AppConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "prompt-studio-server")]
#[command(about = "Prompt Studio HTTP Server")]
#[command(version)]
struct Cli {
    /// Server port
    #[arg(long, env = "APP_PORT", default_value = "8080")]
    port: u16,

    /// Directory for the entity snapshot and uploaded files
    /// (overrides PROMPT_STUDIO_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .with_file(false),
        )
        .init();

    let mut config = AppConfig::from_env();
    if let Some(data_dir) = cli.data_dir {
        config = config.with_data_dir(data_dir);
    }

    tracing::info!(
        port = cli.port,
        data_dir = %config.data_dir.display(),
        prompt_service = %config.prompt_service_url,
        "Starting prompt studio server"
    );

    if let Err(e) = prompt_studio::server::run(config, cli.port).await {
        tracing::error!("Failed to run web service: {}", e);
        std::process::exit(1);
    }
}
