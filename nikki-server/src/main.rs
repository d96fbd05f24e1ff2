use clap::Parser;
use nikki_core::protocol::DiaryRequest;
use nikki_core::NikkiConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use nikki_server::context::DiaryContext;
use nikki_server::router::handle_request;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "nikki.toml")]
    config: String,

    /// Read the diary once and exit.
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match NikkiConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let ctx = match DiaryContext::from_config(&config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Failed to set up document store: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        store = ctx.store_name(),
        document = %ctx.document_key,
        annotator = ctx.annotator.name(),
        "Diary context ready"
    );

    if args.health {
        let response = handle_request(DiaryRequest::Health, &ctx).await;
        match response.data {
            Some(data) if response.status == "ok" => {
                println!("✅ Store reachable: {}", data["store"]);
                println!("✅ Entries: {}, check-ins: {}", data["entries"], data["checkins"]);
            }
            _ => {
                println!(
                    "❌ Diary health check failed: {}",
                    response.error.unwrap_or_default()
                );
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    nikki_server::http::start_http_server(ctx, config, tx.subscribe()).await?;

    Ok(())
}
