use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mdsite_lsp::server::Server;

/// Language server for wikilinked Markdown sites, speaking LSP over stdio.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Log filter used when MDSITE_LSP_LOG is unset, e.g. `debug` or `mdsite_lsp=trace`
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("MDSITE_LSP_LOG")
                .unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting mdsite-lsp");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            on_signal.cancel();
        }
    });

    Server::run(tokio::io::stdin(), tokio::io::stdout(), cancel).await?;

    tracing::info!("stopped");
    Ok(())
}
