//! CypherNova CLI and REST API entry point.
//!
//! Binary name: `cyphernova`
//!
//! Parses CLI arguments, loads `.env` and `config.toml`, builds the session
//! factory for the selected backend, then runs the terminal chat or starts
//! the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cyphernova_infra::config::{config_path, load_config, load_dotenv, resolve_data_dir};
use cyphernova_infra::llm::build_session_factory;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need configuration
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "cyphernova", &mut std::io::stdout());
        return Ok(());
    }

    let filter = cyphernova_observe::verbosity_filter(cli.verbose, cli.quiet);
    if let Err(e) = cyphernova_observe::init_tracing(filter, cli.otel) {
        eprintln!("Warning: tracing setup failed: {e}");
    }

    load_dotenv();
    let data_dir = resolve_data_dir();
    let config_file = cli.config.clone().unwrap_or_else(|| config_path(&data_dir));
    let mut config = load_config(&config_file).await;

    let result = run(cli, &mut config, &data_dir, &config_file).await;
    cyphernova_observe::shutdown_tracing();
    result
}

async fn run(
    cli: Cli,
    config: &mut cyphernova_types::config::ChatConfig,
    data_dir: &std::path::Path,
    config_file: &std::path::Path,
) -> anyhow::Result<()> {
    match cli.command {
        Commands::Chat {
            overrides,
            no_stream,
        } => {
            overrides.apply(config);
            let factory = build_session_factory(config)?;
            cli::chat::loop_runner::run_chat_loop(&factory, !no_stream).await?;
        }

        Commands::Serve {
            overrides,
            port,
            host,
        } => {
            overrides.apply(config);
            let factory = build_session_factory(config)?;
            let state = AppState::new(factory);

            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} CypherNova API listening on {}",
                console::style("🌸").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!(
                "  {}",
                console::style(format!("Backend: {}", config.backend)).dim()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            println!("\n  Server stopped.");
        }

        Commands::Models { backend } => {
            cli::models::list_models(config, backend, cli.json)?;
        }

        Commands::Config => {
            cli::config::show_config(config, data_dir, config_file, cli.json)?;
        }

        Commands::Completions { .. } => unreachable!("handled in main"),
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
