use anyhow::{Context as _, Result};

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use qr_menu::{
    config::{Cli, Command, Config},
    frontend_url::FrontendUrl,
    http::{AppState, build_router},
    qr,
    tables::TableRegistry,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cmd = cli.command.clone().unwrap_or(Command::Run);

    match cmd {
        Command::Run => run_server(cli.config).await,
        Command::Configure(args) => configure_tables(&cli.config, args.tables),
        Command::ExportQr(args) => export_qr_codes(&cli.config, &args.out).await,
    }
}

fn configure_tables(config: &Config, total_tables: i64) -> Result<()> {
    let mut registry = TableRegistry::open(&config.data_dir)?;
    let tables = registry.configure(total_tables)?;
    println!("{}", serde_json::to_string_pretty(&tables)?);
    Ok(())
}

async fn export_qr_codes(config: &Config, out: &std::path::Path) -> Result<()> {
    let registry = TableRegistry::open(&config.data_dir)?;
    let tables = registry.list_all()?;
    let frontend_url = FrontendUrl::new(config.frontend_url.clone(), config.frontend_port)
        .resolve()
        .await;

    let zip = qr::render_all(&tables, &frontend_url)?;
    std::fs::write(out, zip).with_context(|| format!("write {}", out.display()))?;
    info!(
        tables = tables.len(),
        frontend_url = %frontend_url,
        out = %out.display(),
        "qr codes exported"
    );
    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    let state = AppState::open(
        &config.data_dir,
        FrontendUrl::new(config.frontend_url.clone(), config.frontend_port),
    )?;

    let app = build_router(state, &config.cors_origins).layer(TraceLayer::new_for_http());

    info!(
        bind = %config.bind,
        data_dir = %config.data_dir.display(),
        cors_origins = ?config.cors_origins,
        "starting qr-menu"
    );
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
