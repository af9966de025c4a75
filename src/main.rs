use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use expensedb::{
    catalog::CategoryCatalog,
    config::{CliArgs, Command, Config, LoggingConfig},
    display::{ExpenseTable, SummaryTable},
    http::{self, AppState},
    repository::{open_backend, ExpenseRepository},
    service::{Envelope, ExpenseService},
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    init_logging(&config.logging);

    let backend = open_backend(&config.storage).context("Failed to open storage backend")?;
    let repository = ExpenseRepository::new(backend);

    // The schema must be usable before any call is accepted.
    let bootstrap = repository.clone();
    tokio::task::spawn_blocking(move || bootstrap.bootstrap())
        .await
        .context("Schema bootstrap task panicked")?
        .context("Database initialization failed")?;

    let catalog = CategoryCatalog::new(config.catalog.path());
    tracing::info!(
        backend = repository.backend_name(),
        categories = %config.catalog.path().display(),
        "Storage ready"
    );
    let backend_name = repository.backend_name();
    let service = Arc::new(ExpenseService::new(repository, catalog));

    let code = match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => {
            serve(&config, service).await?;
            ExitCode::SUCCESS
        }
        Command::Init => {
            println!("Schema ready ({})", backend_name);
            ExitCode::SUCCESS
        }
        Command::Add { date, amount, category, subcategory, note } => {
            let args = json!({
                "date": date,
                "amount": amount,
                "category": category,
                "subcategory": subcategory,
                "note": note,
            });
            match service.add_expense(args).await {
                Envelope::Ok(added) => {
                    println!("{} (id {})", added.message, added.id);
                    ExitCode::SUCCESS
                }
                Envelope::Error(e) => report(&e.message),
            }
        }
        Command::List { start_date, end_date } => {
            let args = json!({ "start_date": start_date, "end_date": end_date });
            match service.list_expenses(args).await {
                Envelope::Ok(rows) => {
                    println!("{}", ExpenseTable(&rows));
                    ExitCode::SUCCESS
                }
                Envelope::Error(e) => report(&e.message),
            }
        }
        Command::Summarize { start_date, end_date, category } => {
            let args = json!({ "start_date": start_date, "end_date": end_date, "category": category });
            match service.summarize(args).await {
                Envelope::Ok(rows) => {
                    println!("{}", SummaryTable(&rows));
                    ExitCode::SUCCESS
                }
                Envelope::Error(e) => report(&e.message),
            }
        }
        Command::Categories => {
            println!("{}", service.categories().await);
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}

fn report(message: &str) -> ExitCode {
    eprintln!("{}", message);
    ExitCode::FAILURE
}

/// Logs go to stderr so CLI output on stdout stays clean.
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|e| {
        eprintln!("Warning: invalid log level {:?}: {}", config.level, e);
        EnvFilter::new("info")
    });

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn serve(config: &Config, service: Arc<ExpenseService>) -> anyhow::Result<()> {
    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics recorder unavailable, /metrics will be empty");
            None
        }
    };

    let app = http::router(AppState { service, metrics });
    let addr = config.listen_addr().context("Invalid listen address")?;

    tracing::info!(%addr, "API listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
