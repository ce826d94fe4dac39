use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use dialect_lsp::{
    cli::{check, Cli, CliCommand},
    config::Settings,
    server::DialectLanguageServer,
};
use tokio::io::{stdin, stdout};
use tower_lsp::{lsp_types::ClientCapabilities, LspService, Server};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(CliCommand::Serve) {
        CliCommand::Serve => {
            info!(version = env!("CARGO_PKG_VERSION"), "starting language server");
            let (service, socket) = LspService::new(DialectLanguageServer::new);
            Server::new(stdin(), stdout(), socket).serve(service).await;
            ExitCode::SUCCESS
        }
        CliCommand::Check { paths, root } => match run_check(paths, root).await {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(err) => {
                error!("{err:#}");
                eprintln!("error: {err:#}");
                ExitCode::from(2)
            }
        },
    }
}

/// `Ok(false)` when an error was reported.
async fn run_check(
    paths: Vec<std::path::PathBuf>,
    root: Option<std::path::PathBuf>,
) -> anyhow::Result<bool> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir().context("reading the current directory")?,
    };
    let settings = Settings::new(&root, &ClientCapabilities::default())?;

    let report = tokio::task::spawn_blocking(move || {
        check(&paths, settings, &mut std::io::stdout().lock())
    })
    .await??;

    info!(
        files = report.files,
        errors = report.errors,
        warnings = report.warnings,
        "check finished"
    );
    Ok(!report.failed())
}
