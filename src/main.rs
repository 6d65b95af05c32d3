use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use dc_lastlogon::config::Cli;
use dc_lastlogon::output::render;
use dc_lastlogon::{ActiveDirectoryClient, LastLogonReport, LastLogonResolver};

fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));

    // Logs go to stderr; stdout carries the results.
    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match &cli.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            let file_name = path
                .file_name()
                .context("--log-file must name a file")?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn run(cli: &Cli, client: &ActiveDirectoryClient) -> Result<LastLogonReport> {
    let resolver = LastLogonResolver::new(client, cli.resolver_config()?)?;

    let report = if cli.reads_stdin() {
        info!("Reading account identifiers from stdin");
        let lines = BufReader::new(tokio::io::stdin()).lines();
        let identifiers = stream::unfold(lines, |mut lines| async move {
            match lines.next_line().await {
                Ok(Some(line)) => Some((line, lines)),
                Ok(None) => None,
                Err(e) => {
                    warn!("Stopped reading stdin: {}", e);
                    None
                }
            }
        })
        .filter(|line| futures::future::ready(!line.trim().is_empty()));
        resolver.resolve_stream(identifiers).await?
    } else {
        resolver.resolve_all(&cli.identifiers).await?
    };

    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _guard = init_logging(&cli)?;
    cli.check_identifiers()?;

    let directory_config = cli.directory_config()?;
    let client = ActiveDirectoryClient::connect(directory_config)
        .await
        .context("could not open the directory session")?;

    let outcome = run(&cli, &client).await;
    client.close().await;

    let report = outcome.map_err(|e| {
        error!("Last logon resolution failed: {:#}", e);
        e
    })?;

    if !report.skipped.is_empty() {
        warn!(
            "{} input(s) skipped: {}",
            report.skipped.len(),
            report
                .skipped
                .iter()
                .map(|s| s.input.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let rendered = render(&report.results, cli.format, cli.extended)?;
    println!("{}", rendered);
    Ok(())
}
