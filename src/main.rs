use std::process::ExitCode;
use std::sync::Arc;

use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use trackdeck::adapters::{InMemoryCache, ReqwestHttpClient};
use trackdeck::cli::{parse_args, progress_line, version_line, CliCommand, DownloadArgs, USAGE};
use trackdeck::config::TransferConfig;
use trackdeck::traits::Observer;
use trackdeck::transfer::{SessionRegistry, TransferState, TransferStatus};

fn main() -> Result<ExitCode> {
    let args = match parse_args(std::env::args()) {
        Ok(CliCommand::Version) => {
            println!("{}", version_line());
            return Ok(ExitCode::SUCCESS);
        }
        Ok(CliCommand::Help) => {
            println!("{}", USAGE);
            return Ok(ExitCode::SUCCESS);
        }
        Ok(CliCommand::Download(args)) => args,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            return Ok(ExitCode::from(2));
        }
    };

    color_eyre::install()?;

    // Logs go to stderr so progress output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trackdeck=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(follow_download(args))
}

/// Follow one transfer until it ends, times out or is interrupted.
async fn follow_download(args: DownloadArgs) -> Result<ExitCode> {
    let mut config = TransferConfig::from_env();
    if let Some(api) = &args.api {
        config = config.with_base_url(api);
    }

    let registry = SessionRegistry::new(
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(InMemoryCache::new()),
        config,
    );

    let request = args.to_request();
    let printer: Observer = Arc::new(|state: &TransferState| println!("{}", progress_line(state)));
    let _subscription = registry.subscribe(&request.identity, printer);

    let handle = registry.begin(request);

    let finished = async {
        match args.timeout {
            Some(limit) => tokio::time::timeout(limit, handle.finished()).await.is_ok(),
            None => {
                handle.finished().await;
                true
            }
        }
    };

    tokio::select! {
        in_time = finished => {
            if !in_time {
                tracing::warn!("Timed out waiting for {}", handle.identity());
                handle.cancel();
                handle.finished().await;
                eprintln!("timed out");
                return Ok(ExitCode::FAILURE);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            registry.cancel_all();
            handle.finished().await;
            eprintln!("cancelled");
            return Ok(ExitCode::from(130));
        }
    }

    match handle.state() {
        Some(state) if state.status == TransferStatus::Completed => Ok(ExitCode::SUCCESS),
        _ => Ok(ExitCode::FAILURE),
    }
}
