use clap::Parser;
use log::{error, info, warn};
use std::{path::PathBuf, process::ExitCode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use downwatch::{
    config::{self, ConfigSource, FileSource, Overrides, Settings, SmtpSettings},
    monitor::{Events, Monitor},
    notify::{LogMailer, Mailer, SmtpMailer},
    probe::HttpProber,
    server::{self, AppState},
    signals,
};

/// Watches websites and sends an email when one goes down or comes back up.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "DOWNWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Log debug messages
    #[arg(short, long, env = "DOWNWATCH_DEBUG")]
    debug: bool,
    /// Check the configuration and exit
    #[arg(short = 't', long)]
    check: bool,
    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(level));

    let path = cli.config.unwrap_or_else(config::default_config_path);
    let source = FileSource::new(path, cli.overrides);
    let settings = match source.load() {
        Ok(settings) => settings,
        Err(e) => {
            error!(
                "Failed to load configuration from {}: {e}",
                source.path().display()
            );
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        println!("Configuration syntax OK");
        return ExitCode::SUCCESS;
    }

    let prober = match HttpProber::new(settings.timeout) {
        Ok(prober) => prober,
        Err(e) => {
            error!("Failed to build HTTP client: {e}");
            return ExitCode::FAILURE;
        }
    };

    match SmtpSettings::from_env() {
        Ok(Some(smtp)) => match SmtpMailer::new(&smtp) {
            Ok(mailer) => {
                info!("SMTP is set, alerts will be sent to {}", smtp.to);
                run(settings, prober, mailer, source).await
            }
            Err(e) => {
                error!("Invalid SMTP configuration: {e}");
                ExitCode::FAILURE
            }
        },
        Ok(None) => {
            warn!("SMTP is not set, alerts will only be logged");
            run(settings, prober, LogMailer, source).await
        }
        Err(e) => {
            error!("Invalid SMTP configuration: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run<M: Mailer>(
    settings: Settings,
    prober: HttpProber,
    mailer: M,
    source: FileSource,
) -> ExitCode {
    let port = settings.port;
    let monitor = Monitor::new(settings, prober, mailer, source);

    let shutdown = CancellationToken::new();
    let (subscribers, subscribers_rx) = mpsc::channel(1);
    let (reloads, reloads_rx) = mpsc::channel(1);
    signals::spawn(shutdown.clone(), reloads);

    let state = AppState {
        store: monitor.store(),
        subscribers,
    };
    tokio::spawn(async move {
        if let Err(e) = server::serve(port, state).await {
            error!("Could not start server on port {port}: {e}. Skipping...");
        }
    });

    monitor
        .run(Events {
            subscribers: subscribers_rx,
            reloads: reloads_rx,
            shutdown,
        })
        .await;

    ExitCode::SUCCESS
}
