//! `logship` command-line entry point.

use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use log::{error, info};
use signal_hook::consts::{SIGINT, SIGTERM};

use logship::{
    ConfigError, FileConfig, Session, SessionBuilder, SessionOutcome, ShippingSession, StopToken,
    config::write_sample_config,
};

/// Tail log files and ship every line to a remote collector.
#[derive(Parser, Debug)]
#[command(name = "logship")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// INI configuration file; command-line flags take precedence over it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Collector host name or address
    #[arg(long)]
    host: Option<String>,

    /// Collector TCP port
    #[arg(long)]
    port: Option<u16>,

    /// Shared password; only its SHA-256 digest is sent
    #[arg(long)]
    password: Option<String>,

    /// Comma-separated list of files to tail
    #[arg(long, value_delimiter = ',', value_name = "PATHS")]
    log_files: Option<Vec<PathBuf>>,

    /// Seconds between file polls
    #[arg(long, value_name = "SECS")]
    poll_interval: Option<f64>,

    /// Lines of existing content to ship from each file at start-up
    #[arg(long, value_name = "N")]
    tail_lines: Option<usize>,

    /// Text encoding of the tailed files
    #[arg(long)]
    encoding: Option<String>,

    /// Upgrade the connection to TLS
    #[arg(long)]
    ssl: bool,

    /// Write a sample configuration file to PATH and exit
    #[arg(long, value_name = "PATH")]
    create_config: Option<PathBuf>,
}

impl Args {
    /// Merge defaults, the optional config file, and command-line overrides.
    fn session(&self) -> Result<Session, ConfigError> {
        let mut builder = match &self.config {
            Some(path) => SessionBuilder::from_file(&FileConfig::load(path)?),
            None => SessionBuilder::new(),
        };
        if let Some(host) = &self.host {
            builder = builder.with_host(host.as_str());
        }
        if let Some(port) = self.port {
            builder = builder.with_port(port);
        }
        if let Some(password) = &self.password {
            builder = builder.with_password(password.as_str());
        }
        if let Some(files) = &self.log_files {
            builder = builder.with_log_files(files.iter().cloned());
        }
        if let Some(secs) = self.poll_interval {
            let interval = Duration::try_from_secs_f64(secs)
                .map_err(|_| ConfigError::Invalid(format!("invalid poll interval {secs}")))?;
            builder = builder.with_poll_interval(interval);
        }
        if let Some(lines) = self.tail_lines {
            builder = builder.with_tail_lines(lines);
        }
        if let Some(encoding) = &self.encoding {
            builder = builder.with_encoding(encoding.as_str());
        }
        if self.ssl {
            builder = builder.with_tls(true);
        }
        builder.build()
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &args.create_config {
        return match write_sample_config(path) {
            Ok(()) => {
                info!("logship: wrote sample configuration to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("logship: {err}");
                ExitCode::from(1)
            }
        };
    }

    let session = match args.session() {
        Ok(session) => session,
        Err(err) => {
            error!("logship: {err}");
            return ExitCode::from(1);
        }
    };

    let stop = StopToken::new();
    for signal in [SIGINT, SIGTERM] {
        if let Err(err) = signal_hook::flag::register(signal, stop.flag()) {
            error!("logship: cannot install handler for signal {signal}: {err}");
            return ExitCode::from(1);
        }
    }

    match ShippingSession::new(session).with_stop_token(stop).run() {
        Ok(SessionOutcome::Stopped) => ExitCode::SUCCESS,
        Ok(SessionOutcome::GaveUp { .. }) => ExitCode::from(2),
        Err(err) => {
            error!("logship: cannot load buffered lines: {err}");
            ExitCode::from(1)
        }
    }
}
