use std::io::{BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;

use crate::config::{self, ConfigError};
use crate::logging::Logger;
use crate::protocol::{Request, Response};
use crate::worker::{Worker, WorkerError};

#[derive(Debug)]
pub enum RuntimeError {
    Config(ConfigError),
    Worker(WorkerError),
    Io(std::io::Error),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(error) => write!(f, "config error: {error}"),
            Self::Worker(error) => write!(f, "worker error: {error}"),
            Self::Io(error) => write!(f, "io error: {error}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<ConfigError> for RuntimeError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<WorkerError> for RuntimeError {
    fn from(value: WorkerError) -> Self {
        Self::Worker(value)
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliMode {
    /// Serve filter requests over stdio, or over one TCP connection when an
    /// address to listen on is given.
    Worker { listen: Option<String> },
    /// Filter the corpus once and print the ranked values.
    Filter { query: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub mode: CliMode,
    pub config_path: Option<PathBuf>,
    pub limit: Option<usize>,
}

pub fn parse_cli_args(args: &[String]) -> Result<CliOptions, String> {
    let mut mode: Option<CliMode> = None;
    let mut listen: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut limit: Option<usize> = None;

    let mut rest = args.iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--worker" => {
                set_mode(&mut mode, CliMode::Worker { listen: None })?;
            }
            "--filter" => {
                let query = rest
                    .next()
                    .ok_or_else(|| "--filter requires a query".to_string())?;
                set_mode(
                    &mut mode,
                    CliMode::Filter {
                        query: query.clone(),
                    },
                )?;
            }
            "--listen" => {
                let addr = rest
                    .next()
                    .ok_or_else(|| "--listen requires an address".to_string())?;
                listen = Some(addr.clone());
            }
            "--config" => {
                let path = rest
                    .next()
                    .ok_or_else(|| "--config requires a path".to_string())?;
                config_path = Some(PathBuf::from(path));
            }
            "--limit" => {
                let raw = rest
                    .next()
                    .ok_or_else(|| "--limit requires a number".to_string())?;
                limit = Some(
                    raw.parse()
                        .map_err(|_| format!("invalid --limit value: {raw}"))?,
                );
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    let mode = match (mode, listen) {
        (Some(CliMode::Worker { .. }), listen) => CliMode::Worker { listen },
        (Some(mode), None) => mode,
        (Some(_), Some(_)) => return Err("--listen only applies to --worker".to_string()),
        (None, _) => return Err("one of --worker or --filter is required".to_string()),
    };

    Ok(CliOptions {
        mode,
        config_path,
        limit,
    })
}

fn set_mode(slot: &mut Option<CliMode>, mode: CliMode) -> Result<(), String> {
    if slot.is_some() {
        return Err("--worker and --filter are mutually exclusive".to_string());
    }
    *slot = Some(mode);
    Ok(())
}

pub fn run_with_options(options: CliOptions) -> Result<(), RuntimeError> {
    let config = config::load(options.config_path.as_deref())?;
    let limit = options.limit.unwrap_or(config.limit);
    let logger = match &config.log_path {
        Some(path) => Logger::to_file(path)?,
        None => Logger::null(),
    };

    match options.mode {
        CliMode::Worker { listen: None } => run_worker_stdio(limit, &logger),
        CliMode::Worker {
            listen: Some(addr),
        } => run_worker_socket(&addr, limit, &logger),
        CliMode::Filter { query } => run_filter_once(&query, limit),
    }
}

/// Corpus on stdin up to a blank line, then request lines; responses go to
/// stdout.
fn run_worker_stdio(limit: usize, logger: &Logger) -> Result<(), RuntimeError> {
    let stdin = std::io::stdin();
    let mut reader = stdin.lock();
    let corpus = Worker::read_corpus(&mut reader)?;
    logger.info(&format!("worker serving {} entries over stdio", corpus.len()));

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();
    Worker::new(corpus, limit).run(&mut reader, &mut writer, logger)?;
    Ok(())
}

/// Listens on `addr` and serves exactly one connection, corpus first.
fn run_worker_socket(addr: &str, limit: usize, logger: &Logger) -> Result<(), RuntimeError> {
    let listener = TcpListener::bind(addr)?;
    let (stream, peer) = listener.accept()?;
    logger.info(&format!("worker serving a connection from {peer}"));

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    let corpus = Worker::read_corpus(&mut reader)?;
    Worker::new(corpus, limit).run(&mut reader, &mut writer, logger)?;
    Ok(())
}

/// One-shot filtering: corpus on stdin, ranked values on stdout.
fn run_filter_once(query: &str, limit: usize) -> Result<(), RuntimeError> {
    let stdin = std::io::stdin();
    let mut reader = stdin.lock();
    let corpus = Worker::read_corpus(&mut reader)?;

    let response = Worker::new(corpus, limit).handle(Request::Filter {
        seq: 0,
        input: query.to_string(),
    });

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();
    if let Response::Filter { items, .. } = response {
        for item in items {
            writeln!(writer, "{}", item.value)?;
        }
    }
    writer.flush()?;
    Ok(())
}
