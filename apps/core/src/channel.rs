use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::logging::Logger;
use crate::protocol::{Request, Response};

const STOP_GRACE: Duration = Duration::from_secs(2);
const STOP_POLL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub enum ChannelError {
    Io(std::io::Error),
    Spawn(String),
    Connect(String),
}

impl Display for ChannelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io error: {error}"),
            Self::Spawn(error) => write!(f, "spawn error: {error}"),
            Self::Connect(error) => write!(f, "connect error: {error}"),
        }
    }
}

impl std::error::Error for ChannelError {}

impl From<std::io::Error> for ChannelError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Events delivered to the orchestrator's loop. The channel never reorders:
/// responses arrive in the order the worker wrote them.
#[derive(Debug)]
pub enum ChannelEvent {
    /// The worker consumed the corpus and is accepting requests; queued
    /// requests have been flushed.
    Ready,
    Response(Response),
    /// The worker went away without being asked to.
    Terminated(Option<i32>),
    /// The channel itself failed (spawn or connect budget exhausted).
    Failed(String),
}

/// How the request/response stream reaches the worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The worker's stdin/stdout pipes.
    Pipes,
    /// A loopback TCP connection; the worker listens on a port this side
    /// picked, and the connect retries while the child starts up.
    Socket,
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// The worker executable; spawned with `--worker`.
    pub program: PathBuf,
    pub transport: TransportKind,
    pub limit: usize,
    pub retry_attempts: usize,
    pub retry_delay: Duration,
}

impl ChannelConfig {
    pub fn new(program: PathBuf, transport: TransportKind, limit: usize) -> Self {
        Self {
            program,
            transport,
            limit,
            retry_attempts: 20,
            retry_delay: Duration::from_millis(25),
        }
    }
}

struct Inner {
    writer: Option<Box<dyn Write + Send>>,
    child: Option<Child>,
    pending: VecDeque<Request>,
    ready: bool,
    stopping: bool,
    generation: u64,
}

/// One worker process behind a message-passing boundary. All filtering I/O,
/// including the connect-retry loop, happens on the channel's own thread so
/// the interactive loop never blocks.
pub struct FilterChannel {
    config: ChannelConfig,
    events: Sender<ChannelEvent>,
    inner: Arc<Mutex<Inner>>,
    logger: Logger,
}

impl FilterChannel {
    pub fn new(config: ChannelConfig, events: Sender<ChannelEvent>, logger: Logger) -> Self {
        Self {
            config,
            events,
            inner: Arc::new(Mutex::new(Inner {
                writer: None,
                child: None,
                pending: VecDeque::new(),
                ready: false,
                stopping: false,
                generation: 0,
            })),
            logger,
        }
    }

    /// Spawns the worker and streams it the corpus, asynchronously. Emits
    /// `Ready` once requests flow, `Failed` if the worker cannot be reached.
    pub fn start(&self, corpus: Vec<String>) {
        let config = self.config.clone();
        let events = self.events.clone();
        let inner = self.inner.clone();
        let logger = self.logger.clone();

        let generation = {
            let mut locked = lock(&inner);
            locked.generation += 1;
            locked.generation
        };

        thread::spawn(move || {
            if let Err(error) = run_session(&config, &events, &inner, &logger, generation, corpus)
            {
                logger.error(&format!("worker channel failed: {error}"));
                let _ = events.send(ChannelEvent::Failed(error.to_string()));
            }
        });
    }

    /// Sends a request, or queues it if the worker is still starting up.
    /// Queued requests flush in receipt order when the worker becomes ready.
    pub fn request(&self, request: Request) -> Result<(), ChannelError> {
        let mut inner = lock(&self.inner);
        if !inner.ready {
            inner.pending.push_back(request);
            return Ok(());
        }

        let Some(writer) = inner.writer.as_mut() else {
            inner.pending.push_back(request);
            return Ok(());
        };
        write_request(writer.as_mut(), &request)
    }

    /// Terminates the worker and confirms it is gone before returning, so a
    /// replacement can never share its output stream.
    pub fn stop(&self) -> Result<(), ChannelError> {
        let (writer, child) = {
            let mut inner = lock(&self.inner);
            inner.ready = false;
            inner.stopping = true;
            (inner.writer.take(), inner.child.take())
        };

        // A blank line asks the worker loop to exit on its own.
        if let Some(mut writer) = writer {
            let _ = writer.write_all(b"\n");
            let _ = writer.flush();
        }

        if let Some(mut child) = child {
            let deadline = Instant::now() + STOP_GRACE;
            loop {
                match child.try_wait()? {
                    Some(_) => break,
                    None if Instant::now() >= deadline => {
                        child.kill()?;
                        child.wait()?;
                        break;
                    }
                    None => thread::sleep(STOP_POLL),
                }
            }
        }
        Ok(())
    }

    /// Replaces the worker with a fresh one over a new corpus. Requests
    /// arriving in the meantime queue until the replacement signals ready.
    pub fn refresh(&self, corpus: Vec<String>) -> Result<(), ChannelError> {
        self.stop()?;
        self.start(corpus);
        Ok(())
    }

    /// Process id of the attached worker, if one is alive.
    pub fn worker_id(&self) -> Option<u32> {
        lock(&self.inner).child.as_ref().map(Child::id)
    }
}

impl crate::menu::RequestSink for FilterChannel {
    fn send(&mut self, request: Request) {
        if let Err(error) = self.request(request) {
            self.logger.error(&format!("request dropped: {error}"));
        }
    }
}

fn lock<'a>(inner: &'a Arc<Mutex<Inner>>) -> std::sync::MutexGuard<'a, Inner> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn reap_worker(inner: &Arc<Mutex<Inner>>, generation: u64) {
    let child = {
        let mut locked = lock(inner);
        // A superseding start owns the current child; leave it alone.
        if locked.generation != generation {
            return;
        }
        locked.ready = false;
        locked.writer = None;
        locked.child.take()
    };
    if let Some(mut child) = child {
        let _ = child.kill();
        let _ = child.wait();
    }
}

fn write_request<W: Write + ?Sized>(writer: &mut W, request: &Request) -> Result<(), ChannelError> {
    let mut payload = serde_json::to_string(request)
        .map_err(|error| ChannelError::Spawn(format!("unserializable request: {error}")))?;
    payload.push('\n');
    writer.write_all(payload.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// The channel thread body: spawn, connect, stream the corpus, flush queued
/// requests, then pump responses until the stream closes.
fn run_session(
    config: &ChannelConfig,
    events: &Sender<ChannelEvent>,
    inner: &Arc<Mutex<Inner>>,
    logger: &Logger,
    generation: u64,
    corpus: Vec<String>,
) -> Result<(), ChannelError> {
    let (child, mut writer, mut reader) = open_transport(config)?;

    {
        let mut locked = lock(inner);
        if locked.generation != generation {
            // A newer start superseded this one before it came up.
            return Ok(());
        }
        locked.child = Some(child);
        locked.stopping = false;
    }

    for line in &corpus {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;

    {
        let mut locked = lock(inner);
        if locked.generation != generation {
            return Ok(());
        }
        while let Some(request) = locked.pending.pop_front() {
            write_request(writer.as_mut(), &request)?;
        }
        locked.writer = Some(writer);
        locked.ready = true;
    }
    let _ = events.send(ChannelEvent::Ready);
    logger.info("worker channel ready");

    let mut line = String::new();
    loop {
        line.clear();
        let read = match reader.read_line(&mut line) {
            Ok(read) => read,
            Err(error) => {
                reap_worker(inner, generation);
                return Err(ChannelError::Io(error));
            }
        };
        if read == 0 {
            break;
        }
        let raw = line.trim_end_matches(['\r', '\n']);
        if raw.is_empty() {
            continue;
        }
        let response: Response = match serde_json::from_str(raw) {
            Ok(response) => response,
            Err(error) => {
                // A worker speaking garbage cannot be trusted with further
                // requests; it is killed before the failure is reported.
                reap_worker(inner, generation);
                return Err(ChannelError::Spawn(format!("bad response line: {error}")));
            }
        };
        let _ = events.send(ChannelEvent::Response(response));
    }

    let mut locked = lock(inner);
    if locked.generation != generation || locked.stopping {
        // Expected teardown via stop/refresh.
        return Ok(());
    }
    locked.ready = false;
    locked.writer = None;
    let status = locked
        .child
        .take()
        .and_then(|mut child| child.wait().ok())
        .and_then(|status| status.code());
    drop(locked);

    logger.warn("worker terminated unexpectedly");
    let _ = events.send(ChannelEvent::Terminated(status));
    Ok(())
}

type Endpoints = (Child, Box<dyn Write + Send>, Box<dyn BufRead + Send>);

fn open_transport(config: &ChannelConfig) -> Result<Endpoints, ChannelError> {
    match config.transport {
        TransportKind::Pipes => open_pipes(config),
        TransportKind::Socket => open_socket(config),
    }
}

fn open_pipes(config: &ChannelConfig) -> Result<Endpoints, ChannelError> {
    let mut child = worker_command(config)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|error| ChannelError::Spawn(error.to_string()))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| ChannelError::Spawn("worker stdin unavailable".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ChannelError::Spawn("worker stdout unavailable".to_string()))?;

    Ok((child, Box::new(stdin), Box::new(BufReader::new(stdout))))
}

fn open_socket(config: &ChannelConfig) -> Result<Endpoints, ChannelError> {
    let address = ephemeral_loopback_address()?;
    let child = worker_command(config)
        .arg("--listen")
        .arg(address.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .spawn()
        .map_err(|error| ChannelError::Spawn(error.to_string()))?;

    let stream = connect_with_retry(address, config.retry_attempts, config.retry_delay)?;
    let writer = stream.try_clone()?;
    Ok((child, Box::new(writer), Box::new(BufReader::new(stream))))
}

fn worker_command(config: &ChannelConfig) -> Command {
    let mut command = Command::new(&config.program);
    command.arg("--worker");
    if config.limit > 0 {
        command.arg("--limit").arg(config.limit.to_string());
    }
    command
}

/// Picks a free loopback port for the worker to listen on. The port is only
/// reserved until the listener drops; if something else grabs it before the
/// child binds, the child exits and the connect budget surfaces the failure.
fn ephemeral_loopback_address() -> Result<SocketAddr, ChannelError> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?)
}

/// Connects to a worker that may not be listening yet. Only
/// connection-refused is retried; the budget is bounded and the delay fixed.
pub fn connect_with_retry(
    address: SocketAddr,
    attempts: usize,
    delay: Duration,
) -> Result<TcpStream, ChannelError> {
    let mut last_error = None;
    for attempt in 0..attempts.max(1) {
        match TcpStream::connect(address) {
            Ok(stream) => return Ok(stream),
            Err(error) if error.kind() == std::io::ErrorKind::ConnectionRefused => {
                last_error = Some(error);
                if attempt + 1 < attempts.max(1) {
                    thread::sleep(delay);
                }
            }
            Err(error) => return Err(ChannelError::Io(error)),
        }
    }
    Err(ChannelError::Connect(format!(
        "worker not listening on {address} after {attempts} attempts: {}",
        last_error
            .map(|error| error.to_string())
            .unwrap_or_else(|| "connection refused".to_string())
    )))
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use super::connect_with_retry;

    #[test]
    fn retry_succeeds_once_the_port_starts_listening() {
        let probe = TcpListener::bind("127.0.0.1:0").expect("probe bind");
        let address = probe.local_addr().expect("probe addr");
        drop(probe);

        let opener = thread::spawn(move || {
            thread::sleep(Duration::from_millis(60));
            TcpListener::bind(address).expect("late bind")
        });

        let stream = connect_with_retry(address, 30, Duration::from_millis(10));
        assert!(stream.is_ok());
        drop(stream);
        opener.join().expect("listener thread");
    }

    #[test]
    fn retry_budget_exhaustion_is_an_error() {
        let probe = TcpListener::bind("127.0.0.1:0").expect("probe bind");
        let address = probe.local_addr().expect("probe addr");
        drop(probe);

        let result = connect_with_retry(address, 3, Duration::from_millis(5));
        assert!(result.is_err());
    }
}
