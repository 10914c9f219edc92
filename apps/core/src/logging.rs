use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_LOG_BYTES: u64 = 1_000_000;
const MAX_ARCHIVES: usize = 5;

/// A logging capability handed to whatever needs one at construction; there
/// is no process-global logger. Cloning shares the sink.
#[derive(Clone)]
pub struct Logger {
    sink: Sink,
}

#[derive(Clone)]
enum Sink {
    Null,
    Stderr,
    File(Arc<Mutex<File>>),
}

impl Logger {
    pub fn null() -> Self {
        Self { sink: Sink::Null }
    }

    pub fn stderr() -> Self {
        Self { sink: Sink::Stderr }
    }

    /// Appends to `path`, rotating it aside once it grows past the size cap
    /// and pruning all but the newest archives.
    pub fn to_file(path: &Path) -> Result<Self, std::io::Error> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        rotate_if_needed(path)?;

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            sink: Sink::File(Arc::new(Mutex::new(file))),
        })
    }

    pub fn info(&self, message: &str) {
        self.write_line("INFO", message);
    }

    pub fn warn(&self, message: &str) {
        self.write_line("WARN", message);
    }

    pub fn error(&self, message: &str) {
        self.write_line("ERROR", message);
    }

    fn write_line(&self, level: &str, message: &str) {
        let line = format!("[{}] [{level}] {message}\n", now_secs());
        match &self.sink {
            Sink::Null => {}
            Sink::Stderr => {
                let _ = std::io::stderr().write_all(line.as_bytes());
            }
            Sink::File(file) => {
                let Ok(mut file) = file.lock() else {
                    return;
                };
                let _ = file.write_all(line.as_bytes());
                let _ = file.flush();
            }
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn rotate_if_needed(log_path: &Path) -> Result<(), std::io::Error> {
    let meta = match fs::metadata(log_path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    if meta.len() < MAX_LOG_BYTES {
        return Ok(());
    }

    let stem = log_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("quickpick");
    let dir = log_path.parent().map(PathBuf::from).unwrap_or_default();
    let archived = dir.join(format!("{stem}-{}.log", now_secs()));
    fs::rename(log_path, archived)?;
    prune_old_archives(&dir, stem)?;
    Ok(())
}

fn prune_old_archives(dir: &Path, stem: &str) -> Result<(), std::io::Error> {
    let prefix = format!("{stem}-");
    let mut archives = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix) && n.ends_with(".log"))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    archives.sort();
    while archives.len() > MAX_ARCHIVES {
        let oldest = archives.remove(0);
        let _ = fs::remove_file(oldest);
    }
    Ok(())
}
