use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_HISTORY_ENTRIES: usize = 100;

#[derive(Debug)]
pub enum HistoryError {
    Io(std::io::Error),
    Corrupt(String),
}

impl Display for HistoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io error: {error}"),
            Self::Corrupt(error) => write!(f, "history file corrupt: {error}"),
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<std::io::Error> for HistoryError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// A previously accepted input and its position in the stored list. Index -1
/// means "not from history": the caller's in-progress input echoed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub index: i64,
    pub value: String,
}

/// Key-scoped accepted-input history, most-recent-first, persisted as one
/// JSON object mapping history-keys to string lists. History is an optional
/// capability: built without a key it stores and yields nothing.
pub struct History {
    store: Option<Store>,
}

struct Store {
    path: PathBuf,
    key: String,
    all: BTreeMap<String, Vec<String>>,
    entries: Vec<String>,
}

impl History {
    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Opens the history file for the given key, creating an empty file on
    /// first use. A present-but-unreadable file is a fatal error rather than
    /// silently discarded history.
    pub fn open(path: &Path, key: Option<&str>) -> Result<Self, HistoryError> {
        let key = match key {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Ok(Self::disabled()),
        };

        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, "{}")?;
        }

        let raw = fs::read_to_string(path)?;
        let all: BTreeMap<String, Vec<String>> =
            serde_json::from_str(&raw).map_err(|error| HistoryError::Corrupt(error.to_string()))?;
        let entries = all.get(&key).cloned().unwrap_or_default();

        Ok(Self {
            store: Some(Store {
                path: path.to_path_buf(),
                key,
                all,
                entries,
            }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Steps toward newer entries (lower indices) from `index`, matching by
    /// prefix. Falls back to index -1 with the in-progress input once the
    /// newest match is passed.
    pub fn next(&self, index: i64, input: &str) -> Option<HistoryEntry> {
        let store = self.store.as_ref()?;
        if index < 0 {
            return None;
        }

        let bound = (index as usize).min(store.entries.len());
        for (position, value) in store.entries[..bound].iter().enumerate().rev() {
            if value.starts_with(input) {
                return Some(HistoryEntry {
                    index: position as i64,
                    value: value.clone(),
                });
            }
        }
        Some(HistoryEntry {
            index: -1,
            value: input.to_string(),
        })
    }

    /// Steps toward older entries (higher indices) from `index`, matching by
    /// prefix. Yields nothing once the oldest match is passed.
    pub fn prev(&self, index: i64, input: &str) -> Option<HistoryEntry> {
        let store = self.store.as_ref()?;
        let start = (index + 1).max(0) as usize;
        if start >= store.entries.len() {
            return None;
        }

        store.entries[start..]
            .iter()
            .enumerate()
            .find(|(_, value)| value.starts_with(input))
            .map(|(offset, value)| HistoryEntry {
                index: (start + offset) as i64,
                value: value.clone(),
            })
    }

    /// Records an accepted input at the front, de-duplicating and trimming to
    /// the cap, then persists. Empty values are never stored.
    pub fn add(&mut self, value: &str) -> Result<(), HistoryError> {
        let Some(store) = self.store.as_mut() else {
            return Ok(());
        };
        if value.is_empty() {
            return Ok(());
        }

        store.entries.retain(|existing| existing != value);
        store.entries.insert(0, value.to_string());
        store.entries.truncate(MAX_HISTORY_ENTRIES);
        store
            .all
            .insert(store.key.clone(), store.entries.clone());
        store.dump()
    }
}

impl Store {
    fn dump(&self) -> Result<(), HistoryError> {
        // BTreeMap keys serialize sorted; pretty-printing keeps the file
        // diffable across runs.
        let raw = serde_json::to_string_pretty(&self.all)
            .map_err(|error| HistoryError::Corrupt(error.to_string()))?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::{History, HistoryError, MAX_HISTORY_ENTRIES};

    fn temp_history_path(tag: &str) -> std::path::PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be valid")
            .as_nanos();
        std::env::temp_dir().join(format!("quickpick-history-{tag}-{unique}.json"))
    }

    #[test]
    fn disabled_history_yields_nothing() {
        let mut history = History::disabled();
        assert!(!history.is_enabled());
        history.add("x").expect("add should be a no-op");
        assert_eq!(history.next(0, ""), None);
        assert_eq!(history.prev(-1, ""), None);
    }

    #[test]
    fn add_deduplicates_and_keeps_most_recent_first() {
        let path = temp_history_path("dedupe");
        let mut history = History::open(&path, Some("k")).expect("history should open");
        assert!(history.is_enabled());

        history.add("a").expect("add a");
        history.add("b").expect("add b");
        history.add("a").expect("re-add a");

        assert_eq!(history.prev(-1, "").map(|e| e.value), Some("a".to_string()));
        assert_eq!(history.prev(0, "").map(|e| e.value), Some("b".to_string()));
        assert_eq!(history.prev(1, ""), None);

        std::fs::remove_file(path).expect("temp history should be removed");
    }

    #[test]
    fn add_caps_entries_evicting_oldest_first() {
        let path = temp_history_path("cap");
        let mut history = History::open(&path, Some("k")).expect("history should open");

        for n in 0..MAX_HISTORY_ENTRIES + 5 {
            history.add(&format!("entry-{n}")).expect("add");
        }

        let newest = history.prev(-1, "").expect("newest entry");
        assert_eq!(newest.value, format!("entry-{}", MAX_HISTORY_ENTRIES + 4));
        // entry-0 through entry-4 were evicted.
        assert_eq!(
            history
                .prev((MAX_HISTORY_ENTRIES - 1) as i64, "")
                .map(|e| e.value),
            None
        );

        std::fs::remove_file(path).expect("temp history should be removed");
    }

    #[test]
    fn next_falls_back_to_echoing_the_input() {
        let path = temp_history_path("next");
        let mut history = History::open(&path, Some("k")).expect("history should open");
        history.add("older").expect("add");
        history.add("newer").expect("add");

        let oldest = history.prev(0, "").expect("step to oldest");
        assert_eq!(oldest.value, "older");

        let back = history.next(oldest.index, "").expect("step back");
        assert_eq!(back.value, "newer");

        let echo = history.next(back.index, "typed").expect("past the newest");
        assert_eq!(echo.index, -1);
        assert_eq!(echo.value, "typed");

        std::fs::remove_file(path).expect("temp history should be removed");
    }

    #[test]
    fn prefix_narrows_navigation() {
        let path = temp_history_path("prefix");
        let mut history = History::open(&path, Some("k")).expect("history should open");
        history.add("make check").expect("add");
        history.add("git log").expect("add");
        history.add("make test").expect("add");

        assert_eq!(
            history.prev(-1, "make").map(|e| e.value),
            Some("make test".to_string())
        );
        assert_eq!(
            history.prev(0, "make").map(|e| e.value),
            Some("make check".to_string())
        );

        std::fs::remove_file(path).expect("temp history should be removed");
    }

    #[test]
    fn entries_survive_reopen_per_key() {
        let path = temp_history_path("reopen");
        let mut history = History::open(&path, Some("files")).expect("history should open");
        history.add("src/lib.rs").expect("add");

        let other = History::open(&path, Some("dirs")).expect("other key should open");
        assert_eq!(other.prev(-1, ""), None);

        let reopened = History::open(&path, Some("files")).expect("reopen");
        assert_eq!(
            reopened.prev(-1, "").map(|e| e.value),
            Some("src/lib.rs".to_string())
        );

        std::fs::remove_file(path).expect("temp history should be removed");
    }

    #[test]
    fn corrupt_history_file_is_a_fatal_error() {
        let path = temp_history_path("corrupt");
        std::fs::write(&path, "not json at all").expect("write corrupt file");

        match History::open(&path, Some("k")) {
            Err(HistoryError::Corrupt(_)) => {}
            Err(other) => panic!("expected corrupt history error, got {other}"),
            Ok(_) => panic!("corrupt history file should not open"),
        }

        std::fs::remove_file(path).expect("temp history should be removed");
    }
}
