use std::fmt::{Display, Formatter};
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::cache::{Cache, FilterResult};
use crate::logging::Logger;
use crate::matcher;
use crate::model::{corpus_from_lines, Entry};
use crate::pattern::parse_patterns;
use crate::protocol::{ItemDto, Request, Response};

#[derive(Debug)]
pub enum WorkerError {
    Io(std::io::Error),
    /// A line that is not a known request. The worker must die loudly rather
    /// than skip input it does not understand.
    Protocol(String),
}

impl Display for WorkerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io error: {error}"),
            Self::Protocol(error) => write!(f, "protocol error: {error}"),
        }
    }
}

impl std::error::Error for WorkerError {}

impl From<std::io::Error> for WorkerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// The filtering engine living on the far side of the worker channel: one
/// corpus, one incremental cache, served over line-framed JSON.
pub struct Worker {
    cache: Cache,
}

impl Worker {
    pub fn new(corpus: Vec<Arc<Entry>>, limit: usize) -> Self {
        let cache = Cache::new(
            corpus,
            Box::new(move |patterns, entries| {
                let matches = matcher::filter(entries, patterns);
                let ranked = matcher::rank(&matches, limit);
                FilterResult { matches, ranked }
            }),
        );
        Self { cache }
    }

    /// Reads corpus lines up to a blank line or EOF, dropping entries that
    /// are blank after trimming.
    pub fn read_corpus(reader: &mut impl BufRead) -> Result<Vec<Arc<Entry>>, WorkerError> {
        let mut lines = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                break;
            }
            lines.push(trimmed.to_string());
        }
        Ok(corpus_from_lines(lines))
    }

    /// Serves requests until EOF or a blank line. Any unparseable line is
    /// fatal.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        reader: &mut R,
        writer: &mut W,
        logger: &Logger,
    ) -> Result<(), WorkerError> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let raw = line.trim_end_matches(['\r', '\n']);
            if raw.is_empty() {
                return Ok(());
            }

            let request: Request = serde_json::from_str(raw).map_err(|error| {
                logger.error(&format!("unparseable request line: {error}"));
                WorkerError::Protocol(format!("bad request {raw:?}: {error}"))
            })?;

            let response = self.handle(request);
            let mut payload =
                serde_json::to_string(&response).map_err(|error| {
                    WorkerError::Protocol(format!("unserializable response: {error}"))
                })?;
            payload.push('\n');
            writer.write_all(payload.as_bytes())?;
            writer.flush()?;
        }
    }

    pub fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::Filter { seq, input } => self.filter(seq, &input),
            Request::Complete { seq, input, sep } => self.complete(seq, &input, sep.as_deref()),
        }
    }

    fn filter(&mut self, seq: u64, input: &str) -> Response {
        let patterns = parse_patterns(input);
        let result = self.cache.filter(&patterns);

        Response::Filter {
            seq,
            total: self.cache.total(),
            filtered: result.matches.len(),
            items: result.ranked.iter().map(ItemDto::from).collect(),
        }
    }

    /// Extends `input` by the longest prefix common to every matched entry
    /// that starts with it. With a separator configured the candidate is cut
    /// just past the separator's last occurrence at or after the end of the
    /// input; a common prefix without one falls back to the input itself.
    fn complete(&mut self, seq: u64, input: &str, sep: Option<&str>) -> Response {
        let patterns = parse_patterns(input);
        let result = self.cache.filter(&patterns);

        let candidates: Vec<&str> = result
            .matches
            .iter()
            .map(|m| m.entry.value.as_str())
            .filter(|value| value.starts_with(input))
            .collect();

        let mut candidate = common_prefix(&candidates);
        if let Some(sep) = sep.filter(|sep| !sep.is_empty()) {
            // No candidates leaves an empty common prefix, shorter than the
            // input itself; `get` keeps that case on the fallback path.
            candidate = match candidate
                .get(input.len()..)
                .and_then(|tail| tail.rfind(sep))
            {
                Some(position) => candidate[..input.len() + position + sep.len()].to_string(),
                None => input.to_string(),
            };
        }
        if candidate.is_empty() {
            candidate = input.to_string();
        }

        Response::Complete { seq, candidate }
    }
}

fn common_prefix(values: &[&str]) -> String {
    let Some(first) = values.first() else {
        return String::new();
    };
    let mut end = first.len();
    for value in &values[1..] {
        end = first
            .char_indices()
            .take_while(|&(i, c)| i + c.len_utf8() <= end && value[i..].starts_with(c))
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        if end == 0 {
            break;
        }
    }
    first[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::{common_prefix, Worker};
    use crate::logging::Logger;
    use crate::model::corpus_from_lines;
    use crate::protocol::{Request, Response};

    fn worker(lines: &[&str]) -> Worker {
        Worker::new(corpus_from_lines(lines.iter().copied()), 20)
    }

    #[test]
    fn common_prefix_of_disjoint_values_is_empty() {
        assert_eq!(common_prefix(&["abc", "xyz"]), "");
        assert_eq!(common_prefix(&["abc", "abd"]), "ab");
        assert_eq!(common_prefix(&[]), "");
    }

    #[test]
    fn filter_reports_totals_and_ranked_items() {
        let mut worker = worker(&["alpha", "beta", "alphabet"]);
        let response = worker.handle(Request::Filter {
            seq: 1,
            input: "alp".into(),
        });

        match response {
            Response::Filter {
                seq,
                total,
                filtered,
                items,
            } => {
                assert_eq!((seq, total, filtered), (1, 3, 2));
                assert_eq!(items[0].value, "alpha");
            }
            Response::Complete { .. } => panic!("expected a filter response"),
        }
    }

    #[test]
    fn complete_extends_to_the_common_prefix() {
        let mut worker = worker(&["src/cache.rs", "src/channel.rs", "tests/x"]);
        let response = worker.handle(Request::Complete {
            seq: 2,
            input: "src/c".into(),
            sep: None,
        });

        match response {
            Response::Complete { candidate, .. } => assert_eq!(candidate, "src/c"),
            Response::Filter { .. } => panic!("expected a complete response"),
        }
    }

    #[test]
    fn complete_with_separator_stops_past_it() {
        let mut worker = worker(&["src/module/a.rs", "src/module/b.rs"]);
        let response = worker.handle(Request::Complete {
            seq: 3,
            input: "src".into(),
            sep: Some("/".into()),
        });

        match response {
            Response::Complete { candidate, .. } => assert_eq!(candidate, "src/module/"),
            Response::Filter { .. } => panic!("expected a complete response"),
        }
    }

    #[test]
    fn complete_with_separator_missing_resets_to_input() {
        let mut worker = worker(&["srcfile-one", "srcfile-two"]);
        let response = worker.handle(Request::Complete {
            seq: 4,
            input: "src".into(),
            sep: Some("/".into()),
        });

        match response {
            Response::Complete { candidate, .. } => assert_eq!(candidate, "src"),
            Response::Filter { .. } => panic!("expected a complete response"),
        }
    }

    #[test]
    fn complete_with_no_matching_prefix_echoes_the_input() {
        let mut worker = worker(&["alpha", "beta"]);
        let response = worker.handle(Request::Complete {
            seq: 5,
            input: "zzz".into(),
            sep: Some("/".into()),
        });

        match response {
            Response::Complete { candidate, .. } => assert_eq!(candidate, "zzz"),
            Response::Filter { .. } => panic!("expected a complete response"),
        }
    }

    #[test]
    fn run_services_a_session_and_stops_at_blank_line() {
        let mut worker = worker(&["one", "two"]);
        let input = "{\"command\":\"filter\",\"seq\":1,\"input\":\"on\"}\n\n";
        let mut output = Vec::new();

        worker
            .run(&mut input.as_bytes(), &mut output, &Logger::null())
            .expect("session should run");

        let raw = String::from_utf8(output).expect("responses should be utf-8");
        let response: Response =
            serde_json::from_str(raw.lines().next().expect("one response line"))
                .expect("response should parse");
        assert_eq!(response.seq(), 1);
    }

    #[test]
    fn unknown_command_kills_the_worker() {
        let mut worker = worker(&["one"]);
        let input = "{\"command\":\"explode\",\"seq\":1,\"input\":\"\"}\n";
        let mut output = Vec::new();

        let result = worker.run(&mut input.as_bytes(), &mut output, &Logger::null());
        assert!(result.is_err());
    }

    #[test]
    fn corpus_reading_stops_at_the_blank_terminator() {
        let stream = "alpha\nbeta\n\n{\"command\":\"noise\"}\n";
        let mut reader = stream.as_bytes();
        let corpus = Worker::read_corpus(&mut reader).expect("corpus should read");

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus[1].value, "beta");
    }
}
