use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

use quickpick_core::protocol::Response;

fn worker_bin() -> &'static str {
    env!("CARGO_BIN_EXE_quickpick-core")
}

#[test]
fn worker_serves_filter_and_complete_over_pipes() {
    let mut child = Command::new(worker_bin())
        .args(["--worker", "--limit", "10"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("worker should spawn");

    let mut stdin = child.stdin.take().expect("worker stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("worker stdout"));

    stdin
        .write_all(b"src/cache.rs\nsrc/channel.rs\nREADME.md\n\n")
        .expect("corpus should stream");
    stdin
        .write_all(b"{\"command\":\"filter\",\"seq\":1,\"input\":\"src\"}\n")
        .expect("filter request should write");
    stdin
        .write_all(b"{\"command\":\"complete\",\"seq\":2,\"input\":\"s\",\"sep\":\"/\"}\n")
        .expect("complete request should write");
    stdin.flush().expect("requests should flush");

    let mut line = String::new();
    reader.read_line(&mut line).expect("first response line");
    let first: Response =
        serde_json::from_str(line.trim_end()).expect("filter response should parse");
    match first {
        Response::Filter {
            seq,
            total,
            filtered,
            items,
        } => {
            assert_eq!((seq, total, filtered), (1, 3, 2));
            assert!(items.iter().all(|item| item.value.starts_with("src/")));
        }
        Response::Complete { .. } => panic!("expected a filter response"),
    }

    line.clear();
    reader.read_line(&mut line).expect("second response line");
    let second: Response =
        serde_json::from_str(line.trim_end()).expect("complete response should parse");
    match second {
        Response::Complete { seq, candidate } => {
            assert_eq!(seq, 2);
            assert_eq!(candidate, "src/");
        }
        Response::Filter { .. } => panic!("expected a complete response"),
    }

    // A blank line ends the session cleanly.
    stdin.write_all(b"\n").expect("terminator should write");
    stdin.flush().expect("terminator should flush");
    drop(stdin);
    let status = child.wait().expect("worker should exit");
    assert!(status.success());
}

#[test]
fn worker_dies_loudly_on_an_unparseable_request() {
    let mut child = Command::new(worker_bin())
        .arg("--worker")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("worker should spawn");

    let mut stdin = child.stdin.take().expect("worker stdin");
    stdin
        .write_all(b"alpha\n\n{\"command\":\"explode\"}\n")
        .expect("bad request should write");
    stdin.flush().expect("bad request should flush");
    drop(stdin);

    let status = child.wait().expect("worker should exit");
    assert_eq!(status.code(), Some(1));
}

#[test]
fn one_shot_filter_prints_ranked_values() {
    let mut child = Command::new(worker_bin())
        .args(["--filter", "ca"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("filter run should spawn");

    child
        .stdin
        .take()
        .expect("filter stdin")
        .write_all(b"src/cache.rs\nREADME\nsrc/main.rs\n")
        .expect("corpus should stream");

    let output = child.wait_with_output().expect("filter run should exit");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("output should be utf-8");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    // The contiguous match outranks the fragmented one.
    assert_eq!(lines[0], "src/cache.rs");
    assert_eq!(lines[1], "src/main.rs");
}

#[test]
fn cli_rejects_unknown_arguments() {
    let output = Command::new(worker_bin())
        .arg("--frobnicate")
        .output()
        .expect("run should finish");

    assert_eq!(output.status.code(), Some(2));
}
