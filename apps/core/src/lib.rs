pub mod cache;
pub mod channel;
pub mod config;
pub mod editor;
pub mod history;
pub mod logging;
pub mod matcher;
pub mod menu;
pub mod model;
pub mod pattern;
pub mod protocol;
pub mod runtime;
pub mod worker;

#[cfg(test)]
mod tests {
    mod filter_latency_test {
        include!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../tests/perf/filter_latency_test.rs"
        ));
    }
}
