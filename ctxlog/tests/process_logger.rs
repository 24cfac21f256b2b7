use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ctxlog::{Environment, Logger, RequestContext, from_ctx, get_context_logger, with_ctx};
use serde_json::Value;
use tempfile::TempDir;
use tracing::Level;

static LOG_DIR: OnceLock<TempDir> = OnceLock::new();

fn log_dir() -> &'static Path {
    LOG_DIR
        .get_or_init(|| {
            // Records go to the file sink outside of development.
            Environment::Prod.set();
            tempfile::tempdir().unwrap()
        })
        .path()
}

fn log_path() -> PathBuf {
    log_dir().join("app.log")
}

fn active_log_file() -> PathBuf {
    log_dir().join("app_rCURRENT.log")
}

fn process_logger() -> Logger {
    ctxlog::get(log_path(), "warn")
}

#[test]
fn later_calls_return_the_same_instance() {
    let first = process_logger();
    let second = ctxlog::get("/elsewhere/other.log", "error");

    assert_eq!(first, second);
}

#[test]
fn records_below_the_level_are_suppressed_in_the_file() {
    let logger = process_logger();

    assert_eq!(logger.level(), Some(Level::WARN));

    logger.in_scope(|| {
        tracing::trace!(case = "level-test", "trace record");
        tracing::debug!(case = "level-test", "debug record");
        tracing::info!(case = "level-test", "info record");
        tracing::warn!(case = "level-test", "warn record");
        tracing::error!(case = "level-test", "error record");
    });

    let contents = std::fs::read_to_string(active_log_file()).unwrap();
    let records: Vec<Value> = contents
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap())
        .filter(|record| record["case"] == "level-test")
        .collect();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["level"], "WARN");
    assert!(records[0].get("stacktrace").is_none());
    assert_eq!(records[1]["level"], "ERROR");
    assert!(records[1]["stacktrace"].is_string());
    for record in &records {
        assert!(record["timestamp"].is_string());
        assert!(record["git_revision"].is_string());
        assert!(record["rustc_version"].is_string());
    }
}

#[test]
fn context_falls_back_to_the_process_logger() {
    let logger = process_logger();

    assert_eq!(from_ctx(&RequestContext::new()), logger);

    let (ctx, resolved) = get_context_logger(&RequestContext::new());
    assert_eq!(resolved, logger);
    assert_eq!(ctx.logger(), Some(&logger));
}

#[test]
fn attached_logger_wins_over_the_process_logger() {
    let process = process_logger();
    let explicit = Logger::noop();

    let ctx = with_ctx(&RequestContext::new(), &explicit);

    assert_eq!(from_ctx(&ctx), explicit);
    assert_ne!(from_ctx(&ctx), process);
}
