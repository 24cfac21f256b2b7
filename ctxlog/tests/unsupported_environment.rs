use ctxlog::LoggerBuilder;
use serde_json::Value;
use tracing::Level;

// Sets `APP_ENVIRONMENT` to an unknown value, so it is the only test in this binary.
#[test]
fn unsupported_environment_logs_json_to_the_file() {
    unsafe { std::env::set_var("APP_ENVIRONMENT", "qa") };
    let dir = tempfile::tempdir().unwrap();
    let mut diagnostics = Vec::new();

    let logger =
        LoggerBuilder::from_env_with_diagnostics(dir.path().join("app.log"), "", &mut diagnostics)
            .build();

    let output = String::from_utf8(diagnostics).unwrap();
    assert_eq!(output.lines().count(), 1);
    assert!(output.contains("qa is not a supported environment"));
    assert_eq!(logger.level(), Some(Level::INFO));

    logger.in_scope(|| tracing::info!("written as production"));

    let contents = std::fs::read_to_string(dir.path().join("app_rCURRENT.log")).unwrap();
    let record: Value = serde_json::from_str(contents.trim()).unwrap();
    assert_eq!(record["message"], "written as production");
    assert!(record["git_revision"].is_string());
}
