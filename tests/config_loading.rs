use std::io::Write;

use jobdispatch::config::{DispatchConfig, load_and_validate, load_from_path};
use jobdispatch::errors::DispatchError;
use jobdispatch::job::{RetryPolicy, RetryStrategy};
use jobdispatch::logging::resolve_level;
use jobdispatch::types::LogLevel;
use tempfile::NamedTempFile;
use tracing::Level;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn empty_file_yields_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg, DispatchConfig::default());
    assert_eq!(cfg.coder().prefix(), "");
}

#[test]
fn full_file_is_applied() {
    let file = write_config(
        r#"
[logging]
level = "debug"

[coder]
prefix = "com.example.job."
include_extras = false

[retry]
policy = "linear"
initial_backoff = 60
maximum_backoff = 1800
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.log_level, Some(LogLevel::Debug));
    assert_eq!(cfg.coder_prefix, "com.example.job.");
    assert!(!cfg.include_extras);
    assert_eq!(
        cfg.default_retry,
        RetryStrategy::new(RetryPolicy::Linear, 60, 1800)
    );

    let job = cfg.job_builder().tag("t").target("W").build().unwrap();
    assert_eq!(job.retry_strategy(), &cfg.default_retry);
}

#[test]
fn unknown_policy_is_a_config_error() {
    let file = write_config("[retry]\npolicy = \"random\"\n");
    match load_and_validate(file.path()) {
        Err(DispatchError::ConfigError(msg)) => assert!(msg.contains("random")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn bad_backoff_reports_validator_messages() {
    let file = write_config("[retry]\ninitial_backoff = 10\nmaximum_backoff = 100\n");
    match load_and_validate(file.path()) {
        Err(DispatchError::Validation { errors, .. }) => {
            assert!(errors.contains(&"Initial backoff must be at least 30s".to_string()));
            assert!(errors.contains(
                &"Maximum backoff must be greater than 300s (5 minutes)".to_string()
            ));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn whitespace_in_prefix_is_rejected() {
    let file = write_config("[coder]\nprefix = \"a b\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(DispatchError::ConfigError(_))
    ));
}

#[test]
fn unknown_keys_and_bad_toml_fail_to_parse() {
    let file = write_config("[coder]\nsuffix = \"x\"\n");
    assert!(matches!(load_from_path(file.path()), Err(DispatchError::TomlError(_))));

    let file = write_config("this is not toml");
    assert!(matches!(load_from_path(file.path()), Err(DispatchError::TomlError(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.toml");
    assert!(matches!(load_and_validate(&path), Err(DispatchError::IoError(_))));
}

#[test]
fn configured_log_level_wins_over_environment() {
    assert_eq!(resolve_level(Some(LogLevel::Warn), Some("trace")), Level::WARN);
    assert_eq!(resolve_level(None, Some(" Debug ")), Level::DEBUG);
    assert_eq!(resolve_level(None, Some("loud")), Level::INFO);
    assert_eq!(resolve_level(None, None), Level::INFO);
}
