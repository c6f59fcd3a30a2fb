use std::env;
use std::path::PathBuf;
use std::time::Duration;

use billiards_hub::config::environment::{ConfigError, DEFAULT_ANON_KEY, DEFAULT_BACKEND_URL};
use billiards_hub::config::Config;
use serial_test::serial;

const VARS: [&str; 6] = [
    "BACKEND_URL",
    "BACKEND_ANON_KEY",
    "VERIFICATION_POLL_SECS",
    "HTTP_TIMEOUT_SECS",
    "SESSION_FILE",
    "SUPPORT_EMAIL",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn defaults_apply_when_nothing_is_set() {
    clear_env();

    let config = Config::from_env().unwrap();

    assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
    assert_eq!(config.anon_key, DEFAULT_ANON_KEY);
    assert!(config.uses_default_key());
    assert_eq!(config.poll_interval, Duration::from_secs(30));
    assert_eq!(config.http_timeout, Duration::from_secs(15));
    assert_eq!(config.session_file, None);
    assert_eq!(config.support_email, "support@saudibilliards.com");
}

#[test]
#[serial]
fn explicit_values_override_defaults() {
    clear_env();
    env::set_var("BACKEND_URL", "http://localhost:54321/");
    env::set_var("BACKEND_ANON_KEY", "local-anon-key");
    env::set_var("VERIFICATION_POLL_SECS", "5");
    env::set_var("SESSION_FILE", "/tmp/billiards-session.json");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.backend_url, "http://localhost:54321");
    assert_eq!(config.anon_key, "local-anon-key");
    assert!(!config.uses_default_key());
    assert_eq!(config.poll_interval, Duration::from_secs(5));
    assert_eq!(
        config.session_file,
        Some(PathBuf::from("/tmp/billiards-session.json"))
    );
}

#[test]
#[serial]
fn non_numeric_interval_is_an_error() {
    clear_env();
    env::set_var("VERIFICATION_POLL_SECS", "soon");

    let err = Config::from_env().unwrap_err();
    clear_env();

    assert_eq!(
        err,
        ConfigError::InvalidNumber {
            name: "VERIFICATION_POLL_SECS",
            value: "soon".to_string()
        }
    );
}

#[test]
#[serial]
fn zero_timeout_is_an_error() {
    clear_env();
    env::set_var("HTTP_TIMEOUT_SECS", "0");

    let err = Config::from_env().unwrap_err();
    clear_env();

    assert!(matches!(
        err,
        ConfigError::InvalidNumber {
            name: "HTTP_TIMEOUT_SECS",
            ..
        }
    ));
}

#[test]
#[serial]
fn blank_variable_is_an_error() {
    clear_env();
    env::set_var("SUPPORT_EMAIL", "   ");

    let err = Config::from_env().unwrap_err();
    clear_env();

    assert_eq!(err, ConfigError::Empty("SUPPORT_EMAIL"));
}
