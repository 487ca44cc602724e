// Configuration loading, including the base URL environment override.
use serial_test::serial;
use std::env;
use std::fs;
use std::sync::Arc;
use storyapp::StoryApp;
use storyapp::config::{BASE_URL_ENV, Config, DEFAULT_BASE_URL};
use storyapp::context::{AppContext, SharedContext, TestContext};

#[test]
#[serial]
fn test_defaults_without_file_or_env() {
    unsafe {
        env::remove_var(BASE_URL_ENV);
    }
    let ctx = TestContext::new();
    let config = Config::load_or_default(&ctx).unwrap();
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.page_size, 10);
    assert_eq!(config.connect_timeout_secs, 30);
    assert_eq!(config.read_timeout_secs, 30);
}

#[test]
#[serial]
fn test_env_overrides_file_value() {
    let ctx = TestContext::new();
    fs::write(
        ctx.get_config_file_path().unwrap(),
        "base_url = \"https://file.example/v1/\"\npage_size = 5\n",
    )
    .unwrap();

    unsafe {
        env::set_var(BASE_URL_ENV, "http://127.0.0.1:9999/v1");
    }
    let config = Config::load_or_default(&ctx).unwrap();
    unsafe {
        env::remove_var(BASE_URL_ENV);
    }

    assert_eq!(config.base_url, "http://127.0.0.1:9999/v1");
    assert_eq!(config.page_size, 5);
}

#[test]
#[serial]
fn test_broken_file_is_reported_not_defaulted() {
    unsafe {
        env::remove_var(BASE_URL_ENV);
    }
    let ctx = TestContext::new();
    fs::write(ctx.get_config_file_path().unwrap(), "page_size = \"ten\"").unwrap();

    let err = Config::load_or_default(&ctx).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[tokio::test]
#[serial]
async fn test_app_open_uses_loaded_config() {
    unsafe {
        env::set_var(BASE_URL_ENV, "http://127.0.0.1:9999/api");
    }
    let ctx: SharedContext = Arc::new(TestContext::new());
    let app = StoryApp::open(ctx.clone());
    unsafe {
        env::remove_var(BASE_URL_ENV);
    }

    let app = app.unwrap();
    assert_eq!(app.config().base_url, "http://127.0.0.1:9999/api");
    assert!(!app.auth().is_logged_in());
    // Session file lives under the context's data dir once written.
    app.session().save_session("t", "u", "n").await.unwrap();
    assert!(ctx.get_session_path().unwrap().exists());
}
