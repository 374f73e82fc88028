use std::io::Write;
use std::time::Duration;

use prepbox::{Error, SandboxConfig};

#[test]
fn test_empty_document_uses_defaults() {
    let config = SandboxConfig::from_toml_str("").unwrap();
    assert_eq!(config, SandboxConfig::default());
    assert_eq!(config.preview_row_limit, 5);
    assert_eq!(config.signature_sample_limit, 160);
    assert_eq!(config.init_timeout(), Duration::from_secs(60));
    assert_eq!(config.interpreter.timeout(), Duration::from_secs(5));
    assert_eq!(config.interpreter.code_size_limit, 1024 * 1024);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "preview_row_limit = 10\n\
         slow_statement_threshold_ms = 250\n\
         \n\
         [interpreter]\n\
         timeout_ms = 2000"
    )
    .unwrap();

    let config = SandboxConfig::from_file(file.path()).unwrap();
    assert_eq!(config.preview_row_limit, 10);
    assert_eq!(config.slow_statement_threshold(), Duration::from_millis(250));
    assert_eq!(config.interpreter.timeout_ms, 2000);
    assert_eq!(config.interpreter.code_size_limit, 1024 * 1024);
}

#[test]
fn test_invalid_values_rejected() {
    assert!(matches!(
        SandboxConfig::from_toml_str("preview_row_limit = 0"),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        SandboxConfig::from_toml_str("preview_row_limit = \"five\""),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        SandboxConfig::from_file("/nonexistent/prepbox.toml"),
        Err(Error::Config(_))
    ));
}
