use std::io::Write;

use gpupack::config::{Config, ConfigError, PodRequest};

#[test]
fn config_loads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        "gpu:\n  number: 2\n  capacity: [8, 8]\n  mappings:\n    small: [2, 2]\n    big: [4, 4]\npods:\n  small: 3\n  big: 3\n"
    )
    .expect("write yaml");

    let cfg = Config::load(file.path()).expect("valid configuration");
    assert_eq!(cfg.gpu.number, 2);
    let PodRequest::Counts(counts) = &cfg.pods else {
        panic!("expected the counts shape");
    };
    assert_eq!(counts.get("big"), Some(&3));
}

#[test]
fn missing_file_is_a_configuration_error() {
    let err = Config::load("does-not-exist.yaml".as_ref()).unwrap_err();
    assert!(matches!(err, ConfigError::Unreadable { .. }));
}

#[test]
fn malformed_yaml_is_a_configuration_error() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "gpu: [not, a, mapping").expect("write yaml");
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Malformed { .. }));
}

#[test]
fn invalid_initial_state_fails_at_load_time() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        "gpu:\n  number: 1\n  capacity: [4]\n  mappings:\n    big: [3]\n  initialState:\n    0: [big, big]\npods:\n  big: 1\n"
    )
    .expect("write yaml");
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InitialOverflow { gpu: 0, .. }));
}
