//! Unit tests for client error types.

use std::sync::Arc;

use rstest::rstest;

use super::*;

#[test]
fn spawn_error_message_includes_program_and_cause() {
    let error = ClientError::Spawn {
        program: "/usr/bin/missing-plugin".into(),
        source: Arc::new(std::io::Error::from(std::io::ErrorKind::NotFound)),
    };
    let message = error.to_string();
    assert!(
        message.contains("/usr/bin/missing-plugin"),
        "expected program in message: {message}"
    );
    assert!(
        message.contains("not found"),
        "expected cause in message: {message}"
    );
}

#[rstest]
#[case::timeout(ClientError::HandshakeTimeout { timeout_ms: 60_000 }, "60000")]
#[case::port_range(ClientError::InvalidPortRange { min: 9000, max: 8000 }, "9000-8000")]
fn error_message_includes_numeric_fields(#[case] error: ClientError, #[case] expected: &str) {
    let message = error.to_string();
    assert!(
        message.contains(expected),
        "expected {expected} in message: {message}"
    );
}

#[test]
fn client_error_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ClientError>();
}
