//! Unit tests for the line buffer.

use std::io::{Cursor, Write};

use rstest::rstest;

use super::*;

fn drained(input: &'static [u8]) -> LineBuffer {
    let (buffer, handle) = LineBuffer::spawn(Cursor::new(input), "test-pump").expect("spawn pump");
    handle.join().expect("pump thread panicked");
    buffer
}

#[test]
fn complete_lines_are_returned_in_order() {
    let mut buffer = drained(b"first\nsecond\n");
    assert_eq!(buffer.try_read_line(), ReadAttempt::Line("first\n".into()));
    assert_eq!(buffer.try_read_line(), ReadAttempt::Line("second\n".into()));
    assert_eq!(buffer.try_read_line(), ReadAttempt::Closed);
}

#[test]
fn unterminated_tail_is_reported_as_partial() {
    let mut buffer = drained(b"line\ntail");
    assert_eq!(buffer.try_read_line(), ReadAttempt::Line("line\n".into()));
    assert_eq!(buffer.try_read_line(), ReadAttempt::Partial("tail".into()));
    assert_eq!(buffer.try_read_line(), ReadAttempt::Closed);
}

#[rstest]
#[case::empty(b"")]
#[case::only_newline(b"\n")]
fn blank_streams_yield_no_text(#[case] input: &'static [u8]) {
    let mut buffer = drained(input);
    let mut lines = Vec::new();
    while let ReadAttempt::Line(line) = buffer.try_read_line() {
        lines.push(line);
    }
    assert!(lines.iter().all(|line| line.trim().is_empty()));
    assert_eq!(buffer.try_read_line(), ReadAttempt::Closed);
}

#[test]
fn invalid_utf8_is_replaced_lossily() {
    let mut buffer = drained(b"ok\xff\n");
    assert_eq!(
        buffer.try_read_line(),
        ReadAttempt::Line("ok\u{fffd}\n".into())
    );
}

#[test]
fn open_stream_without_data_is_pending() {
    let (reader, _writer) = std::io::pipe().expect("create pipe");
    let (mut buffer, _handle) = LineBuffer::spawn(reader, "pending-pump").expect("spawn pump");
    assert_eq!(buffer.try_read_line(), ReadAttempt::Pending);
}

#[test]
fn dropped_buffer_keeps_draining_the_stream() {
    let (reader, mut writer) = std::io::pipe().expect("create pipe");
    let (buffer, handle) = LineBuffer::spawn(reader, "detached-pump").expect("spawn pump");
    drop(buffer);

    // Far more than a pipe holds, so the writer depends on the pump reading.
    let burst = b"ignored output\n".repeat(20_000);
    writer
        .write_all(&burst)
        .expect("writing after the buffer is dropped should succeed");
    drop(writer);

    handle.join().expect("pump thread panicked");
}
