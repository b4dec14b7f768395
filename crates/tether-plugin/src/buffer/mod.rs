//! In-memory line buffers fed from a child's output streams.
//!
//! A pump thread copies the stream into a queue one newline-terminated line
//! at a time. Readers never block: [`LineBuffer::try_read_line`] reports
//! whatever has arrived so far. The pump finishes when the stream reaches
//! end-of-file or fails, at which point the buffer reports
//! [`ReadAttempt::Closed`] once every queued line has been consumed.
//!
//! Dropping a [`LineBuffer`] does not close the stream. The pump keeps
//! reading and discards what it reads, so a child that goes on writing after
//! its output stops being interesting neither blocks nor gets `SIGPIPE`.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::mem;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::error::ClientError;

const BUFFER_TARGET: &str = "tether_plugin::buffer";

/// Outcome of a single non-blocking read attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadAttempt {
    /// A complete line, including its trailing newline.
    Line(String),
    /// Trailing bytes the stream ended with that were never newline
    /// terminated.
    Partial(String),
    /// No complete line has arrived yet.
    Pending,
    /// The stream has ended and every buffered line has been consumed.
    Closed,
}

/// Buffered view over one child output stream.
#[derive(Debug)]
pub struct LineBuffer {
    receiver: Receiver<Vec<u8>>,
}

impl LineBuffer {
    /// Starts a pump thread draining `stream` into a new buffer.
    ///
    /// The returned handle finishes once the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Thread`] when the pump thread cannot be spawned.
    pub fn spawn<R>(stream: R, name: &'static str) -> Result<(Self, JoinHandle<()>), ClientError>
    where
        R: Read + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || pump(stream, &sender, name))
            .map_err(|source| ClientError::Thread {
                name,
                source: Arc::new(source),
            })?;
        Ok((Self { receiver }, handle))
    }

    /// Attempts to take the next line without blocking.
    pub fn try_read_line(&mut self) -> ReadAttempt {
        match self.receiver.try_recv() {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                if bytes.ends_with(b"\n") {
                    ReadAttempt::Line(text)
                } else {
                    ReadAttempt::Partial(text)
                }
            }
            Err(TryRecvError::Empty) => ReadAttempt::Pending,
            Err(TryRecvError::Disconnected) => ReadAttempt::Closed,
        }
    }
}

fn pump<R: Read>(stream: R, sender: &Sender<Vec<u8>>, name: &str) {
    let mut reader = BufReader::new(stream);
    let mut detached = false;
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) if detached => {}
            Ok(_) => {
                if sender.send(mem::take(&mut line)).is_err() {
                    debug!(
                        target: BUFFER_TARGET,
                        stream = name,
                        "buffer dropped, discarding further output"
                    );
                    detached = true;
                }
            }
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) => {
                debug!(
                    target: BUFFER_TARGET,
                    stream = name,
                    error = %error,
                    "stream read failed, closing buffer"
                );
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests;
