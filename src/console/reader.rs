//! Dedicated OS-thread line reader for console input.
//!
//! Reading stdin is a blocking call with no cancellation API, so it lives on
//! its own thread and forwards lines over a `tokio::sync::mpsc` channel.
//! End of input closes the channel.
//!
//! # Shutdown caveat
//!
//! A thread blocked in `read_line` cannot be interrupted.  Dropping the
//! [`ConsoleReader`] sets a stop flag so no further lines are forwarded; the
//! thread itself stays parked in the read until the process exits.

use std::io::BufRead;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

/// Handle to a running reader thread.  Drop it to stop forwarding lines.
pub struct ConsoleReader {
    stop: Arc<AtomicBool>,
    /// Never joined; see the module docs.
    _thread: std::thread::JoinHandle<()>,
}

impl ConsoleReader {
    /// Read lines from stdin.
    pub fn stdin(capacity: usize) -> std::io::Result<(Self, mpsc::Receiver<String>)> {
        Self::spawn(std::io::BufReader::new(std::io::stdin()), capacity)
    }

    /// Spawn a thread that forwards every line of `input`, without its line
    /// terminator, until end of input or until the receiver is dropped.
    pub fn spawn<R>(mut input: R, capacity: usize) -> std::io::Result<(Self, mpsc::Receiver<String>)>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("console-reader".into())
            .spawn(move || {
                let mut line = String::new();
                loop {
                    line.clear();
                    match input.read_line(&mut line) {
                        Ok(0) => {
                            log::debug!("console: end of input");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            log::warn!("console: read failed: {e}");
                            break;
                        }
                    }

                    if stop_clone.load(Ordering::Relaxed) {
                        break;
                    }
                    let text = line.trim_end_matches(['\r', '\n']).to_string();
                    // blocking_send is safe to call from non-async threads.
                    if tx.blocking_send(text).is_err() {
                        break;
                    }
                }
            })?;

        Ok((
            Self {
                stop,
                _thread: thread,
            },
            rx,
        ))
    }
}

impl Drop for ConsoleReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
