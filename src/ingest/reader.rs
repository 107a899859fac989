//! Background reader that turns a line source into a stream of posts.
//!
//! Lines are read and parsed on a dedicated thread and handed to the
//! engine through a bounded channel. The engine thread keeps sole ownership
//! of all snapshot state, so nothing downstream of the channel is shared.

use crate::ingest::parser::PostParser;
use crate::ingest::post::Post;
use crate::stats::SharedPipelineStats;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{BufRead, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, warn};

/// Channel capacity between the reader and the engine.
const CHANNEL_CAPACITY: usize = 10_000;

/// Errors that can occur when starting the reader.
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Reader is already running")]
    AlreadyRunning,
}

/// Reads raw records on a background thread.
pub struct PostReader {
    parser: PostParser,
    stats: SharedPipelineStats,
    sender: Option<Sender<Post>>,
    receiver: Receiver<Post>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl PostReader {
    /// Create a reader that parses records with `parser`.
    pub fn new(parser: PostParser, stats: SharedPipelineStats) -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            parser,
            stats,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start reading `source` in a background thread.
    ///
    /// The channel closes once the source is exhausted or [`stop`](Self::stop)
    /// is called. A reader can only be started once.
    pub fn start<R>(&mut self, source: R) -> Result<(), ReaderError>
    where
        R: BufRead + Send + 'static,
    {
        let sender = self.sender.take().ok_or(ReaderError::AlreadyRunning)?;
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let parser = self.parser.clone();
        let stats = self.stats.clone();

        let handle = thread::spawn(move || {
            read_lines(source, &parser, &sender, &running, &stats);
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Shared flag that stops the reader when cleared.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Stop reading and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Drain so a reader blocked on a full channel can observe the flag.
        while self.receiver.try_recv().is_ok() {}
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Stop reading without waiting for the thread.
    ///
    /// A thread blocked on its source exits at the next line or at end of
    /// input.
    pub fn detach(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.thread_handle.take();
    }

    /// Check whether the background thread is still reading.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for parsed posts.
    pub fn receiver(&self) -> &Receiver<Post> {
        &self.receiver
    }
}

impl Drop for PostReader {
    fn drop(&mut self) {
        self.detach();
    }
}

fn read_lines<R: BufRead>(
    source: R,
    parser: &PostParser,
    sender: &Sender<Post>,
    running: &AtomicBool,
    stats: &SharedPipelineStats,
) {
    for (line_no, line) in source.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            debug!(line_no, "reader stopped");
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                stats.record_malformed();
                warn!(line_no, "skipping non UTF-8 record");
                continue;
            }
            Err(e) => {
                warn!(line_no, error = %e, "input read failed, ending stream");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        stats.record_read();
        match parser.parse_line(&line) {
            Ok(post) => {
                if sender.send(post).is_err() {
                    // Receiver is gone, nobody left to feed.
                    break;
                }
            }
            Err(e) => {
                stats.record_malformed();
                warn!(line_no, error = %e, "skipping malformed record");
            }
        }
    }
}
