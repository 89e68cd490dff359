//! Execution contexts that completions are delivered on.
//!
//! # Design
//! A `CallbackContext` takes a boxed job and runs it somewhere. `Inline` runs
//! it right away on the current thread. `MainQueue` posts it to a single
//! designated loop, the place where UI or caller-thread work is safe; the
//! loop is drained by whichever thread owns the `MainLoop`.

use std::io;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::warn;

/// Unit of work handed to a context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait CallbackContext: Send + Sync + 'static {
    fn execute(&self, job: Job);
}

/// Runs every job immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl CallbackContext for Inline {
    fn execute(&self, job: Job) {
        job()
    }
}

/// Handle for posting jobs to a designated loop.
#[derive(Debug, Clone)]
pub struct MainQueue {
    sender: mpsc::UnboundedSender<Job>,
}

/// The receiving end of a `MainQueue`. Whoever drives it is the main context.
#[derive(Debug)]
pub struct MainLoop {
    receiver: mpsc::UnboundedReceiver<Job>,
}

impl MainQueue {
    pub fn new() -> (MainQueue, MainLoop) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (MainQueue { sender }, MainLoop { receiver })
    }

    /// Start a named thread that runs the loop until every handle is dropped.
    pub fn spawn(name: &str) -> io::Result<(MainQueue, JoinHandle<()>)> {
        let (queue, main_loop) = MainQueue::new();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || main_loop.run())?;
        Ok((queue, handle))
    }
}

impl CallbackContext for MainQueue {
    fn execute(&self, job: Job) {
        if self.sender.send(job).is_err() {
            warn!("main loop is gone, dropping completion");
        }
    }
}

impl MainLoop {
    /// Run jobs until every `MainQueue` handle has been dropped.
    ///
    /// # Panics
    /// Panics when called from inside an async runtime; use a plain thread.
    pub fn run(mut self) {
        while let Some(job) = self.receiver.blocking_recv() {
            job();
        }
    }

    /// Run whatever is queued right now without waiting. Returns the number
    /// of jobs run.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }
}
