//! Thread-backed jobs.
//!
//! A job runs one closure on its own OS thread. Waiting on it yields a
//! `Result<Option<T>, JobError>`:
//!
//! - `Ok(Some(value))`: the closure ran and returned `value` (which may
//!   itself be an "empty" value such as `None` or `()`)
//! - `Ok(None)`: the job was killed before its closure started
//! - `Err(_)`: the thread could not be spawned or the closure panicked
//!
//! Killing is cooperative. A running closure observes it through the
//! [`JobToken`] it receives.
//!
//! [`Job`] owns its closure (`'static`). [`JobScope`] runs jobs that borrow
//! from the caller's stack, which is what parallel visits use to hand out
//! references into a tree.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use thiserror::Error;

/// Job failure.
#[derive(Error, Debug)]
pub enum JobError {
    /// The OS refused to create the thread.
    #[error("failed to spawn job thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The job's closure panicked.
    #[error("job panicked: {0}")]
    Panicked(String),
}

/// Outcome of waiting on a job.
pub type JobResult<T> = std::result::Result<Option<T>, JobError>;

/// Kill flag shared between a job handle and its closure.
#[derive(Debug, Clone, Default)]
pub struct JobToken {
    killed: Arc<AtomicBool>,
}

impl JobToken {
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Wraps a job body so it does not start once killed.
fn gated<F, T>(token: JobToken, f: F) -> impl FnOnce() -> Option<T>
where
    F: FnOnce(&JobToken) -> T,
{
    move || {
        if token.is_killed() {
            return None;
        }
        Some(f(&token))
    }
}

/// A job owning its closure.
pub struct Job<T> {
    handle: thread::JoinHandle<Option<T>>,
    token: JobToken,
}

impl<T: Send + 'static> Job<T> {
    /// Starts `f` on a new thread named `name`.
    pub fn run<F>(name: impl Into<String>, f: F) -> Result<Self, JobError>
    where
        F: FnOnce(&JobToken) -> T + Send + 'static,
    {
        let token = JobToken::default();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(gated(token.clone(), f))
            .map_err(JobError::Spawn)?;

        Ok(Self { handle, token })
    }
}

impl<T> Job<T> {
    /// Whether the closure has returned (or panicked).
    pub fn is_done(&self) -> bool {
        self.handle.is_finished()
    }

    /// Asks the job to stop. A job that has not started yet never runs.
    pub fn kill(&self) {
        self.token.kill();
    }

    pub fn name(&self) -> Option<&str> {
        self.handle.thread().name()
    }

    /// Blocks until the job ends and releases its thread.
    pub fn wait(self) -> JobResult<T> {
        self.handle.join().map_err(|p| JobError::Panicked(panic_message(p)))
    }
}

/// Scope in which borrowing jobs run. Every job started in the scope has
/// ended by the time [`scope`] returns.
pub struct JobScope<'scope, 'env: 'scope> {
    scope: &'scope thread::Scope<'scope, 'env>,
}

/// Opens a [`JobScope`].
pub fn scope<'env, F, R>(f: F) -> R
where
    F: for<'scope> FnOnce(&JobScope<'scope, 'env>) -> R,
{
    thread::scope(|s| f(&JobScope { scope: s }))
}

impl<'scope, 'env> JobScope<'scope, 'env> {
    /// Starts `f` on a new thread that may borrow from outside the scope.
    pub fn run<F, T>(&self, name: &str, f: F) -> Result<ScopedJob<'scope, T>, JobError>
    where
        F: FnOnce(&JobToken) -> T + Send + 'scope,
        T: Send + 'scope,
    {
        let token = JobToken::default();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn_scoped(self.scope, gated(token.clone(), f))
            .map_err(JobError::Spawn)?;

        Ok(ScopedJob { handle, token })
    }
}

/// A job started inside a [`JobScope`].
pub struct ScopedJob<'scope, T> {
    handle: thread::ScopedJoinHandle<'scope, Option<T>>,
    token: JobToken,
}

impl<'scope, T> ScopedJob<'scope, T> {
    pub fn is_done(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn kill(&self) {
        self.token.kill();
    }

    pub fn wait(self) -> JobResult<T> {
        self.handle.join().map_err(|p| JobError::Panicked(panic_message(p)))
    }
}
