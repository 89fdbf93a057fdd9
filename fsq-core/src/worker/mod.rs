//! The worker supervision loop.
//!
//! A worker is a single-threaded long-running process meant to sit in the
//! background on a cluster node: it polls `queued/`, claims one task at a
//! time by rename, gates it on its precondition, runs the command under
//! supervision, and reports the outcome by moving the file. It writes no
//! log of its own: queue state is inspected straight from the directories.

pub mod signal;
pub mod supervise;

use anyhow::{Context, Result};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::Duration;

use crate::queue::{QueueDir, TaskState};
use crate::task::{naming, parser};
use supervise::RunOutcome;

/// Configuration for one worker instance.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue root directory.
    pub queue_root: PathBuf,
    /// Sleep between directory polls and supervision ticks.
    pub poll_interval: Duration,
    /// Keep polling when `queued` is empty instead of exiting.
    pub persist: bool,
    /// Exit after the first task reaches a terminal state, yielding the
    /// scheduling slot back to the cluster.
    pub one_task: bool,
}

impl WorkerConfig {
    /// Defaults: 1 s poll interval, exit when idle, run until idle.
    pub fn new(queue_root: impl Into<PathBuf>) -> Self {
        Self {
            queue_root: queue_root.into(),
            poll_interval: Duration::from_secs(1),
            persist: false,
            one_task: false,
        }
    }
}

/// What a scan over the `queued` snapshot produced.
enum Claim {
    /// A task made it to `active` and is ours to run.
    Task(String),
    /// Every candidate was lost to a peer, gated, or malformed.
    Nothing,
    /// SIGTERM arrived mid-scan; any held claim has been released.
    Shutdown,
}

/// Run the worker supervision loop until it yields.
///
/// Returns `Ok(())` on every graceful path: empty queue with `persist` off,
/// first terminal transition with `one_task` on, or SIGTERM (the held task
/// is returned to `queued` first, so no task is ever lost to a worker
/// death). An error indicates a fault in the environment, such as an
/// unreadable queue root, never a task outcome.
pub fn run_worker(config: &WorkerConfig) -> Result<()> {
    let queue = QueueDir::new(&config.queue_root);
    queue.init()?;
    signal::install_sigterm_handler();
    let worker_id = naming::worker_id();

    loop {
        if signal::term_requested() {
            return Ok(());
        }

        let ready = queue.snapshot(TaskState::Queued)?;
        if ready.is_empty() {
            thread::sleep(config.poll_interval);
            if !config.persist {
                // Yield the scheduling slot back to the cluster.
                return Ok(());
            }
            continue;
        }

        let task_id = match claim(&queue, &worker_id, &ready)? {
            Claim::Task(id) => id,
            Claim::Nothing => {
                thread::sleep(config.poll_interval);
                continue;
            }
            Claim::Shutdown => return Ok(()),
        };

        match supervise::run_task(&queue, &task_id, &worker_id, config.poll_interval)? {
            RunOutcome::Released => return Ok(()),
            RunOutcome::Done | RunOutcome::Failed | RunOutcome::Deleted => {
                if config.one_task {
                    return Ok(());
                }
            }
        }
    }
}

/// Scan the sorted `queued` snapshot and try to claim one runnable task.
///
/// For each candidate: rename into `checking` (the claim; losing the rename
/// race just means a peer won), evaluate the precondition, and either
/// promote to `active` or release back to `queued`. The `checking` state
/// makes precondition evaluation itself mutually exclusive: preconditions
/// may have side effects, and two workers must never run the same one
/// concurrently.
fn claim(queue: &QueueDir, worker_id: &str, ready: &[String]) -> Result<Claim> {
    for task_id in ready {
        if signal::term_requested() {
            return Ok(Claim::Shutdown);
        }

        if !queue.transition(task_id, TaskState::Queued, TaskState::Checking)? {
            continue;
        }

        // We own the file now; a read failure here is a real fault.
        let path = queue.task_path(TaskState::Checking, task_id);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let parsed = match parser::parse_task(&content) {
            Ok(parsed) => parsed,
            Err(reason) => {
                // Malformed tasks would otherwise cycle through the queue
                // forever; fail them visibly instead.
                append_note(queue, task_id, TaskState::Checking, worker_id, &reason.to_string());
                queue.transition(task_id, TaskState::Checking, TaskState::Failed)?;
                continue;
            }
        };

        // Gating, not judging: a failed precondition returns the task to
        // `queued` so it stays eligible once its dependencies are met.
        let met = precondition_met(&parsed.precondition)?;

        if signal::term_requested() {
            queue.transition(task_id, TaskState::Checking, TaskState::Queued)?;
            return Ok(Claim::Shutdown);
        }

        if !met {
            queue.transition(task_id, TaskState::Checking, TaskState::Queued)?;
            continue;
        }

        if !queue.transition(task_id, TaskState::Checking, TaskState::Active)? {
            // Externally deleted while checking; the deletion stands.
            continue;
        }
        return Ok(Claim::Task(task_id.clone()));
    }
    Ok(Claim::Nothing)
}

/// Run a precondition script and report whether it exited 0.
///
/// Stdio is inherited and the process is not supervised: preconditions are
/// trusted to terminate. An empty script is the shell no-op and passes.
fn precondition_met(chk: &str) -> Result<bool> {
    let status = Command::new("sh")
        .arg("-c")
        .arg(chk)
        .status()
        .context("failed to launch precondition shell")?;
    Ok(status.success())
}

/// Append a banner plus a rejection note to a task file. Best-effort: a
/// write failure must not take the worker down.
pub(crate) fn append_note(
    queue: &QueueDir,
    task_id: &str,
    state: TaskState,
    worker_id: &str,
    reason: &str,
) {
    let path = queue.task_path(state, task_id);
    if let Ok(mut file) = OpenOptions::new().append(true).open(&path) {
        let _ = write!(file, "\n=== {worker_id} ===\nrejected: {reason}\n");
    }
}
