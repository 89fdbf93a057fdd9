//! Supervision of one active task: subprocess launch, pause/resume,
//! external deletion, and SIGTERM release.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use super::signal;
use crate::proc;
use crate::queue::{QueueDir, TaskState};
use crate::task::parser;

/// How a supervised task run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Command exited 0; task moved to `done`.
    Done,
    /// Command exited non-zero (or the file turned malformed); task moved to
    /// `failed` with its output appended.
    Failed,
    /// Task file was externally deleted; tree killed, no rename. The
    /// operator's deletion stands.
    Deleted,
    /// SIGTERM: tree killed, task returned to `queued`. The worker must
    /// exit 0 after this.
    Released,
}

/// Where the task file went when it left `active` mid-run.
enum PauseOutcome {
    Resumed,
    Deleted,
    Released,
}

/// Run and supervise the command of a task that is already in `active`.
///
/// Appends the worker banner, launches the command in its own session with
/// stdout and stderr redirected into the task file, then ticks every
/// `poll_interval` watching for child exit, for the file moving to `paused`
/// or disappearing, and for SIGTERM.
pub fn run_task(
    queue: &QueueDir,
    task_id: &str,
    worker_id: &str,
    poll_interval: Duration,
) -> Result<RunOutcome> {
    let active_path = queue.task_path(TaskState::Active, task_id);

    // Re-read after promotion: a prior aborted run may have appended a
    // banner and partial output, and parsing stops the command at the first
    // `===` line.
    let content = match std::fs::read_to_string(&active_path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RunOutcome::Deleted),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", active_path.display()))
        }
    };
    let command = match parser::parse_task(&content) {
        Ok(parsed) => parsed.command,
        Err(reason) => {
            // Only reachable if the file was rewritten behind our back;
            // handled like a malformed claim.
            super::append_note(queue, task_id, TaskState::Active, worker_id, &reason.to_string());
            queue.transition(task_id, TaskState::Active, TaskState::Failed)?;
            return Ok(RunOutcome::Failed);
        }
    };

    // Banner first, then the command's interleaved stdout/stderr, all
    // appended to the task file itself. From here until the terminal rename
    // this worker is the only writer.
    let log = match OpenOptions::new().append(true).open(&active_path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RunOutcome::Deleted),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to open {}", active_path.display()))
        }
    };
    {
        // Best-effort: an append failure must not take the worker down.
        let mut file = &log;
        let _ = write!(file, "\n=== {worker_id} ===\n");
    }

    let mut child = spawn_command(&command, &log)?;
    supervise(queue, task_id, &mut child, poll_interval)
}

/// Launch `sh -c <command>` with stdout and stderr appended to the task
/// file and the child leading its own session.
///
/// The new session is what makes tree termination reliable: the command and
/// everything it spawns are separable from the worker, and a SIGKILL to the
/// direct child alone would leave grandchildren running.
fn spawn_command(command: &str, log: &File) -> Result<Child> {
    let stdout = log.try_clone().context("failed to clone task file handle")?;
    let stderr = log.try_clone().context("failed to clone task file handle")?;

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));

    // SAFETY: setsid is async-signal-safe and cannot fail here, since the
    // child is freshly forked and therefore not a process-group leader.
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    cmd.spawn().context("failed to spawn task command")
}

/// Tick until the child exits or the task file is moved out from under us.
fn supervise(
    queue: &QueueDir,
    task_id: &str,
    child: &mut Child,
    poll_interval: Duration,
) -> Result<RunOutcome> {
    let active_path = queue.task_path(TaskState::Active, task_id);

    loop {
        if signal::term_requested() {
            kill_and_reap(child);
            queue.transition(task_id, TaskState::Active, TaskState::Queued)?;
            return Ok(RunOutcome::Released);
        }

        if let Some(status) = child.try_wait().context("failed to poll task command")? {
            let to = if status.success() {
                TaskState::Done
            } else {
                TaskState::Failed
            };
            let moved = queue.transition(task_id, TaskState::Active, to)?;
            return Ok(match (moved, status.success()) {
                (false, _) => RunOutcome::Deleted,
                (true, true) => RunOutcome::Done,
                (true, false) => RunOutcome::Failed,
            });
        }

        if !active_path.exists() {
            match follow_pause(queue, task_id, child, poll_interval)? {
                PauseOutcome::Resumed => {}
                PauseOutcome::Deleted => return Ok(RunOutcome::Deleted),
                PauseOutcome::Released => return Ok(RunOutcome::Released),
            }
        }

        thread::sleep(poll_interval);
    }
}

/// The task file left `active` while the command was running.
///
/// If it moved to `paused`, SIGSTOP the whole tree (partial suspension of a
/// pipeline is worse than none) and wait for the operator: back in `active`
/// means SIGCONT and resume; gone from both means the deletion stands and
/// the tree is killed.
fn follow_pause(
    queue: &QueueDir,
    task_id: &str,
    child: &mut Child,
    poll_interval: Duration,
) -> Result<PauseOutcome> {
    let active_path = queue.task_path(TaskState::Active, task_id);
    let paused_path = queue.task_path(TaskState::Paused, task_id);

    if !paused_path.exists() {
        if active_path.exists() {
            // Paused and resumed between two of our looks; nothing to do.
            return Ok(PauseOutcome::Resumed);
        }
        kill_and_reap(child);
        return Ok(PauseOutcome::Deleted);
    }

    proc::kill_tree(child.id(), libc::SIGSTOP, Duration::ZERO);

    loop {
        if signal::term_requested() {
            kill_and_reap(child);
            queue.transition(task_id, TaskState::Paused, TaskState::Queued)?;
            return Ok(PauseOutcome::Released);
        }
        if active_path.exists() {
            proc::kill_tree(child.id(), libc::SIGCONT, Duration::ZERO);
            return Ok(PauseOutcome::Resumed);
        }
        if !paused_path.exists() {
            kill_and_reap(child);
            return Ok(PauseOutcome::Deleted);
        }
        thread::sleep(poll_interval);
    }
}

/// SIGKILL the whole tree and reap the direct child.
fn kill_and_reap(child: &mut Child) {
    proc::kill_tree(child.id(), libc::SIGKILL, Duration::ZERO);
    let _ = child.wait();
}
