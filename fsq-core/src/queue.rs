use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::task::naming::is_task_file;

/// State of a task, encoded solely by the directory its file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Checking,
    Active,
    Paused,
    Done,
    Failed,
}

impl TaskState {
    /// All states, in lifecycle order.
    pub const ALL: [TaskState; 6] = [
        TaskState::Queued,
        TaskState::Checking,
        TaskState::Active,
        TaskState::Paused,
        TaskState::Done,
        TaskState::Failed,
    ];

    /// Name of the state directory under the queue root.
    pub fn dir_name(self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Checking => "checking",
            TaskState::Active => "active",
            TaskState::Paused => "paused",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
        }
    }

    /// Terminal states are never mutated again by the worker that set them.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Handle on a queue root directory.
///
/// The queue has no broker and no metadata store: the six state directories
/// ARE the shared state, and every state change is a single rename within
/// the root (atomic on POSIX filesystems). Holding a `QueueDir` grants
/// nothing; ownership of a task is only ever established by winning a
/// rename.
#[derive(Debug, Clone)]
pub struct QueueDir {
    root: PathBuf,
}

impl QueueDir {
    /// Bind a queue root path. No I/O happens until [`QueueDir::init`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the six state directories (idempotent). Every worker runs this
    /// on startup; submitters run it before writing.
    pub fn init(&self) -> Result<()> {
        for state in TaskState::ALL {
            let dir = self.state_dir(state);
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn state_dir(&self, state: TaskState) -> PathBuf {
        self.root.join(state.dir_name())
    }

    pub fn task_path(&self, state: TaskState, task_id: &str) -> PathBuf {
        self.state_dir(state).join(task_id)
    }

    /// Sorted snapshot of the task ids currently in `state`.
    ///
    /// Dot-prefixed submit temporaries and other non-task entries are
    /// skipped. A missing state directory reads as empty rather than as an
    /// error, so observers work against uninitialized roots.
    pub fn snapshot(&self, state: TaskState) -> Result<Vec<String>> {
        let dir = self.state_dir(state);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", dir.display()))
            }
        };

        let mut ids: Vec<String> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_task_file(name))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Move `task_id` from `from` to `to` with a single rename.
    ///
    /// Returns `Ok(false)` when the source file no longer exists: another
    /// worker won the claim, or an external actor moved or deleted the task.
    /// That is the queue's normal contention outcome, not an error.
    pub fn transition(&self, task_id: &str, from: TaskState, to: TaskState) -> Result<bool> {
        let src = self.task_path(from, task_id);
        let dst = self.task_path(to, task_id);
        match fs::rename(&src, &dst) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("failed to move {task_id} from {from} to {to}")),
        }
    }

    /// Locate `task_id`, searching the state directories in lifecycle order.
    pub fn state_of(&self, task_id: &str) -> Option<TaskState> {
        TaskState::ALL
            .into_iter()
            .find(|&state| self.task_path(state, task_id).exists())
    }

    // Operator actions. These are the only sanctioned external mutations of
    // the queue; everything else belongs to the worker holding the task.

    /// Suspend a running task: rename `active → paused`. The supervising
    /// worker notices the move and SIGSTOPs the process tree. Returns false
    /// if the task was not in `active`.
    pub fn pause(&self, task_id: &str) -> Result<bool> {
        self.transition(task_id, TaskState::Active, TaskState::Paused)
    }

    /// Resume a paused task: rename `paused → active`. The worker SIGCONTs
    /// the tree and supervision picks up where it left off. Returns false if
    /// the task was not in `paused`.
    pub fn resume(&self, task_id: &str) -> Result<bool> {
        self.transition(task_id, TaskState::Paused, TaskState::Active)
    }

    /// Cancel a task by deleting its file from `active` or `paused`. The
    /// worker kills the process tree when it notices and performs no rename:
    /// the deletion stands. Returns false if the task was in neither.
    pub fn cancel(&self, task_id: &str) -> Result<bool> {
        for state in [TaskState::Active, TaskState::Paused] {
            let path = self.task_path(state, task_id);
            match fs::remove_file(&path) {
                Ok(()) => return Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to delete {}", path.display()))
                }
            }
        }
        Ok(false)
    }

    /// Requeue a failed task: rename `failed → queued`. The appended output
    /// log stays in the file; re-execution is well defined because command
    /// parsing stops at the first `===` banner.
    pub fn retry(&self, task_id: &str) -> Result<bool> {
        self.transition(task_id, TaskState::Failed, TaskState::Queued)
    }
}
