use anyhow::{Context, Result};
use std::fs;

use crate::queue::{QueueDir, TaskState};
use crate::task::naming;

/// A freshly queued task: its id and its completion witness.
///
/// The witness is a shell expression (`test -f '<Q>/done/<id>'`) that exits 0
/// exactly when the task has completed successfully. Because it tests the
/// same queue directory, it can be passed verbatim as the precondition of a
/// later submission, chaining tasks into a DAG without any scheduler.
#[derive(Debug, Clone)]
pub struct Submission {
    pub task_id: String,
    pub witness: String,
}

/// Queue a command for execution.
///
/// Writes `<chk>\n---\n<cmd>` under a dot-prefixed temporary name in
/// `queued/` and renames it into place, so no worker can observe a partially
/// written task. `chk` defaults to `true` (run unconditionally). State
/// directories are created on demand.
///
/// The only failure mode is an I/O error when the queue root is not
/// writable.
pub fn submit(queue: &QueueDir, cmd: &str, chk: Option<&str>) -> Result<Submission> {
    queue.init()?;

    let task_id = naming::task_id();
    let tmp_path = queue
        .state_dir(TaskState::Queued)
        .join(format!(".{task_id}.tmp"));
    let task_path = queue.task_path(TaskState::Queued, &task_id);

    let content = format!("{}\n---\n{}", chk.unwrap_or("true"), cmd);
    fs::write(&tmp_path, content)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &task_path)
        .with_context(|| format!("failed to publish {}", task_path.display()))?;

    let witness = witness(queue, &task_id);
    Ok(Submission { task_id, witness })
}

/// The completion witness for `task_id`.
pub fn witness(queue: &QueueDir, task_id: &str) -> String {
    format!(
        "test -f '{}'",
        queue.task_path(TaskState::Done, task_id).display()
    )
}
