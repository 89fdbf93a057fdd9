use anyhow::{bail, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::queue::{QueueDir, TaskState};

/// Point-in-time listing of every task in the queue, grouped by state.
///
/// Serializable so operators can feed `status --json` into scripts; the
/// snapshot is advisory, since tasks keep moving while it is being read.
#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub root: PathBuf,
    pub states: Vec<StateEntry>,
}

#[derive(Debug, Serialize)]
pub struct StateEntry {
    pub state: TaskState,
    pub tasks: Vec<String>,
}

/// Collect a status snapshot across all six state directories.
pub fn queue_status(queue: &QueueDir) -> Result<QueueStatus> {
    let mut states = Vec::with_capacity(TaskState::ALL.len());
    for state in TaskState::ALL {
        states.push(StateEntry {
            state,
            tasks: queue.snapshot(state)?,
        });
    }
    Ok(QueueStatus {
        root: queue.root().to_path_buf(),
        states,
    })
}

/// Render the status snapshot as pretty-printed JSON.
pub fn status_json(queue: &QueueDir) -> Result<String> {
    Ok(serde_json::to_string_pretty(&queue_status(queue)?)?)
}

/// Print queue state: for each non-empty state directory, the task ids and
/// a count.
pub fn print_status(queue: &QueueDir) -> Result<()> {
    let status = queue_status(queue)?;
    let mut total = 0usize;

    for entry in &status.states {
        if entry.tasks.is_empty() {
            continue;
        }
        total += entry.tasks.len();
        println!("{} ({}):", entry.state, entry.tasks.len());
        for task_id in &entry.tasks {
            println!("  {task_id}");
        }
    }

    if total == 0 {
        println!("No tasks in {}", status.root.display());
    }
    Ok(())
}

/// Print a task file and its current state (searches all state
/// directories).
pub fn show_task(queue: &QueueDir, task_id: &str) -> Result<()> {
    let Some(state) = queue.state_of(task_id) else {
        bail!("task '{task_id}' not found in {}", queue.root().display());
    };

    println!("=== Task: {task_id} ===");
    println!("State: {state}");
    let content = fs::read_to_string(queue.task_path(state, task_id))?;
    print!("{content}");
    Ok(())
}
