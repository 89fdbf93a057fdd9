//! Process-tree signalling.
//!
//! Task commands run in their own session (see the worker's spawn path), but
//! descendants are free to change process group, so signalling the negative
//! pgid alone can miss part of the tree. These helpers enumerate the live
//! tree through `/proc` and signal every member individually.

use std::fs;
use std::time::{Duration, Instant};

/// Pids of all live descendants of `pid`: children, grandchildren, and so
/// on. Zombies are excluded; they cannot be signalled to any effect.
pub fn descendants(pid: u32) -> Vec<u32> {
    let mut edges: Vec<(u32, u32)> = Vec::new();
    if let Ok(entries) = fs::read_dir("/proc") {
        for entry in entries.flatten() {
            let Some(candidate) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };
            if let Some((ppid, state)) = proc_stat(candidate) {
                if state != 'Z' {
                    edges.push((ppid, candidate));
                }
            }
        }
    }

    let mut tree: Vec<u32> = Vec::new();
    let mut frontier = vec![pid];
    while let Some(parent) = frontier.pop() {
        for &(ppid, child) in &edges {
            if ppid == parent && !tree.contains(&child) {
                tree.push(child);
                frontier.push(child);
            }
        }
    }
    tree
}

/// Send `sig` to every live descendant of `pid`, then to `pid` itself, and
/// wait up to `grace` for the whole tree to exit. Returns true when no
/// process in the tree remains (a zombie awaiting its parent's reap counts
/// as gone). Pass a zero `grace` to signal without waiting.
///
/// Processes that already exited are skipped silently, and the calling
/// process is never signalled.
pub fn kill_tree(pid: u32, sig: libc::c_int, grace: Duration) -> bool {
    let own_pid = std::process::id();

    // Descendants first, root last, so the root cannot observe its children
    // dying and fork replacements in between.
    for target in descendants(pid) {
        if target != own_pid {
            unsafe { libc::kill(target as libc::pid_t, sig) };
        }
    }
    if pid != own_pid {
        unsafe { libc::kill(pid as libc::pid_t, sig) };
    }

    let deadline = Instant::now() + grace;
    loop {
        if !tree_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// True while `pid` or any of its descendants is running.
fn tree_alive(pid: u32) -> bool {
    matches!(proc_stat(pid), Some((_, state)) if state != 'Z') || !descendants(pid).is_empty()
}

/// Parse `(ppid, state)` out of `/proc/<pid>/stat`. The comm field is
/// parenthesized and may itself contain spaces or parentheses, so fields are
/// taken from after the LAST closing parenthesis.
fn proc_stat(pid: u32) -> Option<(u32, char)> {
    let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let rest = stat.get(stat.rfind(')')? + 1..)?;
    let mut fields = rest.split_whitespace();
    let state = fields.next()?.chars().next()?;
    let ppid = fields.next()?.parse().ok()?;
    Some((ppid, state))
}
