use chrono::Local;

/// Generate a fresh task id: `task_YYYYMMDD_HHMMSS_<9-digit-nanos>`.
///
/// Ids sort lexicographically by creation time, which is what gives workers
/// their FIFO-ish selection order. The zero-padded nanosecond tail keeps
/// concurrent submitters on one host from colliding; cross-host collisions
/// are possible in principle and not prevented.
pub fn task_id() -> String {
    let now = Local::now();
    format!(
        "task_{}_{:09}",
        now.format("%Y%m%d_%H%M%S"),
        now.timestamp_subsec_nanos() % 1_000_000_000
    )
}

/// Generate the identity string for this worker process:
/// `worker_YYYYMMDD_HHMMSS_<short-hostname>_<pid>_gpus=<CUDA_VISIBLE_DEVICES>`.
///
/// Embedded in the task-file banner before the command output. Attribution
/// only, never used for coordination.
pub fn worker_id() -> String {
    let now = Local::now();
    let gpus = std::env::var("CUDA_VISIBLE_DEVICES").unwrap_or_default();
    format!(
        "worker_{}_{}_{}_gpus={}",
        now.format("%Y%m%d_%H%M%S"),
        short_hostname(),
        std::process::id(),
        gpus
    )
}

/// True for basenames that name a task file.
///
/// State-directory snapshots use this to skip dot-prefixed submit
/// temporaries and anything else that strays into a state directory.
pub fn is_task_file(name: &str) -> bool {
    name.starts_with("task_")
}

/// Hostname up to the first dot, or `localhost` when unavailable.
fn short_hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..len]).into_owned();
    match name.split('.').next() {
        Some(short) if !short.is_empty() => short.to_string(),
        _ => "localhost".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_shape() {
        let id = task_id();
        assert!(id.starts_with("task_"));
        // task_ + YYYYMMDD + _ + HHMMSS + _ + 9 digits
        assert_eq!(id.len(), "task_".len() + 8 + 1 + 6 + 1 + 9);
        let nanos = id.rsplit('_').next().unwrap();
        assert_eq!(nanos.len(), 9);
        assert!(nanos.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_task_ids_are_distinct_and_ordered() {
        let a = task_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = task_id();
        assert_ne!(a, b);
        assert!(a < b, "{a} should sort before {b}");
    }

    #[test]
    fn test_worker_id_shape() {
        let id = worker_id();
        assert!(id.starts_with("worker_"));
        assert!(id.contains(&format!("_{}_", std::process::id())));
        assert!(id.contains("_gpus="));
    }

    #[test]
    fn test_is_task_file() {
        assert!(is_task_file("task_20240101_120000_000000001"));
        assert!(!is_task_file(".task_20240101_120000_000000001.tmp"));
        assert!(!is_task_file("notes.txt"));
    }

    #[test]
    fn test_short_hostname_has_no_dot() {
        assert!(!short_hostname().contains('.'));
        assert!(!short_hostname().is_empty());
    }
}
