//! SIGTERM receiver for the worker loop.
//!
//! SIGTERM is the cancellation contract: operators stop a worker with it and
//! expect the held task back in `queued`. Filesystem work is not
//! async-signal-safe, so the handler only stores a flag; the supervision
//! loop polls [`term_requested`] at every blocking point and performs the
//! release as a normal code path.

use std::sync::atomic::{AtomicBool, Ordering};

static TERM_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigterm(_sig: libc::c_int) {
    TERM_REQUESTED.store(true, Ordering::SeqCst);
}

/// Install the SIGTERM handler for this process. Idempotent.
pub fn install_sigterm_handler() {
    let handler = on_sigterm as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }
}

/// True once SIGTERM has been received.
pub fn term_requested() -> bool {
    TERM_REQUESTED.load(Ordering::SeqCst)
}
