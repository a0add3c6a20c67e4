//! Ctrl-C handling for runs.
//!
//! The first SIGINT cancels the run's token so the enactor stops
//! dispatching and rolls back. The handler is then reset, so a second
//! SIGINT terminates the process.

use enactor::CancelToken;

#[cfg(unix)]
mod imp {
    use enactor::CancelToken;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    static INTERRUPTED: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_sigint(_signum: libc::c_int) {
        INTERRUPTED.store(true, Ordering::SeqCst);
    }

    pub fn install(token: &CancelToken) {
        INTERRUPTED.store(false, Ordering::SeqCst);

        // SAFETY: the handler only stores to an atomic, which is
        // async-signal-safe.
        let previous = unsafe {
            libc::signal(
                libc::SIGINT,
                on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t,
            )
        };
        if previous == libc::SIG_ERR {
            log::warn!("could not install SIGINT handler, Ctrl-C will abort without rollback");
            return;
        }

        let token = token.clone();
        let spawned = thread::Builder::new()
            .name("sigint-watch".to_string())
            .spawn(move || {
                while !INTERRUPTED.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(100));
                }
                log::warn!("interrupted, stopping after in-flight instructions");
                token.cancel();
                // SAFETY: restoring the default disposition has no
                // preconditions.
                unsafe {
                    libc::signal(libc::SIGINT, libc::SIG_DFL);
                }
            });
        if let Err(e) = spawned {
            log::warn!("could not watch for SIGINT: {e}");
        }
    }

    #[cfg(test)]
    pub fn raise_flag() {
        INTERRUPTED.store(true, Ordering::SeqCst);
    }
}

#[cfg(not(unix))]
mod imp {
    use enactor::CancelToken;

    pub fn install(_token: &CancelToken) {
        log::debug!("Ctrl-C cancellation not supported on this platform");
    }
}

/// Cancel `token` on the first Ctrl-C
pub fn cancel_on_interrupt(token: &CancelToken) {
    imp::install(token);
}
