use std::net::TcpListener;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{debug, info, warn};

use crate::error::Result;

/// A cancellation token shared by the accept loop, the workers and whoever requests termination.
///
/// Triggering it sets the termination flag and shuts the watched listening socket down, so an
/// accept call that is blocked on it returns with an error right away. The accept loop treats
/// that error as a clean stop because the flag is set.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug, Default)]
struct ShutdownInner {
    exiting: AtomicBool,
    listener: Mutex<Option<RawFd>>,
}

impl Shutdown {
    /// creates a token that has not been triggered
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once termination was requested
    pub fn is_triggered(&self) -> bool {
        self.inner.exiting.load(Ordering::SeqCst)
    }

    /// requests termination. Calling this more than once has no further effect.
    pub fn trigger(&self) {
        if self.inner.exiting.swap(true, Ordering::SeqCst) {
            return;
        }
        let listener = self.inner.listener.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(fd) = *listener {
            debug!(fd, "shutting down listening socket");
            shutdown_socket(fd);
        }
    }

    /// Registers the socket whose blocked `accept` must be interrupted on termination. If
    /// termination was already requested the socket is shut down immediately.
    ///
    /// The listener must outlive the registration, see [`unwatch`](#method.unwatch).
    pub(crate) fn watch(&self, listener: &TcpListener) {
        let fd = listener.as_raw_fd();
        let mut watched = self.inner.listener.lock().unwrap_or_else(|e| e.into_inner());
        *watched = Some(fd);
        if self.is_triggered() {
            shutdown_socket(fd);
        }
    }

    /// forgets the registered socket, so it is never touched after it was closed
    pub(crate) fn unwatch(&self) {
        let mut watched = self.inner.listener.lock().unwrap_or_else(|e| e.into_inner());
        *watched = None;
    }

    /// Spawns a thread that triggers this token when the process receives SIGINT or SIGTERM.
    ///
    /// # Errors
    /// returns an IO error if the signal handlers could not be registered
    pub fn install_signal_handler(&self) -> Result<()> {
        let mut signals = Signals::new(&[SIGINT, SIGTERM])?;
        let shutdown = self.clone();
        thread::Builder::new()
            .name("signal-handler".into())
            .spawn(move || {
                for signal in signals.forever() {
                    info!(signal, "Caught signal, exiting");
                    shutdown.trigger();
                }
            })?;
        Ok(())
    }
}

fn shutdown_socket(fd: RawFd) {
    // SAFETY: `fd` belongs to a listener that stays open while it is registered
    let rc = unsafe { libc::shutdown(fd, libc::SHUT_RDWR) };
    if rc == -1 {
        warn!(
            "could not shut down listening socket: {}",
            std::io::Error::last_os_error()
        );
    }
}
