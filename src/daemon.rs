use std::io;

use crate::error::{AesdError, Result};

/// Detaches the process from its terminal.
///
/// The process forks, the parent exits with status 0, and the child becomes a session leader
/// whose working directory is `/` and whose standard streams point at `/dev/null`.
///
/// Must be called before any other thread is started.
pub fn daemonize() -> Result<()> {
    // SAFETY: the process is still single threaded, and every call is checked
    unsafe {
        match libc::fork() {
            -1 => return Err(last_os_error("fork")),
            0 => {}
            _ => libc::_exit(0),
        }

        if libc::setsid() == -1 {
            return Err(last_os_error("setsid"));
        }

        if libc::chdir(b"/\0".as_ptr() as *const libc::c_char) == -1 {
            return Err(last_os_error("chdir"));
        }

        let fd = libc::open(b"/dev/null\0".as_ptr() as *const libc::c_char, libc::O_RDWR);
        if fd == -1 {
            return Err(last_os_error("open /dev/null"));
        }
        for target in &[libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
            if libc::dup2(fd, *target) == -1 {
                return Err(last_os_error("dup2"));
            }
        }
        if fd > libc::STDERR_FILENO {
            libc::close(fd);
        }
    }
    Ok(())
}

fn last_os_error(call: &str) -> AesdError {
    let e = io::Error::last_os_error();
    AesdError::Io(io::Error::new(e.kind(), format!("call to {}() failed: {}", call, e)))
}
