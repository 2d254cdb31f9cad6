//! Thin wrappers over the process and descriptor system calls.
//!
//! Everything marked "child side" runs between `fork` and `execvp`/`_exit`
//! in a process whose parent has several threads, so those helpers only make
//! async-signal-safe calls and never allocate.

use std::ffi::{CStr, CString, NulError};
use std::io;
use std::os::fd::RawFd;
use std::ptr;

use crate::jobs::Pid;

pub(crate) enum Fork {
    Parent(Pid),
    Child,
}

/// # Safety
///
/// In the child only async-signal-safe operations may run until the process
/// calls `execvp` or `_exit`.
pub(crate) unsafe fn fork() -> io::Result<Fork> {
    match unsafe { libc::fork() } {
        -1 => Err(io::Error::last_os_error()),
        0 => Ok(Fork::Child),
        pid => Ok(Fork::Parent(pid)),
    }
}

/// Convert a raw `waitpid` status into shell-style exit code semantics.
///
/// Processes terminated by a signal map to `128 + signal`.
pub fn exit_code_from_wait_status(raw_status: libc::c_int) -> Option<i32> {
    if libc::WIFEXITED(raw_status) {
        return Some(libc::WEXITSTATUS(raw_status));
    }

    if libc::WIFSIGNALED(raw_status) {
        return Some(128 + libc::WTERMSIG(raw_status));
    }

    None
}

/// Block until `pid` exits and return its exit code.
pub fn wait_for_pid(pid: Pid) -> io::Result<i32> {
    let mut raw_status: libc::c_int = 0;

    loop {
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, 0) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }

        if let Some(code) = exit_code_from_wait_status(raw_status) {
            return Ok(code);
        }
    }
}

/// A null-terminated argv ready for `execvp`.
pub(crate) struct ExecArgs {
    // Owns the strings `pointers` refers to.
    _args: Vec<CString>,
    pointers: Vec<*const libc::c_char>,
}

impl ExecArgs {
    pub(crate) fn new(argv: &[String]) -> Result<Self, NulError> {
        let args = argv
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut pointers: Vec<*const libc::c_char> = args.iter().map(|a| a.as_ptr()).collect();
        pointers.push(ptr::null());
        Ok(Self {
            _args: args,
            pointers,
        })
    }

    /// Child side. Replaces the process image; returns only on failure.
    pub(crate) fn exec(&self) {
        unsafe {
            libc::execvp(self.pointers[0], self.pointers.as_ptr());
        }
    }
}

/// Child side.
pub(crate) fn open_fd(path: &CStr, flags: libc::c_int, mode: libc::mode_t) -> Option<RawFd> {
    loop {
        let fd = unsafe { libc::open(path.as_ptr(), flags, libc::c_uint::from(mode)) };
        if fd >= 0 {
            return Some(fd);
        }
        if io::Error::last_os_error().raw_os_error() != Some(libc::EINTR) {
            return None;
        }
    }
}

/// Child side. Rebind `target` to `fd`, then close `fd`.
pub(crate) fn move_fd(fd: RawFd, target: RawFd) -> bool {
    if fd == target {
        return true;
    }
    let ok = unsafe { libc::dup2(fd, target) } >= 0;
    close_fd(fd);
    ok
}

/// Child side.
pub(crate) fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// Child side. Best effort: a short or failed write is not retried past EOF.
pub(crate) fn write_fd(fd: RawFd, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        let rc = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
        if rc < 0 {
            if io::Error::last_os_error().raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return;
        }
        if rc == 0 {
            return;
        }
        bytes = &bytes[rc as usize..];
    }
}

/// Child side. Rust starts with SIGPIPE ignored and exec keeps ignored
/// dispositions, so stages must get the default back.
pub(crate) fn restore_default_signal(signal: libc::c_int) {
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
    }
}

/// Child side. Leave without running atexit handlers or flushing buffers
/// inherited from the interpreter.
pub(crate) fn exit_child(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_args_are_null_terminated() {
        let args = ExecArgs::new(&["echo".to_string(), "hi".to_string()]).unwrap();
        assert_eq!(args.pointers.len(), 3);
        assert!(args.pointers[2].is_null());
    }

    #[test]
    fn exec_args_reject_nul() {
        assert!(ExecArgs::new(&["ec\0ho".to_string()]).is_err());
    }

    #[test]
    fn wait_reports_exit_code() {
        let child = std::process::Command::new("sh")
            .args(["-c", "exit 7"])
            .spawn()
            .unwrap();
        let code = wait_for_pid(child.id() as Pid).unwrap();
        assert_eq!(code, 7);
    }

    #[test]
    fn wait_reports_signal_as_128_plus() {
        let child = std::process::Command::new("sh")
            .args(["-c", "kill -TERM $$"])
            .spawn()
            .unwrap();
        let code = wait_for_pid(child.id() as Pid).unwrap();
        assert_eq!(code, 128 + libc::SIGTERM);
    }

    #[test]
    fn wait_for_unknown_child_fails() {
        assert!(wait_for_pid(i32::MAX).is_err());
    }
}
