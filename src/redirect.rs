use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::ShellError;
use crate::process;

/// Mode for output files created by a redirection: owner read/write,
/// group and other read.
pub const OUTPUT_FILE_MODE: libc::mode_t = 0o644;

/// A file to rebind, resolved before fork so the child never allocates.
struct Target {
    path: CString,
    diagnostic: Vec<u8>,
}

impl Target {
    fn new(path: &Path, what: &str) -> Result<Self, ShellError> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| ShellError::InvalidArgument(path.display().to_string()))?;
        Ok(Self {
            path: c_path,
            diagnostic: format!("pipesh: {}: cannot open {what} file\n", path.display()).into_bytes(),
        })
    }
}

/// Standard input/output rebinding for one pipeline stage.
#[derive(Default)]
pub(crate) struct Redirection {
    input: Option<Target>,
    output: Option<Target>,
}

impl Redirection {
    pub(crate) fn new(input: Option<&Path>, output: Option<&Path>) -> Result<Self, ShellError> {
        Ok(Self {
            input: input.map(|p| Target::new(p, "input")).transpose()?,
            output: output.map(|p| Target::new(p, "output")).transpose()?,
        })
    }

    /// Child side. Opens and rebinds the files; a failure terminates this
    /// child with status 1 after printing a diagnostic.
    pub(crate) fn apply(&self) {
        if let Some(input) = &self.input {
            rebind(input, libc::O_RDONLY, libc::STDIN_FILENO);
        }
        if let Some(output) = &self.output {
            rebind(
                output,
                libc::O_RDWR | libc::O_CREAT | libc::O_TRUNC,
                libc::STDOUT_FILENO,
            );
        }
    }
}

fn rebind(target: &Target, flags: libc::c_int, fd: libc::c_int) {
    let opened = process::open_fd(&target.path, flags, OUTPUT_FILE_MODE);
    match opened {
        Some(opened) if process::move_fd(opened, fd) => {}
        _ => {
            process::write_fd(libc::STDERR_FILENO, &target.diagnostic);
            process::exit_child(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use crate::process::{Fork, wait_for_pid};

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pipesh_redirect_{label}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Fork, apply `redirection`, write `text` to stdout and exit.
    fn run_in_child(redirection: &Redirection, text: &[u8]) -> i32 {
        match unsafe { process::fork() }.unwrap() {
            Fork::Child => {
                redirection.apply();
                process::write_fd(libc::STDOUT_FILENO, text);
                process::exit_child(0);
            }
            Fork::Parent(pid) => wait_for_pid(pid).unwrap(),
        }
    }

    #[test]
    fn nul_in_path_is_rejected() {
        let path = PathBuf::from("bad\0name");
        assert!(matches!(
            Redirection::new(Some(&path), None),
            Err(ShellError::InvalidArgument(_))
        ));
    }

    #[test]
    fn empty_redirection_has_nothing() {
        let redirection = Redirection::new(None, None).unwrap();
        assert!(redirection.input.is_none());
        assert!(redirection.output.is_none());
    }

    #[test]
    fn output_file_is_created_and_truncated() {
        let dir = temp_dir("truncate");
        let path = dir.join("out.txt");
        let redirection = Redirection::new(None, Some(&path)).unwrap();

        assert_eq!(run_in_child(&redirection, b"a much longer first line\n"), 0);
        assert_eq!(run_in_child(&redirection, b"short\n"), 0);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "short\n");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o600, 0o600);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unwritable_output_terminates_only_the_child() {
        let dir = temp_dir("unwritable");
        let path = dir.join("no-such-dir").join("out.txt");
        let redirection = Redirection::new(None, Some(&path)).unwrap();

        assert_eq!(run_in_child(&redirection, b"lost\n"), 1);
        assert!(!path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_input_terminates_only_the_child() {
        let dir = temp_dir("missing");
        let path = dir.join("does-not-exist.txt");
        let redirection = Redirection::new(Some(&path), None).unwrap();

        assert_eq!(run_in_child(&redirection, b""), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
