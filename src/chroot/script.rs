//! Replay script generation.
//!
//! The script is text, so every path it names must be valid UTF-8.
//! Paths that aren't are refused rather than rewritten.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use crate::common::{join_escaped, shell_escape, write_file_mode};
use crate::pack::Run;

/// File name of the replay script inside the target directory.
pub const SCRIPT_NAME: &str = "script.sh";

const SCRIPT_HEADER: &str = "#!/bin/sh\n\n";

fn utf8(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        anyhow!(
            "{} is not valid UTF-8; the replay script can't name it",
            path.display()
        )
    })
}

/// Shell command replaying `run` from inside the root.
///
/// `argv[0]` is replaced by the binary path.
pub fn run_command(run: &Run) -> Result<String> {
    let binary = utf8(&run.binary)?;
    let argv = std::iter::once(binary).chain(run.argv.iter().skip(1).map(String::as_str));
    Ok(format!(
        "cd {} && {}",
        shell_escape(utf8(&run.workingdir)?),
        join_escaped(argv)
    ))
}

/// One script line: enter `root` as the run's user and replay it with `shell`.
pub fn chroot_line(run: &Run, root: &Path, shell: &Path) -> Result<String> {
    Ok(join_escaped([
        "chroot".to_string(),
        format!("--userspec={}", run.userspec()),
        utf8(root)?.to_string(),
        utf8(shell)?.to_string(),
        "-c".to_string(),
        run_command(run)?,
    ]))
}

/// Full script text for `runs`, in order.
pub fn render_script(runs: &[Run], root: &Path, shell: &Path) -> Result<String> {
    let mut script = String::from(SCRIPT_HEADER);
    for run in runs {
        script.push_str(&chroot_line(run, root, shell)?);
        script.push('\n');
    }
    Ok(script)
}

/// Write the replay script to `path`, replacing any previous one.
pub fn write_script(path: &Path, root: &Path, runs: &[Run], shell: &Path) -> Result<PathBuf> {
    let script = render_script(runs, root, shell)?;
    write_file_mode(path, script, 0o755)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::process::Command;
    use tempfile::TempDir;

    fn run(binary: &str, argv: &[&str], workingdir: &str) -> Run {
        Run {
            binary: PathBuf::from(binary),
            argv: argv.iter().map(|a| a.to_string()).collect(),
            workingdir: PathBuf::from(workingdir),
            uid: None,
            gid: None,
            architecture: None,
            hostname: None,
        }
    }

    #[test]
    fn test_run_command_replaces_argv0() {
        let r = run("/bin/app", &["app", "--flag"], "/home/user");
        assert_eq!(run_command(&r).unwrap(), "cd /home/user && /bin/app --flag");
    }

    #[test]
    fn test_run_command_empty_argv() {
        let r = run("/usr/bin/my tool", &[], "/");
        assert_eq!(run_command(&r).unwrap(), "cd / && '/usr/bin/my tool'");
    }

    #[test]
    fn test_chroot_line_format() {
        let mut r = run("/bin/app", &["/bin/app", "--flag"], "/home/user");
        r.uid = Some(1000);
        r.gid = Some(1000);
        let line = chroot_line(&r, Path::new("/tmp/exp dir/root"), Path::new("/bin/sh")).unwrap();
        assert_eq!(
            line,
            "chroot --userspec=1000:1000 '/tmp/exp dir/root' /bin/sh -c 'cd /home/user && /bin/app --flag'"
        );
    }

    #[test]
    fn test_arguments_survive_two_levels_of_shell() {
        let arg = "it's a \"test\" $HOME; `x` & *";
        let r = run("/bin/printf", &["printf", "%s", arg], "/");
        let command = run_command(&r).unwrap().replacen("cd / && /bin/printf", "printf", 1);

        let output = Command::new("sh").arg("-c").arg(&command).output().unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), arg);
    }

    #[test]
    fn test_script_header_and_order() {
        let runs = vec![
            run("/bin/first", &["first"], "/"),
            run("/bin/second", &["second"], "/tmp"),
        ];
        let text = render_script(&runs, Path::new("/r"), Path::new("/bin/sh")).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "#!/bin/sh");
        assert_eq!(lines[1], "");
        assert!(lines[2].ends_with("'cd / && /bin/first'"));
        assert!(lines[3].ends_with("'cd /tmp && /bin/second'"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_write_script_truncates_and_is_executable() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join(SCRIPT_NAME);
        fs::write(&script, "x".repeat(4096)).unwrap();

        let path = write_script(&script, Path::new("/r"), &[], Path::new("/bin/sh")).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh\n\n");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_non_utf8_root_is_refused() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = Path::new(OsStr::from_bytes(b"/tmp/exp\xff/root"));
        let runs = vec![run("/bin/app", &["app"], "/")];
        let err = render_script(&runs, root, Path::new("/bin/sh")).unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn test_non_utf8_workingdir_is_refused() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let mut r = run("/bin/app", &["app"], "/");
        r.workingdir = PathBuf::from(OsStr::from_bytes(b"/home/\xfe"));
        assert!(run_command(&r).is_err());
    }
}
