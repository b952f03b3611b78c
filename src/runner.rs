use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::artifacts::ArtifactOutput;
use crate::error::{Error, Result};
use crate::tools::{Capture, ToolDef};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Where a tool's console output lands.
pub fn console_path(tool: &ToolDef, artifacts_dir: &Path) -> PathBuf {
    match &tool.capture {
        Capture::Redirect(file) => artifacts_dir.join(file),
        Capture::ToolWritten(_) => artifacts_dir.join("logs").join(format!("{}.log", tool.name)),
    }
}

/// The artifact file a tool produces, whether it writes it or the runner does.
pub fn artifact_path(tool: &ToolDef, artifacts_dir: &Path) -> PathBuf {
    artifacts_dir.join(tool.capture.file_name())
}

/// Runs a staged tool once, with the artifacts folder as working directory.
///
/// stdout and stderr share one file handle, so their output interleaves in
/// the order the tool wrote it. A non-zero exit is an error for the caller to
/// log; whatever the tool wrote is kept either way.
pub fn run_tool(
    tool: &ToolDef,
    executable: &Path,
    artifacts_dir: &Path,
    timeout: Option<Duration>,
) -> Result<ArtifactOutput> {
    let artifact = artifact_path(tool, artifacts_dir);
    let console = console_path(tool, artifacts_dir);

    for dir in [artifact.parent(), console.parent()].into_iter().flatten() {
        fs::create_dir_all(dir).map_err(|source| output_error(tool, dir, source))?;
    }

    let stdout = File::create(&console).map_err(|source| output_error(tool, &console, source))?;
    let stderr = stdout
        .try_clone()
        .map_err(|source| output_error(tool, &console, source))?;

    let child = Command::new(executable)
        .args(tool.resolved_args(&artifact))
        .current_dir(artifacts_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(|source| Error::Launch {
            tool: tool.name.clone(),
            source,
        })?;

    let status = wait(child, tool, timeout)?;
    if !status.success() {
        return Err(Error::ToolExit {
            tool: tool.name.clone(),
            code: status.code(),
        });
    }

    Ok(ArtifactOutput {
        name: tool.name.clone(),
        path: artifact,
    })
}

fn wait(mut child: Child, tool: &ToolDef, timeout: Option<Duration>) -> Result<ExitStatus> {
    let launch = |source: std::io::Error| Error::Launch {
        tool: tool.name.clone(),
        source,
    };

    let Some(limit) = timeout else {
        return child.wait().map_err(launch);
    };

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(launch)? {
            return Ok(status);
        }
        let elapsed = started.elapsed();
        if elapsed >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Timeout {
                tool: tool.name.clone(),
                after: limit,
            });
        }
        thread::sleep(POLL_INTERVAL.min(limit - elapsed));
    }
}

fn output_error(tool: &ToolDef, path: &Path, source: std::io::Error) -> Error {
    Error::Output {
        tool: tool.name.clone(),
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolPayload, OUTPUT_ARG};
    use std::borrow::Cow;
    use tempfile::TempDir;

    fn tool(name: &str, args: &[&str], capture: Capture) -> ToolDef {
        ToolDef {
            name: name.into(),
            file_name: format!("{name}.exe"),
            args: args.iter().map(|a| a.to_string()).collect(),
            capture,
            payload: ToolPayload::Embedded(Cow::Borrowed(b"")),
        }
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn launch_failure_is_recoverable() {
        let tmp = TempDir::new().unwrap();
        let t = tool("PsList", &[], Capture::Redirect("ProcessList.txt".into()));

        let err = run_tool(&t, &tmp.path().join("missing.exe"), tmp.path(), None).unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn tool_written_console_goes_to_logs() {
        let t = tool(
            "LastActivityView",
            &["/scomma", OUTPUT_ARG],
            Capture::ToolWritten("LastActivityView.csv".into()),
        );
        assert_eq!(
            console_path(&t, Path::new("A")),
            Path::new("A").join("logs").join("LastActivityView.log")
        );
    }

    #[cfg(unix)]
    #[test]
    fn merges_stdout_and_stderr_into_artifact() {
        let tmp = TempDir::new().unwrap();
        let exe = script(tmp.path(), "pslist", "echo out-line\necho err-line >&2\necho \"$@\"");
        let artifacts = tmp.path().join("Artifacts");
        let t = tool("PsList", &["-t", "/accepteula"], Capture::Redirect("ProcessList.txt".into()));

        let output = run_tool(&t, &exe, &artifacts, None).unwrap();
        assert_eq!(output.path, artifacts.join("ProcessList.txt"));

        let text = fs::read_to_string(&output.path).unwrap();
        assert_eq!(text, "out-line\nerr-line\n-t /accepteula\n");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_keeps_output() {
        let tmp = TempDir::new().unwrap();
        let exe = script(tmp.path(), "tcpvcon", "echo partial\nexit 3");
        let t = tool("TcpView", &[], Capture::Redirect("LogsTCPView.csv".into()));

        let err = run_tool(&t, &exe, tmp.path(), None).unwrap_err();
        assert!(matches!(err, Error::ToolExit { code: Some(3), .. }));
        assert_eq!(
            fs::read_to_string(tmp.path().join("LogsTCPView.csv")).unwrap(),
            "partial\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn tool_written_output_receives_path() {
        let tmp = TempDir::new().unwrap();
        let exe = script(tmp.path(), "lav", "echo rows > \"$2\"\necho done");
        let t = tool(
            "LastActivityView",
            &["/scomma", OUTPUT_ARG],
            Capture::ToolWritten("LastActivityView.csv".into()),
        );

        run_tool(&t, &exe, tmp.path(), None).unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("LastActivityView.csv")).unwrap(),
            "rows\n"
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("logs").join("LastActivityView.log")).unwrap(),
            "done\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn hung_tool_is_killed_after_timeout() {
        let tmp = TempDir::new().unwrap();
        let exe = script(tmp.path(), "hang", "exec sleep 30");
        let t = tool("Autoruns", &[], Capture::Redirect("Autoruns.csv".into()));

        let started = Instant::now();
        let err = run_tool(&t, &exe, tmp.path(), Some(Duration::from_millis(300))).unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
