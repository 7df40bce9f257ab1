// src/build/command.rs

//! Structured subprocess invocation
//!
//! Every external step is described as a [`CommandSpec`]: program, ordered
//! arguments, working directory and environment. Only the build tool itself
//! goes through a shell, via [`CommandSpec::trap_guarded`], so that recipe
//! hooks run in a real bash and a Ctrl-C reaches auric instead of the build.

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use wait_timeout::ChildExt;

/// How often a supervised child is polled for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Wrapper script: ignore SIGINT, then become the build tool
const TRAP_WRAPPER: &str = "trap '' INT; exec \"$0\" \"$@\"";

/// Output handling for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Child shares auric's terminal (interactive prompts work)
    Inherit,
    /// stdout and stderr are captured
    Capture,
}

/// A fully described process invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
    output: OutputMode,
}

/// Result of a finished command
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or -1 when killed by a signal
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }
}

impl CommandSpec {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            output: OutputMode::Inherit,
        }
    }

    /// Run `tool args..` inside `bash -c` with SIGINT ignored
    pub fn trap_guarded<I, S>(tool: impl AsRef<OsStr>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Self::new("bash")
            .arg("-c")
            .arg(TRAP_WRAPPER)
            .arg(tool)
            .args(args)
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn capture(mut self) -> Self {
        self.output = OutputMode::Capture;
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Human-readable command line for logs and errors
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        match self.output {
            OutputMode::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            OutputMode::Capture => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
        }
        cmd
    }

    /// Spawn and wait
    ///
    /// The child is killed when `timeout` elapses (`TimeoutError`) or when
    /// `cancel` fires (`Cancelled`). A non-zero exit is not an error here;
    /// callers decide what it means.
    pub fn run(&self, timeout: Option<Duration>, cancel: &CancelToken) -> Result<CommandOutput> {
        cancel.check()?;
        debug!("running: {}", self.display());
        if let Some(ref dir) = self.cwd {
            trace!("in {}", dir.display());
        }

        let mut child = self.to_command().spawn().map_err(|e| {
            Error::InitError(format!(
                "Failed to run {}: {}",
                self.program.to_string_lossy(),
                e
            ))
        })?;

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = self.supervise(&mut child, timeout, cancel)?;

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);
        if !status.success() && !stderr.is_empty() {
            for line in stderr.lines() {
                warn!("[{}] {}", self.program.to_string_lossy(), line);
            }
        }

        Ok(CommandOutput {
            status,
            stdout,
            stderr,
        })
    }

    /// Run and require a zero exit status
    pub fn run_checked(
        &self,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<CommandOutput> {
        let output = self.run(timeout, cancel)?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::IoError(format!(
                "{} failed with exit code {}",
                self.display(),
                output.code()
            )))
        }
    }

    fn supervise(
        &self,
        child: &mut Child,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ExitStatus> {
        let _guard = cancel.supervise();
        let started = Instant::now();

        loop {
            if let Some(status) = child.wait_timeout(POLL_INTERVAL)? {
                return Ok(status);
            }

            if cancel.is_cancelled() {
                warn!("interrupted, stopping {}", self.display());
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Cancelled);
            }

            if let Some(limit) = timeout
                && started.elapsed() >= limit
            {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::TimeoutError(format!(
                    "{} after {} seconds",
                    self.display(),
                    limit.as_secs()
                )));
            }
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> Option<JoinHandle<String>> {
    source.map(|mut src| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = src.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// True when running as root (makepkg refuses to build as root)
pub fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_display() {
        let spec = CommandSpec::new("git")
            .args(["clone", "--depth=1"])
            .arg("https://aur.archlinux.org/foo.git")
            .arg(".")
            .current_dir("/tmp");
        assert_eq!(
            spec.display(),
            "git clone --depth=1 https://aur.archlinux.org/foo.git ."
        );
        assert_eq!(spec.working_dir(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_trap_guarded_layout() {
        let spec = CommandSpec::trap_guarded("makepkg", ["-sr"]);
        assert_eq!(spec.program(), "bash");
        let args: Vec<_> = spec
            .arguments()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[0], "-c");
        assert!(args[1].contains("trap '' INT"));
        assert_eq!(&args[2..], &["makepkg", "-sr"]);
    }

    #[test]
    fn test_capture_output_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let output = CommandSpec::new("sh")
            .args(["-c", "echo \"$GREETING\"; pwd"])
            .env("GREETING", "hello")
            .current_dir(dir.path())
            .capture()
            .run(None, &CancelToken::new())
            .unwrap();
        assert!(output.success());
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("hello"));
        let cwd = lines.next().unwrap();
        assert!(cwd.ends_with(dir.path().file_name().unwrap().to_str().unwrap()));
    }

    #[test]
    fn test_trap_guarded_passes_arguments() {
        let output = CommandSpec::trap_guarded("echo", ["a b", "c"])
            .capture()
            .run(None, &CancelToken::new())
            .unwrap();
        assert_eq!(output.stdout.trim(), "a b c");
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let spec = CommandSpec::new("sh").args(["-c", "exit 3"]).capture();
        let output = spec.run(None, &CancelToken::new()).unwrap();
        assert_eq!(output.code(), 3);
        assert!(spec.run_checked(None, &CancelToken::new()).is_err());
    }

    #[test]
    fn test_timeout_kills_child() {
        let result = CommandSpec::new("sleep")
            .arg("5")
            .capture()
            .run(Some(Duration::from_millis(300)), &CancelToken::new());
        assert!(matches!(result, Err(Error::TimeoutError(_))));
    }

    #[test]
    fn test_cancelled_before_spawn() {
        let token = CancelToken::new();
        token.cancel();
        let result = CommandSpec::new("true").run(None, &token);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_missing_program() {
        let result = CommandSpec::new("/nonexistent/auric-tool").run(None, &CancelToken::new());
        assert!(matches!(result, Err(Error::InitError(_))));
    }
}
