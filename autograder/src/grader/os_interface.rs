//! This module provides the interface between the grader and the programs it executes.
//!
//! Everything related to spawning a process, capturing what it prints and stopping it
//! when it runs for too long is implemented here.

use crate::error::{Error, Result};
use log::{debug, warn};
use std::{
    io::{self, Read, Write},
    path::PathBuf,
    process::{self, Child, Command, Stdio},
    sync::{Arc, Mutex, mpsc},
    thread,
    time::{Duration, Instant},
};

/// Timeout of a test when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long output may stay open after a timed program ended.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How a process ended.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RunStatus {
    /// The process ended on its own. Processes terminated by a signal report the
    /// negated signal number.
    Exited(i32),
    /// The process was still running at the deadline and got killed.
    Killed,
}

impl RunStatus {
    pub fn code(&self) -> Option<i32> {
        match self {
            RunStatus::Exited(code) => Some(*code),
            RunStatus::Killed => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ProcessOutput {
    /// Merged stdout and stderr, with trailing whitespace removed.
    pub output: String,
    pub status: RunStatus,
}

/// Spawns commands, optionally from inside a working directory.
///
/// A relative program path with a directory part (e.g. `./prog`) is resolved
/// against the working directory rather than the grader's own.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct ProcessRunner {
    working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }

    /// Runs `cmd` to completion or until `timeout` elapses, whichever comes first.
    ///
    /// Blocks the calling thread. Errors are reserved for failures to launch or
    /// wait for the process; a non-zero exit code or a timeout is a normal outcome.
    pub fn run(&self, cmd: &[String], stdin: Option<&str>, timeout: Duration) -> io::Result<ProcessOutput> {
        self.execute(cmd, stdin, Some(timeout))
    }

    /// Runs an auxiliary command (clean, build, unpack) with no timeout.
    ///
    /// Any non-zero exit is turned into [`Error::Command`] carrying the captured output.
    pub fn run_command(&self, cmd: &[String]) -> Result<()> {
        let result = self.execute(cmd, None, None).map_err(|err| {
            Error::io(
                format!("unable to run {cmd:?}: {err}"),
                cmd.first().map(String::as_str).unwrap_or_default(),
                err,
            )
        })?;
        match result.status {
            RunStatus::Exited(0) => Ok(()),
            status => Err(Error::Command {
                cmd: cmd.to_vec(),
                code: status.code().unwrap_or(-1),
                output: result.output,
            }),
        }
    }

    fn command(&self, cmd: &[String]) -> io::Result<Command> {
        let (program, args) = cmd
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        let mut program = PathBuf::from(program);
        let mut command = match &self.working_dir {
            Some(dir) => {
                if program.is_relative() && program.components().count() > 1 {
                    program = dir.join(program);
                }
                let mut command = Command::new(&program);
                command.current_dir(dir);
                command
            }
            None => Command::new(&program),
        };
        command.args(args);
        Ok(command)
    }

    fn execute(&self, cmd: &[String], stdin: Option<&str>, timeout: Option<Duration>) -> io::Result<ProcessOutput> {
        debug!("Running {cmd:?}");
        let (mut reader, writer) = io::pipe()?;

        let mut command = self.command(cmd)?;
        command
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(writer.try_clone()?)
            .stderr(writer);
        #[cfg(unix)]
        if timeout.is_some() {
            use std::os::unix::process::CommandExt;

            // anything the program forks can then be killed along with it
            command.process_group(0);
        }
        let mut child = command.spawn()?;
        // `command` still owns the write ends of the pipe; the reader gets EOF
        // only once the child and this handle are both gone.
        drop(command);

        if let (Some(content), Some(mut pipe)) = (stdin, child.stdin.take()) {
            let content = content.to_owned();
            thread::spawn(move || pipe.write_all(content.as_bytes()));
        }

        let collected = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = mpsc::channel();
        {
            let collected = Arc::clone(&collected);
            thread::spawn(move || {
                let _ = done_tx.send(drain(&mut reader, &collected));
            });
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let status = match wait_until(&mut child, deadline)? {
            Some(status) => RunStatus::Exited(exit_code(status)),
            None => {
                debug!("Deadline reached, killing {cmd:?}");
                kill_group(&mut child)?;
                child.wait()?;
                RunStatus::Killed
            }
        };

        if deadline.is_none() {
            done_rx.recv().map_err(|_| io::Error::other("output reader stopped"))??;
        } else if !wait_drained(&done_rx)? {
            // processes left behind by the program still hold the output open
            debug!("Output of {cmd:?} still open, killing its process group");
            kill_group(&mut child)?;
            if !wait_drained(&done_rx)? {
                warn!("Output of {cmd:?} left open after the program ended");
            }
        }

        let bytes = collected
            .lock()
            .map_err(|_| io::Error::other("output buffer poisoned"))?
            .clone();
        let output = String::from_utf8_lossy(&bytes).trim_end().to_string();
        debug!("Complete. Status {status:?}\n{output}");

        Ok(ProcessOutput { output, status })
    }
}

/// Copies everything read from `reader` into `collected` until end of file.
fn drain(reader: &mut impl Read, collected: &Mutex<Vec<u8>>) -> io::Result<()> {
    let mut chunk = [0; 4096];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        collected
            .lock()
            .map_err(|_| io::Error::other("output buffer poisoned"))?
            .extend_from_slice(&chunk[..n]);
    }
}

/// Waits up to [`DRAIN_GRACE`] for the output reader, returning whether it reached end of file.
fn wait_drained(done: &mpsc::Receiver<io::Result<()>>) -> io::Result<bool> {
    match done.recv_timeout(DRAIN_GRACE) {
        Ok(result) => result.map(|()| true),
        Err(mpsc::RecvTimeoutError::Timeout) => Ok(false),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(io::Error::other("output reader stopped")),
    }
}

/// Kills the process group led by `child`, or just `child` when there is none.
#[cfg(unix)]
fn kill_group(child: &mut Child) -> io::Result<()> {
    use nix::{
        sys::signal::{Signal, killpg},
        unistd::Pid,
    };

    if let Ok(pid) = i32::try_from(child.id())
        && killpg(Pid::from_raw(pid), Signal::SIGKILL).is_ok()
    {
        return Ok(());
    }
    child.kill()
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) -> io::Result<()> {
    child.kill()
}

/// Renders a command line the way it would be typed in a shell.
pub fn display_command(cmd: &[String]) -> String {
    shlex::try_join(cmd.iter().map(String::as_str)).unwrap_or_else(|_| format!("{cmd:?}"))
}

/// Waits for `child`, returning `None` if it is still running at `deadline`.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<process::ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(unix)]
fn exit_code(status: process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    mod run_tests {
        use super::*;

        #[test_log::test]
        fn should_capture_merged_output_and_trim_it() {
            let result = ProcessRunner::new()
                .run(&sh("echo out; echo err 1>&2; echo '  '"), None, DEFAULT_TIMEOUT)
                .unwrap();
            assert_eq!(
                result,
                ProcessOutput {
                    output: "out\nerr".to_string(),
                    status: RunStatus::Exited(0),
                }
            );
        }

        #[test_log::test]
        fn should_report_the_exit_code() {
            let result = ProcessRunner::new()
                .run(&sh("echo partial; exit 3"), None, DEFAULT_TIMEOUT)
                .unwrap();
            assert_eq!(result.status, RunStatus::Exited(3));
            assert_eq!(result.output, "partial");
        }

        #[test_log::test]
        fn should_feed_stdin_when_given() {
            let cmd = vec!["cat".to_string()];
            let result = ProcessRunner::new()
                .run(&cmd, Some("this is the input    !\n and this also\n"), DEFAULT_TIMEOUT)
                .unwrap();
            assert_eq!(result.output, "this is the input    !\n and this also");
        }

        #[test_log::test]
        fn should_close_stdin_when_not_given() {
            let cmd = vec!["cat".to_string()];
            let result = ProcessRunner::new()
                .run(&cmd, None, Duration::from_secs(5))
                .unwrap();
            assert_eq!(result.status, RunStatus::Exited(0));
            assert_eq!(result.output, "");
        }

        #[test_log::test]
        fn should_kill_a_process_past_its_deadline() {
            let cmd = vec!["sleep".to_string(), "5".to_string()];
            let start = Instant::now();
            let result = ProcessRunner::new()
                .run(&cmd, None, Duration::from_millis(200))
                .unwrap();
            assert_eq!(result.status, RunStatus::Killed);
            assert_eq!(result.status.code(), None);
            assert!(start.elapsed() < Duration::from_secs(4));
        }

        #[test_log::test]
        fn should_kill_what_the_program_started_at_the_deadline() {
            let dir = tempfile::tempdir().unwrap();
            utils::write_script(dir.path(), "prog", "sleep 4; echo done");

            let start = Instant::now();
            let result = ProcessRunner::in_dir(dir.path())
                .run(&["./prog".to_string()], None, Duration::from_millis(200))
                .unwrap();
            assert_eq!(result.status, RunStatus::Killed);
            assert_eq!(result.output, "");
            assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());
        }

        #[test_log::test]
        fn should_not_wait_for_background_processes_holding_the_output() {
            let dir = tempfile::tempdir().unwrap();
            utils::write_script(dir.path(), "prog", "sleep 4 &\necho started");

            let start = Instant::now();
            let result = ProcessRunner::in_dir(dir.path())
                .run(&["./prog".to_string()], None, DEFAULT_TIMEOUT)
                .unwrap();
            assert_eq!(result.status, RunStatus::Exited(0));
            assert_eq!(result.output, "started");
            assert!(start.elapsed() < Duration::from_secs(3), "took {:?}", start.elapsed());
        }

        #[test_log::test]
        fn should_resolve_relative_programs_against_working_dir() {
            let dir = tempfile::tempdir().unwrap();
            utils::write_script(dir.path(), "hello", "echo hello from $(basename \"$PWD\")");

            let cmd = vec!["./hello".to_string()];
            let result = ProcessRunner::in_dir(dir.path())
                .run(&cmd, None, DEFAULT_TIMEOUT)
                .unwrap();
            let dir_name = dir.path().file_name().unwrap().to_string_lossy();
            assert_eq!(result.output, format!("hello from {dir_name}"));
        }

        #[test_log::test]
        fn should_fail_to_spawn_a_missing_program() {
            let cmd = vec!["____invalid_command".to_string()];
            assert!(ProcessRunner::new().run(&cmd, None, DEFAULT_TIMEOUT).is_err());
            assert!(ProcessRunner::new().run(&[], None, DEFAULT_TIMEOUT).is_err());
        }
    }

    #[test]
    fn should_display_commands_shell_quoted() {
        let cmd = vec!["./prog".to_string(), "two words".to_string(), "-x".to_string()];
        assert_eq!(display_command(&cmd), "./prog 'two words' -x");
    }

    mod run_command_tests {
        use super::*;

        #[test_log::test]
        fn should_accept_a_successful_command() {
            ProcessRunner::new().run_command(&sh("true")).unwrap();
        }

        #[test_log::test]
        fn should_surface_output_of_a_failed_command() {
            let err = ProcessRunner::new()
                .run_command(&sh("echo no rule to make target; exit 2"))
                .unwrap_err();
            match err {
                Error::Command { cmd, code, output } => {
                    assert_eq!(cmd[0], "sh");
                    assert_eq!(code, 2);
                    assert_eq!(output, "no rule to make target");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[test_log::test]
        fn should_report_launch_failures_as_io_errors() {
            let err = ProcessRunner::new()
                .run_command(&["____invalid_command".to_string()])
                .unwrap_err();
            assert!(matches!(err, Error::Io { .. }));
        }
    }
}
