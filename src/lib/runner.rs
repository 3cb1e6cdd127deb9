//! Process Runner for makensis
//!
//! Launches one makensis process per call and normalizes the outcome into an
//! [`ExecResult`]. Two flavours share the same result shape:
//! - [`spawn_makensis`] returns immediately with a [`MakensisTask`]; stdout and
//!   stderr are drained on background threads while the caller keeps going.
//! - [`spawn_makensis_sync`] blocks until makensis exits.
//!
//! Neither flavour retries, times out or cancels.

use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use crate::args_mapper::{
    InvocationPlan, SpawnOptions, CMDHELP_FLAG, HDRINFO_FLAG, LICENSE_FLAG, VERSION_FLAG,
};
use crate::debug::log_debug;
use crate::options::ShellSetting;
use crate::output_parser::{count_warnings, interpret, StructuredOutput};

/// Flags whose output can be interpreted
const INFORMATIONAL_FLAGS: [&str; 4] = [VERSION_FLAG, LICENSE_FLAG, HDRINFO_FLAG, CMDHELP_FLAG];

/// Captured standard output, raw or interpreted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Stdout {
    Raw(String),
    Structured(StructuredOutput),
}

impl Default for Stdout {
    fn default() -> Self {
        Stdout::Raw(String::new())
    }
}

impl Stdout {
    /// Raw text, if the output was not interpreted
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Stdout::Raw(text) => Some(text),
            Stdout::Structured(_) => None,
        }
    }

    /// Structured value, if the output was interpreted
    pub fn structured(&self) -> Option<&StructuredOutput> {
        match self {
            Stdout::Raw(_) => None,
            Stdout::Structured(output) => Some(output),
        }
    }
}

/// Outcome of one makensis call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    /// Exit code; `None` when the process could not be spawned or was killed
    pub status: Option<i32>,
    /// Trimmed standard output
    pub stdout: Stdout,
    /// Trimmed standard error
    pub stderr: String,
    /// Number of compiler warnings, for compile calls in JSON mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<u32>,
}

impl ExecResult {
    /// Whether makensis exited with status 0
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Convert to JSON Value
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

enum TaskState {
    Running(JoinHandle<ExecResult>),
    Finished(ExecResult),
}

/// Handle to a makensis process started with [`spawn_makensis`]
pub struct MakensisTask {
    state: TaskState,
}

impl MakensisTask {
    /// Whether the process has exited and its output is collected
    pub fn is_finished(&self) -> bool {
        match &self.state {
            TaskState::Running(handle) => handle.is_finished(),
            TaskState::Finished(_) => true,
        }
    }

    /// Wait for makensis to exit.
    ///
    /// Resolves to `Ok` on status 0 and `Err` with the same result shape
    /// otherwise, including spawn failures.
    pub fn wait(self) -> Result<ExecResult, ExecResult> {
        let result = match self.state {
            TaskState::Finished(result) => result,
            TaskState::Running(handle) => handle.join().unwrap_or_else(|_| ExecResult {
                stderr: "makensis runner thread panicked".to_string(),
                ..Default::default()
            }),
        };

        if result.success() {
            Ok(result)
        } else {
            Err(result)
        }
    }
}

impl InvocationPlan {
    /// Start the planned process without blocking
    pub fn spawn(&self) -> MakensisTask {
        spawn_makensis(&self.program, &self.args, &self.spawn_options)
    }

    /// Run the planned process to completion
    pub fn run_sync(&self) -> ExecResult {
        spawn_makensis_sync(&self.program, &self.args, &self.spawn_options)
    }
}

/// Start makensis and return a task that resolves when it exits
pub fn spawn_makensis(program: &str, args: &[String], options: &SpawnOptions) -> MakensisTask {
    log_debug("Runner", &format!("Spawning {} {}", program, args.join(" ")));

    let mut command = build_command(program, args, options);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return MakensisTask {
                state: TaskState::Finished(spawn_failure(program, &e)),
            }
        }
    };

    let args = args.to_vec();
    let json = options.json;
    let handle = thread::spawn(move || collect_child(child, &args, json));

    MakensisTask {
        state: TaskState::Running(handle),
    }
}

/// Run makensis and block until it exits. Never fails on non-zero status.
pub fn spawn_makensis_sync(program: &str, args: &[String], options: &SpawnOptions) -> ExecResult {
    log_debug("Runner", &format!("Running {} {}", program, args.join(" ")));

    let mut command = build_command(program, args, options);
    command.stdin(Stdio::null());

    match command.output() {
        Ok(output) => finish(
            output.status.code(),
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
            args,
            options.json,
        ),
        Err(e) => spawn_failure(program, &e),
    }
}

/// Drain both pipes concurrently, then wait for the exit status
fn collect_child(mut child: Child, args: &[String], json: bool) -> ExecResult {
    let stdout_handle = child.stdout.take().map(spawn_reader);
    let stderr_handle = child.stderr.take().map(spawn_reader);

    let stdout = join_reader(stdout_handle);
    let stderr = join_reader(stderr_handle);

    let status = match child.wait() {
        Ok(status) => status.code(),
        Err(e) => {
            log_debug("Runner", &format!("Error waiting for makensis: {}", e));
            None
        }
    };

    finish(status, &stdout, &stderr, args, json)
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log_debug("Runner", &format!("Error reading makensis output: {}", e));
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}

/// Build the normalized result, interpreting stdout in JSON mode
pub(crate) fn finish(
    status: Option<i32>,
    stdout: &str,
    stderr: &str,
    args: &[String],
    json: bool,
) -> ExecResult {
    let stdout = stdout.trim();
    let stderr = stderr.trim();

    log_debug("Runner", &format!("makensis exited with status {:?}", status));

    let mut result = ExecResult {
        status,
        stdout: Stdout::Raw(stdout.to_string()),
        stderr: stderr.to_string(),
        warnings: None,
    };

    if !json {
        return result;
    }

    match command_tag(args) {
        Some(tag) => {
            if let Some(structured) = interpret(tag, stdout, stderr) {
                result.stdout = Stdout::Structured(structured);
            }
        }
        None => result.warnings = Some(count_warnings(stdout)),
    }

    result
}

/// The informational flag of an invocation. Under wine the first argument
/// is the makensis path, so the flag is looked up in the first two.
pub fn command_tag(args: &[String]) -> Option<&str> {
    args.iter()
        .take(2)
        .map(String::as_str)
        .find(|arg| INFORMATIONAL_FLAGS.contains(arg))
}

fn spawn_failure(program: &str, error: &std::io::Error) -> ExecResult {
    let message = format!("Failed to spawn {}: {}", program, error);
    log_debug("Runner", &message);
    ExecResult {
        status: None,
        stdout: Stdout::default(),
        stderr: message,
        warnings: None,
    }
}

fn build_command(program: &str, args: &[String], options: &SpawnOptions) -> Command {
    let mut command = match &options.shell {
        Some(shell) => shell_command(shell, &join_command_line(program, args)),
        None => {
            let mut command = Command::new(program);
            command.args(args);
            command
        }
    };

    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }

    command.envs(&options.env);

    if options.detached {
        detach(&mut command);
    }

    command
}

/// Command that runs `command_line` through the configured shell
fn shell_command(shell: &ShellSetting, command_line: &str) -> Command {
    let program = match shell {
        ShellSetting::Program(program) => program.clone(),
        ShellSetting::Enabled(_) => default_shell(),
    };

    let mut command = Command::new(&program);
    if is_cmd_shell(&program) {
        cmd_shell_args(&mut command, command_line);
    } else {
        command.arg("-c").arg(command_line);
    }
    command
}

/// Whether `program` is cmd.exe, which takes `/d /s /c` instead of `-c`
pub fn is_cmd_shell(program: &str) -> bool {
    let name = program.rsplit(['/', '\\']).next().unwrap_or(program);
    name.eq_ignore_ascii_case("cmd") || name.eq_ignore_ascii_case("cmd.exe")
}

#[cfg(windows)]
fn cmd_shell_args(command: &mut Command, command_line: &str) {
    use std::os::windows::process::CommandExt;

    command.args(["/d", "/s", "/c"]);
    command.raw_arg(format!("\"{}\"", command_line));
}

#[cfg(not(windows))]
fn cmd_shell_args(command: &mut Command, command_line: &str) {
    command.args(["/d", "/s", "/c", command_line]);
}

fn default_shell() -> String {
    if cfg!(windows) {
        std::env::var("ComSpec").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        "/bin/sh".to_string()
    }
}

/// Join program and arguments into one shell command line
pub fn join_command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(quote_arg)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote an argument for the platform shell
pub fn quote_arg(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));

    if is_plain {
        return arg.to_string();
    }

    if cfg!(windows) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: setsid is async-signal-safe and touches no parent state
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;

    const DETACHED_PROCESS: u32 = 0x0000_0008;
    command.creation_flags(DETACHED_PROCESS);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}
