/*
 * Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

//! Running commands on guests.
//!
//! The transport is a [`RemoteShell`]; [`SshShell`] drives the system ssh
//! client as a child process. Completion is detected by polling the
//! process, never by callback.

use crate::harness::error::HarnessError;
use crate::harness::polling::{RetryPolicy, poll_until, retry};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Stderr fragments that mean the guest is not reachable yet.
pub const TRANSIENT_CONNECTION_ERRORS: [&str; 2] = ["No route to host", "Connection refused"];

const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(100);
const SIGTERM_TIMEOUT: Duration = Duration::from_secs(5);
const SIGKILL_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub user: String,
    pub key_file: Option<PathBuf>,
    /// Extra `-o` options for the transport.
    pub options: Vec<String>,
}

impl RemoteTarget {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            key_file: None,
            options: Vec::new(),
        }
    }

    pub fn with_key_file(mut self, key_file: impl Into<PathBuf>) -> Self {
        self.key_file = Some(key_file.into());
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn from_text(stdout: &str, stderr: &str, exit_code: Option<i32>) -> Self {
        Self {
            stdout: stdout.lines().map(str::to_string).collect(),
            stderr: stderr.lines().map(str::to_string).collect(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }
}

/// A command started on a remote host.
pub trait RemoteProcess: Send {
    /// True once the process has exited.
    fn try_wait(&mut self) -> Result<bool, HarnessError>;
    fn kill(&mut self);
    /// Collect the output of a finished (or killed) process.
    fn output(self: Box<Self>) -> Result<CommandOutput, HarnessError>;
}

pub trait RemoteShell: Send + Sync {
    fn spawn(
        &self,
        target: &RemoteTarget,
        command: &str,
    ) -> Result<Box<dyn RemoteProcess>, HarnessError>;
}

/// Run `command` on `target`, waiting at most `timeout` for it to exit.
pub fn run_remote_command(
    shell: &dyn RemoteShell,
    target: &RemoteTarget,
    command: &str,
    timeout: Duration,
) -> Result<CommandOutput, HarnessError> {
    debug!("Running '{command}' on {}@{}", target.user, target.host);
    let mut process = shell.spawn(target, command)?;
    let finished = poll_until(
        &format!("'{command}' on {}", target.host),
        timeout,
        COMMAND_POLL_INTERVAL,
        || Ok(process.try_wait()?.then_some(())),
    );
    match finished {
        Ok(()) => process.output(),
        Err(HarnessError::Timeout { .. }) => {
            process.kill();
            Err(HarnessError::CommandTimeout {
                host: target.host.clone(),
                command: command.to_string(),
                timeout,
            })
        }
        Err(e) => {
            process.kill();
            Err(e)
        }
    }
}

/// True when stderr shows the guest refusing or not routing connections yet.
pub fn is_transient_connection_error(output: &CommandOutput) -> bool {
    output.stderr.iter().any(|line| {
        TRANSIENT_CONNECTION_ERRORS
            .iter()
            .any(|marker| line.contains(marker))
    })
}

/// [`run_remote_command`] retried while the connection looks transient.
///
/// Timeouts and other errors are returned without retrying.
pub fn run_remote_command_with_retry(
    shell: &dyn RemoteShell,
    target: &RemoteTarget,
    command: &str,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<CommandOutput, HarnessError> {
    retry(
        policy,
        |result: &Result<CommandOutput, HarnessError>| {
            let transient = matches!(result, Ok(output) if is_transient_connection_error(output));
            if transient {
                warn!("Transient connection error from {}, retrying", target.host);
            }
            transient
        },
        || run_remote_command(shell, target, command, timeout),
    )
}

/// Runs commands through the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshShell {
    program: String,
}

impl Default for SshShell {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
        }
    }
}

impl SshShell {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, target: &RemoteTarget, command: &str) -> Command {
        let mut ssh = Command::new(&self.program);
        ssh.arg("-o").arg("BatchMode=yes");
        for option in &target.options {
            ssh.arg("-o").arg(option);
        }
        if let Some(key_file) = &target.key_file {
            ssh.arg("-i").arg(key_file);
        }
        ssh.arg(format!("{}@{}", target.user, target.host))
            .arg("--")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        ssh
    }
}

impl RemoteShell for SshShell {
    fn spawn(
        &self,
        target: &RemoteTarget,
        command: &str,
    ) -> Result<Box<dyn RemoteProcess>, HarnessError> {
        let mut child = self.command(target, command).spawn()?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        Ok(Box::new(SshProcess {
            child,
            stdout,
            stderr,
            exit_code: None,
        }))
    }
}

struct SshProcess {
    child: Child,
    stdout: Option<JoinHandle<Vec<u8>>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    exit_code: Option<i32>,
}

impl RemoteProcess for SshProcess {
    fn try_wait(&mut self) -> Result<bool, HarnessError> {
        match self.child.try_wait()? {
            Some(status) => {
                self.exit_code = status.code();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn kill(&mut self) {
        graceful_kill(&mut self.child);
    }

    fn output(mut self: Box<Self>) -> Result<CommandOutput, HarnessError> {
        if self.exit_code.is_none() {
            self.exit_code = self.child.wait()?.code();
        }
        let stdout = collect(self.stdout.take());
        let stderr = collect(self.stderr.take());
        Ok(CommandOutput::from_text(&stdout, &stderr, self.exit_code))
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = reader.read_to_end(&mut buffer);
        buffer
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// SIGTERM, wait up to 5s, then SIGKILL.
fn graceful_kill(child: &mut Child) {
    let pid = child.id() as libc::pid_t;

    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }

    let deadline = Instant::now() + SIGTERM_TIMEOUT;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(_)) | Err(_) => return,
            Ok(None) => thread::sleep(SIGKILL_POLL_INTERVAL),
        }
    }

    unsafe {
        libc::kill(pid, libc::SIGKILL);
    }
    let _ = child.wait();
}
