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

//! Long-running connectivity probes on guests.
//!
//! A probe is a detached `ping` whose output goes to a log file on the
//! guest. It shares nothing with the code that reshapes the topology while
//! it runs, apart from the addresses it was started with.

use crate::harness::error::HarnessError;
use crate::harness::remote::{RemoteShell, RemoteTarget, run_remote_command};
use regex::Regex;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SUMMARY_PATTERN: &str = r"(\d+) packets transmitted,.*?(\d+(?:\.\d+)?)% packet loss";
const HOSTNAME_PATTERN: &str = r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,62})(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,62}))*$";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingSummary {
    pub packets_transmitted: u64,
    pub packet_loss_percent: f64,
}

fn summary_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(SUMMARY_PATTERN).ok()).as_ref()
}

fn hostname_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(HOSTNAME_PATTERN).ok()).as_ref()
}

/// The destination ends up in a guest shell line, so only addresses and
/// plain hostnames are accepted.
fn validate_destination(destination: &str) -> Result<(), HarnessError> {
    let is_hostname = || hostname_pattern().is_some_and(|p| p.is_match(destination));
    if destination.parse::<IpAddr>().is_ok() || is_hostname() {
        Ok(())
    } else {
        Err(HarnessError::invalid_state(format!(
            "ping destination '{destination}' is not an IP address or hostname"
        )))
    }
}

/// Extract the transmitted count and loss percentage from ping's summary.
///
/// `None` means no summary line was found, which is not the same as zero loss.
pub fn parse_ping_summary(text: &str) -> Option<PingSummary> {
    let captures = summary_pattern()?.captures(text)?;
    Some(PingSummary {
        packets_transmitted: captures.get(1)?.as_str().parse().ok()?,
        packet_loss_percent: captures.get(2)?.as_str().parse().ok()?,
    })
}

/// A ping running in the background on a guest.
pub struct BackgroundPing {
    shell: Arc<dyn RemoteShell>,
    target: RemoteTarget,
    destination: String,
    pid: u32,
    log_path: String,
    stopped: bool,
}

impl std::fmt::Debug for BackgroundPing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundPing")
            .field("host", &self.target.host)
            .field("destination", &self.destination)
            .field("pid", &self.pid)
            .field("log_path", &self.log_path)
            .finish()
    }
}

/// Start `ping` from `target` to `destination` as a detached process.
pub fn start_background_ping(
    shell: Arc<dyn RemoteShell>,
    target: &RemoteTarget,
    destination: &str,
    timeout: Duration,
) -> Result<BackgroundPing, HarnessError> {
    validate_destination(destination)?;
    let log_path = format!("/tmp/cloud-harness-ping-{}.log", Uuid::now_v7().simple());
    let command = format!("nohup ping -q {destination} > {log_path} 2>&1 < /dev/null & echo $!");
    let output = run_remote_command(shell.as_ref(), target, &command, timeout)?;
    let pid = output
        .stdout
        .iter()
        .rev()
        .find_map(|line| line.trim().parse::<u32>().ok())
        .ok_or_else(|| HarnessError::UnparseableProbeOutput {
            output: output.stdout_text(),
        })?;

    info!(
        "Started background ping {} -> {destination} (pid {pid})",
        target.host
    );
    Ok(BackgroundPing {
        shell,
        target: target.clone(),
        destination: destination.to_string(),
        pid,
        log_path,
        stopped: false,
    })
}

impl BackgroundPing {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Interrupt the probe and block until its summary has been collected.
    pub fn stop(mut self, timeout: Duration) -> Result<PingSummary, HarnessError> {
        self.stopped = true;
        let command = format!(
            "kill -INT {pid}; sleep 1; cat {log}; rm -f {log}",
            pid = self.pid,
            log = self.log_path
        );
        let output = run_remote_command(self.shell.as_ref(), &self.target, &command, timeout)?;
        let text = output.stdout_text();
        debug!("Background ping {} output: {text}", self.pid);
        let summary = parse_ping_summary(&text)
            .ok_or(HarnessError::UnparseableProbeOutput { output: text })?;
        info!(
            "Background ping {} -> {}: {} transmitted, {}% loss",
            self.target.host,
            self.destination,
            summary.packets_transmitted,
            summary.packet_loss_percent
        );
        Ok(summary)
    }
}

impl Drop for BackgroundPing {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        warn!(
            "Background ping {} on {} dropped without stop, killing it",
            self.pid, self.target.host
        );
        let command = format!("kill -INT {}; rm -f {}", self.pid, self.log_path);
        if let Err(e) = run_remote_command(
            self.shell.as_ref(),
            &self.target,
            &command,
            Duration::from_secs(10),
        ) {
            warn!("Failed to kill background ping {}: {e}", self.pid);
        }
    }
}
